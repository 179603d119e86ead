//! ブラウザレンダリングによるページ取得
//!
//! JavaScript実行後のDOMが必要なソース (numbers.lk など) 用。
//! フェッチごとに独立したブラウザセッションを起動し、成功・失敗・
//! タイムアウトのどの経路でも必ずセッションを解放する。
//! ブラウザ経路の失敗時は解放前にスクリーンショットを保存する。

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use chrono::Utc;
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::ScrapeError;
use crate::sources::{SourceDescriptor, WaitCondition};

use super::Fetcher;

/// セレクタ出現ポーリングのインターバル
const SELECTOR_POLL_INTERVAL_MS: u64 = 500;
/// レンダリング完了後の安定待機
const SETTLE_SECS: u64 = 3;

/// chromiumoxideによるレンダリングフェッチャー
pub struct BrowserFetcher {
    headless: bool,
    debug: bool,
    render_timeout: Duration,
    screenshots_dir: PathBuf,
}

impl BrowserFetcher {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            headless: config.headless,
            debug: config.debug,
            render_timeout: config.render_timeout,
            screenshots_dir: config.screenshots_dir.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<String, ScrapeError> {
        info!("Rendering {} ({})", source.id, source.url);

        let mut session = BrowserSession::launch(self.headless, self.debug).await?;

        // タイムアウトでrender futureが中断されてもセッションは
        // 生きているため、スクリーンショットと解放は必ず行える
        let rendered = tokio::time::timeout(self.render_timeout, session.render(source)).await;

        let result = match rendered {
            Ok(Ok(html)) => Ok(html),
            Ok(Err(e)) => {
                session
                    .capture_failure_screenshot(&source.id, &self.screenshots_dir)
                    .await;
                Err(e)
            }
            Err(_) => {
                session
                    .capture_failure_screenshot(&source.id, &self.screenshots_dir)
                    .await;
                Err(ScrapeError::Timeout(format!(
                    "{}: レンダリングが{}秒以内に完了しませんでした",
                    source.id,
                    self.render_timeout.as_secs()
                )))
            }
        };

        session.teardown().await;
        result
    }
}

/// 1フェッチ分のブラウザセッション
///
/// `teardown` を呼ばずにドロップしてもプロセスは回収されるが、
/// 正常経路では必ず明示的に解放する。
struct BrowserSession {
    browser: Option<Browser>,
    page: Option<Page>,
    debug: bool,
}

impl BrowserSession {
    async fn launch(headless: bool, debug: bool) -> Result<Self, ScrapeError> {
        // ユニークなユーザーデータディレクトリを生成
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("exrate-{}", unique_id));

        // Chrome パスを取得
        let chrome_path = std::env::var("CHROME_PATH")
            .or_else(|_| std::env::var("CHROMIUM_PATH"))
            .unwrap_or_else(|_| "chromium".to_string());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(&user_data_dir)
            .window_size(1920, 1080);

        if !headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(Duration::from_secs(60))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScrapeError::BrowserInit(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScrapeError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::BrowserInit(e.to_string()))?;

        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            debug,
        })
    }

    fn page(&self) -> Result<&Page, ScrapeError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScrapeError::BrowserInit("ページが初期化されていません".into()))
    }

    /// ナビゲートし、待機条件を満たしてからHTMLを取得する
    async fn render(&self, source: &SourceDescriptor) -> Result<String, ScrapeError> {
        let page = self.page()?;

        page.goto(&source.url)
            .await
            .map_err(|e| ScrapeError::Navigation(format!("{}: {}", source.id, e)))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| ScrapeError::Navigation(format!("{}: {}", source.id, e)))?;
        debug!("{}: navigation complete", source.id);

        match &source.wait {
            Some(WaitCondition::Selector(selector)) => {
                self.wait_for_selector(page, source, selector).await?;
            }
            Some(WaitCondition::Delay(delay)) => {
                debug!("{}: fixed delay {:?}", source.id, delay);
                sleep(*delay).await;
            }
            None => {}
        }

        // 動的コンテンツの描画完了を待つ
        sleep(Duration::from_secs(SETTLE_SECS)).await;

        let html = page.content().await.map_err(|e| ScrapeError::Fetch {
            source_id: source.id.clone(),
            message: format!("HTML取得エラー: {}", e),
        })?;

        debug!("{}: {} bytes rendered", source.id, html.len());
        Ok(html)
    }

    /// セレクタの出現をポーリングで待機
    async fn wait_for_selector(
        &self,
        page: &Page,
        source: &SourceDescriptor,
        selector: &str,
    ) -> Result<(), ScrapeError> {
        let script = format!("document.querySelector('{}') !== null", selector);

        for i in 0..60 {
            let present = page
                .evaluate(script.as_str())
                .await
                .ok()
                .and_then(|v| v.into_value::<bool>().ok())
                .unwrap_or(false);

            if present {
                debug!("{}: selector '{}' present", source.id, selector);
                return Ok(());
            }

            if i % 10 == 0 {
                debug!("{}: waiting for '{}'... ({}/60)", source.id, selector, i + 1);
            }
            sleep(Duration::from_millis(SELECTOR_POLL_INTERVAL_MS)).await;
        }

        Err(ScrapeError::Fetch {
            source_id: source.id.clone(),
            message: format!("要素が出現しませんでした: {}", selector),
        })
    }

    /// 失敗診断用のスクリーンショットを保存する (失敗しても実行は継続)
    async fn capture_failure_screenshot(&self, source_id: &str, dir: &Path) {
        let page = match self.page.as_ref() {
            Some(page) => page,
            None => return,
        };

        let shot = page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await;

        let bytes = match shot {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("{}: screenshot capture failed: {}", source_id, e);
                return;
            }
        };

        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Failed to create screenshots directory: {}", e);
            return;
        }

        let filename = format!("{}_{}.png", source_id, Utc::now().format("%H%M%S"));
        let path = dir.join(filename);

        match std::fs::write(&path, &bytes) {
            Ok(_) => info!("Failure screenshot saved: {:?}", path),
            Err(e) => warn!("Failed to save screenshot: {}", e),
        }

        if self.debug {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            debug!(
                "{} screenshot: data:image/png;base64,{}",
                source_id, encoded
            );
        }
    }

    /// セッションを解放する
    async fn teardown(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Failed to close page: {}", e);
            }
        }

        // ブラウザプロセスはドロップで回収される
        self.browser = None;
        debug!("Browser session released");
    }
}
