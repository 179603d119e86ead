//! 静的ページのHTTP取得

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::ScrapeError;
use crate::sources::SourceDescriptor;

use super::{Fetcher, INITIAL_BACKOFF_MS, MAX_RETRIES};

/// 銀行サイトはヘッドレスクライアントを弾くことがあるため
/// ブラウザ相当のヘッダを送る
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// reqwestによる静的フェッチャー (リトライ付き)
pub struct StaticFetcher {
    client: reqwest::Client,
}

impl StaticFetcher {
    pub fn new(config: &RunConfig) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(config.static_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScrapeError::Config(format!("HTTPクライアント構築エラー: {}", e)))?;

        Ok(Self { client })
    }

    async fn get_once(&self, source: &SourceDescriptor) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(&source.url)
            .header("Accept", ACCEPT)
            .header("Accept-Language", "en-US,en;q=0.5")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScrapeError::Timeout(format!("{}: {}", source.id, e))
                } else {
                    ScrapeError::Fetch {
                        source_id: source.id.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Fetch {
                source_id: source.id.clone(),
                message: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(|e| ScrapeError::Fetch {
            source_id: source.id.clone(),
            message: format!("本文読み込みエラー: {}", e),
        })
    }
}

#[async_trait::async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<String, ScrapeError> {
        info!("Fetching {} ({})", source.id, source.url);
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match self.get_once(source).await {
                Ok(html) => {
                    debug!("{}: {} bytes fetched", source.id, html.len());
                    return Ok(html);
                }
                Err(e) => {
                    let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
                    warn!(
                        "{}: attempt {} failed, retrying in {}ms: {}",
                        source.id,
                        attempt + 1,
                        backoff,
                        e
                    );
                    last_error = Some(e);
                    if attempt + 1 < MAX_RETRIES {
                        sleep(Duration::from_millis(backoff)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ScrapeError::Fetch {
            source_id: source.id.clone(),
            message: "リトライ上限到達".to_string(),
        }))
    }
}
