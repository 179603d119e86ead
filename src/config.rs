use std::path::PathBuf;
use std::time::Duration;

use crate::error::ScrapeError;

/// MongoDB接続文字列の環境変数名
pub const MONGODB_ENV_KEY: &str = "MONGODB_CONNECTION_STRING";

/// 実行全体の設定
///
/// 1回のスケジュール起動ごとに1つ生成し、各コンポーネントへ渡す。
/// モジュールレベルのグローバル状態は持たない。
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// MongoDB接続文字列 (dry-run時はNoneを許容)
    pub mongodb_uri: Option<String>,
    pub db_name: String,
    pub collection_name: String,
    /// 収集対象の外貨 (通貨ペアは "{currency}/LKR")
    pub currency: String,
    pub headless: bool,
    pub debug: bool,
    /// 永続化をスキップする
    pub dry_run: bool,
    /// 静的ページ取得のタイムアウト
    pub static_timeout: Duration,
    /// ブラウザレンダリングのタイムアウト
    pub render_timeout: Duration,
    /// 実行全体のウォールクロック上限
    pub run_deadline: Duration,
    pub screenshots_dir: PathBuf,
    pub summary_path: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mongodb_uri: None,
            db_name: "exchange_rates".to_string(),
            collection_name: "daily_aud_rates".to_string(),
            currency: "AUD".to_string(),
            headless: true,
            debug: false,
            dry_run: false,
            static_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(60),
            run_deadline: Duration::from_secs(600),
            screenshots_dir: PathBuf::from("./screenshots"),
            summary_path: PathBuf::from("./execution_summary.json"),
        }
    }
}

impl RunConfig {
    /// 環境変数から設定を構築する
    ///
    /// `MONGODB_CONNECTION_STRING` が未設定かつdry-runでない場合は
    /// フェッチ開始前に設定エラーとして失敗する。
    pub fn from_env(dry_run: bool) -> Result<Self, ScrapeError> {
        let mongodb_uri = std::env::var(MONGODB_ENV_KEY).ok().filter(|v| !v.is_empty());

        if mongodb_uri.is_none() && !dry_run {
            return Err(ScrapeError::Config(format!(
                "{} が設定されていません。シークレットを確認してください",
                MONGODB_ENV_KEY
            )));
        }

        Ok(Self {
            mongodb_uri,
            dry_run,
            ..Default::default()
        })
    }

    pub fn with_mongodb_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongodb_uri = Some(uri.into());
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// デバッグモード: ログ詳細化に加えてタイムアウトを延長する
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        if debug {
            self.static_timeout = self.static_timeout * 2;
            self.render_timeout = self.render_timeout * 2;
            self.run_deadline = self.run_deadline * 2;
        }
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline = deadline;
        self
    }

    pub fn with_summary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_path = path.into();
        self
    }

    pub fn with_screenshots_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshots_dir = dir.into();
        self
    }

    /// 通貨ペア表記 (例: "AUD/LKR")
    pub fn currency_pair(&self) -> String {
        format!("{}/LKR", self.currency)
    }
}
