use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("取得エラー [{source_id}]: {message}")]
    Fetch { source_id: String, message: String },

    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("解析エラー [{source_id}]: {message}")]
    Parse { source_id: String, message: String },

    #[error("全ソースからレートを取得できませんでした")]
    NoData,

    #[error("永続化エラー: {0}")]
    Persistence(String),
}

impl ScrapeError {
    /// ソース単位でスキップできず、実行全体を失敗させるエラーか
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScrapeError::Config(_) | ScrapeError::NoData | ScrapeError::Persistence(_)
        )
    }
}
