//! ページ取得層
//!
//! 静的HTTP取得とブラウザレンダリング取得を同じ `Fetcher` トレイトで
//! 抽象化する。パイプラインはソースの `RenderMode` に応じて使い分ける。

mod browser;
mod static_http;

pub use browser::BrowserFetcher;
pub use static_http::StaticFetcher;

use async_trait::async_trait;

use crate::error::ScrapeError;
use crate::sources::SourceDescriptor;

/// リトライ設定
pub(crate) const MAX_RETRIES: u32 = 3;
pub(crate) const INITIAL_BACKOFF_MS: u64 = 1000;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// ソースのHTMLを取得する
    ///
    /// 失敗はソース単位のエラーとして返し、呼び出し側が
    /// スキップを判断する (実行全体は止めない)。
    async fn fetch(&self, source: &SourceDescriptor) -> Result<String, ScrapeError>;
}
