//! 為替レートスクレイパーライブラリ
//!
//! - アグリゲータ (tools.numbers.lk) と各銀行サイトからAUD/LKRレートを収集
//! - ソース間の矛盾を優先度で照合して日次スナップショットを構築
//! - MongoDBに日付キーでupsertし、実行サマリーをJSONで出力
//!
//! # 使用例
//!
//! ```rust,ignore
//! use exrate_scraper::{Pipeline, RunConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RunConfig::from_env(false).unwrap().with_debug(true);
//!     let pipeline = Pipeline::new(config).unwrap();
//!
//!     let outcome = pipeline.run(exrate_scraper::local_date()).await.unwrap();
//!     println!("banks: {}", outcome.summary.total_banks_scraped);
//! }
//! ```
//!
//! # tower::Service 経由の使用例
//!
//! ```rust,ignore
//! use exrate_scraper::{RunConfig, RunRequest, ScrapeService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = ScrapeService::new();
//!     let request = RunRequest::new(RunConfig::from_env(false).unwrap());
//!     let outcome = service.call(request).await.unwrap();
//!     println!("status: {:?}", outcome.summary.status);
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod service;
pub mod sources;
pub mod store;

// 主要な型をリエクスポート
pub use config::RunConfig;
pub use error::ScrapeError;
pub use fetch::{BrowserFetcher, Fetcher, StaticFetcher};
pub use model::{DailySnapshot, ExecutionSummary, RateRecord, RunStatus, SkippedSource};
pub use pipeline::{Pipeline, RunOutcome};
pub use service::{RunRequest, ScrapeService};
pub use sources::{default_sources, SourceDescriptor};
pub use store::RateStore;

use chrono::{FixedOffset, NaiveDate, Utc};

/// スリランカ時間 (UTC+5:30) での今日の日付
///
/// スナップショットのキーは収集対象市場のカレンダー日付に合わせる。
pub fn local_date() -> NaiveDate {
    let colombo = FixedOffset::east_opt(5 * 3600 + 1800).expect("valid offset");
    Utc::now().with_timezone(&colombo).date_naive()
}
