use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::NaiveDate;
use tower::Service;
use tracing::info;

use crate::config::RunConfig;
use crate::error::ScrapeError;
use crate::pipeline::{Pipeline, RunOutcome};

/// スクレイプ実行リクエスト
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub config: RunConfig,
    /// 対象日 (未指定なら当日)
    pub date: Option<NaiveDate>,
}

impl RunRequest {
    pub fn new(config: RunConfig) -> Self {
        Self { config, date: None }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// tower::Serviceを実装したスクレイパーサービス
///
/// パイプラインをService境界で公開する組み込み用の表面。
#[derive(Debug, Clone, Default)]
pub struct ScrapeService {
    // 将来的な拡張用（レートリミットなど）
}

impl ScrapeService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<RunRequest> for ScrapeService {
    type Response = RunOutcome;
    type Error = ScrapeError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RunRequest) -> Self::Future {
        info!(
            "Scrape request received: currency={} dry_run={}",
            req.config.currency, req.config.dry_run
        );

        Box::pin(async move {
            let date = req
                .date
                .unwrap_or_else(|| crate::local_date());

            let pipeline = Pipeline::new(req.config)?;
            pipeline.run(date).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_request_builder() {
        let config = RunConfig::default().with_dry_run(true);
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let req = RunRequest::new(config).with_date(date);

        assert_eq!(req.date, Some(date));
        assert!(req.config.dry_run);
    }
}
