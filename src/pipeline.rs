//! 実行パイプライン
//!
//! フェッチ → 抽出 → 照合 → 永続化 → レポートを1回の実行として
//! 順番に進める。ソース単位の失敗はスキップ注釈に変換して続行し、
//! 致命的エラー (`Config` / `NoData` / `Persistence`) のみ実行を
//! 失敗させる。その場合もサマリーは必ず書き出す。

use std::collections::BTreeSet;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::error::ScrapeError;
use crate::extract::extract_records;
use crate::fetch::{BrowserFetcher, Fetcher, StaticFetcher};
use crate::model::{DailySnapshot, ExecutionSummary, RateRecord, SkippedSource};
use crate::reconcile::reconcile;
use crate::report;
use crate::sources::{default_sources, RenderMode, SourceDescriptor};
use crate::store::RateStore;

/// 1回の実行の結果
#[derive(Debug)]
pub struct RunOutcome {
    pub snapshot: Option<DailySnapshot>,
    pub summary: ExecutionSummary,
}

/// 実行コンテキスト
///
/// 設定とフェッチャーを保持し、1回のスケジュール起動ごとに
/// 生成・破棄する。テストではスタブのフェッチャーを注入できる。
pub struct Pipeline {
    config: RunConfig,
    sources: Vec<SourceDescriptor>,
    static_fetcher: Box<dyn Fetcher>,
    browser_fetcher: Box<dyn Fetcher>,
}

impl Pipeline {
    pub fn new(config: RunConfig) -> Result<Self, ScrapeError> {
        let sources = default_sources(&config.currency);
        let static_fetcher: Box<dyn Fetcher> = Box::new(StaticFetcher::new(&config)?);
        let browser_fetcher: Box<dyn Fetcher> = Box::new(BrowserFetcher::new(&config));
        Ok(Self::with_fetchers(
            config,
            sources,
            static_fetcher,
            browser_fetcher,
        ))
    }

    /// フェッチャーを差し替えて構築する (テスト用の継ぎ目)
    pub fn with_fetchers(
        config: RunConfig,
        sources: Vec<SourceDescriptor>,
        static_fetcher: Box<dyn Fetcher>,
        browser_fetcher: Box<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            sources,
            static_fetcher,
            browser_fetcher,
        }
    }

    fn fetcher_for(&self, mode: RenderMode) -> &dyn Fetcher {
        match mode {
            RenderMode::Static => self.static_fetcher.as_ref(),
            RenderMode::Rendered => self.browser_fetcher.as_ref(),
        }
    }

    /// 全ソースからレコードを収集する
    ///
    /// 実行全体のデッドラインを超えたら残りのソースを諦め、
    /// それまでに集めたレコードで照合に進む (部分結果ポリシー)。
    /// スキップできるのはソース単位のエラーのみで、致命的エラーは
    /// 収集を中断して伝播する。
    async fn collect(
        &self,
        currency_pair: &str,
    ) -> Result<(Vec<RateRecord>, BTreeSet<String>, Vec<SkippedSource>), ScrapeError> {
        let started = Instant::now();
        let mut records = Vec::new();
        let mut sources_used = BTreeSet::new();
        let mut skipped = Vec::new();

        for source in &self.sources {
            if started.elapsed() >= self.config.run_deadline {
                warn!(
                    "Run deadline ({}s) exceeded, skipping remaining sources",
                    self.config.run_deadline.as_secs()
                );
                skipped.push(SkippedSource {
                    source: source.id.clone(),
                    reason: "実行デッドライン超過".to_string(),
                });
                continue;
            }

            let html = match self.fetcher_for(source.mode).fetch(source).await {
                Ok(html) => html,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Skipping {}: {}", source.id, e);
                    skipped.push(SkippedSource {
                        source: source.id.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match extract_records(&html, source, currency_pair, Utc::now()) {
                Ok(extracted) => {
                    info!("{}: {} records extracted", source.id, extracted.len());
                    sources_used.insert(source.id.clone());
                    records.extend(extracted);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    // 構造が見つからない = レイアウト変更の可能性が高い
                    warn!("Skipping {} (site layout may have changed): {}", source.id, e);
                    skipped.push(SkippedSource {
                        source: source.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok((records, sources_used, skipped))
    }

    /// パイプラインを実行する
    ///
    /// 戻り値が `Err` の場合もサマリーは書き出し済み。
    pub async fn run(&self, date: NaiveDate) -> Result<RunOutcome, ScrapeError> {
        info!(
            "Starting scrape run for {} ({} sources, dry_run={})",
            date,
            self.sources.len(),
            self.config.dry_run
        );

        // 永続化の事前確認: フェッチに時間を使う前に接続を確立する。
        // 接続は実行スコープで保持し、終了時にドロップで解放される。
        let store = if self.config.dry_run {
            None
        } else {
            match RateStore::connect(&self.config).await {
                Ok(store) => Some(store),
                Err(e) => {
                    let summary = report::build_summary(None, &[]);
                    report::write_summary(&summary, &self.config.summary_path);
                    return Err(e);
                }
            }
        };

        let (records, sources_used, skipped) =
            match self.collect(&self.config.currency_pair()).await {
                Ok(collected) => collected,
                Err(e) => {
                    let summary = report::build_summary(None, &[]);
                    report::write_summary(&summary, &self.config.summary_path);
                    return Err(e);
                }
            };

        let snapshot = match reconcile(records, &self.sources, sources_used, date) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // 全ソース失敗: ドキュメントは書かず、失敗サマリーのみ残す
                let summary = report::build_summary(None, &skipped);
                report::write_summary(&summary, &self.config.summary_path);
                return Err(e);
            }
        };

        report::log_rate_table(&snapshot);

        if let Some(store) = &store {
            if let Err(e) = store.upsert_snapshot(&snapshot).await {
                let mut summary = report::build_summary(Some(&snapshot), &skipped);
                summary.status = crate::model::RunStatus::Failure;
                report::write_summary(&summary, &self.config.summary_path);
                return Err(e);
            }
        } else {
            info!("Dry run: skipping persistence");
        }

        let summary = report::build_summary(Some(&snapshot), &skipped);
        report::write_summary(&summary, &self.config.summary_path);

        info!(
            "Run completed: {} banks, status {:?}",
            snapshot.total_banks, summary.status
        );

        Ok(RunOutcome {
            snapshot: Some(snapshot),
            summary,
        })
    }
}
