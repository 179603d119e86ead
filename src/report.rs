//! 実行サマリーと診断出力
//!
//! サマリーの生成・書き出しは実行結果を変えない:
//! 書き出し失敗はログに残すだけで握りつぶす。

use std::path::Path;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::model::{
    BestRate, DailySnapshot, ExecutionSummary, RunStatus, SkippedSource,
};

/// パイプラインの結果からサマリーを構築する
pub fn build_summary(
    snapshot: Option<&DailySnapshot>,
    skipped: &[SkippedSource],
) -> ExecutionSummary {
    let status = match snapshot {
        None => RunStatus::Failure,
        Some(_) if skipped.is_empty() => RunStatus::Success,
        Some(_) => RunStatus::Partial,
    };

    let mut summary = ExecutionSummary {
        execution_time: Utc::now(),
        status,
        total_banks_scraped: 0,
        banks_list: Vec::new(),
        sources_used: Default::default(),
        best_rate_to_sell_aud: None,
        best_rate_to_buy_aud: None,
        average_buying_rate: None,
        average_selling_rate: None,
        skipped_sources: skipped.to_vec(),
    };

    let Some(snapshot) = snapshot else {
        return summary;
    };

    summary.total_banks_scraped = snapshot.total_banks;
    summary.banks_list = snapshot.records.iter().map(|r| r.bank_name.clone()).collect();
    summary.sources_used = snapshot.sources_used.clone();
    summary.best_rate_to_sell_aud = Some(BestRate {
        bank: snapshot.best_sell.bank_name.clone(),
        rate: snapshot.best_sell.buy_rate,
    });
    summary.best_rate_to_buy_aud = Some(BestRate {
        bank: snapshot.best_buy.bank_name.clone(),
        rate: snapshot.best_buy.sell_rate,
    });

    let n = snapshot.records.len() as f64;
    if n > 0.0 {
        summary.average_buying_rate =
            Some(snapshot.records.iter().map(|r| r.buy_rate).sum::<f64>() / n);
        summary.average_selling_rate =
            Some(snapshot.records.iter().map(|r| r.sell_rate).sum::<f64>() / n);
    }

    summary
}

/// サマリーをJSONファイルとして書き出す (失敗しても実行は継続)
pub fn write_summary(summary: &ExecutionSummary, path: &Path) {
    let json = match serde_json::to_string_pretty(summary) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize execution summary: {}", e);
            return;
        }
    };

    match std::fs::write(path, json) {
        Ok(_) => info!("Execution summary saved to {:?}", path),
        Err(e) => warn!("Failed to write execution summary: {}", e),
    }
}

/// 収集結果を人の読める形でログに出す
pub fn log_rate_table(snapshot: &DailySnapshot) {
    info!("================================================================");
    info!("ALL BANKS - {} EXCHANGE RATES", snapshot.best_buy.currency_pair);
    info!("================================================================");

    for record in &snapshot.records {
        info!(
            "{} [{}]  buy: LKR {:.2}  sell: LKR {:.2}  spread: LKR {:.4}",
            record.bank_name,
            record.source,
            record.buy_rate,
            record.sell_rate,
            record.spread()
        );
    }

    info!(
        "Best to sell: LKR {:.2} at {}",
        snapshot.best_sell.buy_rate, snapshot.best_sell.bank_name
    );
    info!(
        "Best to buy:  LKR {:.2} at {}",
        snapshot.best_buy.sell_rate, snapshot.best_buy.bank_name
    );
    info!(
        "Total banks: {} / sources: {:?}",
        snapshot.total_banks, snapshot.sources_used
    );
    info!("================================================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RateRecord;
    use std::collections::BTreeSet;

    fn snapshot() -> DailySnapshot {
        let boc = RateRecord {
            bank_name: "Bank of Ceylon".to_string(),
            currency_pair: "AUD/LKR".to_string(),
            buy_rate: 190.0,
            sell_rate: 198.0,
            source: "numbers_lk".to_string(),
            observed_at: Utc::now(),
        };
        let sampath = RateRecord {
            bank_name: "Sampath Bank".to_string(),
            currency_pair: "AUD/LKR".to_string(),
            buy_rate: 192.0,
            sell_rate: 199.0,
            source: "sampath_direct".to_string(),
            observed_at: Utc::now(),
        };
        DailySnapshot {
            date: "2025-06-01".to_string(),
            records: vec![boc.clone(), sampath.clone()],
            best_buy: boc,
            best_sell: sampath,
            sources_used: BTreeSet::from([
                "numbers_lk".to_string(),
                "sampath_direct".to_string(),
            ]),
            total_banks: 2,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_success_summary() {
        let snapshot = snapshot();
        let summary = build_summary(Some(&snapshot), &[]);

        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(summary.total_banks_scraped, 2);
        assert_eq!(
            summary.best_rate_to_sell_aud.as_ref().unwrap().bank,
            "Sampath Bank"
        );
        assert_eq!(summary.best_rate_to_sell_aud.as_ref().unwrap().rate, 192.0);
        assert_eq!(
            summary.best_rate_to_buy_aud.as_ref().unwrap().bank,
            "Bank of Ceylon"
        );
        assert_eq!(summary.average_buying_rate, Some(191.0));
        assert_eq!(summary.average_selling_rate, Some(198.5));
    }

    #[test]
    fn test_partial_when_sources_skipped() {
        let snapshot = snapshot();
        let skipped = vec![SkippedSource {
            source: "hnb_direct".to_string(),
            reason: "timeout".to_string(),
        }];
        let summary = build_summary(Some(&snapshot), &skipped);

        assert_eq!(summary.status, RunStatus::Partial);
        assert_eq!(summary.skipped_sources.len(), 1);
        // スキップしたソースは sources_used に現れない
        assert!(!summary.sources_used.contains("hnb_direct"));
    }

    #[test]
    fn test_failure_summary_without_snapshot() {
        let skipped = vec![SkippedSource {
            source: "numbers_lk".to_string(),
            reason: "all fetches failed".to_string(),
        }];
        let summary = build_summary(None, &skipped);

        assert_eq!(summary.status, RunStatus::Failure);
        assert_eq!(summary.total_banks_scraped, 0);
        assert!(summary.best_rate_to_sell_aud.is_none());
        assert!(summary.average_buying_rate.is_none());
    }

    #[test]
    fn test_write_summary_to_tempfile() {
        let summary = build_summary(Some(&snapshot()), &[]);
        let path = std::env::temp_dir().join(format!(
            "exrate-summary-{}.json",
            std::process::id()
        ));

        write_summary(&summary, &path);

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["status"], "success");
        assert_eq!(parsed["total_banks_scraped"], 2);
        assert!(parsed["best_rate_to_sell_aud"]["bank"].is_string());

        let _ = std::fs::remove_file(&path);
    }
}
