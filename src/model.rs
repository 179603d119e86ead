//! レートデータの型定義

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 1行のレート観測値
///
/// `buy_rate` / `sell_rate` は銀行視点:
/// buy_rate = 銀行が外貨を買い取るレート (顧客は外貨を売る)
/// sell_rate = 銀行が外貨を売るレート (顧客は外貨を買う)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRecord {
    pub bank_name: String,
    /// 例: "AUD/LKR"
    pub currency_pair: String,
    pub buy_rate: f64,
    pub sell_rate: f64,
    /// ソース識別子 (例: "numbers_lk", "ntb_direct")
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

impl RateRecord {
    /// 銀行の売買スプレッド
    pub fn spread(&self) -> f64 {
        self.sell_rate - self.buy_rate
    }
}

/// 1日分の照合済みスナップショット
///
/// `date` をキーとしてMongoDBにupsertされる。
/// `best_buy` / `best_sell` は必ず `records` のメンバーの複製。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySnapshot {
    /// "YYYY-MM-DD"
    pub date: String,
    /// 正規化済み銀行名でソート済み (決定的な順序)
    pub records: Vec<RateRecord>,
    /// 顧客が外貨を買うのに最良 (最小sell_rate)
    pub best_buy: RateRecord,
    /// 顧客が外貨を売るのに最良 (最大buy_rate)
    pub best_sell: RateRecord,
    pub sources_used: BTreeSet<String>,
    pub total_banks: usize,
    pub last_updated: DateTime<Utc>,
}

/// 実行ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// 全ソース成功
    Success,
    /// 一部ソースをスキップしたがレートは取得できた
    Partial,
    Failure,
}

/// サマリー内のベストレート表記
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestRate {
    pub bank: String,
    pub rate: f64,
}

/// 実行サマリー (execution_summary.json として出力)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_time: DateTime<Utc>,
    pub status: RunStatus,
    pub total_banks_scraped: usize,
    pub banks_list: Vec<String>,
    pub sources_used: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_rate_to_sell_aud: Option<BestRate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_rate_to_buy_aud: Option<BestRate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_buying_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_selling_rate: Option<f64>,
    /// スキップしたソースと理由
    pub skipped_sources: Vec<SkippedSource>,
}

/// スキップされたソースの注釈
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedSource {
    pub source: String,
    pub reason: String,
}
