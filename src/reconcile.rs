//! 複数ソースのレコード照合
//!
//! (正規化済み銀行名, 通貨ペア) をキーに重複を解消し、
//! 1日分のスナップショットを構築する。解決は決定的:
//! 優先度 → 観測時刻の新しさ → ソース識別子の辞書順。

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::model::{DailySnapshot, RateRecord};
use crate::sources::SourceDescriptor;

/// `challenger` が `incumbent` を置き換えるべきか
fn prefers(
    challenger: &RateRecord,
    incumbent: &RateRecord,
    priority_of: &BTreeMap<&str, u8>,
) -> bool {
    let cp = priority_of.get(challenger.source.as_str()).copied().unwrap_or(0);
    let ip = priority_of.get(incumbent.source.as_str()).copied().unwrap_or(0);

    if cp != ip {
        return cp > ip;
    }
    if challenger.observed_at != incumbent.observed_at {
        return challenger.observed_at > incumbent.observed_at;
    }
    // 最終タイブレーク: ソース識別子の辞書順で小さい方
    challenger.source < incumbent.source
}

/// 全ソースのレコードを1つのスナップショットに照合する
///
/// `sources_used` はフェッチ・抽出に成功したソースの集合
/// (レコードが優先度で上書きされたソースも「使用した」とみなす)。
pub fn reconcile(
    records: Vec<RateRecord>,
    sources: &[SourceDescriptor],
    sources_used: BTreeSet<String>,
    date: NaiveDate,
) -> Result<DailySnapshot, ScrapeError> {
    if records.is_empty() {
        return Err(ScrapeError::NoData);
    }

    let priority_of: BTreeMap<&str, u8> = sources
        .iter()
        .map(|s| (s.id.as_str(), s.priority))
        .collect();

    // キー順のマップで走査順も決定的にする
    let mut by_key: BTreeMap<(String, String), RateRecord> = BTreeMap::new();

    for record in records {
        let key = (record.bank_name.clone(), record.currency_pair.clone());
        match by_key.get(&key) {
            Some(incumbent) => {
                if prefers(&record, incumbent, &priority_of) {
                    debug!(
                        "{} ({}): {} の値を {} で上書き",
                        key.0, key.1, incumbent.source, record.source
                    );
                    by_key.insert(key, record);
                }
            }
            None => {
                by_key.insert(key, record);
            }
        }
    }

    // BTreeMapのキー順 = 銀行名の辞書順
    let reconciled: Vec<RateRecord> = by_key.into_values().collect();

    let Some(first) = reconciled.first() else {
        return Err(ScrapeError::NoData);
    };

    // 同率は銀行名の辞書順で先のものを採用 (走査がキー順なので
    // 「より良い場合のみ更新」で自然に満たされる)
    let mut best_sell = first; // 顧客が外貨を売るのに最良 = 銀行買取レートの最大
    let mut best_buy = first; // 顧客が外貨を買うのに最良 = 銀行販売レートの最小
    for record in &reconciled {
        if record.buy_rate > best_sell.buy_rate {
            best_sell = record;
        }
        if record.sell_rate < best_buy.sell_rate {
            best_buy = record;
        }
    }
    let best_sell = best_sell.clone();
    let best_buy = best_buy.clone();

    let total_banks = reconciled.len();
    info!(
        "Reconciled {} banks (best sell: {} @ {}, best buy: {} @ {})",
        total_banks, best_sell.buy_rate, best_sell.bank_name, best_buy.sell_rate, best_buy.bank_name
    );

    Ok(DailySnapshot {
        date: date.format("%Y-%m-%d").to_string(),
        records: reconciled,
        best_buy,
        best_sell,
        sources_used,
        total_banks,
        last_updated: Utc::now(),
    })
}
