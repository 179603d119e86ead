//! MongoDBへの永続化
//!
//! 日次スナップショットを `date` をキーに1ドキュメントとして
//! upsertする。同日の再実行はマージではなくドキュメント全体を
//! 置き換える。接続は実行ごとに1回確立し、実行終了時にドロップで
//! 解放される。

use std::time::Duration;

use mongodb::bson::doc;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::ScrapeError;
use crate::model::DailySnapshot;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// レートスナップショットのストア
pub struct RateStore {
    collection: Collection<DailySnapshot>,
}

impl RateStore {
    /// 接続を確立し疎通を確認する
    ///
    /// 接続・認証の失敗はフェッチ開始前に `Persistence` エラーとして
    /// 検出される。
    pub async fn connect(config: &RunConfig) -> Result<Self, ScrapeError> {
        let uri = config.mongodb_uri.as_deref().ok_or_else(|| {
            ScrapeError::Config("MongoDB接続文字列が設定されていません".to_string())
        })?;

        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| ScrapeError::Persistence(format!("接続文字列の解析エラー: {}", e)))?;
        options.server_selection_timeout = Some(Duration::from_secs(CONNECT_TIMEOUT_SECS));
        options.connect_timeout = Some(Duration::from_secs(CONNECT_TIMEOUT_SECS));

        let client = Client::with_options(options)
            .map_err(|e| ScrapeError::Persistence(format!("クライアント構築エラー: {}", e)))?;

        // 疎通確認
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ScrapeError::Persistence(format!("ping失敗: {}", e)))?;

        let collection = client
            .database(&config.db_name)
            .collection::<DailySnapshot>(&config.collection_name);

        // dateの一意インデックス (既存ならno-op)
        let index = IndexModel::builder()
            .keys(doc! { "date": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection
            .create_index(index)
            .await
            .map_err(|e| ScrapeError::Persistence(format!("インデックス作成エラー: {}", e)))?;

        info!(
            "Connected to MongoDB: db={} collection={}",
            config.db_name, config.collection_name
        );

        Ok(Self { collection })
    }

    /// スナップショットをupsertする
    ///
    /// 同一日付の2回目の書き込みはドキュメントを丸ごと置き換える
    /// (重複は作らない)。書き込みはドキュメント単位でアトミック。
    pub async fn upsert_snapshot(&self, snapshot: &DailySnapshot) -> Result<(), ScrapeError> {
        let result = self
            .collection
            .replace_one(doc! { "date": &snapshot.date }, snapshot)
            .upsert(true)
            .await
            .map_err(|e| ScrapeError::Persistence(format!("書き込みエラー: {}", e)))?;

        if result.upserted_id.is_some() {
            info!("Created snapshot document for {}", snapshot.date);
        } else {
            info!("Replaced snapshot document for {}", snapshot.date);
        }
        debug!(
            "matched={} modified={}",
            result.matched_count, result.modified_count
        );

        Ok(())
    }

    /// 指定日のスナップショットを取得する
    pub async fn get_snapshot(&self, date: &str) -> Result<Option<DailySnapshot>, ScrapeError> {
        self.collection
            .find_one(doc! { "date": date })
            .await
            .map_err(|e| ScrapeError::Persistence(format!("読み込みエラー: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RateRecord;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn sample_snapshot(date: &str) -> DailySnapshot {
        let record = RateRecord {
            bank_name: "Bank of Ceylon".to_string(),
            currency_pair: "AUD/LKR".to_string(),
            buy_rate: 190.25,
            sell_rate: 198.50,
            source: "numbers_lk".to_string(),
            observed_at: Utc::now(),
        };
        DailySnapshot {
            date: date.to_string(),
            records: vec![record.clone()],
            best_buy: record.clone(),
            best_sell: record,
            sources_used: BTreeSet::from(["numbers_lk".to_string()]),
            total_banks: 1,
            last_updated: Utc::now(),
        }
    }

    // 実環境テスト用:
    // MONGODB_CONNECTION_STRING=... cargo test test_upsert_is_idempotent -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_upsert_is_idempotent_per_date() {
        let config = crate::config::RunConfig::from_env(false).expect("connection string not set");
        let store = RateStore::connect(&config).await.expect("connect failed");

        let snapshot = sample_snapshot("1970-01-01");
        store.upsert_snapshot(&snapshot).await.expect("first write");
        store.upsert_snapshot(&snapshot).await.expect("second write");

        let stored = store
            .get_snapshot("1970-01-01")
            .await
            .expect("read failed")
            .expect("document missing");
        assert_eq!(stored.total_banks, 1);
    }
}
