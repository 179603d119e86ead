//! スクレイプ対象ソースの定義
//!
//! 各ソースは URL・レンダリングモード・抽出スキーマ・優先度を持つ
//! 静的な設定であり、ユーザー入力ではない。

mod normalize;

pub use normalize::{canonical_bank_name, known_bank};

use std::time::Duration;

/// ページの取得方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// 通常のHTTP GETで取得できる
    Static,
    /// JavaScript実行後のDOMが必要 (ヘッドレスブラウザ経由)
    Rendered,
}

/// ブラウザレンダリング時の待機条件
#[derive(Debug, Clone)]
pub enum WaitCondition {
    /// 指定セレクタの要素が出現するまでポーリング
    Selector(String),
    /// 固定待機
    Delay(Duration),
}

/// レート列の並び順 (サイトごとに異なる)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateOrder {
    /// 買いレートが先 (例: NTB)
    BuyThenSell,
    /// 売りレートが先 (例: numbers.lk)
    SellThenBuy,
    /// 並び不定: 小さい方が買いレート (例: HNB)
    LowThenHigh,
}

/// ソース固有の抽出スキーマ
#[derive(Debug, Clone)]
pub struct ExtractionSchema {
    /// レート表を特定するCSSセレクタ
    pub table_selector: String,
    /// 対象行を特定する通貨ラベル (例: "AUD")
    pub currency_label: String,
    /// 単一銀行サイトの場合の銀行名 (アグリゲータではNone)
    pub fixed_bank: Option<String>,
    pub rate_order: RateOrder,
    /// もっともらしいレート範囲 (LKR)。表中の日付や口座番号を除外する
    pub plausible_range: (f64, f64),
}

impl ExtractionSchema {
    /// アグリゲータページ用 (銀行名は行の先頭セルから取得)
    pub fn aggregator(currency: &str) -> Self {
        Self {
            table_selector: "table".to_string(),
            currency_label: currency.to_string(),
            fixed_bank: None,
            rate_order: RateOrder::SellThenBuy,
            plausible_range: (100.0, 250.0),
        }
    }

    /// 単一銀行サイト用
    pub fn single_bank(currency: &str, bank: &str, rate_order: RateOrder) -> Self {
        Self {
            table_selector: "table".to_string(),
            currency_label: currency.to_string(),
            fixed_bank: Some(bank.to_string()),
            rate_order,
            plausible_range: (100.0, 250.0),
        }
    }

    pub fn with_table_selector(mut self, selector: impl Into<String>) -> Self {
        self.table_selector = selector.into();
        self
    }
}

/// 1つのスクレイプ対象
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    /// ソース識別子 (サマリーやログの表示名)
    pub id: String,
    pub url: String,
    pub mode: RenderMode,
    pub wait: Option<WaitCondition>,
    /// 照合時の優先度 (大きいほど優先)
    pub priority: u8,
    pub schema: ExtractionSchema,
}

/// アグリゲータの優先度
pub const PRIORITY_AGGREGATOR: u8 = 1;
/// 銀行直接サイトの優先度 (アグリゲータより信頼する)
pub const PRIORITY_DIRECT: u8 = 2;

/// デフォルトのソース一覧
///
/// numbers.lk をベースに、主要銀行の直接サイトで検証・補完する。
/// 直接サイトは優先度2でアグリゲータ(優先度1)の値を上書きする。
pub fn default_sources(currency: &str) -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor {
            id: "numbers_lk".to_string(),
            url: "https://tools.numbers.lk/exrates".to_string(),
            mode: RenderMode::Rendered,
            wait: Some(WaitCondition::Selector("table".to_string())),
            priority: PRIORITY_AGGREGATOR,
            schema: ExtractionSchema::aggregator(currency),
        },
        SourceDescriptor {
            id: "ntb_direct".to_string(),
            url: "https://www.nationstrust.com/foreign-exchange-rates".to_string(),
            mode: RenderMode::Static,
            wait: None,
            priority: PRIORITY_DIRECT,
            schema: ExtractionSchema::single_bank(
                currency,
                "Nations Trust Bank",
                RateOrder::BuyThenSell,
            ),
        },
        SourceDescriptor {
            id: "hnb_direct".to_string(),
            url: "https://www.hnb.lk/".to_string(),
            mode: RenderMode::Rendered,
            wait: Some(WaitCondition::Delay(Duration::from_secs(5))),
            priority: PRIORITY_DIRECT,
            schema: ExtractionSchema::single_bank(
                currency,
                "Hatton National Bank",
                RateOrder::LowThenHigh,
            ),
        },
        SourceDescriptor {
            id: "boc_direct".to_string(),
            url: "https://www.boc.lk/rates-tariff".to_string(),
            mode: RenderMode::Static,
            wait: None,
            priority: PRIORITY_DIRECT,
            schema: ExtractionSchema::single_bank(
                currency,
                "Bank of Ceylon",
                RateOrder::BuyThenSell,
            ),
        },
        SourceDescriptor {
            id: "combank_direct".to_string(),
            url: "https://www.combank.lk/rates-tariff#exchange-rates".to_string(),
            mode: RenderMode::Static,
            wait: None,
            priority: PRIORITY_DIRECT,
            schema: ExtractionSchema::single_bank(
                currency,
                "Commercial Bank",
                RateOrder::BuyThenSell,
            ),
        },
        SourceDescriptor {
            id: "amana_direct".to_string(),
            url: "https://www.amanabank.lk/business/treasury/exchange-rates.html".to_string(),
            mode: RenderMode::Static,
            wait: None,
            priority: PRIORITY_DIRECT,
            schema: ExtractionSchema::single_bank(currency, "Amana Bank", RateOrder::BuyThenSell),
        },
        SourceDescriptor {
            id: "peoples_direct".to_string(),
            url: "https://www.peoplesbank.lk/exchange-rates/".to_string(),
            mode: RenderMode::Static,
            wait: None,
            priority: PRIORITY_DIRECT,
            schema: ExtractionSchema::single_bank(
                currency,
                "People's Bank",
                RateOrder::BuyThenSell,
            ),
        },
        SourceDescriptor {
            id: "sampath_direct".to_string(),
            url: "https://www.sampath.lk/rates-and-charges?activeTab=exchange-rates".to_string(),
            mode: RenderMode::Rendered,
            wait: Some(WaitCondition::Selector("table".to_string())),
            priority: PRIORITY_DIRECT,
            schema: ExtractionSchema::single_bank(currency, "Sampath Bank", RateOrder::BuyThenSell),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sources_unique_ids() {
        let sources = default_sources("AUD");
        let mut ids: Vec<_> = sources.iter().map(|s| s.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), sources.len());
    }

    #[test]
    fn test_direct_sources_outrank_aggregator() {
        let sources = default_sources("AUD");
        let aggregator = sources.iter().find(|s| s.id == "numbers_lk").unwrap();
        for source in sources.iter().filter(|s| s.id != "numbers_lk") {
            assert!(source.priority > aggregator.priority, "{}", source.id);
        }
    }

    #[test]
    fn test_rendered_sources_have_wait_condition() {
        for source in default_sources("AUD") {
            if source.mode == RenderMode::Rendered {
                assert!(source.wait.is_some(), "{}", source.id);
            }
        }
    }
}
