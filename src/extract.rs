//! HTMLからのレート抽出
//!
//! ソースごとの抽出スキーマに従ってテーブルを走査し、
//! `RateRecord` の列を生成する。期待する構造が見つからない場合は
//! `Parse` エラーを返す (サイトのレイアウト変更の兆候)。

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::error::ScrapeError;
use crate::model::RateRecord;
use crate::sources::{canonical_bank_name, known_bank, RateOrder, SourceDescriptor};

fn rate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.\d+").unwrap())
}

/// セルテキストからレート候補を抽出する
///
/// 桁区切りカンマと余分な空白は許容する。数値でないセルは
/// 単に候補なしとして扱う (呼び出し側が警告を出す)。
fn parse_rate_cells(cells: &[String], range: (f64, f64)) -> Vec<f64> {
    let mut rates = Vec::new();
    for cell in cells {
        let cleaned: String = cell.chars().filter(|c| !c.is_whitespace()).collect();
        let cleaned = cleaned.replace(',', "");
        for m in rate_regex().find_iter(&cleaned) {
            if let Ok(value) = m.as_str().parse::<f64>() {
                if value >= range.0 && value <= range.1 {
                    rates.push(value);
                }
            }
        }
    }
    rates
}

fn cell_texts(row: ElementRef<'_>, cell_selector: &Selector) -> Vec<String> {
    row.select(cell_selector)
        .map(|cell| {
            cell.text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// レート列の並び順を (buy, sell) に解決する
fn resolve_rates(rates: &[f64], order: RateOrder) -> Option<(f64, f64)> {
    if rates.len() < 2 {
        return None;
    }
    match order {
        RateOrder::BuyThenSell => Some((rates[0], rates[1])),
        RateOrder::SellThenBuy => Some((rates[1], rates[0])),
        RateOrder::LowThenHigh => {
            let min = rates.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = rates.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            Some((min, max))
        }
    }
}

/// HTMLからレートレコードを抽出する
pub fn extract_records(
    html: &str,
    source: &SourceDescriptor,
    currency_pair: &str,
    observed_at: DateTime<Utc>,
) -> Result<Vec<RateRecord>, ScrapeError> {
    let schema = &source.schema;
    let document = Html::parse_document(html);

    let table_selector =
        Selector::parse(&schema.table_selector).map_err(|e| ScrapeError::Parse {
            source_id: source.id.clone(),
            message: format!("不正なセレクタ '{}': {}", schema.table_selector, e),
        })?;
    let row_selector = Selector::parse("tr").expect("static selector");
    let cell_selector = Selector::parse("td, th").expect("static selector");

    let tables: Vec<_> = document.select(&table_selector).collect();
    if tables.is_empty() {
        return Err(ScrapeError::Parse {
            source_id: source.id.clone(),
            message: format!(
                "レート表が見つかりません (selector: '{}')",
                schema.table_selector
            ),
        });
    }
    debug!("{}: {} tables found", source.id, tables.len());

    let mut records: Vec<RateRecord> = Vec::new();

    for table in &tables {
        for row in table.select(&row_selector) {
            let cells = cell_texts(row, &cell_selector);
            if cells.is_empty() {
                continue;
            }

            // 行の対象判定:
            //  - 単一銀行サイト: 通貨ラベルを含む行
            //  - アグリゲータ: 既知の銀行名を含む行
            let bank_name = match &schema.fixed_bank {
                Some(bank) => {
                    if !cells.iter().any(|c| c.contains(&schema.currency_label)) {
                        continue;
                    }
                    canonical_bank_name(bank)
                }
                None => match cells.iter().find_map(|c| known_bank(c)) {
                    Some(bank) => bank,
                    None => continue,
                },
            };

            if records.iter().any(|r| r.bank_name == bank_name) {
                // 同一銀行の重複行は最初の出現を採用
                continue;
            }

            let rates = parse_rate_cells(&cells, schema.plausible_range);
            let Some((buy_rate, sell_rate)) = resolve_rates(&rates, schema.rate_order) else {
                warn!(
                    "{}: {} の行にレートセルが不足 ({}個): スキップ",
                    source.id,
                    bank_name,
                    rates.len()
                );
                continue;
            };

            debug!(
                "{}: {} buy={} sell={}",
                source.id, bank_name, buy_rate, sell_rate
            );
            records.push(RateRecord {
                bank_name,
                currency_pair: currency_pair.to_string(),
                buy_rate,
                sell_rate,
                source: source.id.clone(),
                observed_at,
            });

            // 単一銀行サイトは最初の一致行で十分
            if schema.fixed_bank.is_some() {
                return Ok(records);
            }
        }
    }

    if records.is_empty() {
        return Err(ScrapeError::Parse {
            source_id: source.id.clone(),
            message: "対象行が見つかりません (レイアウト変更の可能性)".to_string(),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{ExtractionSchema, RenderMode, SourceDescriptor};

    fn aggregator_source() -> SourceDescriptor {
        SourceDescriptor {
            id: "numbers_lk".to_string(),
            url: "https://tools.numbers.lk/exrates".to_string(),
            mode: RenderMode::Rendered,
            wait: None,
            priority: 1,
            schema: ExtractionSchema::aggregator("AUD"),
        }
    }

    fn single_bank_source(order: RateOrder) -> SourceDescriptor {
        SourceDescriptor {
            id: "ntb_direct".to_string(),
            url: "https://www.nationstrust.com/foreign-exchange-rates".to_string(),
            mode: RenderMode::Static,
            wait: None,
            priority: 2,
            schema: ExtractionSchema::single_bank("AUD", "Nations Trust Bank", order),
        }
    }

    const AGGREGATOR_HTML: &str = r#"
        <html><body><table>
            <tr><th>Bank</th><th>Selling</th><th>Buying</th></tr>
            <tr><td>Bank of Ceylon</td><td>198.50</td><td>190.25</td></tr>
            <tr><td>Sampath Bank</td><td>199.00</td><td>191.00</td></tr>
            <tr><td>Peoples Bank</td><td>197.75</td><td>189.50</td></tr>
        </table></body></html>
    "#;

    #[test]
    fn test_aggregator_extraction() {
        let source = aggregator_source();
        let records =
            extract_records(AGGREGATOR_HTML, &source, "AUD/LKR", Utc::now()).unwrap();

        assert_eq!(records.len(), 3);

        let boc = records.iter().find(|r| r.bank_name == "Bank of Ceylon").unwrap();
        // SellThenBuy: 1列目が売り、2列目が買い
        assert_eq!(boc.sell_rate, 198.50);
        assert_eq!(boc.buy_rate, 190.25);

        let peoples = records.iter().find(|r| r.bank_name == "People's Bank");
        assert!(peoples.is_some(), "表記ゆれが正規化されること");
    }

    #[test]
    fn test_single_bank_extraction() {
        let html = r#"
            <table>
                <tr><td>USD</td><td>302.10</td><td>311.45</td></tr>
                <tr><td>AUD</td><td>190.25</td><td>198.50</td></tr>
            </table>
        "#;
        let source = single_bank_source(RateOrder::BuyThenSell);
        let records = extract_records(html, &source, "AUD/LKR", Utc::now()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].bank_name, "Nations Trust Bank");
        assert_eq!(records[0].buy_rate, 190.25);
        assert_eq!(records[0].sell_rate, 198.50);
    }

    #[test]
    fn test_low_then_high_order() {
        let html = r#"
            <table>
                <tr><td>AUD Australian Dollar</td><td>198.50</td><td>190.25</td></tr>
            </table>
        "#;
        let mut source = single_bank_source(RateOrder::LowThenHigh);
        source.schema.fixed_bank = Some("Hatton National Bank".to_string());
        let records = extract_records(html, &source, "AUD/LKR", Utc::now()).unwrap();

        assert_eq!(records[0].buy_rate, 190.25);
        assert_eq!(records[0].sell_rate, 198.50);
    }

    #[test]
    fn test_thousands_separator_and_whitespace_tolerated() {
        let html = r#"
            <table>
                <tr><td>AUD</td><td> 1,90.25 </td><td>198.50</td></tr>
            </table>
        "#;
        let source = single_bank_source(RateOrder::BuyThenSell);
        let records = extract_records(html, &source, "AUD/LKR", Utc::now()).unwrap();
        assert_eq!(records[0].buy_rate, 190.25);
    }

    #[test]
    fn test_implausible_values_filtered() {
        // 2024.0 (年) と 5.25 (手数料) はレートとして拾わない
        let html = r#"
            <table>
                <tr><td>AUD 2024.01</td><td>5.25</td><td>190.25</td><td>198.50</td></tr>
            </table>
        "#;
        let source = single_bank_source(RateOrder::BuyThenSell);
        let records = extract_records(html, &source, "AUD/LKR", Utc::now()).unwrap();
        assert_eq!(records[0].buy_rate, 190.25);
        assert_eq!(records[0].sell_rate, 198.50);
    }

    #[test]
    fn test_missing_rate_cells_skipped_not_fatal() {
        let html = r#"
            <table>
                <tr><td>Bank of Ceylon</td><td>-</td><td>-</td></tr>
                <tr><td>Sampath Bank</td><td>199.00</td><td>191.00</td></tr>
            </table>
        "#;
        let source = aggregator_source();
        let records = extract_records(html, &source, "AUD/LKR", Utc::now()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].bank_name, "Sampath Bank");
    }

    #[test]
    fn test_duplicate_bank_first_occurrence_wins() {
        let html = r#"
            <table>
                <tr><td>BOC</td><td>198.50</td><td>190.25</td></tr>
                <tr><td>Bank of Ceylon</td><td>200.00</td><td>195.00</td></tr>
            </table>
        "#;
        let source = aggregator_source();
        let records = extract_records(html, &source, "AUD/LKR", Utc::now()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sell_rate, 198.50);
    }

    #[test]
    fn test_no_table_is_parse_error() {
        let source = aggregator_source();
        let result = extract_records("<html><body>maintenance</body></html>", &source, "AUD/LKR", Utc::now());
        assert!(matches!(result, Err(ScrapeError::Parse { .. })));
    }

    #[test]
    fn test_no_matching_row_is_parse_error() {
        let html = "<table><tr><td>USD</td><td>302.10</td><td>311.45</td></tr></table>";
        let source = aggregator_source();
        let result = extract_records(html, &source, "AUD/LKR", Utc::now());
        assert!(matches!(result, Err(ScrapeError::Parse { .. })));
    }
}
