//! 銀行名の正規化
//!
//! ソースごとに綴りや略称が異なるため、照合キーとして使う
//! 正規名に揃える (例: "BOC" と "Bank of Ceylon" は同一銀行)。

/// 略称・表記ゆれ → 正規名の対応表
const BANK_ALIASES: &[(&str, &str)] = &[
    ("central bank of sri lanka", "Central Bank of Sri Lanka"),
    ("amana bank", "Amana Bank"),
    ("bank of ceylon", "Bank of Ceylon"),
    ("boc", "Bank of Ceylon"),
    ("commercial bank", "Commercial Bank"),
    ("hatton national bank", "Hatton National Bank"),
    ("hnb", "Hatton National Bank"),
    ("hsbc bank", "HSBC Bank"),
    ("hsbc", "HSBC Bank"),
    ("nations trust bank", "Nations Trust Bank"),
    ("ntb", "Nations Trust Bank"),
    ("people's bank", "People's Bank"),
    ("peoples bank", "People's Bank"),
    ("sampath bank", "Sampath Bank"),
];

/// 銀行名を正規形に変換する
///
/// 完全一致 → 部分一致の順に対応表を引き、どちらにも
/// 当たらなければタイトルケースに整形して返す。
pub fn canonical_bank_name(raw: &str) -> String {
    known_bank(raw).unwrap_or_else(|| title_case(raw.trim()))
}

/// 対応表に載っている銀行であれば正規名を返す
///
/// アグリゲータページの行判定に使う (未知のテキスト行を
/// 銀行として拾わないため)。
pub fn known_bank(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    for (alias, canonical) in BANK_ALIASES {
        if lowered == *alias {
            return Some((*canonical).to_string());
        }
    }

    // "Bank of Ceylon Plc" のような接尾辞付き表記を吸収する
    for (alias, canonical) in BANK_ALIASES {
        if lowered.contains(alias) {
            return Some((*canonical).to_string());
        }
    }

    None
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_alias() {
        assert_eq!(canonical_bank_name("BOC"), "Bank of Ceylon");
        assert_eq!(canonical_bank_name("hnb"), "Hatton National Bank");
        assert_eq!(canonical_bank_name("NTB"), "Nations Trust Bank");
    }

    #[test]
    fn test_suffix_variants_collapse() {
        assert_eq!(canonical_bank_name("Bank of Ceylon Plc"), "Bank of Ceylon");
        assert_eq!(canonical_bank_name("Bank of Ceylon"), "Bank of Ceylon");
        assert_eq!(canonical_bank_name("  bank of ceylon  "), "Bank of Ceylon");
    }

    #[test]
    fn test_apostrophe_variants() {
        assert_eq!(canonical_bank_name("Peoples Bank"), "People's Bank");
        assert_eq!(canonical_bank_name("People's Bank"), "People's Bank");
    }

    #[test]
    fn test_known_bank_rejects_non_bank_text() {
        assert!(known_bank("Selling Rate").is_none());
        assert!(known_bank("").is_none());
        assert_eq!(known_bank("BOC").as_deref(), Some("Bank of Ceylon"));
    }

    #[test]
    fn test_unknown_bank_title_cased() {
        assert_eq!(canonical_bank_name("union bank"), "Union Bank");
        assert_eq!(canonical_bank_name("SEYLAN BANK"), "Seylan Bank");
    }
}
