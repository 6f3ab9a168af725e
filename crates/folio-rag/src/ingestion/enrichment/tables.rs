//! Table header normalization and table role assignment

use crate::types::{Stage, TableBlock, TableRole};

/// Raw header substrings mapped to canonical names, checked in order
const HEADER_SYNONYMS: &[(&str, &str)] = &[
    ("date", "date"),
    ("วันที่", "date"),
    ("วันเดือนปี", "date"),
    ("description", "description"),
    ("details", "description"),
    ("รายละเอียด", "description"),
    ("รายการ", "description"),
    ("debit", "amount_out"),
    ("withdrawal", "amount_out"),
    ("ถอน", "amount_out"),
    ("จ่าย", "amount_out"),
    ("credit", "amount_in"),
    ("deposit", "amount_in"),
    ("ฝาก", "amount_in"),
    ("รับ", "amount_in"),
    ("balance", "balance"),
    ("ยอดคงเหลือ", "balance"),
    ("คงเหลือ", "balance"),
    ("amount", "amount"),
    ("ยอดเงิน", "amount"),
    ("จำนวนเงิน", "amount"),
];

/// Names `normalize_header` produces; these map to themselves
const CANONICAL_HEADERS: &[&str] = &["date", "description", "amount_in", "amount_out", "balance", "amount"];

const AMOUNT_LIKE: &[&str] = &["amount", "ยอดเงิน", "debit", "credit", "ยอดคงเหลือ", "balance"];
const SUMMARY_KEYWORDS: &[&str] = &["summary", "สรุป", "total", "รวม"];

/// Canonical name for a raw header cell; unmatched cells come back lowercased and trimmed
pub fn normalize_header(raw: &str) -> String {
    let cleaned = raw.trim().to_lowercase();
    if cleaned.is_empty() || CANONICAL_HEADERS.contains(&cleaned.as_str()) {
        return cleaned;
    }
    HEADER_SYNONYMS
        .iter()
        .find(|(key, _)| cleaned.contains(key))
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(cleaned)
}

/// Role from header keywords
pub fn guess_table_role(columns: &[String]) -> TableRole {
    let lower: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();

    let has_date = lower.iter().any(|h| h.contains("date"));
    let has_amount = lower.iter().any(|h| AMOUNT_LIKE.iter().any(|k| h.contains(k)));
    if has_date && has_amount {
        return TableRole::TransactionTable;
    }

    let joined = lower.join(" ");
    if SUMMARY_KEYWORDS.iter().any(|k| joined.contains(k)) {
        return TableRole::SummaryTable;
    }

    TableRole::OtherTable
}

/// Normalize headers in place and assign each table a role
pub fn normalize_tables(tables: &mut [TableBlock]) {
    for table in tables.iter_mut() {
        let normalized: Vec<String> = table.columns.iter().map(|h| normalize_header(h)).collect();

        // A resumed checkpoint already carries the header as extracted
        if table.extra.get(Stage::HeaderNormalization, "original_header").is_none() {
            table.extra.set(Stage::HeaderNormalization, "original_header", table.columns.clone());
        }
        table.extra.set(Stage::HeaderNormalization, "normalized_header", normalized.clone());
        table.columns = normalized;

        let role = guess_table_role(&table.columns);
        table.role = Some(role);
        table.extra.set(Stage::Role, "label", role.to_string());
        table.extra.set(Stage::Role, "strategy", "rule");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_statement_header_normalizes() {
        let mut tables = vec![TableBlock::new(
            "tbl_0001",
            "doc_001",
            1,
            strings(&["Date", "Description", "Debit", "Balance"]),
            vec![strings(&["01/01/2024", "ATM", "500.00", "1,500.00"])],
        )];
        normalize_tables(&mut tables);

        assert_eq!(tables[0].columns, strings(&["date", "description", "amount_out", "balance"]));
        assert_eq!(tables[0].role, Some(TableRole::TransactionTable));
        let original = tables[0].extra.get(Stage::HeaderNormalization, "original_header").unwrap();
        assert_eq!(serde_json::to_value(original).unwrap()[2], "Debit");
    }

    #[test]
    fn test_normalization_is_stable_on_rerun() {
        let mut tables = vec![TableBlock::new(
            "tbl_0001",
            "doc_001",
            1,
            strings(&["Date", "Debit", "Credit", "Balance"]),
            vec![strings(&["01/01/2024", "500.00", "", "1,500.00"])],
        )];
        normalize_tables(&mut tables);
        normalize_tables(&mut tables);

        assert_eq!(tables[0].columns, strings(&["date", "amount_out", "amount_in", "balance"]));
        let original = tables[0].extra.get(Stage::HeaderNormalization, "original_header").unwrap();
        assert_eq!(serde_json::to_value(original).unwrap()[1], "Debit");
        for canonical in CANONICAL_HEADERS {
            assert_eq!(normalize_header(canonical), *canonical);
        }
    }

    #[test]
    fn test_thai_headers_and_passthrough() {
        assert_eq!(normalize_header(" วันที่ทำรายการ "), "date");
        assert_eq!(normalize_header("ยอดคงเหลือ"), "balance");
        assert_eq!(normalize_header("เงินฝาก"), "amount_in");
        assert_eq!(normalize_header("  Channel "), "channel");
        assert_eq!(normalize_header("   "), "");
    }

    #[test]
    fn test_table_roles() {
        assert_eq!(guess_table_role(&strings(&["date", "amount"])), TableRole::TransactionTable);
        assert_eq!(guess_table_role(&strings(&["item", "total"])), TableRole::SummaryTable);
        assert_eq!(guess_table_role(&strings(&["date", "channel"])), TableRole::OtherTable);
        assert_eq!(guess_table_role(&[]), TableRole::OtherTable);
    }
}
