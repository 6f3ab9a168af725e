//! Transaction records mapped out of normalized tables

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{DocumentType, IngestedDocument, Stage, TableBlock};

const FINANCIAL_COLUMNS: &[&str] = &["amount_in", "amount_out", "amount", "balance"];

/// One table row mapped onto canonical financial fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub table_id: String,
    pub page: u32,
    pub date_raw: Option<String>,
    pub description: Option<String>,
    pub amount_in_raw: Option<String>,
    pub amount_out_raw: Option<String>,
    pub amount_raw: Option<String>,
    pub balance_raw: Option<String>,
    pub amount_in: Option<f64>,
    pub amount_out: Option<f64>,
    pub amount: Option<f64>,
    pub balance: Option<f64>,
}

/// Cross-document mapping payload written to `transactions.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingPayload {
    pub doc_id: String,
    pub doc_type: DocumentType,
    pub file_name: String,
    pub transactions: Vec<TransactionRecord>,
}

/// Strip thousands separators and parse; failures yield `None`
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Whether the normalized header carries at least one financial column
pub fn has_financial_columns(table: &TableBlock) -> bool {
    table.columns.iter().any(|c| FINANCIAL_COLUMNS.contains(&c.as_str()))
}

/// Map every row of a normalized table; rows with no field values are skipped
pub fn extract_transactions(table: &TableBlock) -> Vec<TransactionRecord> {
    if !has_financial_columns(table) {
        return Vec::new();
    }

    let positions: HashMap<&str, usize> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.is_empty())
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    table
        .rows
        .iter()
        .filter_map(|row| {
            let col = |name: &str| -> Option<String> {
                let idx = *positions.get(name)?;
                let value = row.get(idx)?.trim();
                (!value.is_empty()).then(|| value.to_string())
            };

            let date = col("date");
            let description = col("description");
            let amount_in = col("amount_in");
            let amount_out = col("amount_out");
            let amount = col("amount");
            let balance = col("balance");

            if [&date, &description, &amount_in, &amount_out, &amount, &balance]
                .iter()
                .all(|v| v.is_none())
            {
                return None;
            }

            Some(TransactionRecord {
                table_id: table.id.clone(),
                page: table.page,
                amount_in: amount_in.as_deref().and_then(parse_amount),
                amount_out: amount_out.as_deref().and_then(parse_amount),
                amount: amount.as_deref().and_then(parse_amount),
                balance: balance.as_deref().and_then(parse_amount),
                date_raw: date,
                description,
                amount_in_raw: amount_in,
                amount_out_raw: amount_out,
                amount_raw: amount,
                balance_raw: balance,
            })
        })
        .collect()
}

/// Record per-table transaction counts in `extra`
pub fn annotate_transaction_counts(tables: &mut [TableBlock]) {
    for table in tables.iter_mut().filter(|t| has_financial_columns(t)) {
        let count = extract_transactions(table).len();
        table.extra.set(Stage::Transactions, "row_count", count);
    }
}

/// Collect transactions from every normalized table of a document
pub fn prepare_mapping_payload(doc: &IngestedDocument) -> MappingPayload {
    MappingPayload {
        doc_id: doc.metadata.doc_id.clone(),
        doc_type: doc.metadata.doc_type,
        file_name: doc.metadata.file_name.clone(),
        transactions: doc.tables.iter().flat_map(extract_transactions).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentMetadata;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn statement_table() -> TableBlock {
        TableBlock::new(
            "tbl_0001",
            "doc_001",
            2,
            strings(&["date", "description", "amount_out", "balance"]),
            vec![
                strings(&["01/01/2024", "ATM", "1,500.00", "10,000.00"]),
                strings(&["", "", "", ""]),
                strings(&["02/01/2024", "Fee", "n/a", "9,990.00"]),
            ],
        )
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.50"), Some(1234.5));
        assert_eq!(parse_amount(" -20 "), Some(-20.0));
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_extract_transactions() {
        let records = extract_transactions(&statement_table());
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].table_id, "tbl_0001");
        assert_eq!(records[0].page, 2);
        assert_eq!(records[0].date_raw.as_deref(), Some("01/01/2024"));
        assert_eq!(records[0].amount_out, Some(1500.0));
        assert_eq!(records[0].balance, Some(10000.0));
        assert_eq!(records[0].amount_in, None);

        assert_eq!(records[1].amount_out_raw.as_deref(), Some("n/a"));
        assert_eq!(records[1].amount_out, None);
    }

    #[test]
    fn test_non_financial_table_skipped() {
        let table = TableBlock::new("tbl_0002", "d", 1, strings(&["item", "qty"]), vec![strings(&["pen", "2"])]);
        assert!(extract_transactions(&table).is_empty());
    }

    #[test]
    fn test_mapping_payload() {
        let mut doc = IngestedDocument::new(DocumentMetadata::new("doc_001", "stmt.pdf", DocumentType::BankStatement, 2));
        doc.tables.push(statement_table());
        annotate_transaction_counts(&mut doc.tables);

        let payload = prepare_mapping_payload(&doc);
        assert_eq!(payload.doc_id, "doc_001");
        assert_eq!(payload.transactions.len(), 2);
        assert_eq!(
            doc.tables[0].extra.get(Stage::Transactions, "row_count").and_then(|v| v.as_i64()),
            Some(2)
        );

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["doc_type"], "bank_statement");
        assert_eq!(json["transactions"][0]["amount_out"], 1500.0);
    }
}
