//! Structural health-check issues

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    MissingDocId,
    MissingFileName,
    NoTextBlocks,
    TableNoHeader,
    TableNoRows,
    RowLenMismatch,
    ImageNoPath,
}

/// One validation finding, written to `validation.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub level: IssueLevel,
    pub code: IssueCode,
    pub message: String,
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
}

impl Issue {
    pub fn new(level: IssueLevel, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            level,
            code,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}
