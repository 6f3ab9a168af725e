//! Stage-namespaced auxiliary metadata carried on every block

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pipeline stage that owns a namespace inside [`Extra`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Extraction,
    Cleaning,
    HeaderNormalization,
    Section,
    Role,
    Transactions,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Cleaning => "cleaning",
            Self::HeaderNormalization => "header_normalization",
            Self::Section => "section",
            Self::Role => "role",
            Self::Transactions => "transactions",
        }
    }
}

/// Primitive or nested value stored in [`Extra`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ExtraValue>),
    Map(BTreeMap<String, ExtraValue>),
}

impl ExtraValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for ExtraValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ExtraValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for ExtraValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<usize> for ExtraValue {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f32> for ExtraValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for ExtraValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ExtraValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ExtraValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<String>> for ExtraValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v.into_iter().map(Self::Text).collect())
    }
}

impl<T: Into<ExtraValue>> From<Option<T>> for ExtraValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Audit map keyed by stage, then by field
///
/// Serialized as a nested JSON object, e.g.
/// `{"cleaning": {"original_length": 42, "cleaned_length": 40}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extra(BTreeMap<String, BTreeMap<String, ExtraValue>>);

impl Extra {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one field inside a stage's namespace
    pub fn set(&mut self, stage: Stage, key: &str, value: impl Into<ExtraValue>) {
        self.0
            .entry(stage.as_str().to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn get(&self, stage: Stage, key: &str) -> Option<&ExtraValue> {
        self.0.get(stage.as_str()).and_then(|ns| ns.get(key))
    }

    pub fn namespace(&self, stage: Stage) -> Option<&BTreeMap<String, ExtraValue>> {
        self.0.get(stage.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_do_not_collide() {
        let mut extra = Extra::new();
        extra.set(Stage::Section, "label", "summary");
        extra.set(Stage::Role, "label", "title");

        assert_eq!(extra.get(Stage::Section, "label").and_then(|v| v.as_str()), Some("summary"));
        assert_eq!(extra.get(Stage::Role, "label").and_then(|v| v.as_str()), Some("title"));
        assert!(extra.get(Stage::Cleaning, "label").is_none());
    }

    #[test]
    fn test_json_shape() {
        let mut extra = Extra::new();
        extra.set(Stage::Cleaning, "original_length", 12usize);
        extra.set(Stage::Extraction, "avg_font_size", 10.5f32);
        extra.set(Stage::HeaderNormalization, "original_header", vec!["Date".to_string()]);

        let json = serde_json::to_value(&extra).unwrap();
        assert_eq!(json["cleaning"]["original_length"], 12);
        assert_eq!(json["extraction"]["avg_font_size"], 10.5);
        assert_eq!(json["header_normalization"]["original_header"][0], "Date");

        let back: Extra = serde_json::from_value(json).unwrap();
        assert_eq!(back, extra);
    }
}
