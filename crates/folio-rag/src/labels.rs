//! Closed label sets and canonicalization of free-text model answers
//!
//! Every model-assisted decision (document type, section, role, query intent)
//! produces free text. [`LabelRules`] turns that text into a label with an
//! ordered rule table: exact label match first, then the first rule whose
//! needles all occur in the normalized answer.

/// A closed set of string labels
pub trait Label: Copy + Eq + Sized + 'static {
    /// Every label in the set, in declaration order
    const ALL: &'static [Self];

    /// Wire name of the label
    fn as_str(&self) -> &'static str;

    /// Exact (case-insensitive, trimmed) match against the wire names
    fn parse_exact(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        Self::ALL.iter().copied().find(|label| label.as_str() == normalized)
    }

    /// Wire names joined for prompts, e.g. `text, table, both`
    fn prompt_list() -> String {
        Self::ALL
            .iter()
            .map(|label| label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One fuzzy rule: every needle must occur in the answer
#[derive(Debug, Clone, Copy)]
pub struct LabelRule<L: 'static> {
    pub needles: &'static [&'static str],
    pub label: L,
}

/// Ordered rule table mapping free text onto a label
#[derive(Debug, Clone, Copy)]
pub struct LabelRules<L: 'static> {
    rules: &'static [LabelRule<L>],
}

impl<L> LabelRules<L> {
    pub const fn new(rules: &'static [LabelRule<L>]) -> Self {
        Self { rules }
    }
}

impl<L: Label> LabelRules<L> {
    /// Exact match, then the first substring rule that fires
    pub fn canonicalize(&self, raw: &str) -> Option<L> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return None;
        }
        if let Some(label) = L::parse_exact(&normalized) {
            return Some(label);
        }
        self.rules
            .iter()
            .find(|rule| rule.needles.iter().all(|needle| normalized.contains(needle)))
            .map(|rule| rule.label)
    }

    /// Canonicalize, falling back to `default`
    pub fn resolve(&self, raw: &str, default: L) -> L {
        self.canonicalize(raw).unwrap_or(default)
    }
}

/// First entry whose keyword list has any keyword contained in `text`
pub fn match_any_keyword<L: Copy>(text: &str, table: &[(&[&str], L)]) -> Option<L> {
    table
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| text.contains(keyword)))
        .map(|(_, label)| *label)
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
        .to_string()
}

/// Implements [`Label`], `Display` and `FromStr` for a fieldless enum
macro_rules! impl_label {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $crate::labels::Label for $ty {
            const ALL: &'static [Self] = &[$($ty::$variant),+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::labels::Label::as_str(self))
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::error::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                <$ty as $crate::labels::Label>::parse_exact(s).ok_or_else(|| {
                    $crate::error::Error::Config(format!(
                        "unknown {} '{}' (expected one of: {})",
                        stringify!($ty),
                        s,
                        <$ty as $crate::labels::Label>::prompt_list()
                    ))
                })
            }
        }
    };
}

pub(crate) use impl_label;
