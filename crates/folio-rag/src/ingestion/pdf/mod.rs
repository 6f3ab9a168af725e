//! Structural PDF extraction: text blocks, table grids and embedded images

mod fonts;
pub mod images;
pub mod layout;
pub mod tables;
pub mod text;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

pub use images::extract_images;
pub use layout::{PageLayout, PdfSource, Ruling, TextSpan};
pub use tables::{extract_tables, DetectedTable, TableStrategy};
pub use text::{default_doc_id, parse_pdf};

/// Table detection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFlavor {
    /// Grid recovered from drawn ruling lines
    #[serde(alias = "lattice")]
    StructuralLines,
    /// Columns recovered from whitespace gaps between aligned text
    #[serde(alias = "stream")]
    Whitespace,
}

impl TableFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuralLines => "structural_lines",
            Self::Whitespace => "whitespace",
        }
    }
}

/// Pages to scan: `all`, `1,3,5` or ranges such as `2-4`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PageSelection {
    #[default]
    All,
    Pages(Vec<u32>),
}

impl PageSelection {
    pub fn contains(&self, page: u32) -> bool {
        match self {
            Self::All => true,
            Self::Pages(pages) => pages.contains(&page),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, Error> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        let invalid = || Error::Config(format!("invalid page selection '{}'", raw));
        let mut pages = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((start, end)) => {
                    let start: u32 = start.trim().parse().map_err(|_| invalid())?;
                    let end: u32 = end.trim().parse().map_err(|_| invalid())?;
                    if start == 0 || end < start {
                        return Err(invalid());
                    }
                    pages.extend(start..=end);
                }
                None => {
                    let page: u32 = part.parse().map_err(|_| invalid())?;
                    if page == 0 {
                        return Err(invalid());
                    }
                    pages.push(page);
                }
            }
        }
        pages.sort_unstable();
        pages.dedup();
        Ok(Self::Pages(pages))
    }
}

impl TryFrom<String> for PageSelection {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PageSelection> for String {
    fn from(value: PageSelection) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Pages(pages) => {
                let parts: Vec<String> = pages.iter().map(u32::to_string).collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}
