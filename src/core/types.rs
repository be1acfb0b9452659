use serde::{Deserialize, Serialize};

/// Placeholder used for every enrichment value that could not be located.
pub const SENTINEL: &str = "N/A";

/// Which slice of the catalog to crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub genre_label: String,
    #[serde(default)]
    pub include_out_of_stock: bool,
}

impl FilterSpec {
    pub fn new(genre_label: impl Into<String>) -> Self {
        Self {
            genre_label: genre_label.into(),
            include_out_of_stock: false,
        }
    }

    pub fn with_out_of_stock(mut self, include: bool) -> Self {
        self.include_out_of_stock = include;
        self
    }
}

/// Lightweight fields read straight off a catalog grid tile.
///
/// Absent nodes yield `""`; absence is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub image_url: String,
    pub detail_url: String,
    pub title: String,
    pub artist: String,
    pub price: String,
    pub previous_price: String,
    pub sale_label: String,
    pub low_stock_label: String,
    pub sold_out_label: String,
    pub genre: String,
}

/// One tile of the grid together with its resolved detail link, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub summary: ItemSummary,
    pub detail_link: Option<String>,
}

/// A `label: value` line from the product spec list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecRow {
    pub label: String,
    pub value: String,
}

impl SpecRow {
    pub fn sentinel() -> Self {
        Self {
            label: SENTINEL.to_string(),
            value: SENTINEL.to_string(),
        }
    }

    /// Split on the first colon. Lines without a colon keep the whole text as
    /// the label and an empty value.
    pub fn parse_line(line: &str) -> Self {
        match line.split_once(':') {
            Some((label, value)) => Self {
                label: label.trim().to_string(),
                value: value.trim().to_string(),
            },
            None => Self {
                label: line.trim().to_string(),
                value: String::new(),
            },
        }
    }
}

/// First three cells of a tracklist row (position, title, duration on the
/// live site).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRow {
    pub position: String,
    pub title: String,
    pub duration: String,
}

impl TrackRow {
    pub fn sentinel() -> Self {
        Self {
            position: SENTINEL.to_string(),
            title: SENTINEL.to_string(),
            duration: SENTINEL.to_string(),
        }
    }

    /// Build from the row's cells; missing cells pad with `""`, extra cells are
    /// ignored. Returns `None` for a row with no cells at all.
    pub fn from_cells(cells: Vec<String>) -> Option<Self> {
        if cells.is_empty() {
            return None;
        }
        let mut it = cells.into_iter();
        Some(Self {
            position: it.next().unwrap_or_default(),
            title: it.next().unwrap_or_default(),
            duration: it.next().unwrap_or_default(),
        })
    }
}

/// A person or company from the credits widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub image_url: String,
    pub name: String,
    pub role: String,
}

impl Credit {
    pub fn sentinel() -> Self {
        Self {
            image_url: SENTINEL.to_string(),
            name: SENTINEL.to_string(),
            role: SENTINEL.to_string(),
        }
    }
}

/// Fields only available on the detail page.
///
/// Every sequence holds at least one row: a sub-field that could not be
/// located resolves to a single sentinel row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailEnrichment {
    pub description: String,
    pub spec_rows: Vec<SpecRow>,
    pub playlist_name: String,
    pub tracklist: Vec<TrackRow>,
    pub primary_creators: Vec<Credit>,
    pub companies: Vec<Credit>,
    pub songwriters: Vec<Credit>,
}

impl DetailEnrichment {
    pub fn sentinel() -> Self {
        Self {
            description: SENTINEL.to_string(),
            spec_rows: vec![SpecRow::sentinel()],
            playlist_name: SENTINEL.to_string(),
            tracklist: vec![TrackRow::sentinel()],
            primary_creators: vec![Credit::sentinel()],
            companies: vec![Credit::sentinel()],
            songwriters: vec![Credit::sentinel()],
        }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }
}

/// Replace an empty extraction with its single sentinel row.
pub fn or_sentinel<T>(rows: Vec<T>, sentinel: impl FnOnce() -> T) -> Vec<T> {
    if rows.is_empty() {
        vec![sentinel()]
    } else {
        rows
    }
}

/// Replace an empty string with [`SENTINEL`].
pub fn text_or_sentinel(text: String) -> String {
    if text.is_empty() {
        SENTINEL.to_string()
    } else {
        text
    }
}

/// Final output row: summary plus enrichment (sentinel when enrichment failed
/// or was never attempted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub summary: ItemSummary,
    pub enrichment: DetailEnrichment,
}

impl Record {
    /// Records are keyed by detail URL; tiles without a link have no key.
    pub fn key(&self) -> Option<&str> {
        if self.summary.detail_url.is_empty() {
            None
        } else {
            Some(&self.summary.detail_url)
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub items_collected: usize,
    pub enrichment_attempted: usize,
    pub enrichment_failed: usize,
    /// Detail page passes beyond the first, summed over all items.
    pub enrichment_retries: usize,
    pub songwriter_fallbacks: usize,
    pub session_restarts: usize,
}
