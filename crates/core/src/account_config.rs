//! Per-row filter configuration.
//!
//! Fixed-shape value type shared between the controller and the backend
//! scheduler: the wire field names and enum values must stay stable.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which media classes a run downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaTypeFilter {
    Images,
    Videos,
    #[default]
    Both,
}

/// How the post carrying a piece of media relates to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceType {
    Original,
    Reply,
    Retweet,
    Quote,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::Original,
        SourceType::Reply,
        SourceType::Retweet,
        SourceType::Quote,
    ];
}

/// Filter configuration for one account row.
///
/// Immutable while the row is locked; copy/paste between rows moves the
/// whole value, never individual fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub media_type: MediaTypeFilter,
    #[serde(default = "default_source_types")]
    pub source_types: BTreeSet<SourceType>,
    #[serde(default)]
    pub min_short_side: Option<u32>,
    #[serde(default)]
    pub include_quote_media_in_reply: bool,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            media_type: MediaTypeFilter::Both,
            source_types: default_source_types(),
            min_short_side: None,
            include_quote_media_in_reply: false,
        }
    }
}

impl AccountConfig {
    /// Collapse degenerate values: a zero minimum dimension means "no
    /// minimum" on the wire.
    pub fn normalize(&mut self) {
        if self.min_short_side == Some(0) {
            self.min_short_side = None;
        }
    }
}

fn default_source_types() -> BTreeSet<SourceType> {
    SourceType::ALL.into_iter().collect()
}
