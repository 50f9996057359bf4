//! Core domain types for the xharvest download controller: task status,
//! per-row filter configuration, profile-URL validation and run statistics.
//! No I/O lives here — everything is a value type or a pure function.

pub mod account_config;
pub mod stats;
pub mod status;
pub mod validate;

pub use account_config::{AccountConfig, MediaTypeFilter, SourceType};
pub use stats::RowStats;
pub use status::TaskStatus;
pub use validate::{ProfileUrlError, canonical_profile_url, parse_profile_url};
