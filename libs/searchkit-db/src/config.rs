//! Search execution configuration.
//!
//! Every field has a default, so an absent `search` section yields
//! [`SearchConfig::default`].

use figment::Figment;
use serde::{Deserialize, Serialize};

/// Largest integer that round-trips through a JSON number without loss.
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Knobs for the pagination engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Page size handed to the native paginator when the request asks for
    /// "no limit" (`rowsPerPage` missing or zero).
    pub unbounded_per_page: u64,
    /// Case-insensitive marker that identifies an aggregate query in its
    /// rendered SQL when the query carries no explicit kind.
    pub aggregate_marker: String,
    /// Alias of the derived table wrapped by the count sub-query.
    pub count_alias: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            unbounded_per_page: MAX_SAFE_INTEGER,
            aggregate_marker: "count(".to_owned(),
            count_alias: "tableCount".to_owned(),
        }
    }
}

impl SearchConfig {
    /// Extract the `search` section from a layered configuration.
    ///
    /// # Errors
    /// Returns a figment error if the section exists but does not match the schema.
    pub fn from_figment(figment: &Figment) -> Result<Self, Box<figment::Error>> {
        if !figment.contains("search") {
            return Ok(Self::default());
        }
        figment
            .extract_inner::<Self>("search")
            .map_err(Box::new)
    }
}
