//! Contract for the filter collaborator.
//!
//! The engine does not interpret filters. It decodes the payload and hands it
//! to a [`FilterApplier`] together with the query, which adds its WHERE
//! conditions through [`SearchQuery::where_group`] / [`SearchQuery::or_where`].

use crate::Result;
use crate::input::{FilterSpec, Pagination};
use crate::query::SearchQuery;

/// Translates a filter payload into query conditions.
pub trait FilterApplier: Send + Sync {
    /// Add the conditions described by `filter` to `query`.
    ///
    /// # Errors
    /// Returns `SearchError::InvalidFilter` for payloads the applier rejects.
    fn apply<Q: SearchQuery>(
        &self,
        query: &mut Q,
        pagination: &Pagination,
        filter: &FilterSpec,
    ) -> Result<()>;
}

/// Ignores the filter entirely.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFilter;

impl FilterApplier for NoFilter {
    fn apply<Q: SearchQuery>(
        &self,
        _query: &mut Q,
        _pagination: &Pagination,
        _filter: &FilterSpec,
    ) -> Result<()> {
        Ok(())
    }
}
