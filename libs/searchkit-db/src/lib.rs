#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `SearchKit` query execution helper.
//!
//! This crate turns a query object plus a loosely-typed search payload into
//! either a plain row list or a paginated page with metadata. It sits on top of
//! `SeaORM` / `sea-query` and works around the fact that naive LIMIT/OFFSET
//! pagination is wrong for aggregate (`COUNT(...)`) queries.
//!
//! # Features
//! - `sqlite`, `pg`: enable the `SQLx` backends of `SeaORM`
//! - `axum`: `IntoResponse` for [`Envelope`] and [`FrameworkException`]
//!
//! # Flow
//! 1. [`RawSearchPayload`] is normalized into a typed [`SearchRequest`]
//! 2. [`Projection`] applies preloads and column selection
//! 3. a [`FilterApplier`] rewrites the WHERE clause
//! 4. the [`pager`] either delegates to native pagination or runs the
//!    count-then-slice workaround
//! 5. the result is wrapped in an [`Envelope::PassThrough`]
//!
//! # Example
//! ```rust,ignore
//! use searchkit_db::{ModelQuery, NoFilter, RawSearchPayload, SearchConfig, SearchHelper};
//!
//! let helper = SearchHelper::new(SearchConfig::default(), NoFilter);
//! let payload: RawSearchPayload = serde_json::from_str(body)?;
//! let envelope = helper
//!     .search_payload(&conn, ModelQuery::new(user::Entity::find()), payload.normalize()?)
//!     .await?;
//! ```

pub mod config;
pub mod envelope;
pub mod filter;
pub mod helper;
pub mod input;
pub mod pager;
pub mod projection;
pub mod query;

pub use config::SearchConfig;
#[cfg(feature = "axum")]
pub use envelope::api_view;
pub use envelope::{ApiFailure, Envelope, FrameworkException};
pub use filter::{FilterApplier, NoFilter};
pub use helper::{SearchHelper, build_query, generate_equal_cond, trans};
pub use input::{FilterSpec, Pagination, RawSearchPayload, SearchRequest};
pub use pager::{PageMeta, PageResult, PlainResult, SearchResult, last_page};
pub use projection::{Projection, apply_projection};
pub use query::{
    CondGroup, ModelQuery, QueryKind, RelationMap, Row, SearchQuery, TableQuery, Transacting,
};

use thiserror::Error;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Typed error for search execution.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid JSON in '{field}': {source}")]
    InvalidJson {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    #[error("relation '{0}' cannot be preloaded on a table query")]
    PreloadUnsupported(String),

    #[error("relation '{relation}' needs column '{column}' in the selected fields")]
    MissingPreloadKey { relation: String, column: String },

    #[error("relation '{0}' uses a composite key and cannot be preloaded")]
    CompositeRelation(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("count query returned no rows")]
    MissingCount,

    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),
}

impl SearchError {
    /// HTTP status the boundary layer should use for this error.
    ///
    /// `None` means "no explicit code", which the boundary renders as 500.
    #[must_use]
    pub fn http_code(&self) -> Option<u16> {
        match self {
            Self::InvalidJson { .. }
            | Self::UnknownRelation(_)
            | Self::PreloadUnsupported(_)
            | Self::MissingPreloadKey { .. }
            | Self::InvalidFilter(_) => Some(400),
            Self::CompositeRelation(_) | Self::MissingCount | Self::Db(_) => None,
        }
    }
}
