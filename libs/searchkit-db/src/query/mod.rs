//! Query capability consumed by the search engine.
//!
//! The engine never talks to `SeaORM` selects directly. It drives anything that
//! implements [`SearchQuery`]:
//! - [`ModelQuery`]: entity-aware select with relation preloading
//! - [`TableQuery`]: raw `sea-query` select over any table or sub-query
//!
//! Rows always come back as JSON objects ([`Row`]) so both backends share one
//! result shape.

use async_trait::async_trait;
use sea_orm::sea_query::{
    Alias, ColumnRef, Expr, IntoColumnRef, IntoIden, SelectStatement, SimpleExpr,
};
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbBackend, Value};

use crate::Result;
use crate::pager::PageResult;

mod exec;
mod model;
mod preload;
mod table;

pub(crate) use exec::fetch_rows;
pub use model::{ModelQuery, RelationMap};
pub use table::TableQuery;

/// A single result row, keyed by column name.
pub type Row = sea_orm::JsonValue;

/// Structural tag telling the pager whether native pagination is safe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    /// Row-level data; native LIMIT/OFFSET pagination is correct.
    Rows,
    /// Computed summary (e.g. `GROUP BY` + `COUNT`); needs count-then-slice.
    Aggregate,
}

impl QueryKind {
    /// Infer the kind from rendered SQL by case-insensitive marker match.
    ///
    /// This is a heuristic: a column alias containing the marker text produces
    /// a false positive. Tag the query explicitly when that matters.
    #[must_use]
    pub fn detect(sql: &str, marker: &str) -> Self {
        if marker.is_empty() {
            return Self::Rows;
        }
        if sql
            .to_ascii_lowercase()
            .contains(&marker.to_ascii_lowercase())
        {
            Self::Aggregate
        } else {
            Self::Rows
        }
    }
}

/// Left-to-right chain of conditions.
///
/// `and_where`/`or_where` fold onto the expression built so far, so
/// `a.and(b).or(c)` renders as `(a AND b) OR c`. A nested [`CondGroup::group`]
/// is folded in as one parenthesized operand.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct CondGroup {
    expr: Option<SimpleExpr>,
}

impl CondGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// `AND column = value`.
    pub fn and_where(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.and_expr(column_expr(column).eq(value.into()))
    }

    /// `OR column = value`.
    pub fn or_where(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.or_expr(column_expr(column).eq(value.into()))
    }

    pub fn and_expr(&mut self, expr: SimpleExpr) -> &mut Self {
        self.expr = Some(match self.expr.take() {
            Some(prev) => prev.and(expr),
            None => expr,
        });
        self
    }

    pub fn or_expr(&mut self, expr: SimpleExpr) -> &mut Self {
        self.expr = Some(match self.expr.take() {
            Some(prev) => prev.or(expr),
            None => expr,
        });
        self
    }

    /// Build a nested group and `AND` it onto this chain. Empty groups are dropped.
    pub fn group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut CondGroup),
    {
        let mut inner = CondGroup::new();
        build(&mut inner);
        match inner.into_expr() {
            Some(expr) => self.and_expr(expr),
            None => self,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expr.is_none()
    }

    #[must_use]
    pub fn into_expr(self) -> Option<SimpleExpr> {
        self.expr
    }
}

/// Operations the search engine needs from a query object.
///
/// Builder methods mutate in place and return `&mut Self` for chaining.
/// Execution methods honour the transaction bound via [`Transacting`]; the
/// `conn` argument is only used when no transaction is bound.
#[async_trait]
pub trait SearchQuery: Clone + Send + Sync {
    /// Replace the selected columns. Calling it twice with the same list is a no-op.
    fn select(&mut self, columns: &[String]) -> &mut Self;

    /// Eager-load a named relation.
    ///
    /// # Errors
    /// Returns `SearchError::UnknownRelation` for names the query does not know,
    /// or `SearchError::PreloadUnsupported` on backends without relations.
    fn preload(&mut self, relation: &str) -> Result<&mut Self>;

    /// `AND (<group>)` where the group is built by the callback.
    fn where_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut CondGroup);

    /// `OR column = value` at the top level of the WHERE clause.
    fn or_where(&mut self, column: &str, value: Value) -> &mut Self;

    /// Drop every ORDER BY clause.
    fn clear_order(&mut self) -> &mut Self;

    fn limit(&mut self, limit: u64) -> &mut Self;

    fn offset(&mut self, offset: u64) -> &mut Self;

    /// The fully composed statement (base select plus accumulated conditions).
    fn statement(&self) -> SelectStatement;

    /// Explicit kind tag, if the caller set one.
    fn kind(&self) -> Option<QueryKind>;

    /// Transaction the query is bound to, if any.
    fn transaction(&self) -> Option<&DatabaseTransaction>;

    /// Render the statement with inlined values, for inspection only.
    fn to_sql(&self, backend: DbBackend) -> String {
        backend.build(&self.statement()).to_string()
    }

    /// Execute and return every matching row.
    ///
    /// # Errors
    /// Returns `SearchError::Db` if any query fails, and
    /// `SearchError::MissingPreloadKey` when a preloaded relation's key column
    /// was not selected.
    async fn fetch_all<C>(&self, conn: &C) -> Result<Vec<Row>>
    where
        C: ConnectionTrait;

    /// Native pagination. `page` is 1-based and must be at least 1.
    ///
    /// # Errors
    /// Returns `SearchError::Db` if the count or page query fails.
    async fn paginate<C>(&self, conn: &C, page: u64, per_page: u64) -> Result<PageResult>
    where
        C: ConnectionTrait;
}

/// Binding of a query to a transaction handle.
pub trait Transacting<'a>: Sized {
    #[must_use]
    fn transacting(self, tx: &'a DatabaseTransaction) -> Self;
}

/// Column reference from an API name: `col`, `table.col`, `*` or `table.*`.
pub(crate) fn column_ref(name: &str) -> ColumnRef {
    match name.split_once('.') {
        Some((table, "*")) => ColumnRef::TableAsterisk(Alias::new(table).into_iden()),
        Some((table, column)) => (Alias::new(table), Alias::new(column)).into_column_ref(),
        None if name == "*" => ColumnRef::Asterisk,
        None => Alias::new(name).into_column_ref(),
    }
}

pub(crate) fn column_expr(name: &str) -> Expr {
    Expr::col(column_ref(name))
}
