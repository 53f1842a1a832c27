use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Asterisk, Query, SelectStatement};
use sea_orm::{ConnectionTrait, DatabaseTransaction, Value};

use crate::pager::PageResult;
use crate::query::{
    CondGroup, QueryKind, Row, SearchQuery, Transacting, column_expr, column_ref, exec,
};
use crate::{Result, SearchError};

/// Raw table query over a `sea-query` select.
///
/// Used for reports, joins and derived tables that have no entity behind
/// them. Relation preloading is not available.
///
/// # Example
/// ```rust,ignore
/// let mut stmt = Query::select();
/// stmt.column(Alias::new("user_id"))
///     .expr_as(Expr::col(Alias::new("id")).count(), Alias::new("posts"))
///     .from(Alias::new("posts"))
///     .group_by_col(Alias::new("user_id"));
///
/// let q = TableQuery::new(stmt).with_kind(QueryKind::Aggregate);
/// ```
#[derive(Clone)]
#[must_use]
pub struct TableQuery<'a> {
    stmt: SelectStatement,
    wheres: CondGroup,
    kind: Option<QueryKind>,
    tx: Option<&'a DatabaseTransaction>,
}

impl std::fmt::Debug for TableQuery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableQuery")
            .field("stmt", &self.stmt)
            .field("wheres", &self.wheres)
            .field("kind", &self.kind)
            .field("transacting", &self.tx.is_some())
            .finish()
    }
}

impl TableQuery<'_> {
    pub fn new(stmt: SelectStatement) -> Self {
        Self {
            stmt,
            wheres: CondGroup::new(),
            kind: None,
            tx: None,
        }
    }

    /// `SELECT * FROM <table>`.
    pub fn from_table(table: &str) -> Self {
        let mut stmt = Query::select();
        stmt.column(Asterisk).from(Alias::new(table));
        Self::new(stmt)
    }

    /// Tag the query so the pager does not have to inspect its SQL.
    pub fn with_kind(mut self, kind: QueryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Direct access to the base statement, e.g. to add ordering or joins.
    pub fn statement_mut(&mut self) -> &mut SelectStatement {
        &mut self.stmt
    }
}

impl<'a> Transacting<'a> for TableQuery<'a> {
    fn transacting(mut self, tx: &'a DatabaseTransaction) -> Self {
        self.tx = Some(tx);
        self
    }
}

#[async_trait]
impl SearchQuery for TableQuery<'_> {
    fn select(&mut self, columns: &[String]) -> &mut Self {
        self.stmt
            .clear_selects()
            .columns(columns.iter().map(|c| column_ref(c)));
        self
    }

    fn preload(&mut self, relation: &str) -> Result<&mut Self> {
        Err(SearchError::PreloadUnsupported(relation.to_owned()))
    }

    fn where_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut CondGroup),
    {
        self.wheres.group(build);
        self
    }

    fn or_where(&mut self, column: &str, value: Value) -> &mut Self {
        self.wheres.or_expr(column_expr(column).eq(value));
        self
    }

    fn clear_order(&mut self) -> &mut Self {
        self.stmt.clear_order_by();
        self
    }

    fn limit(&mut self, limit: u64) -> &mut Self {
        self.stmt.limit(limit);
        self
    }

    fn offset(&mut self, offset: u64) -> &mut Self {
        self.stmt.offset(offset);
        self
    }

    fn statement(&self) -> SelectStatement {
        let mut stmt = self.stmt.clone();
        if let Some(expr) = self.wheres.clone().into_expr() {
            stmt.and_where(expr);
        }
        stmt
    }

    fn kind(&self) -> Option<QueryKind> {
        self.kind
    }

    fn transaction(&self) -> Option<&DatabaseTransaction> {
        self.tx
    }

    async fn fetch_all<C>(&self, conn: &C) -> Result<Vec<Row>>
    where
        C: ConnectionTrait,
    {
        let stmt = self.statement();
        match self.tx {
            Some(tx) => exec::fetch_rows(tx, &stmt).await,
            None => exec::fetch_rows(conn, &stmt).await,
        }
    }

    async fn paginate<C>(&self, conn: &C, page: u64, per_page: u64) -> Result<PageResult>
    where
        C: ConnectionTrait,
    {
        let stmt = self.statement();
        match self.tx {
            Some(tx) => exec::paginate_statement(tx, &stmt, page, per_page).await,
            None => exec::paginate_statement(conn, &stmt, page, per_page).await,
        }
    }
}
