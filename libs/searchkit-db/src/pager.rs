//! Pagination engine.
//!
//! Native LIMIT/OFFSET pagination returns wrong totals for aggregate queries
//! (the paginator counts groups of the wrapped query, not rows of the
//! summary). Aggregate queries therefore take a count-then-slice path:
//!
//! 1. count the rows of the query wrapped as a derived table (ORDER BY removed),
//! 2. slice the original query with LIMIT/OFFSET, or fetch everything when
//!    `rows_per_page` is zero,
//! 3. compute the metadata from the count.
//!
//! Row-level queries go straight to [`SearchQuery::paginate`].

use sea_orm::ConnectionTrait;
use sea_orm::sea_query::{Alias, Expr, Query, SelectStatement};
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::input::Pagination;
use crate::query::{QueryKind, Row, SearchQuery};
use crate::{Result, SearchError};

/// Pagination metadata. `page` is 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub data: Vec<Row>,
    pub meta: PageMeta,
}

/// Result of a search without pagination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlainResult {
    pub data: Vec<Row>,
}

/// Either shape a search can produce. Serializes without a tag, so the body
/// is exactly `{data, meta}` or `{data}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchResult {
    Page(PageResult),
    Plain(PlainResult),
}

impl From<PageResult> for SearchResult {
    fn from(page: PageResult) -> Self {
        Self::Page(page)
    }
}

impl From<PlainResult> for SearchResult {
    fn from(plain: PlainResult) -> Self {
        Self::Plain(plain)
    }
}

impl SearchResult {
    #[must_use]
    pub fn data(&self) -> &[Row] {
        match self {
            Self::Page(p) => &p.data,
            Self::Plain(p) => &p.data,
        }
    }

    #[must_use]
    pub fn meta(&self) -> Option<&PageMeta> {
        match self {
            Self::Page(p) => Some(&p.meta),
            Self::Plain(_) => None,
        }
    }
}

/// Number of the last page.
///
/// `ceil(total / per_page)`; with `per_page == 0` (no limit) everything sits
/// on one page, so the result is `1` when there are rows and `0` otherwise.
#[must_use]
pub fn last_page(total: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        return u64::from(total > 0);
    }
    total.div_ceil(per_page)
}

/// Clamp a requested page number to the first page.
pub(crate) fn clamp_page(page: i64) -> u64 {
    page.max(1).unsigned_abs()
}

/// Paginate `query` according to `pagination`.
///
/// The query kind comes from its explicit tag, or from matching
/// `config.aggregate_marker` against the rendered SQL. A missing `page` is
/// treated as the first page; callers that want an unpaginated result should
/// not call this at all.
///
/// # Errors
/// Returns `SearchError::Db` if the count or row query fails, and
/// `SearchError::MissingCount` if the count query yields no row.
pub async fn paginate<Q, C>(
    query: &mut Q,
    conn: &C,
    pagination: &Pagination,
    config: &SearchConfig,
) -> Result<PageResult>
where
    Q: SearchQuery,
    C: ConnectionTrait,
{
    let page = clamp_page(pagination.page.unwrap_or(1));
    let kind = query.kind().unwrap_or_else(|| {
        let backend = match query.transaction() {
            Some(tx) => tx.get_database_backend(),
            None => conn.get_database_backend(),
        };
        QueryKind::detect(&query.to_sql(backend), &config.aggregate_marker)
    });

    match kind {
        QueryKind::Aggregate => {
            let per_page = pagination.rows_per_page.unwrap_or(0);
            let total = count_rows(query, conn, &config.count_alias).await?;
            tracing::debug!(page, per_page, total, "aggregate pagination");

            if per_page > 0 {
                query
                    .limit(per_page)
                    .offset((page - 1).saturating_mul(per_page));
            }
            let data = query.fetch_all(conn).await?;

            Ok(PageResult {
                data,
                meta: PageMeta {
                    page,
                    per_page,
                    total,
                    last_page: last_page(total, per_page),
                },
            })
        }
        QueryKind::Rows => {
            let per_page = pagination
                .rows_per_page
                .filter(|n| *n > 0)
                .unwrap_or(config.unbounded_per_page);
            tracing::debug!(page, per_page, "native pagination");
            query.paginate(conn, page, per_page).await
        }
    }
}

/// `SELECT COUNT(*) AS count FROM (<query without ORDER BY>) AS <alias> LIMIT 1`.
async fn count_rows<Q, C>(query: &Q, conn: &C, alias: &str) -> Result<u64>
where
    Q: SearchQuery,
    C: ConnectionTrait,
{
    let mut inner = query.clone();
    inner.clear_order();

    let mut stmt = Query::select();
    stmt.expr_as(Expr::cust("COUNT(*)"), Alias::new("count"))
        .from_subquery(inner.statement(), Alias::new(alias))
        .limit(1);

    let row = match query.transaction() {
        Some(tx) => query_count(tx, &stmt).await?,
        None => query_count(conn, &stmt).await?,
    };
    let count = row.ok_or(SearchError::MissingCount)?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Run the count statement and read its `count` column as an integer.
async fn query_count<C>(conn: &C, stmt: &SelectStatement) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    let stmt = conn.get_database_backend().build(stmt);
    tracing::trace!(sql = %stmt, "counting rows");
    match conn.query_one(stmt).await? {
        Some(row) => Ok(Some(row.try_get::<i64>("", "count")?)),
        None => Ok(None),
    }
}
