//! Search entry points.
//!
//! [`SearchHelper`] is created once at startup with its configuration and
//! filter collaborator, then shared by handlers (it is `Send + Sync`). The free
//! functions are stateless query helpers.

use sea_orm::sea_query::{Alias, Asterisk, Expr, Query, SelectStatement};
use sea_orm::{ConnectionTrait, DatabaseTransaction, Value};

use crate::Result;
use crate::config::SearchConfig;
use crate::envelope::Envelope;
use crate::filter::{FilterApplier, NoFilter};
use crate::input::{FilterSpec, Pagination, SearchRequest};
use crate::pager::{self, PlainResult, SearchResult};
use crate::projection::{Projection, apply_projection};
use crate::query::{SearchQuery, TableQuery, Transacting};

/// Default alias of the derived table created by [`build_query`].
pub const DEFAULT_SUBQUERY_NAME: &str = "query";

/// Runs searches: projection, filtering, then pagination or a plain fetch.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct SearchHelper<F: FilterApplier = NoFilter> {
    config: SearchConfig,
    filter: F,
}

impl<F: FilterApplier> SearchHelper<F> {
    pub fn new(config: SearchConfig, filter: F) -> Self {
        Self { config, filter }
    }

    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search over any query backend.
    ///
    /// Populates are applied before selects, then the filter collaborator adds
    /// its conditions. Without `pagination.page` every matching row is
    /// returned as `{data}`; otherwise the pager produces `{data, meta}`.
    ///
    /// # Errors
    /// Projection, filter and database errors propagate unchanged.
    pub async fn search<Q, C>(
        &self,
        conn: &C,
        mut query: Q,
        pagination: &Pagination,
        filter: &FilterSpec,
        projection: &Projection,
    ) -> Result<Envelope>
    where
        Q: SearchQuery,
        C: ConnectionTrait,
    {
        apply_projection(&mut query, projection)?;
        self.filter.apply(&mut query, pagination, filter)?;
        let result = self.execute(conn, &mut query, pagination).await?;
        Ok(Envelope::PassThrough(result))
    }

    /// [`SearchHelper::search`] with every argument taken from a normalized payload.
    ///
    /// # Errors
    /// See [`SearchHelper::search`].
    pub async fn search_payload<Q, C>(
        &self,
        conn: &C,
        query: Q,
        request: SearchRequest,
    ) -> Result<Envelope>
    where
        Q: SearchQuery,
        C: ConnectionTrait,
    {
        self.search(
            conn,
            query,
            &request.pagination,
            &request.filter,
            &request.projection,
        )
        .await
    }

    /// Search over a raw table query. Only column selection applies.
    ///
    /// # Errors
    /// See [`SearchHelper::search`].
    pub async fn search_database<C>(
        &self,
        conn: &C,
        query: TableQuery<'_>,
        pagination: &Pagination,
        filter: &FilterSpec,
        selects: Option<&[String]>,
    ) -> Result<Envelope>
    where
        C: ConnectionTrait,
    {
        let projection = Projection {
            selects: selects.map(<[String]>::to_vec),
            populates: None,
        };
        self.search(conn, query, pagination, filter, &projection).await
    }

    /// [`SearchHelper::search_database`] from a normalized payload. The
    /// payload's `populates` is ignored.
    ///
    /// # Errors
    /// See [`SearchHelper::search`].
    pub async fn search_database_payload<C>(
        &self,
        conn: &C,
        query: TableQuery<'_>,
        request: SearchRequest,
    ) -> Result<Envelope>
    where
        C: ConnectionTrait,
    {
        self.search_database(
            conn,
            query,
            &request.pagination,
            &request.filter,
            request.projection.selects.as_deref(),
        )
        .await
    }

    async fn execute<Q, C>(
        &self,
        conn: &C,
        query: &mut Q,
        pagination: &Pagination,
    ) -> Result<SearchResult>
    where
        Q: SearchQuery,
        C: ConnectionTrait,
    {
        if pagination.is_paged() {
            let page = pager::paginate(query, conn, pagination, &self.config).await?;
            return Ok(page.into());
        }
        tracing::debug!("no page requested, fetching all rows");
        let data = query.fetch_all(conn).await?;
        Ok(PlainResult { data }.into())
    }
}

/// `AND (column = ids[n-1] OR column = ids[0] OR ... OR column = ids[n-2])`.
///
/// The last id leads the group, the remaining ones follow in input order. An
/// empty `ids` adds a condition that matches nothing.
pub fn generate_equal_cond<'q, Q, V>(query: &'q mut Q, ids: &[V], column: &str) -> &'q mut Q
where
    Q: SearchQuery,
    V: Clone + Into<Value>,
{
    query.where_group(|group| match ids.split_last() {
        Some((last, rest)) => {
            group.and_where(column, last.clone());
            for id in rest {
                group.or_where(column, id.clone());
            }
        }
        None => {
            group.and_expr(Expr::val(1).eq(0));
        }
    })
}

/// Bind `query` to `tx` when one is given.
#[must_use]
pub fn trans<'a, Q>(query: Q, tx: Option<&'a DatabaseTransaction>) -> Q
where
    Q: Transacting<'a>,
{
    match tx {
        Some(tx) => query.transacting(tx),
        None => query,
    }
}

/// `SELECT * FROM (<inner>) AS <name>`, so that computed columns of `inner`
/// can be filtered and ordered like plain ones.
pub fn build_query(inner: SelectStatement, name: Option<&str>) -> TableQuery<'static> {
    let mut stmt = Query::select();
    stmt.column(Asterisk).from_subquery(
        inner,
        Alias::new(name.unwrap_or(DEFAULT_SUBQUERY_NAME)),
    );
    TableQuery::new(stmt)
}
