use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::sea_query::SelectStatement;
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryTrait, RelationTrait,
    Select, Value,
};

use crate::pager::PageResult;
use crate::query::exec::JsonRow;
use crate::query::{
    CondGroup, QueryKind, Row, SearchQuery, Transacting, column_expr, column_ref, exec, preload,
};
use crate::{Result, SearchError};

/// API relation names mapped to an entity's `SeaORM` relations.
///
/// Names are matched case-sensitively after trimming.
#[must_use]
pub struct RelationMap<E: EntityTrait> {
    map: HashMap<String, E::Relation>,
}

impl<E: EntityTrait> Default for RelationMap<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityTrait> RelationMap<E> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn insert(mut self, api_name: impl Into<String>, relation: E::Relation) -> Self {
        self.map.insert(api_name.into(), relation);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&E::Relation> {
        self.map.get(name)
    }
}

/// Entity-aware query with relation preloading.
///
/// Rows are fetched as JSON; each preloaded relation is attached to its parent
/// row under the API name: an array for has-many relations, an object (or
/// `null`) for has-one / belongs-to relations.
///
/// # Example
/// ```rust,ignore
/// static RELATIONS: LazyLock<RelationMap<user::Entity>> =
///     LazyLock::new(|| RelationMap::new().insert("posts", user::Relation::Posts));
///
/// let mut q = ModelQuery::new(user::Entity::find()).with_relations(&RELATIONS);
/// q.preload("posts")?;
/// let rows = q.fetch_all(&conn).await?;
/// ```
#[must_use]
pub struct ModelQuery<'a, E: EntityTrait> {
    select: Select<E>,
    relations: Option<&'a RelationMap<E>>,
    preloads: Vec<String>,
    wheres: CondGroup,
    kind: Option<QueryKind>,
    tx: Option<&'a DatabaseTransaction>,
}

impl<E: EntityTrait> Clone for ModelQuery<'_, E> {
    fn clone(&self) -> Self {
        Self {
            select: self.select.clone(),
            relations: self.relations,
            preloads: self.preloads.clone(),
            wheres: self.wheres.clone(),
            kind: self.kind,
            tx: self.tx,
        }
    }
}

impl<E: EntityTrait> std::fmt::Debug for ModelQuery<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelQuery")
            .field("table", &E::default().table_name())
            .field("preloads", &self.preloads)
            .field("wheres", &self.wheres)
            .field("kind", &self.kind)
            .field("transacting", &self.tx.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a, E: EntityTrait> ModelQuery<'a, E> {
    pub fn new(select: Select<E>) -> Self {
        Self {
            select,
            relations: None,
            preloads: Vec::new(),
            wheres: CondGroup::new(),
            kind: None,
            tx: None,
        }
    }

    /// Relations that [`SearchQuery::preload`] may resolve.
    pub fn with_relations(mut self, relations: &'a RelationMap<E>) -> Self {
        self.relations = Some(relations);
        self
    }

    /// Tag the query so the pager does not have to inspect its SQL.
    pub fn with_kind(mut self, kind: QueryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Relations requested so far, in request order.
    #[must_use]
    pub fn preloads(&self) -> &[String] {
        &self.preloads
    }

    fn composed(&self) -> Select<E> {
        let mut select = self.select.clone();
        if let Some(expr) = self.wheres.clone().into_expr() {
            QueryTrait::query(&mut select).and_where(expr);
        }
        select
    }

    async fn fetch_on<C>(&self, conn: &C) -> Result<Vec<Row>>
    where
        C: ConnectionTrait,
    {
        let rows = self
            .composed()
            .into_model::<JsonRow>()
            .all(conn)
            .await?
            .into_iter()
            .map(|row| row.0)
            .collect();
        self.attach_preloads(conn, rows).await
    }

    async fn paginate_on<C>(&self, conn: &C, page: u64, per_page: u64) -> Result<PageResult>
    where
        C: ConnectionTrait,
    {
        let paginator = self
            .composed()
            .into_model::<JsonRow>()
            .paginate(conn, per_page.max(1));
        let mut result = exec::collect_page(&paginator, page, per_page).await?;
        result.data = self.attach_preloads(conn, result.data).await?;
        Ok(result)
    }

    async fn attach_preloads<C>(&self, conn: &C, mut rows: Vec<Row>) -> Result<Vec<Row>>
    where
        C: ConnectionTrait,
    {
        if self.preloads.is_empty() || rows.is_empty() {
            return Ok(rows);
        }
        for name in &self.preloads {
            let relation = self
                .relations
                .and_then(|map| map.get(name))
                .ok_or_else(|| SearchError::UnknownRelation(name.clone()))?;
            preload::attach(conn, &mut rows, name, &relation.def()).await?;
        }
        Ok(rows)
    }
}

impl<'a, E: EntityTrait> Transacting<'a> for ModelQuery<'a, E> {
    fn transacting(mut self, tx: &'a DatabaseTransaction) -> Self {
        self.tx = Some(tx);
        self
    }
}

#[async_trait]
impl<E> SearchQuery for ModelQuery<'_, E>
where
    E: EntityTrait,
    E::Relation: Sync,
{
    fn select(&mut self, columns: &[String]) -> &mut Self {
        QueryTrait::query(&mut self.select)
            .clear_selects()
            .columns(columns.iter().map(|c| column_ref(c)));
        self
    }

    fn preload(&mut self, relation: &str) -> Result<&mut Self> {
        let known = self
            .relations
            .is_some_and(|map| map.get(relation).is_some());
        if !known {
            return Err(SearchError::UnknownRelation(relation.to_owned()));
        }
        self.preloads.push(relation.to_owned());
        Ok(self)
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
        QueryTrait::query(&mut self.select).clear_order_by();
        self
    }

    fn limit(&mut self, limit: u64) -> &mut Self {
        QueryTrait::query(&mut self.select).limit(limit);
        self
    }

    fn offset(&mut self, offset: u64) -> &mut Self {
        QueryTrait::query(&mut self.select).offset(offset);
        self
    }

    fn statement(&self) -> SelectStatement {
        self.composed().into_query()
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
        match self.tx {
            Some(tx) => self.fetch_on(tx).await,
            None => self.fetch_on(conn).await,
        }
    }

    async fn paginate<C>(&self, conn: &C, page: u64, per_page: u64) -> Result<PageResult>
    where
        C: ConnectionTrait,
    {
        match self.tx {
            Some(tx) => self.paginate_on(tx, page, per_page).await,
            None => self.paginate_on(conn, page, per_page).await,
        }
    }
}
