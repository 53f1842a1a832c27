use sea_orm::sea_query::SelectStatement;
use sea_orm::{
    ConnectionTrait, DbErr, FromQueryResult, ItemsAndPagesNumber, JsonValue, Paginator,
    PaginatorTrait, QueryResult, SelectorTrait,
};

use crate::Result;
use crate::pager::{PageMeta, PageResult};
use crate::query::Row;

/// A result row decoded as a JSON object.
///
/// Columns with a declared type go through `SeaORM`'s JSON conversion. Columns
/// it skips (expressions such as `COUNT(...)` on `SQLite` carry no declared
/// type) are decoded from their runtime value instead.
pub(super) struct JsonRow(pub(super) Row);

impl FromQueryResult for JsonRow {
    fn from_query_result(res: &QueryResult, pre: &str) -> std::result::Result<Self, DbErr> {
        let mut row = JsonValue::from_query_result(res, pre)?;
        if let Some(obj) = row.as_object_mut() {
            for name in res.column_names() {
                let Some(column) = name.strip_prefix(pre) else {
                    continue;
                };
                if !obj.contains_key(column) {
                    obj.insert(column.to_owned(), untyped_value(res, pre, column));
                }
            }
        }
        Ok(Self(row))
    }
}

fn untyped_value(res: &QueryResult, pre: &str, column: &str) -> JsonValue {
    if let Ok(v) = res.try_get::<Option<i64>>(pre, column) {
        return v.map_or(JsonValue::Null, JsonValue::from);
    }
    if let Ok(v) = res.try_get::<Option<f64>>(pre, column) {
        return v.map_or(JsonValue::Null, JsonValue::from);
    }
    if let Ok(v) = res.try_get::<Option<String>>(pre, column) {
        return v.map_or(JsonValue::Null, JsonValue::from);
    }
    if let Ok(v) = res.try_get::<Option<bool>>(pre, column) {
        return v.map_or(JsonValue::Null, JsonValue::from);
    }
    JsonValue::Null
}

/// Run a statement on `conn` and collect rows as JSON objects.
pub async fn fetch_rows<C>(conn: &C, stmt: &SelectStatement) -> Result<Vec<Row>>
where
    C: ConnectionTrait,
{
    let stmt = conn.get_database_backend().build(stmt);
    tracing::trace!(sql = %stmt, "fetching rows");
    let rows = JsonRow::find_by_statement(stmt).all(conn).await?;
    Ok(rows.into_iter().map(|row| row.0).collect())
}

/// Native pagination over a raw statement via `SeaORM`'s paginator.
pub(super) async fn paginate_statement<C>(
    conn: &C,
    stmt: &SelectStatement,
    page: u64,
    per_page: u64,
) -> Result<PageResult>
where
    C: ConnectionTrait,
{
    let stmt = conn.get_database_backend().build(stmt);
    let paginator = JsonRow::find_by_statement(stmt).paginate(conn, per_page.max(1));
    collect_page(&paginator, page, per_page).await
}

/// Count, then fetch one page, and shape the result.
///
/// A page whose offset does not fit in `u64` is past the end by definition, so
/// it is returned empty without issuing the row query.
pub(super) async fn collect_page<'db, C, S>(
    paginator: &Paginator<'db, C, S>,
    page: u64,
    per_page: u64,
) -> Result<PageResult>
where
    C: ConnectionTrait,
    S: SelectorTrait<Item = JsonRow> + Send + Sync + 'db,
{
    let ItemsAndPagesNumber {
        number_of_items,
        number_of_pages,
    } = paginator.num_items_and_pages().await?;

    let index = page.saturating_sub(1);
    let data = if per_page.max(1).checked_mul(index).is_some() {
        paginator
            .fetch_page(index)
            .await?
            .into_iter()
            .map(|row| row.0)
            .collect()
    } else {
        Vec::new()
    };

    Ok(PageResult {
        data,
        meta: PageMeta {
            page,
            per_page,
            total: number_of_items,
            last_page: number_of_pages,
        },
    })
}
