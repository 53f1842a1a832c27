use std::collections::{HashMap, HashSet};

use sea_orm::sea_query::{Alias, Asterisk, Expr, Iden, Query};
use sea_orm::{ConnectionTrait, Identity, RelationDef, RelationType, Value};

use crate::query::{Row, fetch_rows};
use crate::{Result, SearchError};

/// Load the children of `def` for every row and attach them under `name`.
///
/// One `IN (...)` query is issued per relation regardless of the row count.
/// Every row must carry the relation's local key column; a `NULL` key is
/// fine and attaches nothing.
pub(super) async fn attach<C>(
    conn: &C,
    rows: &mut [Row],
    name: &str,
    def: &RelationDef,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let from_col = single_column(&def.from_col, name)?;
    let to_col = single_column(&def.to_col, name)?;
    if rows.iter().any(|row| row.get(&from_col).is_none()) {
        return Err(SearchError::MissingPreloadKey {
            relation: name.to_owned(),
            column: from_col,
        });
    }

    let mut seen = HashSet::new();
    let keys: Vec<Value> = rows
        .iter()
        .filter_map(|row| row.get(&from_col))
        .filter(|key| !key.is_null() && seen.insert(key.to_string()))
        .filter_map(json_key)
        .collect();

    let mut children: HashMap<String, Vec<Row>> = HashMap::new();
    if !keys.is_empty() {
        let mut stmt = Query::select();
        stmt.column(Asterisk)
            .from(def.to_tbl.clone())
            .and_where(Expr::col(Alias::new(&to_col)).is_in(keys));

        for child in fetch_rows(conn, &stmt).await? {
            if let Some(key) = child.get(&to_col).filter(|k| !k.is_null()) {
                children.entry(key.to_string()).or_default().push(child);
            }
        }
    }
    tracing::debug!(
        relation = name,
        parents = rows.len(),
        groups = children.len(),
        "preloaded relation"
    );

    let many = matches!(def.rel_type, RelationType::HasMany);
    for row in rows.iter_mut() {
        let matched = row
            .get(&from_col)
            .and_then(|key| children.get(&key.to_string()));
        let value = match (many, matched) {
            (true, Some(list)) => Row::Array(list.clone()),
            (true, None) => Row::Array(Vec::new()),
            (false, Some(list)) => list.first().cloned().unwrap_or(Row::Null),
            (false, None) => Row::Null,
        };
        if let Some(obj) = row.as_object_mut() {
            obj.insert(name.to_owned(), value);
        }
    }
    Ok(())
}

fn single_column(identity: &Identity, relation: &str) -> Result<String> {
    match identity {
        Identity::Unary(iden) => Ok(Iden::to_string(&**iden)),
        _ => Err(SearchError::CompositeRelation(relation.to_owned())),
    }
}

fn json_key(key: &Row) -> Option<Value> {
    match key {
        Row::Number(n) => n
            .as_i64()
            .map(Value::from)
            .or_else(|| n.as_u64().map(Value::from))
            .or_else(|| n.as_f64().map(Value::from)),
        Row::String(s) => Some(Value::from(s.clone())),
        Row::Bool(b) => Some(Value::from(*b)),
        _ => None,
    }
}
