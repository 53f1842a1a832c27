//! Column-equality filter for the demo endpoints.
//!
//! Accepts `{"column": value}` or `{"column": [v1, v2, ...]}` objects. Scalars
//! become `column = value`, arrays become an OR group. Only allow-listed
//! columns are accepted.

use sea_orm::Value;
use searchkit_db::{
    FilterApplier, FilterSpec, Pagination, SearchError, SearchQuery, generate_equal_cond,
};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug)]
pub struct FieldEqFilter {
    allowed: &'static [&'static str],
}

impl FieldEqFilter {
    #[must_use]
    pub const fn new(allowed: &'static [&'static str]) -> Self {
        Self { allowed }
    }

    fn check_column(&self, column: &str) -> searchkit_db::Result<()> {
        if self.allowed.iter().any(|c| *c == column) {
            Ok(())
        } else {
            Err(SearchError::InvalidFilter(format!(
                "column '{column}' cannot be filtered"
            )))
        }
    }
}

impl FilterApplier for FieldEqFilter {
    fn apply<Q: SearchQuery>(
        &self,
        query: &mut Q,
        _pagination: &Pagination,
        filter: &FilterSpec,
    ) -> searchkit_db::Result<()> {
        let Some(filter) = filter.as_value() else {
            return Ok(());
        };
        let JsonValue::Object(fields) = filter else {
            return Err(SearchError::InvalidFilter(
                "filter must be an object".to_owned(),
            ));
        };

        for (column, value) in fields {
            self.check_column(column)?;
            match value {
                JsonValue::Array(items) => {
                    let values = items
                        .iter()
                        .map(|v| scalar(column, v))
                        .collect::<searchkit_db::Result<Vec<_>>>()?;
                    generate_equal_cond(query, &values, column);
                }
                other => {
                    let value = scalar(column, other)?;
                    query.where_group(|g| {
                        g.and_where(column, value);
                    });
                }
            }
        }
        tracing::debug!(fields = fields.len(), "applied equality filter");
        Ok(())
    }
}

fn scalar(column: &str, value: &JsonValue) -> searchkit_db::Result<Value> {
    match value {
        JsonValue::String(s) => Ok(Value::from(s.clone())),
        JsonValue::Bool(b) => Ok(Value::from(*b)),
        JsonValue::Number(n) => n
            .as_i64()
            .map(Value::from)
            .or_else(|| n.as_f64().map(Value::from))
            .ok_or_else(|| SearchError::InvalidFilter(format!("'{column}': number out of range"))),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => Err(
            SearchError::InvalidFilter(format!("'{column}' expects a scalar value")),
        ),
    }
}
