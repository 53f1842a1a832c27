//! Request normalization.
//!
//! Clients send `pagination` and `filter` either as structured JSON or as a
//! JSON-encoded string (typical for query-string transport). Everything is
//! decoded once here, before the engine sees it.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::projection::Projection;
use crate::{Result, SearchError};

/// Requested page window.
///
/// `page` is kept signed so that out-of-range input survives normalization and
/// is clamped by the pager. `rows_per_page == Some(0)` means "no limit".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub rows_per_page: Option<u64>,
}

impl Pagination {
    #[must_use]
    pub fn new(page: i64, rows_per_page: u64) -> Self {
        Self {
            page: Some(page),
            rows_per_page: Some(rows_per_page),
        }
    }

    /// Whether the request asked for a page at all.
    #[must_use]
    pub fn is_paged(&self) -> bool {
        self.page.is_some()
    }

    /// Decode from a structured value or a JSON-encoded string.
    ///
    /// Field rules:
    /// - `page`: integers are kept as is (fractions truncate), numeric strings
    ///   are parsed, `null`/`false`/`""` mean "not requested", anything else
    ///   becomes `0` and is clamped to the first page later.
    /// - `rowsPerPage`: non-negative integers and numeric strings are kept,
    ///   negative numbers become `0`, anything else is ignored.
    ///
    /// # Errors
    /// Returns `SearchError::InvalidJson` if a string value is not valid JSON.
    pub fn from_value(value: Option<JsonValue>) -> Result<Self> {
        let Some(value) = decode_string("pagination", value)? else {
            return Ok(Self::default());
        };
        let Some(obj) = value.as_object() else {
            return Ok(Self::default());
        };

        Ok(Self {
            page: obj.get("page").and_then(page_number),
            rows_per_page: obj.get("rowsPerPage").and_then(rows_number),
        })
    }
}

/// Opaque filter payload handed to the filter collaborator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSpec(pub Option<JsonValue>);

impl FilterSpec {
    /// # Errors
    /// Returns `SearchError::InvalidJson` if a string value is not valid JSON.
    pub fn from_value(value: Option<JsonValue>) -> Result<Self> {
        Ok(Self(decode_string("filter", value)?))
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&JsonValue> {
        self.0.as_ref()
    }
}

impl From<JsonValue> for FilterSpec {
    fn from(value: JsonValue) -> Self {
        Self((!value.is_null()).then_some(value))
    }
}

/// Search payload as received from the transport, every field optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawSearchPayload {
    pub pagination: Option<JsonValue>,
    pub filter: Option<JsonValue>,
    pub populates: Option<JsonValue>,
    pub selects: Option<JsonValue>,
}

impl RawSearchPayload {
    /// Decode every field into its typed form.
    ///
    /// # Errors
    /// Returns `SearchError::InvalidJson` when `pagination` or `filter` is a
    /// string that does not parse.
    pub fn normalize(self) -> Result<SearchRequest> {
        Ok(SearchRequest {
            pagination: Pagination::from_value(self.pagination)?,
            filter: FilterSpec::from_value(self.filter)?,
            projection: Projection {
                selects: string_list(self.selects),
                populates: string_list(self.populates),
            },
        })
    }
}

/// Normalized search request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchRequest {
    pub pagination: Pagination,
    pub filter: FilterSpec,
    pub projection: Projection,
}

/// `None` for absent/null/empty-string input; strings are parsed as JSON.
fn decode_string(field: &'static str, value: Option<JsonValue>) -> Result<Option<JsonValue>> {
    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
        Some(JsonValue::String(s)) => serde_json::from_str::<JsonValue>(&s)
            .map(|v| (!v.is_null()).then_some(v))
            .map_err(|source| SearchError::InvalidJson { field, source }),
        Some(other) => Ok(Some(other)),
    }
}

fn page_number(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Null | JsonValue::Bool(false) => None,
        JsonValue::Number(n) => Some(
            n.as_i64()
                .or_else(|| n.as_u64().map(|_| i64::MAX))
                .or_else(|| n.as_f64().map(truncate))
                .unwrap_or(0),
        ),
        JsonValue::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.parse().unwrap_or(0))
        }
        _ => Some(0),
    }
}

fn rows_number(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|_| 0))
            .or_else(|| n.as_f64().map(|f| u64::try_from(truncate(f)).unwrap_or(0))),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate(f: f64) -> i64 {
    // `as` saturates at the bounds and maps NaN to 0.
    f.trunc() as i64
}

/// String elements of a sequence, or of a JSON-encoded sequence. Anything
/// else is treated as absent.
fn string_list(value: Option<JsonValue>) -> Option<Vec<String>> {
    let value = match value? {
        JsonValue::String(s) => serde_json::from_str(&s).ok()?,
        other => other,
    };
    let JsonValue::Array(items) = value else {
        return None;
    };
    Some(
        items
            .into_iter()
            .filter_map(|item| match item {
                JsonValue::String(s) => Some(s),
                _ => None,
            })
            .collect(),
    )
}
