//! Field selection and relation preloading requested by the client.

use crate::Result;
use crate::query::SearchQuery;

/// Columns to select and relations to preload. `None` leaves the query as is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Projection {
    pub selects: Option<Vec<String>>,
    pub populates: Option<Vec<String>>,
}

impl Projection {
    #[must_use]
    pub fn selects<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selects: Some(columns.into_iter().map(Into::into).collect()),
            populates: None,
        }
    }

    #[must_use]
    pub fn with_populates<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.populates = Some(relations.into_iter().map(Into::into).collect());
        self
    }
}

/// Apply `projection` to `query`: one `preload` per relation in request order
/// (names trimmed, blanks skipped), then a single `select` with the full list.
///
/// # Errors
/// Propagates the first `preload` failure; the query may already carry the
/// relations preceding it.
pub fn apply_projection<'q, Q>(query: &'q mut Q, projection: &Projection) -> Result<&'q mut Q>
where
    Q: SearchQuery,
{
    if let Some(populates) = &projection.populates {
        for relation in populates.iter().map(|r| r.as_str().trim()).filter(|r| !r.is_empty()) {
            query.preload(relation)?;
        }
    }
    if let Some(selects) = &projection.selects {
        query.select(selects);
    }
    Ok(query)
}
