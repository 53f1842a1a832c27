//! Response envelope and its boundary rendering.
//!
//! Search results are already response-shaped, so they travel as
//! [`Envelope::PassThrough`] and are written out verbatim. Other values get the
//! generic `{status, data}` wrapping, errors become `{status, error}`, and a
//! [`FrameworkException`] is never serialized as an envelope: it is handed
//! back to the caller to propagate.

use http::StatusCode;
use serde::{Serialize, Serializer};
use serde_json::{Value as JsonValue, json};

use crate::SearchError;
use crate::pager::SearchResult;

/// Outcome of a handler, before it becomes an HTTP response.
#[derive(Clone, Debug)]
pub enum Envelope {
    /// Already response-shaped; written out as is with status 200.
    PassThrough(SearchResult),
    Failure(ApiFailure),
    Fatal(FrameworkException),
    /// Any other value; wrapped as `{status: 200, data}`.
    Value(JsonValue),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_status_code<S>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(status.as_u16())
}

/// Error value rendered as `{status, error}`.
#[derive(Clone, Debug, Serialize)]
pub struct ApiFailure {
    #[serde(serialize_with = "serialize_status_code")]
    pub status: StatusCode,
    pub error: JsonValue,
}

impl ApiFailure {
    #[must_use]
    pub fn new(status: StatusCode, error: JsonValue) -> Self {
        Self { status, error }
    }
}

impl From<SearchError> for ApiFailure {
    fn from(err: SearchError) -> Self {
        let status = err
            .http_code()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            error: json!({ "message": err.to_string() }),
        }
    }
}

/// Error owned by the hosting framework. Propagated, never enveloped.
#[derive(Clone, Debug, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct FrameworkException {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl FrameworkException {
    #[must_use]
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<SearchResult> for Envelope {
    fn from(result: SearchResult) -> Self {
        Self::PassThrough(result)
    }
}

impl From<SearchError> for Envelope {
    fn from(err: SearchError) -> Self {
        Self::Failure(err.into())
    }
}

impl From<FrameworkException> for Envelope {
    fn from(err: FrameworkException) -> Self {
        Self::Fatal(err)
    }
}

impl From<JsonValue> for Envelope {
    fn from(value: JsonValue) -> Self {
        Self::Value(value)
    }
}

impl Envelope {
    /// Status and JSON body for this envelope.
    ///
    /// # Errors
    /// Returns the [`FrameworkException`] carried by [`Envelope::Fatal`], or a
    /// 500 exception if the result cannot be serialized.
    pub fn render(self) -> Result<(StatusCode, JsonValue), FrameworkException> {
        match self {
            Self::PassThrough(result) => serde_json::to_value(result)
                .map(|body| (StatusCode::OK, body))
                .map_err(|e| {
                    FrameworkException::new(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "SERIALIZATION",
                        e.to_string(),
                    )
                }),
            Self::Failure(failure) => Ok((
                failure.status,
                json!({ "status": failure.status.as_u16(), "error": failure.error }),
            )),
            Self::Fatal(err) => Err(err),
            Self::Value(data) => Ok((
                StatusCode::OK,
                json!({ "status": StatusCode::OK.as_u16(), "data": data }),
            )),
        }
    }
}

/// Turn an envelope into an axum response, handing framework exceptions back.
///
/// # Errors
/// Returns the [`FrameworkException`] the envelope carries so the caller can
/// propagate it with `?`.
#[cfg(feature = "axum")]
pub fn api_view(envelope: Envelope) -> Result<axum::response::Response, FrameworkException> {
    use axum::response::IntoResponse;

    let (status, body) = envelope.render()?;
    Ok((status, axum::Json(body)).into_response())
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for Envelope {
    fn into_response(self) -> axum::response::Response {
        match api_view(self) {
            Ok(resp) => resp,
            Err(err) => err.into_response(),
        }
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for FrameworkException {
    fn into_response(self) -> axum::response::Response {
        let status = self.status;
        let mut resp = axum::Json(self).into_response();
        *resp.status_mut() = status;
        resp
    }
}
