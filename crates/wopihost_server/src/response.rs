//! Protocol responses.

use crate::headers;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use bytes::Bytes;
use serde::Serialize;
use tracing::warn;

/// A transport-independent WOPI response.
#[derive(Debug, Clone, PartialEq)]
pub struct WopiResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl WopiResponse {
    /// Creates an empty response with the given status.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Creates an empty `200 OK` response.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Creates a `200 OK` response with a JSON body.
    ///
    /// Falls back to an empty `500` if the value cannot be serialized.
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::ok()
                .with_header(CONTENT_TYPE, headers::CONTENT_TYPE_JSON)
                .with_body(body),
            Err(err) => {
                warn!(error = %err, "failed to encode response body");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Creates a `200 OK` file download response.
    pub fn attachment(filename: &str, content: Bytes) -> Self {
        let disposition = headers::attachment_disposition(filename);
        Self::ok()
            .with_header(CONTENT_TYPE, headers::CONTENT_TYPE_BINARY)
            .with_header(CONTENT_DISPOSITION, &disposition)
            .with_body(content)
    }

    /// Sets a header, replacing any previous value.
    ///
    /// UTF-8 text is kept as-is. Values with control characters are dropped
    /// with a warning.
    #[must_use]
    pub fn with_header<N>(mut self, name: N, value: &str) -> Self
    where
        N: TryInto<HeaderName>,
    {
        self.set_header(name, value);
        self
    }

    /// In-place form of [`with_header`](Self::with_header).
    pub fn set_header<N>(&mut self, name: N, value: &str)
    where
        N: TryInto<HeaderName>,
    {
        let Ok(name) = name.try_into() else {
            warn!("dropping header with invalid name");
            return;
        };
        match headers::value(value) {
            Some(value) => {
                self.headers.insert(name, value);
            }
            None => warn!(header = %name, "dropping header with invalid value"),
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets `X-WOPI-ItemVersion`.
    #[must_use]
    pub fn with_item_version(self, version: &str) -> Self {
        self.with_header(headers::ITEM_VERSION, version)
    }

    /// Sets `X-WOPI-Lock`. An empty string is a valid value.
    #[must_use]
    pub fn with_lock(self, token: &str) -> Self {
        self.with_header(headers::LOCK, token)
    }

    /// Returns a header value as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(headers::text)
    }

    /// Returns the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body isn't valid JSON.
    pub fn json_body(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}
