//! Protocol requests and operation dispatch.

use crate::error::{WopiError, WopiResult};
use crate::headers;
use axum::http::{HeaderMap, HeaderName, Method};
use bytes::Bytes;
use std::fmt;
use tracing::warn;

/// The WOPI endpoint a request was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// `/wopi/files/{id}`
    File,
    /// `/wopi/files/{id}/contents`
    Contents,
}

/// A WOPI operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `GET /wopi/files/{id}`
    CheckFileInfo,
    /// `GET /wopi/files/{id}/contents`
    GetFile,
    /// `POST /wopi/files/{id}/contents`
    PutFile,
    /// `LOCK`
    Lock,
    /// `LOCK` with `X-WOPI-OldLock`
    UnlockAndRelock,
    /// `GET_LOCK`
    GetLock,
    /// `REFRESH_LOCK`
    RefreshLock,
    /// `UNLOCK`
    Unlock,
    /// `PUT_RELATIVE`
    PutRelativeFile,
    /// `RENAME_FILE`
    RenameFile,
    /// `DELETE`
    DeleteFile,
    /// `GET_SHARE_URL`
    GetShareUrl,
    /// `PUT_USER_INFO`
    PutUserInfo,
}

impl Operation {
    /// Resolves the operation of a request.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a file POST without override and
    /// `NotImplemented` for unknown overrides or methods.
    pub fn resolve(method: &Method, target: Target, headers: &HeaderMap) -> WopiResult<Self> {
        let override_value = header_str(headers, headers::OVERRIDE).map(str::to_ascii_uppercase);

        let is_get = *method == Method::GET;
        let is_post = *method == Method::POST;

        match target {
            Target::File if is_get => Ok(Operation::CheckFileInfo),
            Target::Contents if is_get => Ok(Operation::GetFile),
            Target::Contents if is_post => match override_value.as_deref() {
                None | Some("PUT") => Ok(Operation::PutFile),
                Some(other) => Err(WopiError::NotImplemented(format!(
                    "override {other} on file contents"
                ))),
            },
            Target::File if is_post => {
                let Some(value) = override_value else {
                    return Err(WopiError::BadRequest("missing X-WOPI-Override".into()));
                };
                match value.as_str() {
                    "LOCK" if headers.contains_key(headers::OLD_LOCK) => {
                        Ok(Operation::UnlockAndRelock)
                    }
                    "LOCK" => Ok(Operation::Lock),
                    "GET_LOCK" => Ok(Operation::GetLock),
                    "REFRESH_LOCK" => Ok(Operation::RefreshLock),
                    "UNLOCK" => Ok(Operation::Unlock),
                    "PUT_RELATIVE" => Ok(Operation::PutRelativeFile),
                    "RENAME_FILE" => Ok(Operation::RenameFile),
                    "DELETE" => Ok(Operation::DeleteFile),
                    "GET_SHARE_URL" => Ok(Operation::GetShareUrl),
                    "PUT_USER_INFO" => Ok(Operation::PutUserInfo),
                    other => Err(WopiError::NotImplemented(format!("override {other}"))),
                }
            }
            _ => Err(WopiError::NotImplemented(format!("method {method}"))),
        }
    }

    /// Returns the endpoint this operation is sent to.
    #[must_use]
    pub fn target(self) -> Target {
        match self {
            Operation::GetFile | Operation::PutFile => Target::Contents,
            _ => Target::File,
        }
    }

    /// Returns the HTTP method of this operation.
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Operation::CheckFileInfo | Operation::GetFile => Method::GET,
            _ => Method::POST,
        }
    }

    /// Returns the `X-WOPI-Override` value of this operation, if it has one.
    #[must_use]
    pub fn override_value(self) -> Option<&'static str> {
        match self {
            Operation::CheckFileInfo | Operation::GetFile => None,
            Operation::PutFile => Some("PUT"),
            Operation::Lock | Operation::UnlockAndRelock => Some("LOCK"),
            Operation::GetLock => Some("GET_LOCK"),
            Operation::RefreshLock => Some("REFRESH_LOCK"),
            Operation::Unlock => Some("UNLOCK"),
            Operation::PutRelativeFile => Some("PUT_RELATIVE"),
            Operation::RenameFile => Some("RENAME_FILE"),
            Operation::DeleteFile => Some("DELETE"),
            Operation::GetShareUrl => Some("GET_SHARE_URL"),
            Operation::PutUserInfo => Some("PUT_USER_INFO"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A transport-independent WOPI request.
#[derive(Debug, Clone)]
pub struct WopiRequest {
    /// HTTP method.
    pub method: Method,
    /// Endpoint the request was sent to.
    pub target: Target,
    /// File id exactly as it appeared in the path.
    pub file_id: String,
    /// The `access_token` query parameter.
    pub access_token: Option<String>,
    /// Absolute request URL as seen by the client, used for proof validation.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl WopiRequest {
    /// Creates a request without headers or body.
    pub fn new(method: Method, target: Target, file_id: impl Into<String>) -> Self {
        Self {
            method,
            target,
            file_id: file_id.into(),
            access_token: None,
            url: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a request for an operation, setting method, endpoint and
    /// override header.
    pub fn operation(operation: Operation, file_id: impl Into<String>) -> Self {
        let request = Self::new(operation.method(), operation.target(), file_id);
        match operation.override_value() {
            Some(value) => request.header(headers::OVERRIDE, value),
            None => request,
        }
    }

    /// Adds a header. Invalid names or values are dropped with a warning.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::try_from(name),
            headers::value(value),
        ) {
            (Ok(name), Some(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(header = name, "dropping invalid request header"),
        }
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the access token.
    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the absolute request URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Resolves the requested operation.
    ///
    /// # Errors
    ///
    /// See [`Operation::resolve`].
    pub fn resolve(&self) -> WopiResult<Operation> {
        Operation::resolve(&self.method, self.target, &self.headers)
    }

    /// Returns a header value as text.
    ///
    /// Values that are not UTF-8 are treated as absent.
    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        header_str(&self.headers, name)
    }

    /// Returns a header that must be present.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` if the header is missing.
    pub fn require_header(&self, name: &str) -> WopiResult<&str> {
        self.header_str(name)
            .ok_or_else(|| WopiError::BadRequest(format!("missing header {name}")))
    }

    /// Returns true if a boolean header is set to `true`.
    #[must_use]
    pub fn header_flag(&self, name: &str) -> bool {
        self.header_str(name)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(headers::text)
}
