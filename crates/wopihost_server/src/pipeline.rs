//! Request pipeline.
//!
//! A [`Pipeline`] runs its [`Stage`]s around the [`WopiHandler`]:
//!
//! ```text
//! request → stage.before (in order) → handler → stage.after (in order) → response
//! ```
//!
//! A stage that rejects a request in `before` short-circuits the handler, but
//! every stage's `after` still runs so error responses are shaped too.

use crate::error::WopiResult;
use crate::handler::WopiHandler;
use crate::headers;
use crate::proof::ProofValidator;
use crate::request::WopiRequest;
use crate::response::WopiResponse;
use std::sync::Arc;
use tracing::warn;

/// One step of request processing.
pub trait Stage: Send + Sync {
    /// Inspects a request before it reaches the handler.
    fn before(&self, _request: &WopiRequest) -> WopiResult<()> {
        Ok(())
    }

    /// Adjusts the response on its way out.
    fn after(&self, _request: &WopiRequest, _response: &mut WopiResponse) {}
}

/// Rejects requests whose proof headers don't verify.
pub struct ProofStage {
    validator: Arc<dyn ProofValidator>,
}

impl ProofStage {
    /// Creates a stage around `validator`.
    pub fn new(validator: Arc<dyn ProofValidator>) -> Self {
        Self { validator }
    }
}

impl Stage for ProofStage {
    fn before(&self, request: &WopiRequest) -> WopiResult<()> {
        self.validator.validate(request).inspect_err(|err| {
            warn!(file_id = %request.file_id, error = %err, "proof validation failed");
        })
    }
}

/// Adds host identification headers to every response.
pub struct ResponseShaping {
    server_version: String,
}

impl ResponseShaping {
    /// Reports `server_version` as `X-WOPI-ServerVersion`.
    pub fn new(server_version: impl Into<String>) -> Self {
        Self {
            server_version: server_version.into(),
        }
    }
}

impl Stage for ResponseShaping {
    fn after(&self, _request: &WopiRequest, response: &mut WopiResponse) {
        response.set_header(headers::SERVER_VERSION, &self.server_version);
    }
}

/// Ordered stages around a handler.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    handler: Arc<WopiHandler>,
}

impl Pipeline {
    /// Creates a pipeline with no stages.
    pub fn new(handler: Arc<WopiHandler>) -> Self {
        Self {
            stages: Vec::new(),
            handler,
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs a request through every stage and the handler.
    pub fn handle(&self, request: &WopiRequest) -> WopiResponse {
        let rejected = self
            .stages
            .iter()
            .find_map(|stage| stage.before(request).err());

        let mut response = match rejected {
            Some(err) => err.into_response(),
            None => self.handler.handle(request),
        };
        for stage in &self.stages {
            stage.after(request, &mut response);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::error::WopiError;
    use crate::handler::HandlerContext;
    use crate::request::Operation;
    use axum::http::StatusCode;
    use parking_lot::Mutex;
    use wopihost_core::{
        DocumentStore, LockConfig, MemoryDocumentStore, MemoryLockStore, MemoryShareStore,
        NewDocument, SystemClock,
    };

    struct Reject;

    impl Stage for Reject {
        fn before(&self, _request: &WopiRequest) -> WopiResult<()> {
            Err(WopiError::ProofRejected("test".into()))
        }
    }

    struct Record(Arc<Mutex<Vec<StatusCode>>>);

    impl Stage for Record {
        fn after(&self, _request: &WopiRequest, response: &mut WopiResponse) {
            self.0.lock().push(response.status);
        }
    }

    fn pipeline() -> (Pipeline, String) {
        let clock = Arc::new(SystemClock);
        let documents = Arc::new(MemoryDocumentStore::new(clock.clone()));
        let doc = documents.create(NewDocument::new("a", "txt")).unwrap();
        let context = HandlerContext::new(
            ServerConfig::default(),
            documents,
            Arc::new(MemoryLockStore::new(LockConfig::default(), clock.clone())),
            Arc::new(MemoryShareStore::new(clock)),
        );
        let handler = Arc::new(WopiHandler::new(Arc::new(context)));
        (Pipeline::new(handler), doc.id.to_string())
    }

    #[test]
    fn shaping_adds_server_version() {
        let (pipeline, id) = pipeline();
        let pipeline = pipeline.with_stage(ResponseShaping::new("1.2.3"));

        let response = pipeline.handle(&WopiRequest::operation(Operation::GetLock, id));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.header("X-WOPI-ServerVersion"), Some("1.2.3"));
        assert_eq!(response.header("X-WOPI-Lock"), Some(""));
    }

    #[test]
    fn rejection_skips_handler_but_runs_after() {
        let (pipeline, id) = pipeline();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline
            .with_stage(Reject)
            .with_stage(Record(seen.clone()));
        assert_eq!(pipeline.len(), 2);

        let response = pipeline.handle(&WopiRequest::operation(Operation::CheckFileInfo, id));
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.body.is_empty());
        assert_eq!(*seen.lock(), vec![StatusCode::INTERNAL_SERVER_ERROR]);
    }
}
