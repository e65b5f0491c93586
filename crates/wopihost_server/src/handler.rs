//! The WOPI protocol handler.
//!
//! Every operation that reads a lock and then acts on it runs while holding
//! the document's guard from [`DocumentGuards`], so concurrent `Lock` or
//! `PutFile` calls on one document serialize through a single check-then-set.

use crate::config::ServerConfig;
use crate::error::{WopiError, WopiResult};
use crate::file_info::{CheckFileInfo, PutRelativeFileInfo, RenameFileInfo, ShareUrlInfo};
use crate::headers;
use crate::relative::TargetName;
use crate::request::{Operation, WopiRequest};
use crate::response::WopiResponse;
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wopihost_core::{
    Document, DocumentGuards, DocumentStore, FileId, LockStore, LockToken, NewDocument,
    ShareStore,
};

/// Largest accepted `PutUserInfo` body, in bytes.
const MAX_USER_INFO_BYTES: usize = 1024;

/// Shared state of the protocol handler.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Document content and metadata.
    pub documents: Arc<dyn DocumentStore>,
    /// Document locks.
    pub locks: Arc<dyn LockStore>,
    /// Public share links.
    pub shares: Arc<dyn ShareStore>,
    guards: DocumentGuards,
}

impl HandlerContext {
    /// Creates a handler context over the given stores.
    pub fn new(
        config: ServerConfig,
        documents: Arc<dyn DocumentStore>,
        locks: Arc<dyn LockStore>,
        shares: Arc<dyn ShareStore>,
    ) -> Self {
        Self {
            config,
            documents,
            locks,
            shares,
            guards: DocumentGuards::new(),
        }
    }
}

/// Executes WOPI operations against the stores.
pub struct WopiHandler {
    context: Arc<HandlerContext>,
}

impl WopiHandler {
    /// Creates a handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Returns the handler's context.
    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.context
    }

    /// Handles a request. Protocol failures become error responses.
    pub fn handle(&self, request: &WopiRequest) -> WopiResponse {
        self.dispatch(request)
            .unwrap_or_else(WopiError::into_response)
    }

    fn dispatch(&self, request: &WopiRequest) -> WopiResult<WopiResponse> {
        let operation = request.resolve()?;
        let id: FileId = request
            .file_id
            .parse()
            .map_err(|_| WopiError::NotFound(request.file_id.clone()))?;
        debug!(file_id = %id, %operation, "handling request");

        // Unknown ids never get a guard slot.
        self.document(id)?;

        // Held for the whole operation, including reads of the lock state.
        // PutRelativeFile never touches the source's lock; it guards its
        // target instead.
        let _guard = (operation != Operation::PutRelativeFile)
            .then(|| self.context.guards.acquire(id));
        // Re-read under the guard: a concurrent delete may have won the race.
        let document = match self.document(id) {
            Ok(document) => document,
            Err(err) => {
                self.context.guards.forget(id);
                return Err(err);
            }
        };

        match operation {
            Operation::CheckFileInfo => self.check_file_info(&document),
            Operation::GetFile => self.get_file(&document, request),
            Operation::PutFile => self.put_file(&document, request),
            Operation::Lock => self.lock(&document, request),
            Operation::UnlockAndRelock => self.unlock_and_relock(&document, request),
            Operation::GetLock => self.get_lock(&document),
            Operation::RefreshLock => self.refresh_lock(&document, request),
            Operation::Unlock => self.unlock(&document, request),
            Operation::PutRelativeFile => self.put_relative_file(&document, request),
            Operation::RenameFile => self.rename_file(&document, request),
            Operation::DeleteFile => self.delete_file(&document),
            Operation::GetShareUrl => self.get_share_url(&document, request),
            Operation::PutUserInfo => self.put_user_info(&document, request),
        }
    }

    /// Serves the public download of a share.
    pub fn download_share(&self, uuid: &str) -> WopiResponse {
        self.share_download(uuid)
            .unwrap_or_else(WopiError::into_response)
    }

    fn share_download(&self, uuid: &str) -> WopiResult<WopiResponse> {
        let uuid: Uuid = uuid
            .parse()
            .map_err(|_| WopiError::NotFound(format!("share {uuid}")))?;
        let share = self
            .context
            .shares
            .find(uuid)?
            .ok_or_else(|| WopiError::NotFound(format!("share {uuid}")))?;
        let document = self.document(share.file_id)?;
        let content = self.context.documents.read(document.id)?;
        Ok(WopiResponse::attachment(&document.basename(), content)
            .with_item_version(&document.item_version()))
    }

    fn document(&self, id: FileId) -> WopiResult<Document> {
        self.context
            .documents
            .find_by_id(id)?
            .ok_or_else(|| WopiError::NotFound(id.to_string()))
    }

    fn check_file_info(&self, document: &Document) -> WopiResult<WopiResponse> {
        let share = self.context.shares.ensure(document.id)?;
        let share_url = self.context.config.share_url(share.uuid);
        Ok(WopiResponse::json(&CheckFileInfo::new(
            document,
            &self.context.config,
            Some(share_url),
        )))
    }

    fn get_file(&self, document: &Document, request: &WopiRequest) -> WopiResult<WopiResponse> {
        if let Some(value) = request.header_str(headers::MAX_EXPECTED_SIZE) {
            let max: u64 = value.trim().parse().map_err(|_| {
                WopiError::BadRequest(format!("invalid X-WOPI-MaxExpectedSize {value:?}"))
            })?;
            if document.size > max {
                return Err(WopiError::PreconditionFailed(format!(
                    "file is {} bytes, client accepts {max}",
                    document.size
                )));
            }
        }

        let content = self.context.documents.read(document.id)?;
        Ok(WopiResponse::attachment(&document.basename(), content)
            .with_item_version(&document.item_version()))
    }

    fn lock(&self, document: &Document, request: &WopiRequest) -> WopiResult<WopiResponse> {
        let token = lock_header(request, headers::LOCK)?;
        let version = document.item_version();

        match self.context.locks.get(document.id)? {
            None => {
                self.context.locks.set(document.id, token)?;
                info!(file_id = %document.id, "locked");
            }
            Some(current) if current == token => {
                self.context.locks.refresh(document.id)?;
                debug!(file_id = %document.id, "lock refreshed by relock");
            }
            Some(current) => {
                return Err(locked_by_other(&current).with_item_version(version));
            }
        }
        Ok(WopiResponse::ok().with_item_version(&version))
    }

    fn unlock_and_relock(
        &self,
        document: &Document,
        request: &WopiRequest,
    ) -> WopiResult<WopiResponse> {
        let token = lock_header(request, headers::LOCK)?;
        let old = lock_header(request, headers::OLD_LOCK)?;
        let version = document.item_version();

        match self.context.locks.get(document.id)? {
            Some(current) if current == old => {
                self.context.locks.set(document.id, token)?;
                info!(file_id = %document.id, "lock replaced");
                Ok(WopiResponse::ok().with_item_version(&version))
            }
            Some(current) => Err(locked_by_other(&current)),
            None => {
                self.context.locks.set(document.id, token)?;
                info!(file_id = %document.id, "locked");
                Ok(WopiResponse::ok().with_item_version(&version))
            }
        }
    }

    fn get_lock(&self, document: &Document) -> WopiResult<WopiResponse> {
        match self.context.locks.get(document.id)? {
            Some(current) => Ok(WopiResponse::ok().with_lock(current.as_str())),
            None => Ok(WopiResponse::new(StatusCode::NOT_FOUND).with_lock("")),
        }
    }

    fn refresh_lock(&self, document: &Document, request: &WopiRequest) -> WopiResult<WopiResponse> {
        let token = lock_header(request, headers::LOCK)?;

        match self.context.locks.get(document.id)? {
            Some(current) if current == token => {
                self.context.locks.refresh(document.id)?;
                Ok(WopiResponse::ok().with_item_version(&document.item_version()))
            }
            Some(current) => Err(locked_by_other(&current)),
            None => Err(WopiError::lock_missing("file is not locked")),
        }
    }

    fn unlock(&self, document: &Document, request: &WopiRequest) -> WopiResult<WopiResponse> {
        let token = lock_header(request, headers::LOCK)?;

        match self.context.locks.get(document.id)? {
            Some(current) if current == token => {
                self.context.locks.delete(document.id)?;
                info!(file_id = %document.id, "unlocked");
                Ok(WopiResponse::ok()
                    .with_lock("")
                    .with_item_version(&document.item_version()))
            }
            Some(current) => Err(locked_by_other(&current)),
            None => Err(WopiError::lock_missing("file is not locked")),
        }
    }

    fn put_file(&self, document: &Document, request: &WopiRequest) -> WopiResult<WopiResponse> {
        let version = document.item_version();
        let presented = optional_lock_header(request, headers::LOCK)?;

        let held = match self.context.locks.get(document.id)? {
            None if document.is_empty() => None,
            None => {
                return Err(WopiError::lock_missing("file is not locked and not empty")
                    .with_item_version(version))
            }
            Some(current) if presented.as_ref() == Some(&current) => Some(current),
            Some(current) => {
                return Err(locked_by_other(&current).with_item_version(version));
            }
        };

        let editor = self.editor(request);
        let updated = self
            .context
            .documents
            .write(document.id, &request.body, &editor)?;
        info!(
            file_id = %document.id,
            revision = %updated.revision,
            size = updated.size,
            "content written"
        );

        let response = WopiResponse::ok().with_item_version(&updated.item_version());
        Ok(match held {
            Some(token) => response.with_lock(token.as_str()),
            None => response,
        })
    }

    fn put_relative_file(
        &self,
        source: &Document,
        request: &WopiRequest,
    ) -> WopiResult<WopiResponse> {
        if self.context.config.read_only || self.context.config.user_can_not_write_relative {
            return Err(WopiError::NotImplemented("relative writes are disabled".into()));
        }

        let suggested = request.header_str(headers::SUGGESTED_TARGET);
        let relative = request.header_str(headers::RELATIVE_TARGET);
        self.check_declared_size(request);

        let created = match (suggested, relative) {
            (Some(_), Some(_)) => {
                return Err(WopiError::BadRequest(
                    "SuggestedTarget and RelativeTarget are mutually exclusive".into(),
                ))
            }
            (None, None) => {
                return Err(WopiError::BadRequest(
                    "one of SuggestedTarget or RelativeTarget is required".into(),
                ))
            }
            (Some(value), None) => {
                let target = TargetName::suggested(source, value)?.free(&*self.context.documents)?;
                self.create_relative(&target, request)?
            }
            (None, Some(value)) => {
                let target = TargetName::relative(value)?;
                self.write_relative(&target, request)?
            }
        };

        let url = self
            .context
            .config
            .file_url(created.id, request.access_token.as_deref());
        Ok(WopiResponse::json(&PutRelativeFileInfo {
            name: created.basename(),
            url,
        }))
    }

    fn create_relative(&self, target: &TargetName, request: &WopiRequest) -> WopiResult<Document> {
        let new = NewDocument::new(target.name.clone(), target.extension.clone())
            .with_content(request.body.to_vec())
            .with_owner(self.context.config.user_id.clone());
        let created = self.context.documents.create(new)?;
        info!(file_id = %created.id, name = %created.basename(), "created relative file");
        Ok(created)
    }

    fn write_relative(&self, target: &TargetName, request: &WopiRequest) -> WopiResult<Document> {
        let Some(existing) = self.context.documents.find_by_filename(&target.filename())? else {
            return self.create_relative(target, request);
        };

        if !request.header_flag(headers::OVERWRITE_RELATIVE_TARGET) {
            let alternative = target.free(&*self.context.documents)?;
            return Err(WopiError::Conflict {
                reason: format!("{} already exists", target.filename()),
                valid_target: Some(alternative.filename()),
            });
        }

        let _guard = self.context.guards.acquire(existing.id);
        if let Some(current) = self.context.locks.get(existing.id)? {
            return Err(locked_by_other(&current));
        }
        let editor = self.editor(request);
        let updated = self
            .context
            .documents
            .write(existing.id, &request.body, &editor)?;
        info!(file_id = %updated.id, name = %updated.basename(), "overwrote relative file");
        Ok(updated)
    }

    fn rename_file(&self, document: &Document, request: &WopiRequest) -> WopiResult<WopiResponse> {
        let name = request.require_header(headers::REQUESTED_NAME)?.trim();
        wopihost_core::validate_name(name)?;

        if let Some(current) = self.context.locks.get(document.id)? {
            let presented = optional_lock_header(request, headers::LOCK)?;
            if presented.as_ref() != Some(&current) {
                return Err(locked_by_other(&current));
            }
        }

        let renamed = match self.context.documents.rename(document.id, name) {
            Ok(renamed) => renamed,
            Err(wopihost_core::CoreError::DuplicateFilename { filename }) => {
                return Err(WopiError::InvalidName(format!("{filename} already exists")))
            }
            Err(err) => return Err(err.into()),
        };
        info!(file_id = %document.id, name = %renamed.basename(), "renamed");
        Ok(WopiResponse::json(&RenameFileInfo { name: renamed.name }))
    }

    fn delete_file(&self, document: &Document) -> WopiResult<WopiResponse> {
        if let Some(current) = self.context.locks.get(document.id)? {
            return Err(locked_by_other(&current));
        }

        self.context.documents.remove(document.id)?;
        self.context.locks.delete(document.id)?;
        self.context.shares.remove_for(document.id)?;
        self.context.guards.forget(document.id);
        info!(file_id = %document.id, "deleted");
        Ok(WopiResponse::ok())
    }

    fn get_share_url(&self, document: &Document, request: &WopiRequest) -> WopiResult<WopiResponse> {
        let url_type = request.require_header(headers::URL_TYPE)?;
        if !url_type.trim().eq_ignore_ascii_case("ReadOnly") {
            return Err(WopiError::NotImplemented(format!("share url type {url_type}")));
        }
        let share = self.context.shares.ensure(document.id)?;
        Ok(WopiResponse::json(&ShareUrlInfo {
            share_url: self.context.config.share_url(share.uuid),
        }))
    }

    fn put_user_info(&self, document: &Document, request: &WopiRequest) -> WopiResult<WopiResponse> {
        if request.body.len() > MAX_USER_INFO_BYTES {
            return Err(WopiError::BadRequest(format!(
                "user info exceeds {MAX_USER_INFO_BYTES} bytes"
            )));
        }
        let info = std::str::from_utf8(&request.body)
            .map_err(|_| WopiError::BadRequest("user info is not UTF-8".into()))?;
        self.context.documents.set_user_info(document.id, info)?;
        Ok(WopiResponse::ok())
    }

    fn editor(&self, request: &WopiRequest) -> String {
        request
            .header_str(headers::EDITORS)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(self.context.config.user_id.as_str())
            .to_string()
    }

    fn check_declared_size(&self, request: &WopiRequest) {
        let Some(declared) = request.header_str(headers::SIZE) else {
            return;
        };
        if declared.trim().parse::<usize>().ok() != Some(request.body.len()) {
            warn!(
                declared,
                actual = request.body.len(),
                "X-WOPI-Size does not match body, using body length"
            );
        }
    }
}

fn lock_header(request: &WopiRequest, name: &str) -> WopiResult<LockToken> {
    optional_lock_header(request, name)?
        .ok_or_else(|| WopiError::BadRequest(format!("missing header {name}")))
}

fn optional_lock_header(request: &WopiRequest, name: &str) -> WopiResult<Option<LockToken>> {
    request
        .header_str(name)
        .map(|value| LockToken::new(value).map_err(WopiError::from))
        .transpose()
}

fn locked_by_other(current: &LockToken) -> WopiError {
    WopiError::lock_mismatch(current.as_str(), "file is locked with a different token")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wopihost_core::{LockConfig, ManualClock, MemoryDocumentStore, MemoryLockStore, MemoryShareStore};

    fn handler() -> (WopiHandler, FileId) {
        let clock = Arc::new(ManualClock::default());
        let documents = Arc::new(MemoryDocumentStore::new(clock.clone()));
        let doc = documents
            .create(NewDocument::new("a", "txt"))
            .unwrap();
        let context = HandlerContext::new(
            ServerConfig::default(),
            documents,
            Arc::new(MemoryLockStore::new(LockConfig::default(), clock.clone())),
            Arc::new(MemoryShareStore::new(clock)),
        );
        (WopiHandler::new(Arc::new(context)), doc.id)
    }

    #[test]
    fn unknown_file_is_not_found() {
        let (handler, _) = handler();
        let response =
            handler.handle(&WopiRequest::operation(Operation::CheckFileInfo, FileId::new().to_string()));
        assert_eq!(response.status, StatusCode::NOT_FOUND);

        let response = handler.handle(&WopiRequest::operation(Operation::GetFile, "not-a-uuid"));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn lock_requires_token() {
        let (handler, id) = handler();
        let response = handler.handle(&WopiRequest::operation(Operation::Lock, id.to_string()));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn overlong_token_rejected() {
        let (handler, id) = handler();
        let token = "x".repeat(1025);
        let response = handler.handle(
            &WopiRequest::operation(Operation::Lock, id.to_string()).header("X-WOPI-Lock", &token),
        );
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn user_info_size_limit() {
        let (handler, id) = handler();
        let response = handler.handle(
            &WopiRequest::operation(Operation::PutUserInfo, id.to_string()).body(vec![b'x'; 1025]),
        );
        assert_eq!(response.status, StatusCode::BAD_REQUEST);

        let response = handler.handle(
            &WopiRequest::operation(Operation::PutUserInfo, id.to_string()).body("{\"a\":1}"),
        );
        assert_eq!(response.status, StatusCode::OK);
        let info = handler.handle(&WopiRequest::operation(Operation::CheckFileInfo, id.to_string()));
        assert_eq!(info.json_body().unwrap()["UserInfo"], "{\"a\":1}");
    }

    #[test]
    fn share_download_serves_content() {
        let (handler, id) = handler();
        let response = handler.handle(&WopiRequest::operation(Operation::GetShareUrl, id.to_string())
            .header("X-WOPI-UrlType", "ReadOnly"));
        let url = response.json_body().unwrap()["ShareUrl"]
            .as_str()
            .unwrap()
            .to_string();
        let uuid = url.rsplit('/').next().unwrap();

        let download = handler.download_share(uuid);
        assert_eq!(download.status, StatusCode::OK);
        assert_eq!(download.header("content-disposition"), Some("attachment; filename=\"a.txt\""));

        assert_eq!(handler.download_share("nope").status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn unknown_ids_leave_no_guard_slots() {
        let (handler, _) = handler();
        for _ in 0..1000 {
            let response = handler.handle(&WopiRequest::operation(
                Operation::CheckFileInfo,
                FileId::new().to_string(),
            ));
            assert_eq!(response.status, StatusCode::NOT_FOUND);
        }
        assert!(handler.context.guards.is_empty());
    }

    #[test]
    fn share_url_type_must_be_read_only() {
        let (handler, id) = handler();
        let response = handler.handle(&WopiRequest::operation(Operation::GetShareUrl, id.to_string())
            .header("X-WOPI-UrlType", "ReadWrite"));
        assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED);
    }
}
