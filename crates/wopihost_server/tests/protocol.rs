//! Protocol tests for the lock state machine and file operations.

use axum::http::StatusCode;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use wopihost_core::{Clock, FileId, ManualClock, NewDocument};
use wopihost_server::{Operation, ServerConfig, WopiRequest, WopiResponse, WopiServer};

const TTL: Duration = Duration::from_secs(100);

struct Host {
    server: WopiServer,
    clock: Arc<ManualClock>,
}

impl Host {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::default());
        let config = ServerConfig::default()
            .with_public_url("http://wopi.test")
            .with_lock_ttl(TTL);
        let server = WopiServer::in_memory_with_clock(config, clock.clone() as Arc<dyn Clock>);
        Self { server, clock }
    }

    fn create(&self, name: &str, extension: &str, content: &[u8]) -> FileId {
        self.server
            .documents()
            .create(NewDocument::new(name, extension).with_content(content.to_vec()))
            .unwrap()
            .id
    }

    fn send(&self, request: WopiRequest) -> WopiResponse {
        self.server.handle(&request)
    }

    fn lock(&self, id: FileId, token: &str) -> WopiResponse {
        self.send(WopiRequest::operation(Operation::Lock, id.to_string()).header("X-WOPI-Lock", token))
    }

    fn unlock(&self, id: FileId, token: &str) -> WopiResponse {
        self.send(WopiRequest::operation(Operation::Unlock, id.to_string()).header("X-WOPI-Lock", token))
    }

    fn get_lock(&self, id: FileId) -> WopiResponse {
        self.send(WopiRequest::operation(Operation::GetLock, id.to_string()))
    }

    fn put_file(&self, id: FileId, token: Option<&str>, body: &'static [u8]) -> WopiResponse {
        let request = WopiRequest::operation(Operation::PutFile, id.to_string()).body(body);
        self.send(match token {
            Some(token) => request.header("X-WOPI-Lock", token),
            None => request,
        })
    }
}

#[test]
fn unlock_of_unlocked_document_conflicts() {
    let host = Host::new();
    let id = host.create("a", "txt", b"");

    let response = host.unlock(id, "t");
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.header("X-WOPI-Lock"), Some(""));
}

#[test]
fn relock_with_same_token_refreshes() {
    let host = Host::new();
    let id = host.create("a", "txt", b"");

    assert_eq!(host.lock(id, "t").status, StatusCode::OK);
    host.clock.advance(Duration::from_secs(60));
    assert_eq!(host.lock(id, "t").status, StatusCode::OK);

    // Refreshed at T0+60, so still held at T0+150.
    host.clock.advance(Duration::from_secs(90));
    assert_eq!(host.get_lock(id).header("X-WOPI-Lock"), Some("t"));
}

#[test]
fn lock_with_other_token_reports_holder() {
    let host = Host::new();
    let id = host.create("a", "txt", b"");
    host.lock(id, "t1");

    let response = host.lock(id, "t2");
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.header("X-WOPI-Lock"), Some("t1"));
    assert_eq!(response.header("X-WOPI-ItemVersion"), Some("v1"));
    assert!(response.header("X-WOPI-LockFailureReason").is_some());

    assert_eq!(host.get_lock(id).header("X-WOPI-Lock"), Some("t1"));
}

#[test]
fn unlocked_put_on_non_empty_document_conflicts() {
    let host = Host::new();
    let id = host.create("a", "txt", b"content");

    let response = host.put_file(id, None, b"new");
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.header("X-WOPI-Lock"), Some(""));
}

#[test]
fn locked_put_writes_new_revision() {
    let host = Host::new();
    let id = host.create("a", "txt", b"content");
    host.lock(id, "t");

    let response = host.put_file(id, Some("t"), b"0123456789");
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("X-WOPI-ItemVersion"), Some("v2"));
    assert_eq!(response.header("X-WOPI-Lock"), Some("t"));

    let doc = host.server.documents().find_by_id(id).unwrap().unwrap();
    assert_eq!(doc.size, 10);
    assert_eq!(doc.revision.as_u64(), 2);
}

#[test]
fn put_with_wrong_token_conflicts() {
    let host = Host::new();
    let id = host.create("a", "txt", b"content");
    host.lock(id, "t");

    let response = host.put_file(id, Some("other"), b"x");
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.header("X-WOPI-Lock"), Some("t"));
}

#[test]
fn lock_get_unlock_get_cycle() {
    let host = Host::new();
    let id = host.create("a", "txt", b"");

    assert_eq!(host.lock(id, "t").status, StatusCode::OK);

    let held = host.get_lock(id);
    assert_eq!(held.status, StatusCode::OK);
    assert_eq!(held.header("X-WOPI-Lock"), Some("t"));

    let unlocked = host.unlock(id, "t");
    assert_eq!(unlocked.status, StatusCode::OK);
    assert_eq!(unlocked.header("X-WOPI-Lock"), Some(""));

    let free = host.get_lock(id);
    assert_eq!(free.status, StatusCode::NOT_FOUND);
    assert_eq!(free.header("X-WOPI-Lock"), Some(""));
}

#[test]
fn lock_expires_after_ttl() {
    let host = Host::new();
    let id = host.create("a", "txt", b"");
    host.lock(id, "t1");

    host.clock.advance(Duration::from_secs(99));
    assert!(host.server.locks().has(id).unwrap());

    host.clock.advance(Duration::from_secs(2));
    assert!(!host.server.locks().has(id).unwrap());
    assert_eq!(host.lock(id, "t2").status, StatusCode::OK);
    assert_eq!(host.get_lock(id).header("X-WOPI-Lock"), Some("t2"));
}

#[test]
fn unlock_and_relock_swaps_token() {
    let host = Host::new();
    let id = host.create("a", "txt", b"");
    host.lock(id, "old");

    let request = WopiRequest::operation(Operation::UnlockAndRelock, id.to_string())
        .header("X-WOPI-Lock", "new")
        .header("X-WOPI-OldLock", "old");
    assert_eq!(host.send(request).status, StatusCode::OK);
    assert_eq!(host.get_lock(id).header("X-WOPI-Lock"), Some("new"));

    let stale = WopiRequest::operation(Operation::UnlockAndRelock, id.to_string())
        .header("X-WOPI-Lock", "newer")
        .header("X-WOPI-OldLock", "old");
    let response = host.send(stale);
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.header("X-WOPI-Lock"), Some("new"));
}

#[test]
fn unlock_and_relock_on_unlocked_document_locks() {
    let host = Host::new();
    let id = host.create("a", "txt", b"content");

    let request = WopiRequest::operation(Operation::UnlockAndRelock, id.to_string())
        .header("X-WOPI-Lock", "new")
        .header("X-WOPI-OldLock", "gone");
    let response = host.send(request);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("X-WOPI-ItemVersion"), Some("v1"));
    assert_eq!(host.get_lock(id).header("X-WOPI-Lock"), Some("new"));
}

#[test]
fn first_unlocked_put_succeeds_then_conflicts() {
    let host = Host::new();
    let id = host.create("a", "txt", b"");

    assert_eq!(host.put_file(id, None, b"hello").status, StatusCode::OK);
    assert_eq!(host.put_file(id, None, b"again").status, StatusCode::CONFLICT);

    let content = host
        .send(WopiRequest::operation(Operation::GetFile, id.to_string()))
        .body;
    assert_eq!(&content[..], b"hello");
}

#[test]
fn relative_target_collision_suggests_free_name() {
    let host = Host::new();
    let source = host.create("report", "docx", b"source");
    host.create("copy", "docx", b"taken");

    let request = WopiRequest::operation(Operation::PutRelativeFile, source.to_string())
        .header("X-WOPI-RelativeTarget", "copy.docx")
        .body("new");
    let response = host.send(request);
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.header("X-WOPI-ValidRelativeTarget"), Some("copy (1).docx"));
}

#[test]
fn non_ascii_relative_collision_keeps_suggestion() {
    let host = Host::new();
    let source = host.create("report", "docx", b"source");
    host.create("résumé", "docx", b"taken");

    let request = WopiRequest::operation(Operation::PutRelativeFile, source.to_string())
        .header("X-WOPI-RelativeTarget", "résumé.docx")
        .body("new");
    let response = host.send(request);
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(
        response.header("X-WOPI-ValidRelativeTarget"),
        Some("résumé (1).docx")
    );
}

#[test]
fn non_ascii_download_name_is_encoded() {
    let host = Host::new();
    let id = host.create("résumé", "docx", b"cv");

    let response = host.send(WopiRequest::operation(Operation::GetFile, id.to_string()));
    assert_eq!(response.status, StatusCode::OK);
    let disposition = response.header("content-disposition").unwrap();
    assert!(disposition.starts_with("attachment; filename=\""));
    assert!(disposition.ends_with("filename*=UTF-8''r%C3%A9sum%C3%A9.docx"));
}

#[test]
fn relative_target_overwrite_replaces_content() {
    let host = Host::new();
    let source = host.create("report", "docx", b"source");
    let target = host.create("copy", "docx", b"taken");

    let request = WopiRequest::operation(Operation::PutRelativeFile, source.to_string())
        .header("X-WOPI-RelativeTarget", "copy.docx")
        .header("X-WOPI-OverwriteRelativeTarget", "true")
        .body("replaced");
    let response = host.send(request);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json_body().unwrap()["Name"], "copy.docx");

    let content = host.server.documents().read(target).unwrap();
    assert_eq!(&content[..], b"replaced");
}

#[test]
fn relative_overwrite_of_locked_target_conflicts() {
    let host = Host::new();
    let source = host.create("report", "docx", b"source");
    let target = host.create("copy", "docx", b"taken");
    host.lock(target, "held");

    let request = WopiRequest::operation(Operation::PutRelativeFile, source.to_string())
        .header("X-WOPI-RelativeTarget", "copy.docx")
        .header("X-WOPI-OverwriteRelativeTarget", "true")
        .body("replaced");
    let response = host.send(request);
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.header("X-WOPI-Lock"), Some("held"));
}

#[test]
fn suggested_extension_creates_sibling() {
    let host = Host::new();
    let source = host.create("report", "docx", b"source");

    let request = WopiRequest::operation(Operation::PutRelativeFile, source.to_string())
        .header("X-WOPI-SuggestedTarget", ".pdf")
        .header("X-WOPI-Size", "3")
        .access_token("tok")
        .body("pdf");
    let response = host.send(request);
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json_body().unwrap();
    assert_eq!(body["Name"], "report.pdf");
    let created = host
        .server
        .documents()
        .find_by_filename("report.pdf")
        .unwrap()
        .unwrap();
    assert_eq!(created.size, 3);
    assert_eq!(
        body["Url"],
        format!("http://wopi.test/wopi/files/{}?access_token=tok", created.id)
    );
}

#[test]
fn suggested_name_avoids_existing_documents() {
    let host = Host::new();
    let source = host.create("report", "docx", b"source");

    let request = || {
        WopiRequest::operation(Operation::PutRelativeFile, source.to_string())
            .header("X-WOPI-SuggestedTarget", "report.docx")
            .body("copy")
    };
    assert_eq!(host.send(request()).json_body().unwrap()["Name"], "report (1).docx");
    assert_eq!(host.send(request()).json_body().unwrap()["Name"], "report (2).docx");
}

#[test]
fn rename_requires_lock_holder() {
    let host = Host::new();
    let id = host.create("a", "txt", b"");
    host.lock(id, "t");

    let foreign = WopiRequest::operation(Operation::RenameFile, id.to_string())
        .header("X-WOPI-RequestedName", "b")
        .header("X-WOPI-Lock", "other");
    assert_eq!(host.send(foreign).status, StatusCode::CONFLICT);

    let holder = WopiRequest::operation(Operation::RenameFile, id.to_string())
        .header("X-WOPI-RequestedName", "b")
        .header("X-WOPI-Lock", "t");
    let response = host.send(holder);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json_body().unwrap()["Name"], "b");

    let doc = host.server.documents().find_by_id(id).unwrap().unwrap();
    assert_eq!(doc.basename(), "b.txt");
}

#[test]
fn rename_rejects_invalid_name() {
    let host = Host::new();
    let id = host.create("a", "txt", b"");

    let request = WopiRequest::operation(Operation::RenameFile, id.to_string())
        .header("X-WOPI-RequestedName", "bad/name");
    let response = host.send(request);
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.header("X-WOPI-InvalidFileNameError").is_some());
}

#[test]
fn rename_onto_non_ascii_name_reports_reason() {
    let host = Host::new();
    let id = host.create("a", "txt", b"");
    host.create("été", "txt", b"");

    let request = WopiRequest::operation(Operation::RenameFile, id.to_string())
        .header("X-WOPI-RequestedName", "été");
    let response = host.send(request);
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.header("X-WOPI-InvalidFileNameError"),
        Some("été.txt already exists")
    );
}

#[test]
fn delete_removes_document_lock_and_share() {
    let host = Host::new();
    let id = host.create("a", "txt", b"data");

    let info = host.send(WopiRequest::operation(Operation::CheckFileInfo, id.to_string()));
    assert_eq!(info.status, StatusCode::OK);
    assert!(host.server.shares().find_for(id).unwrap().is_some());

    host.lock(id, "t");
    let locked = host.send(WopiRequest::operation(Operation::DeleteFile, id.to_string()));
    assert_eq!(locked.status, StatusCode::CONFLICT);

    host.unlock(id, "t");
    let deleted = host.send(WopiRequest::operation(Operation::DeleteFile, id.to_string()));
    assert_eq!(deleted.status, StatusCode::OK);

    assert!(host.server.documents().find_by_id(id).unwrap().is_none());
    assert!(host.server.shares().find_for(id).unwrap().is_none());
    assert_eq!(host.get_lock(id).status, StatusCode::NOT_FOUND);
}

#[test]
fn check_file_info_reports_document() {
    let host = Host::new();
    let id = host.create("report", "docx", b"abc");

    let response = host.send(WopiRequest::operation(Operation::CheckFileInfo, id.to_string()));
    let info = response.json_body().unwrap();
    assert_eq!(info["BaseFileName"], "report.docx");
    assert_eq!(info["Size"], 3);
    assert_eq!(info["Version"], "v1");
    assert_eq!(info["SupportsLocks"], true);
}

#[derive(Debug, Clone)]
enum Step {
    Lock(&'static str),
    Unlock(&'static str),
    Refresh(&'static str),
    Put(Option<&'static str>),
}

fn step() -> impl Strategy<Value = Step> {
    let token = prop::sample::select(vec!["a", "b"]);
    prop_oneof![
        token.clone().prop_map(Step::Lock),
        token.clone().prop_map(Step::Unlock),
        token.clone().prop_map(Step::Refresh),
        prop::option::of(token).prop_map(Step::Put),
    ]
}

proptest! {
    #[test]
    fn lock_state_machine_matches_model(steps in prop::collection::vec(step(), 1..24)) {
        let host = Host::new();
        let id = host.create("a", "txt", b"");
        let mut held: Option<&str> = None;
        let mut empty = true;

        for step in steps {
            let (response, expected) = match step {
                Step::Lock(t) => {
                    let ok = held.is_none_or(|h| h == t);
                    if ok {
                        held = Some(t);
                    }
                    (host.lock(id, t), ok)
                }
                Step::Unlock(t) => {
                    let ok = held == Some(t);
                    if ok {
                        held = None;
                    }
                    (host.unlock(id, t), ok)
                }
                Step::Refresh(t) => {
                    let request = WopiRequest::operation(Operation::RefreshLock, id.to_string())
                        .header("X-WOPI-Lock", t);
                    (host.send(request), held == Some(t))
                }
                Step::Put(t) => {
                    let ok = match held {
                        None => empty,
                        Some(h) => t == Some(h),
                    };
                    if ok {
                        empty = false;
                    }
                    (host.put_file(id, t, b"x"), ok)
                }
            };
            let status = if expected { StatusCode::OK } else { StatusCode::CONFLICT };
            prop_assert_eq!(response.status, status);
            let lock_response = host.get_lock(id);
            prop_assert_eq!(lock_response.header("X-WOPI-Lock"), Some(held.unwrap_or("")));
        }
    }
}
