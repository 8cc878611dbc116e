mod support;

use std::sync::Arc;

use davlock::error::Error;
use davlock::journal::{FileRecord, LockRecordStore};
use davlock::lock_state::{DesiredState, LockInfo, LockOwnerType};
use davlock::operation::{LockOperation, OperationOptions, OperationState};
use davlock::session::USER_LOCK_HEADER;

use support::{empty_lock_body, lock_body, FailingStore, ScriptedSession, TestJournal};

fn operation(
    journal: &TestJournal,
    session: &Arc<ScriptedSession>,
    path: &str,
    desired: DesiredState,
) -> LockOperation {
    LockOperation::new(
        path,
        desired,
        journal.journal.clone(),
        session.clone(),
        OperationOptions::default(),
    )
    .expect("valid path")
}

#[tokio::test]
async fn lock_then_unlock_round_trip() {
    let journal = TestJournal::new();
    let session = Arc::new(
        ScriptedSession::new("admin")
            .reply(200, Some(&lock_body(true, 0, "admin", "John Doe", "")))
            .reply(200, None),
    );

    let completion = operation(&journal, &session, "file.txt", DesiredState::Locked)
        .start()
        .finished()
        .await
        .expect("lock succeeds");
    assert_eq!(completion.desired, DesiredState::Locked);

    let stored = journal.journal.read("file.txt");
    assert_eq!(
        stored,
        LockInfo {
            locked: true,
            owner_id: "admin".to_string(),
            owner_display_name: "John Doe".to_string(),
            owner_editor_app: String::new(),
            owner_type: LockOwnerType::User,
            lock_time: 1234560,
            lock_timeout: 1800,
        }
    );
    assert_eq!(completion.committed, Some(stored));

    operation(&journal, &session, "file.txt", DesiredState::Unlocked)
        .start()
        .finished()
        .await
        .expect("unlock succeeds");
    assert_eq!(journal.journal.read("file.txt"), LockInfo::unlocked());

    let requests = session.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].verb, "LOCK");
    assert_eq!(requests[0].path, "/file.txt");
    assert!(requests[0]
        .headers
        .contains(&(USER_LOCK_HEADER.to_string(), "1".to_string())));
    assert_eq!(requests[1].verb, "UNLOCK");
}

#[tokio::test]
async fn lock_on_locked_file_fails_and_keeps_store() {
    let journal = TestJournal::new();
    let session = Arc::new(
        ScriptedSession::new("admin").reply(423, Some(&lock_body(true, 0, "john", "John Doe", "john"))),
    );

    let err = operation(&journal, &session, "file.txt", DesiredState::Locked)
        .start()
        .finished()
        .await
        .unwrap_err();

    match err {
        Error::AlreadyLocked { path, holder } => {
            assert_eq!(path, "file.txt");
            assert_eq!(holder, "John Doe");
        }
        other => panic!("expected AlreadyLocked, got {other:?}"),
    }
    assert!(!journal.journal.read("file.txt").locked);
    assert!(journal.journal.get_file_record("file.txt").unwrap().is_none());
}

#[tokio::test]
async fn lock_refused_with_self_closing_lock_element_still_fails() {
    let journal = TestJournal::new();
    let session = Arc::new(ScriptedSession::new("admin").reply(423, Some(&empty_lock_body())));

    let err = operation(&journal, &session, "file.txt", DesiredState::Locked)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyLocked { .. }));
    assert!(!journal.journal.read("file.txt").locked);
}

#[tokio::test]
async fn unlock_of_unlocked_file_is_noop_success() {
    let journal = TestJournal::new();
    let session = Arc::new(ScriptedSession::new("admin").reply(412, Some(&empty_lock_body())));

    let completion = operation(&journal, &session, "file.txt", DesiredState::Unlocked)
        .start()
        .finished()
        .await
        .expect("no-op unlock succeeds");

    assert_eq!(completion.committed, None);
    assert!(!journal.journal.read("file.txt").locked);
    assert!(journal.journal.get_file_record("file.txt").unwrap().is_none());
}

#[tokio::test]
async fn unlock_of_foreign_lock_fails() {
    let journal = TestJournal::new();
    let johns = LockInfo::locked("john", "John Doe", "", LockOwnerType::User, 1234560, 1800);
    journal.journal.write("file.txt", &johns).unwrap();

    let session = Arc::new(
        ScriptedSession::new("admin")
            .reply(412, Some(&lock_body(true, 0, "john", "John Doe", "john")))
            .reply(423, Some(&lock_body(true, 1, "admin", "Admin", "Text"))),
    );

    let err = operation(&journal, &session, "file.txt", DesiredState::Unlocked)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ForeignLock { ref holder, .. } if holder == "John Doe"));
    assert_eq!(journal.journal.read("file.txt"), johns);

    // Application locks are foreign even when the owner id matches.
    let err = operation(&journal, &session, "file.txt", DesiredState::Unlocked)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ForeignLock { ref holder, .. } if holder.contains("Text")));
    assert_eq!(journal.journal.read("file.txt"), johns);
}

#[tokio::test]
async fn journal_write_failure_fails_committed_lock() {
    let store = Arc::new(FailingStore::default());
    let session = Arc::new(
        ScriptedSession::new("admin").reply(200, Some(&lock_body(true, 0, "admin", "John Doe", ""))),
    );

    let err = LockOperation::new(
        "file.txt",
        DesiredState::Locked,
        store.clone(),
        session.clone(),
        OperationOptions::default(),
    )
    .unwrap()
    .start()
    .finished()
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    assert_eq!(session.requests().len(), 1);
    assert_eq!(store.write_attempts(), 1);
}

#[tokio::test]
async fn unlock_refused_for_own_lock_is_rejected() {
    let journal = TestJournal::new();
    let session = Arc::new(
        ScriptedSession::new("admin").reply(423, Some(&lock_body(true, 0, "admin", "Admin", ""))),
    );

    let err = operation(&journal, &session, "file.txt", DesiredState::Unlocked)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnlockRejected { .. }));
    assert!(err.is_conflict());
}

#[tokio::test]
async fn server_error_is_transport_failure() {
    let journal = TestJournal::new();
    let mut record = FileRecord::new("file.txt");
    record.etag = Some("abc".to_string());
    journal.journal.set_file_record(&record).unwrap();
    let before = journal.journal.get_file_record("file.txt").unwrap();

    let session = Arc::new(
        ScriptedSession::new("admin")
            .reply(500, None)
            .reply(500, None),
    );

    for desired in [DesiredState::Locked, DesiredState::Unlocked] {
        let err = operation(&journal, &session, "file.txt", desired)
            .start()
            .finished()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport { status: Some(500), .. }));
    }
    assert_eq!(journal.journal.get_file_record("file.txt").unwrap(), before);
}

#[tokio::test]
async fn send_error_is_transport_failure() {
    let journal = TestJournal::new();
    let session = Arc::new(ScriptedSession::new("admin").fail_transport("connection reset"));

    let err = operation(&journal, &session, "file.txt", DesiredState::Locked)
        .run()
        .await
        .unwrap_err();
    match err {
        Error::Transport { status, message, .. } => {
            assert_eq!(status, None);
            assert!(message.contains("connection reset"));
        }
        other => panic!("expected Transport, got {other:?}"),
    }
}

#[tokio::test]
async fn offline_session_fails_without_request() {
    let journal = TestJournal::new();
    let session = Arc::new(ScriptedSession::offline("admin"));

    let op = operation(&journal, &session, "file.txt", DesiredState::Locked);
    assert_eq!(op.state(), OperationState::Created);

    let err = op.start().finished().await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));
    assert!(session.requests().is_empty());
}

#[tokio::test]
async fn lock_ack_without_body_uses_session_identity() {
    let journal = TestJournal::new();
    let session = Arc::new(ScriptedSession::new("admin").reply(201, None));

    operation(&journal, &session, "/docs/report.odt", DesiredState::Locked)
        .run()
        .await
        .expect("lock succeeds");

    let stored = journal.journal.read("docs/report.odt");
    assert!(stored.locked);
    assert_eq!(stored.owner_id, "admin");
    assert_eq!(stored.owner_display_name, "admin");
    assert_eq!(stored.owner_type, LockOwnerType::User);
    assert_eq!(stored.lock_timeout, OperationOptions::default().default_timeout);
    assert!(stored.lock_time > 0);
}

#[test]
fn invalid_path_is_rejected_up_front() {
    let journal = TestJournal::new();
    let session = Arc::new(ScriptedSession::new("admin"));

    let result = LockOperation::new(
        "../etc/passwd",
        DesiredState::Locked,
        journal.journal.clone(),
        session,
        OperationOptions::default(),
    );
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}
