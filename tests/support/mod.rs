#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use davlock::error::{Error, Result};
use davlock::journal::{LockRecordStore, SyncJournal};
use davlock::lock_state::LockInfo;
use davlock::session::{DavRequest, DavResponse, DavSession};
use tempfile::TempDir;

/// Session that answers requests from a script and records what it was sent
pub struct ScriptedSession {
    user_id: String,
    display_name: String,
    connected: AtomicBool,
    replies: Mutex<VecDeque<Result<DavResponse>>>,
    requests: Mutex<Vec<DavRequest>>,
}

impl ScriptedSession {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: user_id.to_string(),
            connected: AtomicBool::new(true),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn offline(user_id: &str) -> Self {
        let session = Self::new(user_id);
        session.connected.store(false, Ordering::SeqCst);
        session
    }

    pub fn reply(self, status: u16, body: Option<&str>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(DavResponse::new(status, body.map(str::to_string))));
        self
    }

    pub fn fail_transport(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(Error::OperationFailed(message.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<DavRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DavSession for ScriptedSession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn send(&self, request: DavRequest) -> Result<DavResponse> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::OperationFailed("no scripted reply".to_string())))
    }
}

pub struct TestJournal {
    pub dir: TempDir,
    pub journal: Arc<SyncJournal>,
}

impl TestJournal {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let journal = Arc::new(SyncJournal::open(dir.path().join(".davlock")).expect("journal"));
        Self { dir, journal }
    }
}

/// Store whose writes always fail, as a full disk would
#[derive(Default)]
pub struct FailingStore {
    writes: Mutex<usize>,
}

impl FailingStore {
    pub fn write_attempts(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

impl LockRecordStore for FailingStore {
    fn read(&self, _path: &str) -> LockInfo {
        LockInfo::unlocked()
    }

    fn write(&self, _path: &str, _info: &LockInfo) -> Result<()> {
        *self.writes.lock().unwrap() += 1;
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "no space left on device",
        )))
    }
}

/// Property body in the shape the server sends with lock responses
pub fn lock_body(locked: bool, owner_type: u8, owner: &str, display: &str, editor: &str) -> String {
    let lock = if locked {
        "<nc:lock>1</nc:lock>".to_string()
    } else {
        "<nc:lock/>".to_string()
    };
    format!(
        "<?xml version=\"1.0\"?>\n\
<d:prop xmlns:d=\"DAV:\" xmlns:s=\"http://sabredav.org/ns\" xmlns:oc=\"http://owncloud.org/ns\" xmlns:nc=\"http://nextcloud.org/ns\">\n\
 {lock}\n\
 <nc:lock-owner-type>{owner_type}</nc:lock-owner-type>\n\
 <nc:lock-owner>{owner}</nc:lock-owner>\n\
 <nc:lock-owner-displayname>{display}</nc:lock-owner-displayname>\n\
 <nc:lock-owner-editor>{editor}</nc:lock-owner-editor>\n\
 <nc:lock-time>1234560</nc:lock-time>\n\
 <nc:lock-timeout>1800</nc:lock-timeout>\n\
</d:prop>\n"
    )
}

/// Body of a response to an unlock of a file nobody holds
pub fn empty_lock_body() -> String {
    "<?xml version=\"1.0\"?>\n\
<d:prop xmlns:d=\"DAV:\" xmlns:s=\"http://sabredav.org/ns\" xmlns:oc=\"http://owncloud.org/ns\" xmlns:nc=\"http://nextcloud.org/ns\">\n\
 <nc:lock/>\n\
</d:prop>\n"
        .to_string()
}
