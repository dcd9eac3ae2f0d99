//! Process-wide session table
//!
//! Sessions are keyed by id and each sits behind its own async mutex, so all
//! operations on one session run to completion one after another while
//! different sessions proceed independently. Generated bundles are tracked in
//! a separate registry so downloads never wait on a busy session.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tkm_common::Clock;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::Session;

/// A downloadable bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub session_id: Uuid,
    pub path: PathBuf,
    /// Filename offered to the downloader
    pub filename: String,
}

struct SessionSlot {
    created_at: DateTime<Utc>,
    document_root: PathBuf,
    session: Arc<Mutex<Session>>,
}

/// A session removed by the age sweep; its files are still on disk
#[derive(Debug)]
pub struct ExpiredSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub document_root: PathBuf,
    pub bundles: Vec<PathBuf>,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionSlot>>,
    downloads: RwLock<HashMap<Uuid, DownloadRecord>>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            downloads: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Register a new session over an extracted document tree
    pub async fn create(&self, id: Uuid, document_root: PathBuf) -> Arc<Mutex<Session>> {
        let created_at = self.clock.now();
        let session = Arc::new(Mutex::new(Session::new(id, document_root.clone(), created_at)));

        self.sessions.write().await.insert(
            id,
            SessionSlot {
                created_at,
                document_root,
                session: Arc::clone(&session),
            },
        );
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(&id).map(|slot| Arc::clone(&slot.session))
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn register_download(&self, download_id: Uuid, record: DownloadRecord) {
        self.downloads.write().await.insert(download_id, record);
    }

    pub async fn find_download(&self, download_id: Uuid) -> Option<DownloadRecord> {
        self.downloads.read().await.get(&download_id).cloned()
    }

    /// Remove sessions older than `retention` along with their downloads
    ///
    /// Dropping a removed session releases its pending uploads; deleting its
    /// extracted tree and bundles is left to the caller.
    pub async fn sweep_expired(&self, retention: Duration) -> Vec<ExpiredSession> {
        let now = self.clock.now();

        let removed: Vec<(Uuid, SessionSlot)> = {
            let mut sessions = self.sessions.write().await;
            let expired: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, slot)| now.signed_duration_since(slot.created_at) > retention)
                .map(|(id, _)| *id)
                .collect();
            expired
                .into_iter()
                .filter_map(|id| sessions.remove(&id).map(|slot| (id, slot)))
                .collect()
        };
        if removed.is_empty() {
            return Vec::new();
        }

        let mut downloads = self.downloads.write().await;
        removed
            .into_iter()
            .map(|(id, slot)| {
                let mut bundles = Vec::new();
                downloads.retain(|_, record| {
                    if record.session_id == id {
                        bundles.push(record.path.clone());
                        false
                    } else {
                        true
                    }
                });
                tracing::info!(session_id = %id, created_at = %slot.created_at, "Session expired");
                ExpiredSession {
                    id,
                    created_at: slot.created_at,
                    document_root: slot.document_root,
                    bundles,
                }
            })
            .collect()
    }
}
