//! Scan session registry
//!
//! A session lives from its first batch until a batch reports the catalog
//! exhausted, cancelled, or failed. Sessions abandoned between batches are
//! dropped once idle for [`SESSION_IDLE_TIMEOUT`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug)]
struct SessionEntry {
    token: CancellationToken,
    last_used: Instant,
}

/// Cancellation tokens of open scan sessions
#[derive(Debug, Clone, Default)]
pub struct ScanSessions {
    inner: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl ScanSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for the next batch of `session_id`, opening the session if needed
    ///
    /// Also drops sessions idle for longer than [`SESSION_IDLE_TIMEOUT`].
    pub async fn open(&self, session_id: Uuid) -> CancellationToken {
        let mut sessions = self.inner.write().await;
        sweep(&mut sessions, SESSION_IDLE_TIMEOUT);

        let entry = sessions.entry(session_id).or_insert_with(|| SessionEntry {
            token: CancellationToken::new(),
            last_used: Instant::now(),
        });
        entry.last_used = Instant::now();
        entry.token.clone()
    }

    /// Cancel an open session; `false` if it is unknown
    pub async fn cancel(&self, session_id: Uuid) -> bool {
        match self.inner.read().await.get(&session_id) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn close(&self, session_id: Uuid) {
        if self.inner.write().await.remove(&session_id).is_some() {
            debug!(session_id = %session_id, "Scan session closed");
        }
    }

    pub async fn contains(&self, session_id: Uuid) -> bool {
        self.inner.read().await.contains_key(&session_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Drop sessions unused for at least `max_idle`; returns how many
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        sweep(&mut *self.inner.write().await, max_idle)
    }
}

fn sweep(sessions: &mut HashMap<Uuid, SessionEntry>, max_idle: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, entry| entry.last_used.elapsed() < max_idle);
    let dropped = before - sessions.len();
    if dropped > 0 {
        debug!(dropped, "Dropped idle scan sessions");
    }
    dropped
}
