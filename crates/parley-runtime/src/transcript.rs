use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as TokioMutex, RwLock};

use parley_core::Turn;

/// Per-session ordered transcripts, held in memory only.
#[derive(Clone, Default)]
pub struct TranscriptStore {
    transcripts: Arc<RwLock<HashMap<String, Vec<Turn>>>>,
    /// Per-session run locks; turns within one session run one at a time.
    run_locks: Arc<RwLock<HashMap<String, Arc<TokioMutex<()>>>>>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a session's transcript; empty for unseen sessions.
    pub async fn get(&self, session_id: &str) -> Vec<Turn> {
        self.transcripts
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Extend a transcript with `turns` in one step. Readers see either none
    /// or all of them.
    pub async fn append(&self, session_id: &str, turns: Vec<Turn>) {
        if turns.is_empty() {
            return;
        }
        self.transcripts
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .extend(turns);
    }

    /// Drop a session's transcript and, if idle, its run lock. Returns how
    /// many turns were removed.
    pub async fn clear(&self, session_id: &str) -> usize {
        let removed = self
            .transcripts
            .write()
            .await
            .remove(session_id)
            .map(|t| t.len())
            .unwrap_or(0);
        self.release_run_lock(session_id).await;
        removed
    }

    /// Number of turns stored for a session.
    pub async fn len(&self, session_id: &str) -> usize {
        self.transcripts
            .read()
            .await
            .get(session_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Number of sessions with a non-empty transcript.
    pub async fn session_count(&self) -> usize {
        self.transcripts.read().await.len()
    }

    /// Get the per-session run lock. Callers hold the guard for the whole
    /// turn so two turns of one session never interleave.
    pub async fn run_lock(&self, session_id: &str) -> Arc<TokioMutex<()>> {
        // Fast path: lock already exists
        {
            let locks = self.run_locks.read().await;
            if let Some(lock) = locks.get(session_id) {
                return Arc::clone(lock);
            }
        }
        // Slow path: create a new lock
        let mut locks = self.run_locks.write().await;
        Arc::clone(
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(TokioMutex::new(()))),
        )
    }

    /// Forget a session's run lock when nobody else holds a handle to it.
    /// Returns whether the entry was removed.
    pub async fn release_run_lock(&self, session_id: &str) -> bool {
        let mut locks = self.run_locks.write().await;
        match locks.get(session_id) {
            Some(lock) if Arc::strong_count(lock) == 1 => {
                locks.remove(session_id);
                true
            }
            _ => false,
        }
    }

    /// Number of sessions with a live run lock entry.
    pub async fn run_lock_count(&self) -> usize {
        self.run_locks.read().await.len()
    }
}
