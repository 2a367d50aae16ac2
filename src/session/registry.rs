use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::info;

use super::orchestrator::SessionOrchestrator;
use super::stats::SessionStats;

/// Live sessions keyed by session id
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<SessionOrchestrator>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<SessionOrchestrator>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id().to_string(), session);
        info!("Active sessions: {}", sessions.len());
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<SessionOrchestrator>> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(session_id);
        if removed.is_some() {
            info!("Active sessions: {}", sessions.len());
        }
        removed
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionOrchestrator>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Stats for every live session, oldest first
    pub async fn stats(&self) -> Vec<SessionStats> {
        let sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
        let mut stats = join_all(sessions.iter().map(|s| s.stats())).await;
        stats.sort_by_key(|s| s.started_at);
        stats
    }

    /// Shut down and drop every session
    pub async fn shutdown_all(&self, reason: &str) -> usize {
        let sessions: Vec<_> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        let count = sessions.len();

        join_all(sessions.iter().map(|s| s.shutdown(reason))).await;

        if count > 0 {
            info!("Shut down {} session(s): {}", count, reason);
        }
        count
    }
}
