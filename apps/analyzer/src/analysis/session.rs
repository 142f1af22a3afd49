//! Explicit per-user interaction state, kept in memory only.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::analysis::document::{RenderedPage, RenderedResume};
use crate::analysis::evaluator::AnalysisResult;

/// Everything one user has entered or produced so far.
///
/// Ready ⇔ `resume` is present; a `RenderedResume` always holds at least one page
/// and its preview is that resume's page 0.
#[derive(Debug, Clone, Default)]
pub struct AnalysisSession {
    pub job_description: String,
    pub resume: Option<Arc<RenderedResume>>,
    pub last_result: Option<AnalysisResult>,
}

impl AnalysisSession {
    pub fn is_ready(&self) -> bool {
        self.resume.is_some()
    }

    pub fn pages(&self) -> &[RenderedPage] {
        self.resume.as_deref().map(RenderedResume::pages).unwrap_or(&[])
    }

    pub fn attach_resume(&mut self, resume: RenderedResume) {
        self.resume = Some(Arc::new(resume));
    }

    /// A failed upload replaces whatever was rendered before.
    pub fn clear_resume(&mut self) {
        self.resume = None;
    }
}

struct Slot {
    session: AnalysisSession,
    touched: Instant,
}

/// Sessions keyed by an opaque id carried in the page's form.
/// Entries idle for longer than `ttl` are dropped on the next write.
pub struct SessionStore {
    slots: RwLock<HashMap<Uuid, Slot>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the live session for `id`, or a fresh one under a new id.
    pub async fn load(&self, id: Option<Uuid>) -> (Uuid, AnalysisSession) {
        if let Some(id) = id {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(&id) {
                if slot.touched.elapsed() <= self.ttl {
                    return (id, slot.session.clone());
                }
            }
        }
        (Uuid::new_v4(), AnalysisSession::default())
    }

    pub async fn get(&self, id: Uuid) -> Option<AnalysisSession> {
        let slots = self.slots.read().await;
        slots
            .get(&id)
            .filter(|slot| slot.touched.elapsed() <= self.ttl)
            .map(|slot| slot.session.clone())
    }

    pub async fn save(&self, id: Uuid, session: AnalysisSession) {
        let mut slots = self.slots.write().await;
        let ttl = self.ttl;
        let before = slots.len();
        slots.retain(|_, slot| slot.touched.elapsed() <= ttl);
        if slots.len() < before {
            debug!("Evicted {} idle session(s)", before - slots.len());
        }
        slots.insert(
            id,
            Slot {
                session,
                touched: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_id_yields_fresh_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let requested = Uuid::new_v4();
        let (id, session) = store.load(Some(requested)).await;

        assert_ne!(id, requested);
        assert!(!session.is_ready());
        assert!(session.pages().is_empty());
    }

    #[tokio::test]
    async fn test_saved_session_round_trips() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (id, mut session) = store.load(None).await;
        session.job_description = "Rust developer".to_string();
        store.save(id, session).await;

        let (same_id, loaded) = store.load(Some(id)).await;
        assert_eq!(same_id, id);
        assert_eq!(loaded.job_description, "Rust developer");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_expire() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (stale, session) = store.load(None).await;
        store.save(stale, session).await;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.get(stale).await.is_none());

        let (fresh, session) = store.load(None).await;
        store.save(fresh, session).await;
        assert_eq!(store.len().await, 1);
    }
}
