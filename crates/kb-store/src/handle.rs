//! Atomically swappable reference to the current knowledge base.

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::knowledge_base::KnowledgeBase;

/// Publishes the knowledge base used by incoming searches.
///
/// Searches take a snapshot and keep it for the whole call, so a swap never
/// exposes a partially built knowledge base.
#[derive(Debug)]
pub struct KbHandle {
    current: RwLock<Arc<KnowledgeBase>>,
}

impl KbHandle {
    /// Wrap an initial knowledge base.
    pub fn new(kb: KnowledgeBase) -> Self {
        Self {
            current: RwLock::new(Arc::new(kb)),
        }
    }

    /// The knowledge base currently being served.
    pub fn snapshot(&self) -> Arc<KnowledgeBase> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the served knowledge base, returning the previous one.
    pub fn swap(&self, kb: KnowledgeBase) -> Arc<KnowledgeBase> {
        let next = Arc::new(kb);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let previous = std::mem::replace(&mut *guard, next);
        info!(
            "Knowledge base swapped: {} -> {} chunks",
            previous.len(),
            guard.len()
        );
        previous
    }
}
