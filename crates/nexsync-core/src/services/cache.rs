//! Process-wide cache invalidation.
//!
//! Adapters that cache registry or store state (parsed schema files, known
//! payload indexes) register here. The sync engine only ever calls
//! [`Caches::invalidate_all`]; it never reaches into an adapter's cache.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

/// Something holding populate-on-miss state that can be dropped.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn invalidate(&self);
}

/// The set of registered caches.
#[derive(Clone, Default)]
pub struct Caches {
    members: Vec<Arc<dyn CacheInvalidator>>,
}

impl Caches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.members.push(cache);
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub async fn invalidate_all(&self) {
        for cache in &self.members {
            cache.invalidate().await;
            debug!(cache = %cache.name(), "Cache invalidated");
        }
    }
}
