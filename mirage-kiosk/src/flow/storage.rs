//! Transient per-tab storage
//!
//! Stands in for the browser's session storage: a small key/value space per
//! tab, never shared across tabs or devices and gone once the tab is cleared.
//! Tabs that go quiet are evicted after an idle timeout since a closed
//! browser tab never says goodbye.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Key/value space owned by one visitor tab
#[async_trait]
pub trait TransientStorage: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: Vec<u8>);
    async fn remove(&self, key: &str);
    /// Drop every key (tab closed or visitor restarted)
    async fn clear(&self);
}

struct TabEntry {
    values: HashMap<String, Vec<u8>>,
    touched: Instant,
}

impl TabEntry {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            touched: Instant::now(),
        }
    }
}

type TabMap = HashMap<String, TabEntry>;

/// In-process storage for all tabs, addressed by tab id
#[derive(Clone, Default)]
pub struct TabStorage {
    tabs: Arc<RwLock<TabMap>>,
}

impl TabStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// View scoped to a single tab
    pub fn tab(&self, tab_id: impl Into<String>) -> TabScope {
        TabScope {
            tabs: Arc::clone(&self.tabs),
            tab_id: tab_id.into(),
        }
    }

    /// Number of tabs currently holding data
    pub async fn tab_count(&self) -> usize {
        self.tabs.read().await.len()
    }

    /// Drop tabs untouched for at least `ttl`; returns how many went
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut tabs = self.tabs.write().await;
        let before = tabs.len();
        tabs.retain(|_, entry| entry.touched.elapsed() < ttl);
        let evicted = before - tabs.len();

        if evicted > 0 {
            tracing::info!(evicted, remaining = tabs.len(), "Evicted idle tabs");
        }
        evicted
    }

    /// Background task running [`evict_idle`](Self::evict_idle) every `every`
    pub fn spawn_sweeper(&self, ttl: Duration, every: Duration) -> JoinHandle<()> {
        let storage = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                storage.evict_idle(ttl).await;
            }
        })
    }
}

/// One tab's slice of [`TabStorage`]
#[derive(Clone)]
pub struct TabScope {
    tabs: Arc<RwLock<TabMap>>,
    tab_id: String,
}

impl TabScope {
    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }
}

#[async_trait]
impl TransientStorage for TabScope {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut tabs = self.tabs.write().await;
        let entry = tabs.get_mut(&self.tab_id)?;
        entry.touched = Instant::now();
        entry.values.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Vec<u8>) {
        let mut tabs = self.tabs.write().await;
        let entry = tabs.entry(self.tab_id.clone()).or_insert_with(TabEntry::new);
        entry.touched = Instant::now();
        entry.values.insert(key.to_string(), value);
    }

    async fn remove(&self, key: &str) {
        let mut tabs = self.tabs.write().await;
        if let Some(entry) = tabs.get_mut(&self.tab_id) {
            entry.values.remove(key);
            entry.touched = Instant::now();
            if entry.values.is_empty() {
                tabs.remove(&self.tab_id);
            }
        }
    }

    async fn clear(&self) {
        self.tabs.write().await.remove(&self.tab_id);
    }
}
