//! Branch cache: LRU + TTL store for pre-generated branches.
//!
//! Keyed by `location::action_type::target::decision`. Entries are both
//! size-bounded (LRU eviction) and time-bounded (TTL). Lookups carry the
//! session's current state version; a version mismatch drops the entry as a
//! stale eviction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use fateweaver_domain::{BranchKey, QuantumBranch};
use fateweaver_shared::CacheStats;

struct CacheEntry {
    branch: QuantumBranch,
    inserted_at: Instant,
    last_accessed: Instant,
    access_count: u64,
}

/// Thread-safe LRU + TTL branch store with hit/miss accounting.
pub struct BranchCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_size: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    stale_evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl BranchCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            stale_evictions: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Insert a branch, evicting the least-recently-used entry when full.
    pub async fn insert(&self, branch: QuantumBranch) {
        let key = branch.key.to_string();
        let mut entries = self.entries.write().await;

        if !entries.contains_key(&key) && entries.len() >= self.max_size {
            let lru_key = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(k, _)| k.clone());
            if let Some(lru_key) = lru_key {
                entries.remove(&lru_key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(evicted = %lru_key, "cache LRU eviction");
            }
        }

        let now = Instant::now();
        entries.insert(
            key,
            CacheEntry {
                branch,
                inserted_at: now,
                last_accessed: now,
                access_count: 0,
            },
        );
    }

    /// Look up a branch. Expired entries and entries generated at a
    /// different state version are dropped on sight.
    pub async fn get(&self, key: &BranchKey, state_version: u64) -> Option<QuantumBranch> {
        let key = key.to_string();
        let mut entries = self.entries.write().await;

        let Some(entry) = entries.get_mut(&key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if entry.inserted_at.elapsed() >= self.ttl {
            entries.remove(&key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        if entry.branch.state_version != state_version {
            entries.remove(&key);
            self.stale_evictions.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        entry.last_accessed = Instant::now();
        entry.access_count += 1;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.branch.clone())
    }

    pub async fn contains(&self, key: &BranchKey) -> bool {
        let key = key.to_string();
        let entries = self.entries.read().await;
        entries
            .get(&key)
            .is_some_and(|entry| entry.inserted_at.elapsed() < self.ttl)
    }

    /// Drop every branch for a location. Returns the number removed.
    pub async fn invalidate_location(&self, location_key: &str) -> usize {
        let prefix = format!("{}::", location_key);
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        let removed = before - entries.len();
        self.invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            tracing::debug!(location = location_key, removed, "cache location invalidated");
        }
        removed
    }

    /// Remove expired entries; called by the background cleanup task.
    pub async fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        let removed = before - entries.len();
        self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.read().await.len(),
            max_size: self.max_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            stale_evictions: self.stale_evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Spawn the periodic cleanup task; cancelled through `token`.
    pub fn spawn_cleanup(
        self: &std::sync::Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let cache = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let removed = cache.cleanup_expired().await;
                        if removed > 0 {
                            tracing::debug!(removed, "cache cleanup pass");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fateweaver_domain::{
        ActionPrediction, ActionType, GmDecision, LocationKey, OutcomeVariant, VariantName,
    };

    fn branch(location: &str, target: &str, state_version: u64) -> QuantumBranch {
        let variant = OutcomeVariant {
            narrative: format!("[{}:thing] happens", target),
            state_deltas: vec![],
            requires_dice: false,
            dc: None,
            skill: None,
            time_passed_minutes: 1,
        };
        QuantumBranch {
            key: BranchKey::new(
                LocationKey::new(location).unwrap(),
                ActionType::InteractNpc,
                Some(target.to_string()),
                "no_twist",
            ),
            action: ActionPrediction::new(ActionType::InteractNpc, 0.5),
            decision: GmDecision::no_twist(),
            variants: [(VariantName::Success, variant)].into_iter().collect(),
            generated_at: Utc::now(),
            state_version,
            generation_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_hit_and_miss_accounting() {
        let cache = BranchCache::new(10, Duration::from_secs(60));
        let b = branch("tavern", "bartender_001", 1);
        let key = b.key.clone();
        cache.insert(b).await;

        assert!(cache.get(&key, 1).await.is_some());
        let other = BranchKey::new(
            LocationKey::new("tavern").unwrap(),
            ActionType::Observe,
            None,
            "no_twist",
        );
        assert!(cache.get(&other, 1).await.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_state_version_mismatch_drops_entry() {
        let cache = BranchCache::new(10, Duration::from_secs(60));
        let b = branch("tavern", "bartender_001", 7);
        let key = b.key.clone();
        cache.insert(b).await;

        assert!(cache.get(&key, 8).await.is_none());
        let stats = cache.stats().await;
        assert_eq!(stats.stale_evictions, 1);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = BranchCache::new(10, Duration::from_millis(5));
        let b = branch("tavern", "bartender_001", 1);
        let key = b.key.clone();
        cache.insert(b).await;

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(cache.get(&key, 1).await.is_none());
        assert_eq!(cache.stats().await.expirations, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction_at_capacity() {
        let cache = BranchCache::new(2, Duration::from_secs(60));
        let first = branch("tavern", "npc_a", 1);
        let first_key = first.key.clone();
        cache.insert(first).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.insert(branch("tavern", "npc_b", 1)).await;

        // Touch npc_a so npc_b becomes LRU.
        cache.get(&first_key, 1).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        cache.insert(branch("tavern", "npc_c", 1)).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&first_key, 1).await.is_some());
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_invalidate_location_prefix() {
        let cache = BranchCache::new(10, Duration::from_secs(60));
        cache.insert(branch("tavern", "npc_a", 1)).await;
        cache.insert(branch("tavern", "npc_b", 1)).await;
        cache.insert(branch("cellar", "npc_c", 1)).await;

        let removed = cache.invalidate_location("tavern").await;
        assert_eq!(removed, 2);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.stats().await.invalidations, 2);
    }

    #[tokio::test]
    async fn test_cleanup_task_runs() {
        let cache = std::sync::Arc::new(BranchCache::new(10, Duration::from_millis(1)));
        cache.insert(branch("tavern", "npc_a", 1)).await;

        let token = CancellationToken::new();
        let handle = cache.spawn_cleanup(Duration::from_millis(5), token.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.is_empty().await);

        token.cancel();
        handle.await.unwrap();
    }
}
