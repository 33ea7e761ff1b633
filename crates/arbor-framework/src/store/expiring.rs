//! Keyed storage with a per-entry expiration timer.
//!
//! Every [`ExpiringMap::set`] schedules one timer task for its key. Setting
//! the key again cancels that timer and schedules a new one while holding the
//! same lock, so an old timer can never remove a newer value. Each entry also
//! records a generation; a timer only removes the entry it was scheduled for.
//!
//! Reads check the deadline too, so an entry is never observed past its TTL
//! even if its timer has not run yet (or no runtime was available to spawn it).
//! Without a runtime, `set`, `len` and `entries` sweep out expired slots.
//!
//! ```rust,ignore
//! let map = ExpiringMap::new(Duration::from_secs(60));
//! map.set("token", 42, None);
//! assert_eq!(map.get(&"token"), Some(42));
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::trace;

struct Slot<V> {
    value: V,
    deadline: Instant,
    generation: u64,
    timer: CancellationToken,
}

struct Inner<K, V> {
    slots: HashMap<K, Slot<V>>,
    next_generation: u64,
}

impl<K: Eq + Hash, V> Inner<K, V> {
    /// Removes `key` if its deadline has passed. Returns whether it is still live.
    fn purge_if_expired(&mut self, key: &K, now: Instant) -> bool {
        match self.slots.get(key) {
            Some(slot) if slot.deadline <= now => {
                if let Some(slot) = self.slots.remove(key) {
                    slot.timer.cancel();
                }
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Removes every slot whose deadline has passed.
    fn purge_expired(&mut self, now: Instant) {
        self.slots.retain(|_, slot| {
            let live = slot.deadline > now;
            if !live {
                slot.timer.cancel();
            }
            live
        });
    }
}

/// A map whose entries expire independently.
pub struct ExpiringMap<K, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
    default_ttl: Duration,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    /// Creates an empty map using `default_ttl` when `set` gets no TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                slots: HashMap::new(),
                next_generation: 0,
            })),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Inserts or replaces `key`, (re)starting its timer.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let deadline = Instant::now() + ttl;
        let timer = CancellationToken::new();

        let mut inner = self.inner.lock();
        inner.purge_expired(Instant::now());
        let generation = inner.next_generation;
        inner.next_generation += 1;

        let previous = inner.slots.insert(
            key.clone(),
            Slot {
                value,
                deadline,
                generation,
                timer: timer.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.timer.cancel();
        }

        self.schedule(key, generation, deadline, timer);
    }

    /// Spawns the timer task. Without a runtime, expiry is lazy only.
    fn schedule(&self, key: K, generation: u64, deadline: Instant, timer: CancellationToken) {
        let Ok(handle) = Handle::try_current() else {
            trace!("No runtime available, entry expires lazily");
            return;
        };

        let weak: Weak<Mutex<Inner<K, V>>> = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = sleep_until(deadline) => {
                    let Some(inner) = weak.upgrade() else { return };
                    let mut inner = inner.lock();
                    if inner.slots.get(&key).is_some_and(|slot| slot.generation == generation) {
                        inner.slots.remove(&key);
                        trace!(generation, "Entry expired");
                    }
                }
            }
        });
    }

    /// Returns a clone of the live value for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        if !inner.purge_if_expired(key, Instant::now()) {
            return None;
        }
        inner.slots.get(key).map(|slot| slot.value.clone())
    }

    /// Returns `true` if `key` holds a live value.
    pub fn has(&self, key: &K) -> bool {
        self.inner.lock().purge_if_expired(key, Instant::now())
    }

    /// Removes `key` and returns its value if it was live.
    pub fn take(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        if !inner.purge_if_expired(key, Instant::now()) {
            return None;
        }
        inner.slots.remove(key).map(|slot| {
            slot.timer.cancel();
            slot.value
        })
    }

    /// Removes `key`, cancelling its timer. Returns whether a live entry was removed.
    pub fn delete(&self, key: &K) -> bool {
        self.take(key).is_some()
    }

    /// Time left before `key` expires.
    pub fn remaining(&self, key: &K) -> Option<Duration> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        if !inner.purge_if_expired(key, now) {
            return None;
        }
        inner
            .slots
            .get(key)
            .map(|slot| slot.deadline.saturating_duration_since(now))
    }

    /// Cancels every timer, then drops every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        for slot in inner.slots.values() {
            slot.timer.cancel();
        }
        inner.slots.clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.purge_expired(Instant::now());
        inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of live entries. Order is unspecified.
    pub fn entries(&self) -> Vec<(K, V)> {
        let mut inner = self.inner.lock();
        inner.purge_expired(Instant::now());
        inner
            .slots
            .iter()
            .map(|(key, slot)| (key.clone(), slot.value.clone()))
            .collect()
    }

    /// Snapshot of live keys. Order is unspecified.
    pub fn keys(&self) -> Vec<K> {
        self.entries().into_iter().map(|(key, _)| key).collect()
    }
}

impl<K, V> Drop for ExpiringMap<K, V> {
    fn drop(&mut self) {
        for slot in self.inner.lock().slots.values() {
            slot.timer.cancel();
        }
    }
}

impl<K, V> std::fmt::Debug for ExpiringMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringMap")
            .field("slots", &self.inner.lock().slots.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

// =============================================================================
// ExpiringSet
// =============================================================================

/// A set whose members expire independently.
pub struct ExpiringSet<K> {
    map: ExpiringMap<K, ()>,
}

impl<K> ExpiringSet<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            map: ExpiringMap::new(default_ttl),
        }
    }

    /// Adds `key`, restarting its timer if already present.
    pub fn insert(&self, key: K, ttl: Option<Duration>) {
        self.map.set(key, (), ttl);
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.has(key)
    }

    pub fn remove(&self, key: &K) -> bool {
        self.map.delete(key)
    }

    pub fn clear(&self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn members(&self) -> Vec<K> {
        self.map.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_secs(10);

    /// Lets spawned timer tasks observe the advanced clock.
    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    fn slot_count<K, V>(map: &ExpiringMap<K, V>) -> usize {
        map.inner.lock().slots.len()
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let map = ExpiringMap::new(TTL);
        map.set("a", 1, None);
        assert_eq!(map.get(&"a"), Some(1));

        advance(Duration::from_secs(9)).await;
        assert!(map.has(&"a"));

        advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(slot_count(&map), 0);
        assert_eq!(map.get(&"a"), None);
        assert!(!map.has(&"a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_never_observable() {
        let map = ExpiringMap::new(TTL);
        map.set("a", 1, Some(Duration::ZERO));
        assert_eq!(map.get(&"a"), None);
        assert!(!map.has(&"a"));
        assert_eq!(map.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_replaces_timer() {
        let map = ExpiringMap::new(TTL);
        map.set("a", 1, None);

        advance(Duration::from_secs(8)).await;
        map.set("a", 2, None);

        // The first timer would have fired here.
        advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(map.get(&"a"), Some(2));

        advance(Duration::from_secs(6)).await;
        settle().await;
        assert_eq!(map.get(&"a"), None);
        assert_eq!(slot_count(&map), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_and_take() {
        let map = ExpiringMap::new(TTL);
        map.set("a", 1, None);
        map.set("b", 2, None);

        assert!(map.delete(&"a"));
        assert!(!map.delete(&"a"));
        assert_eq!(map.take(&"b"), Some(2));
        assert!(map.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_timers_before_reuse() {
        let map = ExpiringMap::new(TTL);
        map.set("a", 1, None);
        map.set("b", 2, None);
        map.clear();
        assert!(map.is_empty());

        advance(Duration::from_secs(5)).await;
        map.set("a", 3, None);

        // Old schedule for "a" would fire at 10s.
        advance(Duration::from_secs(6)).await;
        settle().await;
        assert_eq!(map.get(&"a"), Some(3));
        assert_eq!(map.remaining(&"a"), Some(Duration::from_secs(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_iteration_skips_expired() {
        let map = ExpiringMap::new(TTL);
        map.set("short", 1, Some(Duration::from_secs(1)));
        map.set("long", 2, None);

        advance(Duration::from_secs(2)).await;
        let entries = map.entries();
        assert_eq!(entries, vec![("long", 2)]);
        assert_eq!(map.keys(), vec!["long"]);
    }

    #[test]
    fn test_lazy_expiry_without_runtime() {
        let map = ExpiringMap::new(TTL);
        map.set(1u32, "x", Some(Duration::ZERO));
        assert_eq!(map.get(&1), None);

        map.set(2u32, "y", None);
        assert_eq!(map.get(&2), Some("y"));
    }

    #[test]
    fn test_unread_expired_slots_are_swept_without_runtime() {
        let map = ExpiringMap::new(TTL);
        for key in 0u32..8 {
            map.set(key, "stale", Some(Duration::ZERO));
        }
        map.set(100, "fresh", None);
        assert_eq!(slot_count(&map), 1);

        map.set(200, "stale", Some(Duration::ZERO));
        assert_eq!(map.len(), 1);
        assert_eq!(slot_count(&map), 1);

        map.set(300, "stale", Some(Duration::ZERO));
        assert_eq!(map.entries(), vec![(100, "fresh")]);
        assert_eq!(slot_count(&map), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiring_set() {
        let set = ExpiringSet::new(TTL);
        set.insert(7u64, None);
        set.insert(8u64, Some(Duration::from_secs(1)));
        assert!(set.contains(&7));
        assert_eq!(set.len(), 2);

        advance(Duration::from_secs(2)).await;
        assert!(!set.contains(&8));
        assert_eq!(set.members(), vec![7]);
        assert!(set.remove(&7));
        assert!(set.is_empty());
    }
}
