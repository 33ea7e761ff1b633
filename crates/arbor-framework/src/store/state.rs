//! Correlation state for multi-step interactions.
//!
//! A command that sends an interactive element (button, select, modal)
//! stores whatever it needs to finish the flow with [`StateStore::make`] and
//! embeds the returned storage id in the element's custom id. When the user
//! clicks, the pipeline resolves the id back to the stored payload.
//!
//! Entries stay readable until their TTL elapses; [`StateStore::take`] is
//! available for flows that want single-use ids.
//!
//! ```rust,ignore
//! let id = store.make("confirm", PendingBan { target }, MakeOptions::owned_by(user_id));
//! let button_id = component_custom_id("confirm", &id);
//! // later, in the component handler:
//! let pending = ctx.state::<PendingBan>();
//! ```

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

use arbor_core::Snowflake;

use super::expiring::ExpiringMap;

/// Reference default lifetime of a state entry.
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(5 * 60);

/// Type-erased stored payload.
pub type StateValue = Arc<dyn Any + Send + Sync>;

/// A stored correlation entry.
#[derive(Clone)]
pub struct StateEntry {
    pub group_id: String,
    pub storage_id: String,
    /// If set, only this principal may retrieve the entry through
    /// [`StateStore::retrieve`].
    pub owner: Option<Snowflake>,
    pub value: StateValue,
    pub expires_at: Instant,
}

impl std::fmt::Debug for StateEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateEntry")
            .field("group_id", &self.group_id)
            .field("storage_id", &self.storage_id)
            .field("owner", &self.owner)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// What a successful retrieval yields.
#[derive(Clone)]
pub struct StatePacket {
    pub group_id: String,
    pub storage_id: String,
    pub value: StateValue,
}

impl StatePacket {
    /// Borrows the payload as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Shares the payload as `Arc<T>`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }
}

impl std::fmt::Debug for StatePacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatePacket")
            .field("group_id", &self.group_id)
            .field("storage_id", &self.storage_id)
            .finish_non_exhaustive()
    }
}

impl From<StateEntry> for StatePacket {
    fn from(entry: StateEntry) -> Self {
        Self {
            group_id: entry.group_id,
            storage_id: entry.storage_id,
            value: entry.value,
        }
    }
}

/// Options for [`StateStore::make`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeOptions {
    pub owner: Option<Snowflake>,
    pub ttl: Option<Duration>,
}

impl MakeOptions {
    /// Restricts retrieval to `owner`.
    pub fn owned_by(owner: Snowflake) -> Self {
        Self {
            owner: Some(owner),
            ttl: None,
        }
    }

    /// Overrides the store's default TTL (builder pattern).
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Issues and resolves correlation ids.
pub struct StateStore {
    entries: ExpiringMap<String, StateEntry>,
}

impl StateStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: ExpiringMap::new(default_ttl),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.entries.default_ttl()
    }

    /// Stores `payload` under a fresh time-ordered id and returns the id.
    pub fn make<T>(&self, group_id: impl Into<String>, payload: T, options: MakeOptions) -> String
    where
        T: Any + Send + Sync,
    {
        let storage_id = Uuid::now_v7().simple().to_string();
        let ttl = options.ttl.unwrap_or(self.entries.default_ttl());
        let entry = StateEntry {
            group_id: group_id.into(),
            storage_id: storage_id.clone(),
            owner: options.owner,
            value: Arc::new(payload),
            expires_at: Instant::now() + ttl,
        };

        debug!(
            group_id = %entry.group_id,
            storage_id = %storage_id,
            ttl_ms = ttl.as_millis() as u64,
            "State entry created"
        );
        self.entries.set(storage_id.clone(), entry, Some(ttl));
        storage_id
    }

    /// Resolves `storage_id` for `principal`.
    ///
    /// `None` if the entry is absent, expired, or owned by someone else.
    pub fn retrieve(&self, storage_id: &str, principal: Snowflake) -> Option<StatePacket> {
        let entry = self.entries.get(&storage_id.to_string())?;
        if entry.owner.is_some_and(|owner| owner != principal) {
            trace!(storage_id, principal = %principal, "State owner mismatch");
            return None;
        }
        Some(entry.into())
    }

    /// Resolves `storage_id` without checking the owner.
    pub fn retrieve_any(&self, storage_id: &str) -> Option<StatePacket> {
        self.entries.get(&storage_id.to_string()).map(Into::into)
    }

    /// Like [`retrieve`](Self::retrieve), but removes the entry on success.
    pub fn take(&self, storage_id: &str, principal: Snowflake) -> Option<StatePacket> {
        self.retrieve(storage_id, principal)?;
        self.entries.take(&storage_id.to_string()).map(Into::into)
    }

    /// The full entry, including owner and expiry.
    pub fn entry(&self, storage_id: &str) -> Option<StateEntry> {
        self.entries.get(&storage_id.to_string())
    }

    pub fn delete(&self, storage_id: &str) -> bool {
        self.entries.delete(&storage_id.to_string())
    }

    /// Drops every entry and cancels every timer.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const OWNER: Snowflake = Snowflake(1);
    const OTHER: Snowflake = Snowflake(2);

    #[derive(Debug, PartialEq)]
    struct Page {
        index: usize,
    }

    #[tokio::test(start_paused = true)]
    async fn test_make_then_retrieve_round_trip() {
        let store = StateStore::default();
        let id = store.make("pager", Page { index: 3 }, MakeOptions::owned_by(OWNER));

        let packet = store.retrieve(&id, OWNER).unwrap();
        assert_eq!(packet.group_id, "pager");
        assert_eq!(packet.storage_id, id);
        assert_eq!(packet.downcast_ref::<Page>(), Some(&Page { index: 3 }));
        assert!(packet.downcast_ref::<String>().is_none());

        // Re-readable until expiry.
        assert!(store.retrieve(&id, OWNER).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_owner_mismatch_returns_none() {
        let store = StateStore::default();
        let owned = store.make("g", 1u8, MakeOptions::owned_by(OWNER));
        let shared = store.make("g", 2u8, MakeOptions::default());

        assert!(store.retrieve(&owned, OTHER).is_none());
        assert!(store.retrieve_any(&owned).is_some());
        assert!(store.retrieve(&shared, OTHER).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = StateStore::default();
        let id = store.make("g", (), MakeOptions::default());
        let short = store.make("g", (), MakeOptions::default().ttl(Duration::from_millis(1)));

        advance(Duration::from_millis(5)).await;
        assert!(store.retrieve_any(&short).is_none());
        assert!(store.retrieve_any(&id).is_some());

        advance(DEFAULT_STATE_TTL).await;
        assert!(store.retrieve_any(&id).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_is_single_use_and_owner_checked() {
        let store = StateStore::default();
        let id = store.make("g", 5u32, MakeOptions::owned_by(OWNER));

        assert!(store.take(&id, OTHER).is_none());
        let packet = store.take(&id, OWNER).unwrap();
        assert_eq!(packet.downcast::<u32>().as_deref(), Some(&5));
        assert!(store.retrieve(&id, OWNER).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_are_unique() {
        let store = StateStore::default();
        let first = store.make("g", (), MakeOptions::default());
        advance(Duration::from_millis(2)).await;
        let second = store.make("g", (), MakeOptions::default());

        assert_ne!(first, second);
        assert_eq!(first.len(), 32);
        assert!(store.delete(&first));
        assert!(!store.delete(&first));
        store.clear();
        assert!(store.retrieve_any(&second).is_none());
    }
}
