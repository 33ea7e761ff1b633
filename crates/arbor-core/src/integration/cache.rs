//! Entity cache interface and an in-memory implementation.
//!
//! The engine only reads from the cache. The single write path is
//! [`EntityCache::fetch_member`], used when the bot's own member record is
//! missing: the cache fetches it upstream and stores it, and the caller
//! re-reads.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::{ApiError, ApiResult};
use crate::foundation::{Channel, Guild, Member, Snowflake};

/// Read access to cached guilds, members and channels.
#[async_trait]
pub trait EntityCache: Send + Sync {
    async fn guild(&self, id: Snowflake) -> Option<Arc<Guild>>;

    async fn member(&self, user_id: Snowflake, guild_id: Snowflake) -> Option<Arc<Member>>;

    async fn channel(&self, id: Snowflake) -> Option<Arc<Channel>>;

    /// Fetches a member from the platform and stores it in the cache.
    async fn fetch_member(&self, guild_id: Snowflake, user_id: Snowflake) -> ApiResult<()>;
}

/// A boxed, shareable entity cache.
pub type BoxedEntityCache = Arc<dyn EntityCache>;

#[derive(Default)]
struct CacheMaps {
    guilds: HashMap<Snowflake, Arc<Guild>>,
    members: HashMap<(Snowflake, Snowflake), Arc<Member>>,
    channels: HashMap<Snowflake, Arc<Channel>>,
    /// Members that exist upstream but have not been cached yet.
    remote_members: HashMap<(Snowflake, Snowflake), Member>,
}

/// An [`EntityCache`] backed by in-process maps.
///
/// Channels inserted through a guild are indexed as well, so a channel is
/// visible whether it was cached on its own or as part of its guild.
/// [`stage_remote_member`](Self::stage_remote_member) registers a member that
/// only becomes visible once [`fetch_member`](EntityCache::fetch_member) runs.
#[derive(Default)]
pub struct MemoryCache {
    maps: RwLock<CacheMaps>,
    lookups: AtomicUsize,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a guild, indexing its channels.
    pub fn insert_guild(&self, guild: Guild) {
        let mut maps = self.maps.write();
        for channel in guild.channels.values() {
            maps.channels.insert(channel.id, Arc::new(channel.clone()));
        }
        maps.guilds.insert(guild.id, Arc::new(guild));
    }

    pub fn insert_member(&self, member: Member) {
        self.maps
            .write()
            .members
            .insert((member.guild_id, member.user_id), Arc::new(member));
    }

    pub fn insert_channel(&self, channel: Channel) {
        self.maps.write().channels.insert(channel.id, Arc::new(channel));
    }

    /// Registers a member that can be fetched but is not cached yet.
    pub fn stage_remote_member(&self, member: Member) {
        self.maps
            .write()
            .remote_members
            .insert((member.guild_id, member.user_id), member);
    }

    pub fn remove_member(&self, user_id: Snowflake, guild_id: Snowflake) -> bool {
        self.maps
            .write()
            .members
            .remove(&(guild_id, user_id))
            .is_some()
    }

    /// Total number of reads served, fetches excluded.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    fn count_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl EntityCache for MemoryCache {
    async fn guild(&self, id: Snowflake) -> Option<Arc<Guild>> {
        self.count_lookup();
        self.maps.read().guilds.get(&id).cloned()
    }

    async fn member(&self, user_id: Snowflake, guild_id: Snowflake) -> Option<Arc<Member>> {
        self.count_lookup();
        self.maps.read().members.get(&(guild_id, user_id)).cloned()
    }

    async fn channel(&self, id: Snowflake) -> Option<Arc<Channel>> {
        self.count_lookup();
        self.maps.read().channels.get(&id).cloned()
    }

    async fn fetch_member(&self, guild_id: Snowflake, user_id: Snowflake) -> ApiResult<()> {
        let mut maps = self.maps.write();
        let member = maps
            .remote_members
            .remove(&(guild_id, user_id))
            .ok_or_else(|| ApiError::not_found("member", user_id))?;
        trace!(guild_id = %guild_id, user_id = %user_id, "Fetched member into cache");
        maps.members.insert((guild_id, user_id), Arc::new(member));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::ChannelType;

    fn member(user: u64, guild: u64) -> Member {
        Member {
            user_id: Snowflake(user),
            guild_id: Snowflake(guild),
            roles: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_guild_channels_are_indexed() {
        let cache = MemoryCache::new();
        cache.insert_guild(Guild::new(Snowflake(1), Snowflake(2)).with_channel(Channel {
            id: Snowflake(10),
            guild_id: Some(Snowflake(1)),
            kind: ChannelType::GuildText,
            parent_id: None,
            overwrites: Vec::new(),
        }));

        assert!(cache.guild(Snowflake(1)).await.is_some());
        assert!(cache.channel(Snowflake(10)).await.is_some());
        assert_eq!(cache.lookup_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_member_populates_cache() {
        let cache = MemoryCache::new();
        cache.stage_remote_member(member(7, 1));

        assert!(cache.member(Snowflake(7), Snowflake(1)).await.is_none());
        cache.fetch_member(Snowflake(1), Snowflake(7)).await.unwrap();
        assert!(cache.member(Snowflake(7), Snowflake(1)).await.is_some());

        let err = cache.fetch_member(Snowflake(1), Snowflake(8)).await;
        assert!(matches!(err, Err(ApiError::NotFound { .. })));
    }
}
