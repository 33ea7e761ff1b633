//! Cached platform entities consumed by the permission resolver and the
//! interaction pipeline.
//!
//! These are plain records. Where they come from (gateway cache, REST
//! fetches, fixtures) is the [`EntityCache`](crate::EntityCache)'s business.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::id::Snowflake;
use super::permission::Permissions;

/// Channel kinds, with the platform's numeric discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ChannelType {
    GuildText = 0,
    Dm = 1,
    GuildVoice = 2,
    GroupDm = 3,
    GuildCategory = 4,
    GuildAnnouncement = 5,
    AnnouncementThread = 10,
    PublicThread = 11,
    PrivateThread = 12,
    GuildStageVoice = 13,
    GuildDirectory = 14,
    GuildForum = 15,
    GuildMedia = 16,
}

impl ChannelType {
    /// Returns `true` for the three thread kinds.
    pub const fn is_thread(self) -> bool {
        matches!(
            self,
            Self::AnnouncementThread | Self::PublicThread | Self::PrivateThread
        )
    }

    /// The platform's name for this kind, used in rejection messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::GuildText => "GuildText",
            Self::Dm => "DM",
            Self::GuildVoice => "GuildVoice",
            Self::GroupDm => "GroupDm",
            Self::GuildCategory => "GuildCategory",
            Self::GuildAnnouncement => "GuildAnnouncement",
            Self::AnnouncementThread => "AnnouncementThread",
            Self::PublicThread => "PublicThread",
            Self::PrivateThread => "PrivateThread",
            Self::GuildStageVoice => "GuildStageVoice",
            Self::GuildDirectory => "GuildDirectory",
            Self::GuildForum => "GuildForum",
            Self::GuildMedia => "GuildMedia",
        }
    }
}

impl From<ChannelType> for u8 {
    fn from(kind: ChannelType) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for ChannelType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::GuildText,
            1 => Self::Dm,
            2 => Self::GuildVoice,
            3 => Self::GroupDm,
            4 => Self::GuildCategory,
            5 => Self::GuildAnnouncement,
            10 => Self::AnnouncementThread,
            11 => Self::PublicThread,
            12 => Self::PrivateThread,
            13 => Self::GuildStageVoice,
            14 => Self::GuildDirectory,
            15 => Self::GuildForum,
            16 => Self::GuildMedia,
            other => return Err(format!("unknown channel type: {other}")),
        })
    }
}

/// Who a channel overwrite targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteKind {
    Role,
    Member,
}

/// A per-channel allow/deny pair for one role or member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overwrite {
    pub id: Snowflake,
    pub kind: OverwriteKind,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permissions: Permissions,
}

/// A user's membership in a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: Snowflake,
    pub guild_id: Snowflake,
    /// Assigned role ids. The "everyone" role is implicit and not listed.
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub kind: ChannelType,
    /// Parent channel for threads, category for regular channels.
    #[serde(default)]
    pub parent_id: Option<Snowflake>,
    #[serde(default)]
    pub overwrites: Vec<Overwrite>,
}

/// A guild with the roles and channels the resolver needs.
///
/// The "everyone" role shares the guild's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    pub owner_id: Snowflake,
    #[serde(default)]
    pub roles: HashMap<Snowflake, Role>,
    #[serde(default)]
    pub channels: HashMap<Snowflake, Channel>,
}

impl Guild {
    /// Creates an empty guild record.
    pub fn new(id: Snowflake, owner_id: Snowflake) -> Self {
        Self {
            id,
            owner_id,
            roles: HashMap::new(),
            channels: HashMap::new(),
        }
    }

    /// Adds a role (builder pattern).
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role.id, role);
        self
    }

    /// Adds a channel (builder pattern).
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.insert(channel.id, channel);
        self
    }

    /// The "everyone" role, if cached.
    pub fn everyone_role(&self) -> Option<&Role> {
        self.roles.get(&self.id)
    }

    pub fn role(&self, id: Snowflake) -> Option<&Role> {
        self.roles.get(&id)
    }

    pub fn channel(&self, id: Snowflake) -> Option<&Channel> {
        self.channels.get(&id)
    }
}
