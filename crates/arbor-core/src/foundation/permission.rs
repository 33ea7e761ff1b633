//! Permission flags and bitmasks.
//!
//! [`Permission`] names a single platform flag; [`Permissions`] is the 64-bit
//! mask that roles, overwrites and resolved principals carry.
//!
//! ```rust,ignore
//! use arbor_core::{Permission, Permissions};
//!
//! let mask = Permissions::from_flags(&[Permission::ViewChannel, Permission::SendMessages]);
//! assert!(mask.contains(Permission::SendMessages));
//! assert_eq!(mask.names(), vec!["VIEW_CHANNEL", "SEND_MESSAGES"]);
//! ```

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Returned when a permission name does not match any known flag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown permission flag: '{0}'")]
pub struct UnknownPermission(pub String);

macro_rules! permissions {
    ($( $(#[$meta:meta])* $variant:ident = $bit:literal => $name:literal, )*) => {
        /// A single named permission flag.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Permission {
            $( $(#[$meta])* $variant = $bit, )*
        }

        impl Permission {
            /// Every defined flag, in bit order.
            pub const ALL: &'static [Permission] = &[$(Permission::$variant,)*];

            /// The canonical SCREAMING_SNAKE name of the flag.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Permission::$variant => $name, )*
                }
            }
        }

        impl FromStr for Permission {
            type Err = UnknownPermission;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $name => Ok(Permission::$variant), )*
                    other => Err(UnknownPermission(other.to_string())),
                }
            }
        }
    };
}

permissions! {
    CreateInstantInvite = 0 => "CREATE_INSTANT_INVITE",
    KickMembers = 1 => "KICK_MEMBERS",
    BanMembers = 2 => "BAN_MEMBERS",
    /// Implies every other flag and bypasses channel overwrites.
    Administrator = 3 => "ADMINISTRATOR",
    ManageChannels = 4 => "MANAGE_CHANNELS",
    ManageGuild = 5 => "MANAGE_GUILD",
    AddReactions = 6 => "ADD_REACTIONS",
    ViewAuditLog = 7 => "VIEW_AUDIT_LOG",
    PrioritySpeaker = 8 => "PRIORITY_SPEAKER",
    Stream = 9 => "STREAM",
    ViewChannel = 10 => "VIEW_CHANNEL",
    SendMessages = 11 => "SEND_MESSAGES",
    SendTtsMessages = 12 => "SEND_TTS_MESSAGES",
    ManageMessages = 13 => "MANAGE_MESSAGES",
    EmbedLinks = 14 => "EMBED_LINKS",
    AttachFiles = 15 => "ATTACH_FILES",
    ReadMessageHistory = 16 => "READ_MESSAGE_HISTORY",
    MentionEveryone = 17 => "MENTION_EVERYONE",
    UseExternalEmojis = 18 => "USE_EXTERNAL_EMOJIS",
    ViewGuildInsights = 19 => "VIEW_GUILD_INSIGHTS",
    Connect = 20 => "CONNECT",
    Speak = 21 => "SPEAK",
    MuteMembers = 22 => "MUTE_MEMBERS",
    DeafenMembers = 23 => "DEAFEN_MEMBERS",
    MoveMembers = 24 => "MOVE_MEMBERS",
    UseVad = 25 => "USE_VAD",
    ChangeNickname = 26 => "CHANGE_NICKNAME",
    ManageNicknames = 27 => "MANAGE_NICKNAMES",
    ManageRoles = 28 => "MANAGE_ROLES",
    ManageWebhooks = 29 => "MANAGE_WEBHOOKS",
    ManageGuildExpressions = 30 => "MANAGE_GUILD_EXPRESSIONS",
    UseApplicationCommands = 31 => "USE_APPLICATION_COMMANDS",
    RequestToSpeak = 32 => "REQUEST_TO_SPEAK",
    ManageEvents = 33 => "MANAGE_EVENTS",
    ManageThreads = 34 => "MANAGE_THREADS",
    CreatePublicThreads = 35 => "CREATE_PUBLIC_THREADS",
    CreatePrivateThreads = 36 => "CREATE_PRIVATE_THREADS",
    UseExternalStickers = 37 => "USE_EXTERNAL_STICKERS",
    /// Thread counterpart of [`Permission::SendMessages`].
    SendMessagesInThreads = 38 => "SEND_MESSAGES_IN_THREADS",
    UseEmbeddedActivities = 39 => "USE_EMBEDDED_ACTIVITIES",
    ModerateMembers = 40 => "MODERATE_MEMBERS",
    ViewCreatorMonetizationAnalytics = 41 => "VIEW_CREATOR_MONETIZATION_ANALYTICS",
    UseSoundboard = 42 => "USE_SOUNDBOARD",
    CreateGuildExpressions = 43 => "CREATE_GUILD_EXPRESSIONS",
    CreateEvents = 44 => "CREATE_EVENTS",
    UseExternalSounds = 45 => "USE_EXTERNAL_SOUNDS",
    SendVoiceMessages = 46 => "SEND_VOICE_MESSAGES",
    SendPolls = 49 => "SEND_POLLS",
    UseExternalApps = 50 => "USE_EXTERNAL_APPS",
}

impl Permission {
    /// The single-bit mask of this flag.
    pub const fn bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Permissions bitmask
// =============================================================================

/// A combined permission bitmask.
///
/// Serialized as a decimal string (the platform's wire form); deserialization
/// accepts either a string or a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Permissions(u64);

impl Permissions {
    /// The empty mask.
    pub const NONE: Self = Self(0);

    /// Wraps raw bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Builds a mask from a list of flags.
    pub fn from_flags(flags: &[Permission]) -> Self {
        flags.iter().fold(Self::NONE, |acc, flag| acc | *flag)
    }

    /// Returns `true` if the given flag is set.
    pub const fn contains(self, flag: Permission) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Returns `true` if the administrator flag is set.
    pub const fn is_admin(self) -> bool {
        self.contains(Permission::Administrator)
    }

    /// Sets a flag.
    pub fn insert(&mut self, flag: Permission) {
        self.0 |= flag.bit();
    }

    /// Clears a flag.
    pub fn remove(&mut self, flag: Permission) {
        self.0 &= !flag.bit();
    }

    /// Clears `deny` then sets `allow`.
    pub const fn apply_overwrite(self, allow: Permissions, deny: Permissions) -> Self {
        Self((self.0 & !deny.0) | allow.0)
    }

    /// The flags set in this mask, in bit order.
    pub fn flags(self) -> Vec<Permission> {
        Permission::ALL
            .iter()
            .copied()
            .filter(|flag| self.contains(*flag))
            .collect()
    }

    /// The flag names set in this mask, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        self.flags().into_iter().map(Permission::as_str).collect()
    }
}

impl From<Permission> for Permissions {
    fn from(flag: Permission) -> Self {
        Self(flag.bit())
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<Permission> for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Permission) -> Self {
        Self(self.0 | rhs.bit())
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Permissions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for Permissions {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for Permissions {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, |acc, flag| acc | flag)
    }
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(bits) => Ok(Self(bits)),
            Raw::Text(text) => text.parse().map(Self).map_err(serde::de::Error::custom),
        }
    }
}
