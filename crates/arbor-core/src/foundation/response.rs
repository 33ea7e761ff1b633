//! Payloads the engine produces for the reply channel.
//!
//! Guards never render messages. They produce a [`Rejection`] and the
//! [`Responder`](crate::Responder) decides how it looks.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entity::ChannelType;
use super::permission::Permission;

/// Which principal failed a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    Bot,
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "User",
            Self::Bot => "Bot",
        })
    }
}

/// Where a permission check was evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScope {
    Guild,
    Channel,
}

/// Broad class of a rejection, used for log severity and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionCategory {
    /// A developer mistake. Always reported to the error sink.
    Configuration,
    /// The caller (or the bot) is not allowed to do this.
    Authorization,
    /// The correlation id is expired or forged.
    ExpiredState,
    /// Required context could not be resolved.
    Upstream,
}

/// Machine-readable reason for a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionCause {
    /// No options are registered for the routing key.
    LinkedOptionsMissing { path: String },
    /// No handler bundle, or not the required callback, is registered.
    LinkedHandlerMissing { path: String },
    /// The handler declares no allowed channel types.
    ChannelTypesUnconfigured,
    /// The interaction's channel type is not allowed.
    ChannelTypeMismatch { channel_type: Option<ChannelType> },
    GuildRequired,
    DeveloperRequired,
    MissingPermissions {
        principal: PrincipalKind,
        scope: PermissionScope,
        required: Vec<Permission>,
        missing: Vec<Permission>,
    },
    /// State packet missing or expired.
    ExpiredState,
    /// Guild, member or channel missing from the cache.
    GuildDataMissing,
    /// The bot's own member record is missing even after a fetch.
    BotMemberMissing,
}

impl RejectionCause {
    /// Short upper-case code shown to users next to the support id.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LinkedOptionsMissing { .. } => "LINKED_OPTIONS_MISSING",
            Self::LinkedHandlerMissing { .. } => "LINKED_HANDLER_MISSING",
            Self::ChannelTypesUnconfigured => "CHANNEL_TYPES_UNCONFIGURED",
            Self::ChannelTypeMismatch { .. } => "CHANNEL_TYPE_MISMATCH",
            Self::GuildRequired => "GUILD_REQUIRED",
            Self::DeveloperRequired => "DEVELOPER_REQUIRED",
            Self::MissingPermissions { .. } => "MISSING_PERMISSIONS",
            Self::ExpiredState => "STATE_EXPIRED",
            Self::GuildDataMissing => "GUILD_DATA_MISSING/MULTI_CACHE_MISS",
            Self::BotMemberMissing => "GUILD_DATA_MISSING/BOT_MEMBER_CACHE_MISS",
        }
    }

    pub fn category(&self) -> RejectionCategory {
        match self {
            Self::LinkedOptionsMissing { .. }
            | Self::LinkedHandlerMissing { .. }
            | Self::ChannelTypesUnconfigured => RejectionCategory::Configuration,
            Self::ChannelTypeMismatch { .. }
            | Self::GuildRequired
            | Self::DeveloperRequired
            | Self::MissingPermissions { .. } => RejectionCategory::Authorization,
            Self::ExpiredState => RejectionCategory::ExpiredState,
            Self::GuildDataMissing | Self::BotMemberMissing => RejectionCategory::Upstream,
        }
    }
}

/// A user-facing refusal with a support id that also appears in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub header: String,
    pub description: String,
    pub cause: RejectionCause,
    pub correlation_id: String,
}

impl Rejection {
    pub fn category(&self) -> RejectionCategory {
        self.cause.category()
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) | Support ID: {}",
            self.header,
            self.cause.code(),
            self.correlation_id
        )
    }
}

/// One autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutocompleteChoice {
    pub name: String,
    pub value: String,
}

impl AutocompleteChoice {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
