//! Rejection payloads produced by the guard chain.
//!
//! Every rejection carries a fresh support id so an operator can match a
//! user report against the logs.

use uuid::Uuid;

use arbor_core::{
    ChannelType, Permission, PermissionScope, PrincipalKind, Rejection, RejectionCause,
};

const INTERNAL_HEADER: &str = "This request was not processed due to a internal exception or security violation. Please try again later or report an issue if this persists.";
const PERMISSIONS_HEADER: &str = "This request was not processed due to a missing permissions. Please try again later or report an issue if this persists.";
const EXPIRED_HEADER: &str = "This interaction has expired or is invalid. Please try again.";

/// A new time-ordered support id.
pub fn correlation_id() -> String {
    Uuid::now_v7().to_string()
}

fn internal(description: impl Into<String>, cause: RejectionCause) -> Rejection {
    Rejection {
        header: INTERNAL_HEADER.to_string(),
        description: description.into(),
        cause,
        correlation_id: correlation_id(),
    }
}

pub fn options_missing(path: &str) -> Rejection {
    internal(
        "This action is not correctly configured. Please report this issue to the bot developer. (LINKED_OPTIONS_MISSING)",
        RejectionCause::LinkedOptionsMissing {
            path: path.to_string(),
        },
    )
}

pub fn handler_missing(path: &str) -> Rejection {
    internal(
        "This action is not correctly configured. Please report this issue to the bot developer. (LINKED_HANDLER_MISSING)",
        RejectionCause::LinkedHandlerMissing {
            path: path.to_string(),
        },
    )
}

pub fn channel_types_unconfigured() -> Rejection {
    internal(
        "This action is not correctly configured to access channel types. Please report this issue to the bot developer.",
        RejectionCause::ChannelTypesUnconfigured,
    )
}

pub fn channel_type_mismatch(channel_type: Option<ChannelType>) -> Rejection {
    let name = channel_type.map_or("Unknown", ChannelType::name);
    internal(
        format!(
            "This action is not configured to access '{name}' types. Please report this issue to the bot developer if you believe this is an error."
        ),
        RejectionCause::ChannelTypeMismatch { channel_type },
    )
}

pub fn guild_required() -> Rejection {
    internal(
        "This action is restricted to use in guild context. Please do not issue this via DMs.",
        RejectionCause::GuildRequired,
    )
}

pub fn developer_required() -> Rejection {
    internal(
        "This is a restricted action. You do not have permission to issue this request.",
        RejectionCause::DeveloperRequired,
    )
}

pub fn guild_data_missing() -> Rejection {
    internal(
        "This action was not able to access the required guild data. Please report this issue to the bot developer if this issue persists. (GUILD_DATA_MISSING/MULTI_CACHE_MISS)",
        RejectionCause::GuildDataMissing,
    )
}

pub fn bot_member_missing() -> Rejection {
    internal(
        "This action was not able to access the required guild data. Please report this issue to the bot developer if this issue persists. (GUILD_DATA_MISSING/BOT_MEMBER_CACHE_MISS)",
        RejectionCause::BotMemberMissing,
    )
}

pub fn expired_state() -> Rejection {
    Rejection {
        header: EXPIRED_HEADER.to_string(),
        description: String::new(),
        cause: RejectionCause::ExpiredState,
        correlation_id: correlation_id(),
    }
}

/// `missing` must be non-empty and in the order of `required`.
pub fn missing_permissions(
    principal: PrincipalKind,
    scope: PermissionScope,
    required: &[Permission],
    missing: Vec<Permission>,
) -> Rejection {
    let names: Vec<&str> = missing.iter().map(|flag| flag.as_str()).collect();
    Rejection {
        header: PERMISSIONS_HEADER.to_string(),
        description: format!("{principal} is missing: {}", names.join(", ")),
        cause: RejectionCause::MissingPermissions {
            principal,
            scope,
            required: required.to_vec(),
            missing,
        },
        correlation_id: correlation_id(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::RejectionCategory;

    #[test]
    fn test_permission_description_lists_missing_flags() {
        let rejection = missing_permissions(
            PrincipalKind::Bot,
            PermissionScope::Channel,
            &[Permission::ViewChannel, Permission::SendMessages],
            vec![Permission::SendMessages],
        );

        assert_eq!(rejection.description, "Bot is missing: SEND_MESSAGES");
        assert_eq!(rejection.category(), RejectionCategory::Authorization);
    }

    #[test]
    fn test_mismatch_names_the_channel_type() {
        let rejection = channel_type_mismatch(Some(ChannelType::Dm));
        assert!(rejection.description.contains("'DM' types"));

        let rejection = channel_type_mismatch(None);
        assert!(rejection.description.contains("'Unknown' types"));
    }

    #[test]
    fn test_support_ids_differ() {
        assert_ne!(
            expired_state().correlation_id,
            expired_state().correlation_id
        );
    }
}
