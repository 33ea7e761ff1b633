//! Incoming interaction events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity::ChannelType;
use super::id::Snowflake;
use super::schema::OptionType;

/// Interaction kinds, with the platform's discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum InteractionKind {
    Ping = 1,
    ApplicationCommand = 2,
    MessageComponent = 3,
    ApplicationCommandAutocomplete = 4,
    ModalSubmit = 5,
}

impl InteractionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::ApplicationCommand => "application_command",
            Self::MessageComponent => "message_component",
            Self::ApplicationCommandAutocomplete => "autocomplete",
            Self::ModalSubmit => "modal_submit",
        }
    }
}

impl From<InteractionKind> for u8 {
    fn from(kind: InteractionKind) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for InteractionKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            3 => Self::MessageComponent,
            4 => Self::ApplicationCommandAutocomplete,
            5 => Self::ModalSubmit,
            other => return Err(format!("unknown interaction type: {other}")),
        })
    }
}

/// An option value as sent with a command invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDataOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: OptionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandDataOption>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub focused: bool,
}

impl CommandDataOption {
    /// A subcommand or group node carrying nested options.
    pub fn nested(kind: OptionType, name: impl Into<String>, options: Vec<CommandDataOption>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: None,
            options,
            focused: false,
        }
    }

    /// A leaf option carrying a value.
    pub fn value(kind: OptionType, name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            value: Some(value),
            options: Vec::new(),
            focused: false,
        }
    }

    /// Marks the option as focused (builder pattern).
    pub fn focused(mut self) -> Self {
        self.focused = true;
        self
    }
}

/// A node of a submitted modal's component tree.
///
/// Layout nodes (rows, labels) carry children in `components` or a single
/// wrapped `component`; inputs carry `value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModalComponent {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<Box<ModalComponent>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ModalComponent>,
}

/// The kind-specific payload of an interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionData {
    /// Root command name, for command and autocomplete interactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandDataOption>,
    /// Component or modal custom id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ModalComponent>,
}

/// An incoming interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    pub user_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    #[serde(default)]
    pub channel_type: Option<ChannelType>,
    #[serde(default)]
    pub data: InteractionData,
}

impl Interaction {
    /// Creates an interaction with empty data and no guild or channel.
    pub fn new(id: Snowflake, kind: InteractionKind, user_id: Snowflake) -> Self {
        Self {
            id,
            kind,
            user_id,
            guild_id: None,
            channel_id: None,
            channel_type: None,
            data: InteractionData::default(),
        }
    }

    /// A chat-input command invocation.
    pub fn command(
        id: Snowflake,
        user_id: Snowflake,
        name: impl Into<String>,
        options: Vec<CommandDataOption>,
    ) -> Self {
        let mut interaction = Self::new(id, InteractionKind::ApplicationCommand, user_id);
        interaction.data.name = Some(name.into());
        interaction.data.options = options;
        interaction
    }

    /// Sets the originating channel (builder pattern).
    pub fn in_channel(mut self, channel_id: Snowflake, kind: ChannelType) -> Self {
        self.channel_id = Some(channel_id);
        self.channel_type = Some(kind);
        self
    }

    /// Sets the originating guild (builder pattern).
    pub fn in_guild(mut self, guild_id: Snowflake) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    pub fn custom_id(&self) -> Option<&str> {
        self.data.custom_id.as_deref()
    }
}
