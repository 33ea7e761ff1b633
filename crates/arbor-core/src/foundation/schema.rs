//! Application command schemas.
//!
//! Only the fields the router walks are typed. Everything else (localizations,
//! choices, min/max constraints, ...) rides along in `extra` so schemas
//! round-trip to the upsert transport untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Application command option types, with the platform's discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum OptionType {
    SubCommand = 1,
    SubCommandGroup = 2,
    String = 3,
    Integer = 4,
    Boolean = 5,
    User = 6,
    Channel = 7,
    Role = 8,
    Mentionable = 9,
    Number = 10,
    Attachment = 11,
}

impl OptionType {
    /// Returns `true` for option kinds that form part of a routing path.
    pub const fn is_routable(self) -> bool {
        matches!(self, Self::SubCommand | Self::SubCommandGroup)
    }
}

impl From<OptionType> for u8 {
    fn from(kind: OptionType) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for OptionType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::SubCommand,
            2 => Self::SubCommandGroup,
            3 => Self::String,
            4 => Self::Integer,
            5 => Self::Boolean,
            6 => Self::User,
            7 => Self::Channel,
            8 => Self::Role,
            9 => Self::Mentionable,
            10 => Self::Number,
            11 => Self::Attachment,
            other => return Err(format!("unknown option type: {other}")),
        })
    }
}

/// One declared option of a command schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    #[serde(rename = "type")]
    pub kind: OptionType,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CommandOption {
    pub fn new(kind: OptionType, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
            required: false,
            options: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn subcommand(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::SubCommand, name, description)
    }

    pub fn group(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::SubCommandGroup, name, description)
    }

    /// Marks the option as required (builder pattern).
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Appends a nested option (builder pattern).
    pub fn option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }
}

/// A chat-input command schema as registered with the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CommandSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Appends a top-level option (builder pattern).
    pub fn option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }
}
