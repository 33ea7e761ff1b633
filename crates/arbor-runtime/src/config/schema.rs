//! Configuration schema definitions.
//!
//! Every field has a serde default, so an empty file (or no file at all)
//! yields a working configuration.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use arbor_core::{CommandScope, Snowflake};
use arbor_framework::{InteractionToggles, PipelineConfig};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArborConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub framework: FrameworkConfig,

    #[serde(default)]
    pub commands: CommandsConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Global log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Written to `logging.file_path`.
    File,
}

/// When the log file is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Minutely,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level. `RUST_LOG` takes precedence when set.
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub span_events: SpanEventConfig,
    pub thread_ids: bool,
    /// Include file names and line numbers.
    pub file_location: bool,
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Rolled files kept on disk. Zero keeps all of them.
    pub max_files: u32,
    /// Per-module levels, e.g. `arbor_framework = "debug"`.
    pub filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            max_files: 5,
            filters: HashMap::new(),
        }
    }
}

// =============================================================================
// Framework
// =============================================================================

fn default_state_ttl_ms() -> u64 {
    300_000
}

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkConfig {
    /// The bot's own user id. Learned from `READY` when absent.
    #[serde(default)]
    pub bot_id: Option<Snowflake>,

    /// Users allowed through developer-only handlers.
    #[serde(default)]
    pub developers: Vec<Snowflake>,

    /// Default lifetime of component state entries.
    #[serde(default = "default_state_ttl_ms")]
    pub state_ttl_ms: u64,

    /// Subscribers running longer than this are failed by the dispatch bus.
    #[serde(default)]
    pub handler_timeout_ms: Option<u64>,

    #[serde(default)]
    pub interactions: InteractionToggles,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            bot_id: None,
            developers: Vec::new(),
            state_ttl_ms: default_state_ttl_ms(),
            handler_timeout_ms: None,
            interactions: InteractionToggles::default(),
        }
    }
}

impl FrameworkConfig {
    pub fn state_ttl(&self) -> Duration {
        Duration::from_millis(self.state_ttl_ms)
    }

    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }

    /// Converts to the pipeline's settings.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            bot_id: self.bot_id,
            developers: self.developers.iter().copied().collect(),
            interactions: self.interactions,
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

fn default_upsert_on_ready() -> bool {
    true
}

/// Command schema registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default)]
    pub scope: CommandScope,

    /// Push the merged schemas the first time `READY` arrives.
    #[serde(default = "default_upsert_on_ready")]
    pub upsert_on_ready: bool,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            scope: CommandScope::default(),
            upsert_on_ready: default_upsert_on_ready(),
        }
    }
}
