//! # Arbor Runtime
//!
//! Runtime orchestration for the Arbor interaction engine.
//!
//! - **Configuration**: typed settings from TOML/YAML files and `ARBOR_*`
//!   environment variables, see [`config`]
//! - **Logging**: `tracing-subscriber` setup driven by that configuration
//! - **Runtime**: [`ArborRuntime`] pumps gateway events through the dispatch
//!   bus into the interaction pipeline
//!
//! ## Example
//!
//! ```rust,ignore
//! use arbor_runtime::ArborRuntime;
//!
//! let runtime = ArborRuntime::builder()
//!     .cache(cache)
//!     .responder(responder)
//!     .transport(transport)
//!     .router(router)
//!     .build()?;
//!
//! runtime.run(events).await?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    ArborConfig, CommandsConfig, ConfigError, ConfigLoader, ConfigResult, FrameworkConfig,
    LoggingConfig, Profile, validate_config,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents, init_from_config};
pub use runtime::{ArborRuntime, RuntimeBuilder};

// Re-export tracing for downstream crates.
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for use inside handlers.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
