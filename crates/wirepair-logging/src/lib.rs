//! Structured logging for Wirepair
//!
//! Every worker in the stack logs through `tracing` with structured fields
//! (`controller`, `line`, `kind`, ...). This crate assembles the subscriber:
//! JSONL to the console by default for log aggregation, or pretty
//! human-readable output for development.
//!
//! # Quick Start
//!
//! ```ignore
//! use wirepair_logging::{LogConfig, WirepairSubscriberBuilder};
//!
//! // JSONL at info level
//! WirepairSubscriberBuilder::new().init();
//!
//! // Pretty output at debug level
//! WirepairSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! `RUST_LOG` overrides the configured default level as usual.

pub mod config;

pub use config::{ConsoleConfig, LogConfig};

use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Builder for configuring and initializing the Wirepair logging subscriber
pub struct WirepairSubscriberBuilder {
    config: LogConfig,
}

impl WirepairSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    ///
    /// Default: JSONL output at info level
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Override just the default level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Install the subscriber globally
    ///
    /// Panics if a global subscriber is already set; use [`try_init`] in
    /// tests where several components may race to install one.
    ///
    /// [`try_init`]: Self::try_init
    pub fn init(self) {
        self.try_init()
            .expect("global tracing subscriber already set");
    }

    /// Install the subscriber globally, ignoring failure if one exists
    pub fn try_init(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let registry = Registry::default().with(filter);
        if self.config.console.pretty {
            registry
                .with(fmt::layer().with_ansi(self.config.console.ansi))
                .try_init()?;
        } else {
            registry
                .with(fmt::layer().json().with_ansi(false))
                .try_init()?;
        }
        Ok(())
    }
}

impl Default for WirepairSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}
