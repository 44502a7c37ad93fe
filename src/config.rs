//! Bridge configuration.
//!
//! Loaded by the `config` crate from an optional TOML file, overridden by
//! `REHAB_BRIDGE__<SECTION>__<KEY>` environment variables, e.g.
//! `REHAB_BRIDGE__TRANSPORT__PORT=5556`.
//!
//! ```toml
//! frame_rate_hz = 60.0
//!
//! [transport]
//! host = "127.0.0.1"
//! port = 5555
//!
//! [session]
//! stale_timeout_ms = 2000
//! tick_gap_warning = 10
//!
//! [[catalog]]
//! key = "Avatar"
//! kind = "player"
//!
//! [[catalog]]
//! key = "Cup"
//! kind = "object"
//! ```

use crate::registry::{Template, TemplateCatalog};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "REHAB_BRIDGE";

const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Interface to bind the REP socket on.
    pub host: String,
    pub port: u16,
    /// Pause after each reply. Throttles the exchange to the planner's pace.
    pub reply_delay_ms: u64,
    /// How often to re-check for an outbound payload while holding a reply.
    pub poll_interval_ms: u64,
}

impl TransportConfig {
    pub fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5555,
            reply_delay_ms: 100,
            poll_interval_ms: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// No tick advance for this long resets the session.
    pub stale_timeout_ms: u64,
    /// A forward jump larger than this is logged as possible message loss.
    pub tick_gap_warning: i64,
}

impl SessionConfig {
    pub fn stale_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stale_timeout_ms: 2000,
            tick_gap_warning: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub transport: TransportConfig,
    pub session: SessionConfig,
    /// Spawnable templates keyed by the planner's `model.type`.
    pub catalog: Vec<Template>,
    /// Host frame loop rate.
    pub frame_rate_hz: f32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            session: SessionConfig::default(),
            catalog: Vec::new(),
            frame_rate_hz: 60.0,
        }
    }
}

impl BridgeConfig {
    /// Defaults, then `path` (if given and present), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml(text: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn template_catalog(&self) -> TemplateCatalog {
        self.catalog.iter().cloned().collect()
    }

    /// Period of the host frame loop, between 1 ms and 1 s.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.frame_rate_hz.max(1.0)).max(MIN_FRAME_INTERVAL)
    }
}
