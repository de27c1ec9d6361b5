//! `GatewayConfig`: defaults → `gateway.toml` → `GATEWAY_`-prefixed
//! environment variables, layered with the `config` crate the way
//! `turbomcp-server`'s `ServerConfig` is assembled, with a thin `clap`
//! CLI wrapper over the same fields (SPEC_FULL.md §A.3).

use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub bind_address: String,
    /// Default TTL for a background task once it reaches a terminal
    /// state (spec.md §5).
    #[serde(with = "humantime_secs")]
    pub task_ttl: Duration,
    /// How often the Background-Task Engine's monitor loop polls the
    /// workflow engine for a non-terminal run (spec.md §4.4, "≈ 2 seconds").
    #[serde(with = "humantime_secs")]
    pub task_poll_interval: Duration,
    pub mcp_endpoint_path: String,
    pub max_message_bytes: usize,
    /// Idle-session reaper interval (SPEC_FULL.md §B, "Session idle expiry").
    #[serde(with = "humantime_secs")]
    pub session_idle_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8787".to_string(),
            task_ttl: Duration::from_secs(12 * 60 * 60),
            task_poll_interval: Duration::from_secs(2),
            mcp_endpoint_path: "/studio-mcp".to_string(),
            max_message_bytes: 4 * 1024 * 1024,
            session_idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl GatewayConfig {
    /// Layer defaults, an optional `gateway.toml`, and `GATEWAY_`-prefixed
    /// environment variables, mirroring `turbomcp-server`'s use of the
    /// `config` crate.
    pub fn load(config_path: Option<&str>) -> GatewayResult<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&defaults)
                .map_err(|e| GatewayError::Validation(format!("default config is malformed: {e}")))?,
        );

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        } else {
            builder = builder.add_source(config::File::with_name("gateway").required(false));
        }

        builder = builder.add_source(config::Environment::with_prefix("GATEWAY").separator("_"));

        let built = builder
            .build()
            .map_err(|e| GatewayError::Validation(format!("failed to load configuration: {e}")))?;
        built
            .try_deserialize()
            .map_err(|e| GatewayError::Validation(format!("invalid configuration: {e}")))
    }
}

/// CLI wrapper over [`GatewayConfig`]'s most commonly overridden fields,
/// following `turbomcp-cli`'s pattern of a config struct plus a thin
/// argument layer rather than a parallel set of options.
#[derive(Debug, Parser)]
#[command(name = "studio-mcp-gateway", about = "Studio MCP Gateway server")]
pub struct Cli {
    /// Path to a gateway.toml-style config file (without the extension).
    #[arg(long, env = "GATEWAY_CONFIG")]
    pub config: Option<String>,

    /// Override the bind address from the loaded configuration.
    #[arg(long, env = "GATEWAY_BIND")]
    pub bind: Option<String>,
}

impl Cli {
    pub fn resolve(self) -> GatewayResult<GatewayConfig> {
        let mut config = GatewayConfig::load(self.config.as_deref())?;
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        Ok(config)
    }
}

mod humantime_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        value.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.task_ttl, Duration::from_secs(12 * 60 * 60));
        assert_eq!(config.task_poll_interval, Duration::from_secs(2));
        assert_eq!(config.mcp_endpoint_path, "/studio-mcp");
    }
}
