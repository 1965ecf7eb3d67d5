use std::{collections::HashSet, path::Path};

use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{chain::ChainConfig, error::EngineError};

/// Environment variables with this prefix override file values, with `__`
/// separating nested keys: `AAKIT__POLLING__TIMEOUT_MS=60000`.
pub const ENV_PREFIX: &str = "AAKIT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Multipliers applied to bundler gas estimates, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub pre_verification_gas_percent: u32,
    pub verification_gas_percent: u32,
    pub call_gas_percent: u32,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            pre_verification_gas_percent: 100,
            verification_gas_percent: 100,
            call_gas_percent: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Upper bound for the backoff interval. Equal to `interval_ms` for a fixed interval.
    pub max_interval_ms: u64,
    pub timeout_ms: u64,
    /// Consecutive transient transport failures tolerated before giving up.
    pub max_transient_retries: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            max_interval_ms: 8_000,
            timeout_ms: 120_000,
            max_transient_retries: 3,
        }
    }
}

impl EngineConfig {
    /// Load from a YAML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let builder = Config::builder()
            .add_source(File::from(path.as_ref()).format(FileFormat::Yaml))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true));
        Self::finish(builder.build()?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, EngineError> {
        Self::from_yaml_with_env(yaml, Environment::with_prefix(ENV_PREFIX))
    }

    fn from_yaml_with_env(yaml: &str, env: Environment) -> Result<Self, EngineError> {
        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .add_source(env.separator("__").try_parsing(true))
            .build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self, EngineError> {
        let engine: EngineConfig = config.try_deserialize()?;
        engine.validate()?;
        tracing::debug!(chains = engine.chains.len(), "loaded engine configuration");
        Ok(engine)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                return Err(EngineError::ConfigError {
                    message: format!("Chain {} is configured more than once", chain.chain_id),
                });
            }
        }

        if self.polling.interval_ms == 0 {
            return Err(EngineError::ConfigError {
                message: "polling.interval_ms must be positive".to_string(),
            });
        }
        if self.polling.max_interval_ms < self.polling.interval_ms {
            return Err(EngineError::ConfigError {
                message: "polling.max_interval_ms must not be below polling.interval_ms"
                    .to_string(),
            });
        }

        let gas = &self.gas;
        if gas.pre_verification_gas_percent == 0
            || gas.verification_gas_percent == 0
            || gas.call_gas_percent == 0
        {
            return Err(EngineError::ConfigError {
                message: "gas multipliers must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|chain| chain.chain_id == chain_id)
    }
}
