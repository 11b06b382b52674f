//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use spine_domain::chain::CRONOS_TESTNET_CHAIN_ID;
use spine_exec::{SettlementConfig, SettlementMode};

use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Durable log locations
    pub storage: StorageConfig,

    /// Reference action executor settings
    pub execution: ExecutionConfig,

    /// Settlement adapter selection
    pub settlement: SettlementConfig,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Durable log locations.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Audit ledger journal
    pub audit_log_path: PathBuf,
    /// Idempotency store journal
    pub idempotency_log_path: PathBuf,
}

/// Reference action executor settings.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Delay applied to steps without a `delayMs` parameter
    pub action_delay: Duration,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Ok(Self {
            api: Self::load_api_config()?,
            storage: Self::load_storage_config(),
            execution: ExecutionConfig {
                action_delay: Duration::from_millis(load_env("SPINE_ACTION_DELAY_MS", 0u64)?),
            },
            settlement: Self::load_settlement_config()?,
            environment: Self::load_environment()?,
        })
    }

    /// Create test configuration.
    ///
    /// Journals live under `./data/test`; tests that touch disk should point
    /// `storage` at a scratch directory.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            storage: StorageConfig {
                audit_log_path: PathBuf::from("./data/test/audit.jsonl"),
                idempotency_log_path: PathBuf::from("./data/test/idempotency.jsonl"),
            },
            execution: ExecutionConfig {
                action_delay: Duration::ZERO,
            },
            settlement: SettlementConfig::default(),
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("SPINE_ENV").unwrap_or_else(|_| "development".to_string());
        env_str.parse()
    }

    fn load_api_config() -> DaemonResult<ApiConfig> {
        let host = env::var("SPINE_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = load_env("SPINE_API_PORT", 4000u16)?;

        Ok(ApiConfig { host, port })
    }

    fn load_storage_config() -> StorageConfig {
        StorageConfig {
            audit_log_path: env::var("SPINE_AUDIT_LOG_PATH")
                .unwrap_or_else(|_| "./data/audit.jsonl".to_string())
                .into(),
            idempotency_log_path: env::var("SPINE_IDEMPOTENCY_LOG_PATH")
                .unwrap_or_else(|_| "./data/idempotency.jsonl".to_string())
                .into(),
        }
    }

    fn load_settlement_config() -> DaemonResult<SettlementConfig> {
        let mode = match env::var("X402_MODE") {
            Ok(val) => val
                .parse::<SettlementMode>()
                .map_err(|_| DaemonError::Config(format!("Invalid X402_MODE: {}", val)))?,
            Err(_) => SettlementMode::Mock,
        };

        Ok(SettlementConfig {
            mode,
            facilitator_url: env::var("X402_FACILITATOR_URL").ok().filter(|u| !u.trim().is_empty()),
            facilitator_timeout: Duration::from_secs(load_env(
                "X402_FACILITATOR_TIMEOUT_SECS",
                30u64,
            )?),
            chain_id: load_env("CRONOS_CHAIN_ID", CRONOS_TESTNET_CHAIN_ID)?,
        })
    }
}

/// Read `key`, falling back to `default` when unset.
fn load_env<T: FromStr>(key: &str, default: T) -> DaemonResult<T> {
    match env::var(key) {
        Ok(val) => parse_var(key, &val),
        Err(_) => Ok(default),
    }
}

fn parse_var<T: FromStr>(key: &str, val: &str) -> DaemonResult<T> {
    val.trim()
        .parse::<T>()
        .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val)))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 4000,
            },
            storage: StorageConfig {
                audit_log_path: PathBuf::from("./data/audit.jsonl"),
                idempotency_log_path: PathBuf::from("./data/idempotency.jsonl"),
            },
            execution: ExecutionConfig {
                action_delay: Duration::ZERO,
            },
            settlement: SettlementConfig::default(),
            environment: Environment::Development,
        }
    }
}

impl FromStr for Environment {
    type Err = DaemonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid SPINE_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.port, 4000);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.settlement.mode, SettlementMode::Mock);
        assert_eq!(config.settlement.chain_id, 338);
        assert_eq!(config.storage.audit_log_path, PathBuf::from("./data/audit.jsonl"));
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.api.port, 0);
        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.execution.action_delay, Duration::ZERO);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("TEST".parse::<Environment>().unwrap(), Environment::Test);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Test.to_string(), "test");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Production.to_string(), "production");
    }

    #[test]
    fn test_parse_var_names_the_variable() {
        assert_eq!(parse_var::<u16>("SPINE_API_PORT", " 8081 ").unwrap(), 8081);

        let err = parse_var::<u16>("SPINE_API_PORT", "eighty").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid SPINE_API_PORT value: eighty"
        );
    }
}
