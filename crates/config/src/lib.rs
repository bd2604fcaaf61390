#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! Typed environment/CLI configuration for the provider daemon (§6, §11 of
//! the design docs).
//!
//! Daemon-scoped values are environment-first, following this workspace's
//! convention of `clap::Parser` CLI overrides layered over `env = "..."`
//! defaults. Per-provider values are parsed out of `PROVIDER_PRIVATE_KEY_<tag>`-
//! style suffixed environment variables, one set per configured provider tag.

use std::collections::BTreeMap;
use std::time::Duration;

use clap::Parser;
use providerd_types::address::Address;
use thiserror::Error;

/// Failures loading or validating daemon configuration. All fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable {0}")]
    MissingVar(String),
    /// A value failed to parse into its expected shape.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// The environment variable or field name.
        key: String,
        /// Why parsing failed.
        reason: String,
    },
    /// No provider tags were discovered (no `PROVIDER_PRIVATE_KEY_*` vars set).
    #[error("no provider configuration found (expected at least one PROVIDER_PRIVATE_KEY_<tag>)")]
    NoProviders,
}

/// CLI overrides layered over the environment, mirroring the `GuardianOpts`
/// shape this workspace uses for its daemon binaries.
#[derive(Parser, Debug, Clone)]
#[command(name = "providerd", about = "Provider daemon")]
pub struct Cli {
    /// Directory holding `details/` and an optional `spec.*`/`oas.*` file.
    #[clap(long, env = "PROVIDERD_DATA_DIR", default_value = "data")]
    pub data_dir: String,

    /// Optional TOML file providing defaults for any unset environment variable.
    #[clap(long, env = "PROVIDERD_CONFIG_FILE")]
    pub config_file: Option<String>,
}

/// Chain to connect to.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Chain {
    /// Local development chain.
    Anvil,
    /// Optimism mainnet.
    Optimism,
    /// Optimism Sepolia testnet.
    OptimismSepolia,
    /// Base mainnet.
    Base,
    /// Base Sepolia testnet.
    BaseSepolia,
}

impl std::str::FromStr for Chain {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anvil" => Ok(Chain::Anvil),
            "optimism" => Ok(Chain::Optimism),
            "optimism-sepolia" => Ok(Chain::OptimismSepolia),
            "base" => Ok(Chain::Base),
            "base-sepolia" => Ok(Chain::BaseSepolia),
            other => Err(ConfigError::InvalidValue {
                key: "CHAIN".into(),
                reason: format!("unknown chain {other}"),
            }),
        }
    }
}

/// Per-provider configuration, one instance per configured `<tag>` suffix.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// The `<tag>` suffix this configuration was parsed from.
    pub tag: String,
    /// Hex-encoded provider private key.
    pub provider_private_key: String,
    /// Hex-encoded billing private key.
    pub billing_private_key: String,
    /// Hex-encoded operator private key.
    pub operator_private_key: String,
    /// Port the operator pipe listens on.
    pub operator_pipe_port: u16,
    /// Explicit protocol override, if configured.
    pub protocol_address: Option<Address>,
    /// `true` if this provider fronts virtual children.
    pub is_gateway: bool,
}

/// Daemon-wide configuration, assembled from the environment.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Database connection string for the (external) relational store.
    pub database_url: String,
    /// RPC endpoint for the chain client.
    pub rpc_host: String,
    /// Base URL of the indexer REST service.
    pub indexer_endpoint: String,
    /// Minimum log level.
    pub log_level: String,
    /// `dev` or `production`.
    pub node_env: String,
    /// Target chain.
    pub chain: Chain,
    /// Port the health/metrics server listens on.
    pub port: u16,
    /// Requests per window for the router's rate limiter.
    pub rate_limit: u32,
    /// Window duration for the rate limiter.
    pub rate_limit_window: Duration,
    /// Registry contract address, if configured.
    pub registry_address: Option<Address>,
    /// Interval between reconciler ticks.
    pub agreement_check_interval: Duration,
    /// Interval between balance-sweeper ticks.
    pub agreement_balance_check_interval: Duration,
    /// Number of blocks fetched per reconciler window.
    pub block_process_range: u64,
    /// Per-provider configuration, keyed by tag.
    pub providers: BTreeMap<String, ProviderConfig>,
}

fn env_var(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parses a duration of the form `<number>[s|m|h|d]`.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: "duration".into(),
        reason: format!("could not parse '{raw}' as <number>[s|m|h|d]"),
    };
    if raw.is_empty() {
        return Err(invalid());
    }
    let (digits, unit) = raw.split_at(raw.len() - 1);
    let (number_str, multiplier) = match unit {
        "s" => (digits, 1u64),
        "m" => (digits, 60),
        "h" => (digits, 3600),
        "d" => (digits, 86_400),
        _ => (raw, 1),
    };
    let number: u64 = number_str.parse().map_err(|_| invalid())?;
    Ok(Duration::from_secs(number.saturating_mul(multiplier)))
}

/// Discovers every `<tag>` suffix with a `PROVIDER_PRIVATE_KEY_<tag>`
/// environment variable set, and assembles its [`ProviderConfig`].
fn load_providers() -> Result<BTreeMap<String, ProviderConfig>, ConfigError> {
    const PREFIX: &str = "PROVIDER_PRIVATE_KEY_";
    let mut providers = BTreeMap::new();
    for (key, value) in std::env::vars() {
        let Some(tag) = key.strip_prefix(PREFIX) else {
            continue;
        };
        let protocol_address = std::env::var(format!("PROTOCOL_ADDRESS_{tag}"))
            .ok()
            .map(|s| s.parse())
            .transpose()
            .map_err(|_| ConfigError::InvalidValue {
                key: format!("PROTOCOL_ADDRESS_{tag}"),
                reason: "not a valid address".into(),
            })?;
        let port: u16 = env_var(&format!("OPERATOR_PIPE_PORT_{tag}"))?
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: format!("OPERATOR_PIPE_PORT_{tag}"),
                reason: "not a valid port".into(),
            })?;
        providers.insert(
            tag.to_string(),
            ProviderConfig {
                tag: tag.to_string(),
                provider_private_key: value,
                billing_private_key: env_var(&format!("BILLING_PRIVATE_KEY_{tag}"))?,
                operator_private_key: env_var(&format!("OPERATOR_PRIVATE_KEY_{tag}"))?,
                operator_pipe_port: port,
                protocol_address,
                is_gateway: env_var_or(&format!("GATEWAY_{tag}"), "false") == "true",
            },
        );
    }
    if providers.is_empty() {
        return Err(ConfigError::NoProviders);
    }
    Ok(providers)
}

/// Layers a TOML file's keys in as environment defaults, then assembles the
/// daemon configuration. Keys already set in the environment always win —
/// the file only fills gaps, mirroring the teacher's layering of `clap` CLI
/// overrides on top of environment defaults, one level further down.
///
/// Table keys are expected to match the environment variable names exactly
/// (e.g. `DATABASE_URL`, `PROVIDER_PRIVATE_KEY_alpha`). A missing or absent
/// `cli.config_file` simply falls through to [`load`].
pub fn load_with_overlay(cli: &Cli) -> Result<DaemonConfig, ConfigError> {
    if let Some(path) = &cli.config_file {
        apply_toml_overlay(path)?;
    }
    load()
}

fn apply_toml_overlay(path: &str) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|err| ConfigError::InvalidValue {
        key: "PROVIDERD_CONFIG_FILE".into(),
        reason: format!("could not read {path}: {err}"),
    })?;
    let table: toml::Value = contents.parse().map_err(|err| ConfigError::InvalidValue {
        key: "PROVIDERD_CONFIG_FILE".into(),
        reason: format!("invalid TOML in {path}: {err}"),
    })?;
    let Some(table) = table.as_table() else {
        return Err(ConfigError::InvalidValue {
            key: "PROVIDERD_CONFIG_FILE".into(),
            reason: "expected a TOML table of environment-variable defaults".into(),
        });
    };
    for (key, value) in table {
        if std::env::var(key).is_ok() {
            continue;
        }
        let value = match value {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        std::env::set_var(key, value);
    }
    Ok(())
}

/// Assembles the daemon configuration from the current process environment.
pub fn load() -> Result<DaemonConfig, ConfigError> {
    Ok(DaemonConfig {
        database_url: env_var("DATABASE_URL")?,
        rpc_host: env_var("RPC_HOST")?,
        indexer_endpoint: env_var("INDEXER_ENDPOINT")?,
        log_level: env_var_or("LOG_LEVEL", "debug"),
        node_env: env_var_or("NODE_ENV", "dev"),
        chain: env_var_or("CHAIN", "anvil").parse()?,
        port: env_var_or("PORT", "3000")
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "PORT".into(),
                reason: "not a valid port".into(),
            })?,
        rate_limit: env_var_or("RATE_LIMIT", "20")
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "RATE_LIMIT".into(),
                reason: "not a valid integer".into(),
            })?,
        rate_limit_window: parse_duration(&env_var_or("RATE_LIMIT_WINDOW", "1s"))?,
        registry_address: std::env::var("REGISTRY_ADDRESS")
            .ok()
            .map(|s| s.parse())
            .transpose()
            .map_err(|_| ConfigError::InvalidValue {
                key: "REGISTRY_ADDRESS".into(),
                reason: "not a valid address".into(),
            })?,
        agreement_check_interval: parse_duration(&env_var_or("AGREEMENT_CHECK_INTERVAL", "5s"))?,
        agreement_balance_check_interval: parse_duration(&env_var_or(
            "AGREEMENT_BALANCE_CHECK_INTERVAL",
            "5m",
        ))?,
        block_process_range: env_var_or("BLOCK_PROCESS_RANGE", "1000")
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "BLOCK_PROCESS_RANGE".into(),
                reason: "not a valid integer".into(),
            })?,
        providers: load_providers()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_suffixes() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
    }

    #[test]
    fn rejects_malformed_duration() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
    }

    #[test]
    fn chain_parses_known_values() {
        assert_eq!("anvil".parse::<Chain>().unwrap(), Chain::Anvil);
        assert!("unknown-chain".parse::<Chain>().is_err());
    }

    #[test]
    fn toml_overlay_fills_only_unset_keys() {
        std::env::set_var("PROVIDERD_TEST_OVERLAY_PRESET", "from-env");
        std::env::remove_var("PROVIDERD_TEST_OVERLAY_MISSING");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.toml");
        std::fs::write(
            &path,
            "PROVIDERD_TEST_OVERLAY_PRESET = \"from-file\"\nPROVIDERD_TEST_OVERLAY_MISSING = \"from-file\"\n",
        )
        .unwrap();

        apply_toml_overlay(path.to_str().unwrap()).unwrap();

        assert_eq!(std::env::var("PROVIDERD_TEST_OVERLAY_PRESET").unwrap(), "from-env");
        assert_eq!(std::env::var("PROVIDERD_TEST_OVERLAY_MISSING").unwrap(), "from-file");

        std::env::remove_var("PROVIDERD_TEST_OVERLAY_PRESET");
        std::env::remove_var("PROVIDERD_TEST_OVERLAY_MISSING");
    }
}
