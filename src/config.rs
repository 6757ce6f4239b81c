use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMode {
    /// Every staked submission is rejected.
    Disabled,
    /// Development only: stakes are accepted without checking the chain.
    Trust,
    Ethereum,
}

impl FromStr for LedgerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" => Ok(LedgerMode::Disabled),
            "trust" => Ok(LedgerMode::Trust),
            "ethereum" | "eth" => Ok(LedgerMode::Ethereum),
            other => bail!("unknown LEDGER_MODE {other:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub resolver_enabled: bool,
    pub resolver_interval: Duration,
    pub store_timeout: Duration,
    pub lock_timeout: Duration,
    pub ledger_mode: LedgerMode,
    pub ledger_timeout: Duration,
    pub rpc_url: Option<String>,
    pub treasury_address: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://poolsettle.db?mode=rwc".to_string(),
            db_max_connections: 5,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            resolver_enabled: true,
            resolver_interval: Duration::from_secs(60),
            store_timeout: Duration::from_secs(10),
            lock_timeout: Duration::from_secs(10),
            ledger_mode: LedgerMode::Disabled,
            ledger_timeout: Duration::from_secs(15),
            rpc_url: None,
            treasury_address: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let config = Config {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            bind_addr: parse_or(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            resolver_enabled: parse_or(&lookup, "RESOLVER_ENABLED", defaults.resolver_enabled)?,
            resolver_interval: secs_or(&lookup, "RESOLVER_INTERVAL_SECS", defaults.resolver_interval)?,
            store_timeout: secs_or(&lookup, "STORE_TIMEOUT_SECS", defaults.store_timeout)?,
            lock_timeout: secs_or(&lookup, "LOCK_TIMEOUT_SECS", defaults.lock_timeout)?,
            ledger_mode: parse_or(&lookup, "LEDGER_MODE", defaults.ledger_mode)?,
            ledger_timeout: secs_or(&lookup, "LEDGER_TIMEOUT_SECS", defaults.ledger_timeout)?,
            rpc_url: lookup("RPC_URL"),
            treasury_address: lookup("TREASURY_ADDRESS"),
        };

        if config.resolver_interval.is_zero() {
            bail!("RESOLVER_INTERVAL_SECS must be greater than zero");
        }
        if config.ledger_mode == LedgerMode::Ethereum
            && (config.rpc_url.is_none() || config.treasury_address.is_none())
        {
            bail!("LEDGER_MODE=ethereum requires RPC_URL and TREASURY_ADDRESS");
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid {key}={raw:?}")),
        None => Ok(default),
    }
}

fn secs_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(lookup, key, default.as_secs())?;
    Ok(Duration::from_secs(secs))
}
