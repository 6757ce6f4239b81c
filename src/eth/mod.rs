//! Pre-stake verification against an external ledger.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{Config, LedgerMode};
use crate::error::SettleError;

pub mod client;

pub use client::EthereumLedger;

#[derive(Debug, Clone, Serialize)]
pub struct LedgerReceipt {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Ledger record as returned by the chain, for audit logs.
    pub raw: serde_json::Value,
}

impl LedgerReceipt {
    pub fn rejected(reason: impl Into<String>, raw: serde_json::Value) -> Self {
        Self {
            verified: false,
            reason: Some(reason.into()),
            raw,
        }
    }
}

#[async_trait]
pub trait LedgerVerifier: Send + Sync {
    /// Checks that `tx_ref` moved at least `expected_amount` from `sender`.
    async fn verify(
        &self,
        tx_ref: &str,
        sender: &str,
        expected_amount: f64,
    ) -> Result<LedgerReceipt, SettleError>;
}

/// Rejects every staked submission; votes still go through.
pub struct DisabledLedger;

#[async_trait]
impl LedgerVerifier for DisabledLedger {
    async fn verify(&self, _: &str, _: &str, _: f64) -> Result<LedgerReceipt, SettleError> {
        Ok(LedgerReceipt::rejected(
            "ledger verification is not configured",
            serde_json::Value::Null,
        ))
    }
}

/// Development ledger that accepts any transaction reference.
pub struct TrustingLedger;

#[async_trait]
impl LedgerVerifier for TrustingLedger {
    async fn verify(
        &self,
        tx_ref: &str,
        sender: &str,
        expected_amount: f64,
    ) -> Result<LedgerReceipt, SettleError> {
        tracing::warn!(tx_ref, sender, expected_amount, "accepting stake without ledger check");
        Ok(LedgerReceipt {
            verified: true,
            reason: None,
            raw: serde_json::json!({ "tx_ref": tx_ref, "trusted": true }),
        })
    }
}

pub fn from_config(config: &Config) -> anyhow::Result<Box<dyn LedgerVerifier>> {
    let ledger: Box<dyn LedgerVerifier> = match config.ledger_mode {
        LedgerMode::Disabled => Box::new(DisabledLedger),
        LedgerMode::Trust => Box::new(TrustingLedger),
        LedgerMode::Ethereum => {
            let rpc = config
                .rpc_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("RPC_URL is required for the ethereum ledger"))?;
            let treasury = config
                .treasury_address
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("TREASURY_ADDRESS is required for the ethereum ledger"))?;
            Box::new(EthereumLedger::new(rpc, treasury)?)
        }
    };
    Ok(ledger)
}
