use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::prelude::*;
use ethers::utils::parse_ether;

use super::{LedgerReceipt, LedgerVerifier};
use crate::error::SettleError;

/// Verifies stake transfers to the treasury over a JSON-RPC endpoint.
pub struct EthereumLedger {
    provider: Provider<Http>,
    treasury: Address,
}

impl EthereumLedger {
    pub fn new(rpc_url: &str, treasury: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .with_context(|| format!("invalid RPC_URL {rpc_url:?}"))?;
        let treasury: Address = treasury
            .parse()
            .with_context(|| format!("invalid TREASURY_ADDRESS {treasury:?}"))?;

        Ok(Self { provider, treasury })
    }
}

fn unavailable(e: ProviderError) -> SettleError {
    SettleError::LedgerUnavailable(e.to_string())
}

#[async_trait]
impl LedgerVerifier for EthereumLedger {
    async fn verify(
        &self,
        tx_ref: &str,
        sender: &str,
        expected_amount: f64,
    ) -> Result<LedgerReceipt, SettleError> {
        let null = serde_json::Value::Null;

        let Ok(hash) = tx_ref.parse::<H256>() else {
            return Ok(LedgerReceipt::rejected("malformed transaction hash", null));
        };
        let Ok(sender) = sender.parse::<Address>() else {
            return Ok(LedgerReceipt::rejected("subject is not an address", null));
        };
        let Ok(expected) = parse_ether(expected_amount) else {
            return Ok(LedgerReceipt::rejected("stake amount not representable in wei", null));
        };

        let Some(tx) = self.provider.get_transaction(hash).await.map_err(unavailable)? else {
            return Ok(LedgerReceipt::rejected("transaction not found", null));
        };
        let raw = serde_json::to_value(&tx).unwrap_or(serde_json::Value::Null);

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(unavailable)?;

        let succeeded = receipt
            .as_ref()
            .and_then(|r| r.status)
            .is_some_and(|status| status == U64::from(1u64));

        let reason = if !succeeded {
            Some("transaction not confirmed")
        } else if tx.from != sender {
            Some("sender mismatch")
        } else if tx.to != Some(self.treasury) {
            Some("recipient is not the treasury")
        } else if tx.value < expected {
            Some("transferred value below stake")
        } else {
            None
        };

        Ok(match reason {
            Some(reason) => LedgerReceipt::rejected(reason, raw),
            None => LedgerReceipt {
                verified: true,
                reason: None,
                raw,
            },
        })
    }
}
