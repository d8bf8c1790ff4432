//! Resolves the true outcome of a relayed call from its receipt.
//!
//! The wrapping transaction can succeed on-chain while the forwarded call
//! inside it failed: the forwarder emits a `MetaStatus` event instead of
//! reverting so the fee can still be charged. Trusting the relay's reply or
//! the transaction status alone therefore produces false positives; the only
//! reliable source is the receipt's logs.
//!
//! Receipt polling is bounded by the configured
//! [`ReceiptPolicy`](crate::config::ReceiptPolicy) with exponential backoff;
//! exhausting it surfaces [`ConveyorError::ReceiptTimeout`].

use alloy_primitives::{Address, TxHash, U256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::{Log, TransactionReceipt};
use alloy_sol_types::SolEvent;
use tracing::{debug, warn};

use crate::config::ReceiptPolicy;
use crate::contracts::{META_STATUS_TOPIC, MetaStatus, TRANSFER_TOPIC, Transfer};
use crate::error::ConveyorError;
use crate::types::{RelayOutcome, RelayResponse};

/// Inspects receipts for the forwarder's status event and fee transfers.
#[derive(Debug)]
pub struct ReceiptVerifier<P> {
    provider: P,
    policy: ReceiptPolicy,
}

impl<P: Provider> ReceiptVerifier<P> {
    pub fn new(provider: P, policy: ReceiptPolicy) -> Self {
        Self { provider, policy }
    }

    /// Polls for the receipt of `txn_hash` under the bounded backoff
    /// schedule. The relay's HTTP reply can arrive before the transaction is
    /// mined, so absence of a receipt is expected at first.
    pub async fn wait_for_receipt(
        &self,
        txn_hash: TxHash,
    ) -> Result<TransactionReceipt, ConveyorError> {
        let mut backoff = self.policy.initial_backoff;
        for attempt in 1..=self.policy.max_attempts {
            if let Some(receipt) = self.provider.get_transaction_receipt(txn_hash).await? {
                return Ok(receipt);
            }
            debug!(%txn_hash, attempt, backoff_ms = backoff.as_millis() as u64, "receipt not yet available");
            if attempt < self.policy.max_attempts {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(self.policy.max_backoff);
            }
        }
        Err(ConveyorError::ReceiptTimeout(
            txn_hash,
            self.policy.max_attempts,
        ))
    }

    /// Resolves the relay's acknowledgment against the on-chain receipt,
    /// overriding `success` with the forwarder's status event when the
    /// forwarded call failed. The transaction hash is preserved either way.
    pub async fn resolve(&self, response: RelayResponse) -> Result<RelayResponse, ConveyorError> {
        let txn_hash = response.result.txn_hash.ok_or_else(|| {
            ConveyorError::RelayRejected(
                "relay reported success without a transaction hash".to_string(),
            )
        })?;
        let receipt = self.wait_for_receipt(txn_hash).await?;
        Ok(resolve_from_logs(response, receipt.inner.logs()))
    }

    /// Net fee retained by `fee_collector` in the transaction: `fee_token`
    /// transfers in, minus refund transfers back out.
    pub async fn compute_charged_fee(
        &self,
        txn_hash: TxHash,
        fee_token: Address,
        fee_collector: Address,
    ) -> Result<U256, ConveyorError> {
        let receipt = self.wait_for_receipt(txn_hash).await?;
        Ok(charged_fee_from_logs(receipt.inner.logs(), fee_token, fee_collector))
    }
}

/// Applies the forwarder's status event, if present in `logs`, to the relay's
/// acknowledgment.
pub fn resolve_from_logs(response: RelayResponse, logs: &[Log]) -> RelayResponse {
    for log in logs {
        if log.topic0() != Some(&META_STATUS_TOPIC) {
            continue;
        }
        let Ok(status) = MetaStatus::decode_log(&log.inner) else {
            continue;
        };
        let status = status.data;
        if !status.success {
            warn!(error = %status.error, "forwarded call failed on-chain");
            return RelayResponse {
                result: RelayOutcome {
                    success: false,
                    error_message: Some(status.error.clone()),
                    txn_hash: response.result.txn_hash,
                },
                ..response
            };
        }
    }
    response
}

/// Sums `fee_token` transfers into `fee_collector` and subtracts transfers
/// out of it (refunds of an over-estimated fee). Only events emitted by the
/// fee token contract count; the forwarded call may move other tokens through
/// the collector in the same transaction.
pub fn charged_fee_from_logs(logs: &[Log], fee_token: Address, fee_collector: Address) -> U256 {
    let mut inflow = U256::ZERO;
    let mut outflow = U256::ZERO;
    for log in logs {
        if log.inner.address != fee_token || log.topic0() != Some(&TRANSFER_TOPIC) {
            continue;
        }
        let Ok(transfer) = Transfer::decode_log(&log.inner) else {
            continue;
        };
        let transfer = transfer.data;
        if transfer.to == fee_collector {
            inflow += transfer.value;
        } else if transfer.from == fee_collector {
            outflow += transfer.value;
        }
    }
    inflow.saturating_sub(outflow)
}
