//! Error taxonomy for the Conveyor meta-transaction flow.
//!
//! Protocol-level failures (`SignatureVerificationFailed`, `UnsupportedChain`,
//! `UnsupportedFeeToken`, `RelayRejected`, `ReceiptTimeout`) are surfaced to
//! callers before or instead of a relay outcome. A forwarded call that failed
//! on-chain is *not* an error here: the forwarder records it in its status
//! event without reverting, so it travels back inside
//! [`RelayResponse`](crate::types::RelayResponse) with `success == false`.

use alloy_primitives::{Address, TxHash};
use alloy_provider::PendingTransactionError;
use alloy_transport::TransportError;

/// Errors produced while constructing, dispatching, or resolving a
/// gas-sponsored call.
#[derive(Debug, thiserror::Error)]
pub enum ConveyorError {
    /// The recovered signer does not match the expected address, or recovery
    /// yielded the zero address. Never retried.
    #[error("signature verification failed: expected {expected}, recovered {recovered}")]
    SignatureVerificationFailed {
        expected: Address,
        recovered: Address,
    },

    /// No price source is configured for the chain.
    #[error("no price source coverage for chain id {0}")]
    UnsupportedChain(u64),

    /// The price source returned no data for the fee token. Absence of price
    /// data is a hard failure, never a zero fee.
    #[error("no price data for fee token {0}")]
    UnsupportedFeeToken(Address),

    /// The relay acknowledged the request but refused to execute it, or its
    /// reply was unusable.
    #[error("relay rejected the request: {0}")]
    RelayRejected(String),

    /// The receipt for a relayed transaction never materialized within the
    /// configured polling budget.
    #[error("no receipt for transaction {0} after {1} attempts")]
    ReceiptTimeout(TxHash, u32),

    /// Fee conversion math left the representable range.
    #[error("fee computation failed: {0}")]
    FeeComputation(String),

    /// Invalid construction-time configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Signer(#[from] alloy_signer::Error),

    #[error(transparent)]
    Contract(#[from] alloy_contract::Error),

    #[error(transparent)]
    Rpc(#[from] TransportError),

    #[error(transparent)]
    PendingTransaction(#[from] PendingTransactionError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
