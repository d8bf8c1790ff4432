//! Gas-sponsored meta-transactions for Conveyor-protected contracts.
//!
//! Instead of paying network fees directly, a caller signs an EIP-712
//! forward request authorizing the Conveyor forwarder to execute the call on
//! their behalf and collect a fee in an ERC-20 token. This crate builds and
//! signs those requests, optionally bundles a token permit so no prior
//! approval transaction is needed, dispatches them to a relay, and resolves
//! the forwarded call's true outcome from the receipt logs (the forwarder
//! records failure in an event instead of reverting, so neither the relay's
//! reply nor the transaction status alone can be trusted).
//!
//! # Usage
//!
//! ```ignore
//! use alloy_provider::ProviderBuilder;
//! use alloy_signer_local::PrivateKeySigner;
//! use conveyor_rs::{Conveyor, ConveyorConfig, ConveyorEnvironment, SubmitOptions};
//!
//! let provider = ProviderBuilder::new().connect_http("https://polygon-rpc.com".parse()?);
//! let signer: PrivateKeySigner = private_key.parse()?;
//! let config = ConveyorConfig::for_environment(ConveyorEnvironment::Production, 137);
//! let conveyor = Conveyor::new(provider, signer, config)?;
//!
//! let response = conveyor.submit_with_permit(&options).await?;
//! ```
//!
//! # Modules
//!
//! - [`conveyor`]: the orchestrator façade.
//! - [`signing`]: EIP-712 document construction and signing.
//! - [`fee`]: gas-cost to fee-token conversion.
//! - [`relay`]: relay payload assembly and dispatch.
//! - [`receipt`]: outcome resolution from receipt logs.
//! - [`networks`]: known chains, price routes, and permit schemas.
//! - [`config`]: per-instance configuration.

pub mod config;
pub mod contracts;
pub mod conveyor;
pub mod error;
pub mod fee;
pub mod networks;
pub mod receipt;
pub mod relay;
pub mod signing;
pub mod types;

pub use config::{ConveyorConfig, ConveyorEnvironment, DomainBinding, ReceiptPolicy};
pub use conveyor::{Conveyor, SubmitOptions};
pub use error::ConveyorError;
pub use fee::{CoinGeckoPriceSource, FeeQuoter, PriceSource};
pub use networks::PermitKind;
pub use receipt::ReceiptVerifier;
pub use relay::{RelayClient, RelayMethod, RelayRequest, SignerKind};
pub use signing::Eip712Signer;
pub use types::{
    ForwardRequest, PermitAuthorization, RelayOutcome, RelayResponse, SignaturePackage,
    SigningDomain, TypedDocument,
};
