//! Construction-time configuration for a [`Conveyor`](crate::Conveyor)
//! instance.
//!
//! Everything the orchestrator needs is resolved once here, so concurrent
//! instances can target different chains and environments without sharing
//! process-wide state: the chain id, the forwarder deployment, the relay
//! endpoint pool (one endpoint is picked at random per dispatch), the receipt
//! polling budget, and which contract the forward-message signing domain is
//! bound to.

use std::time::Duration;

use alloy_primitives::{Address, address};
use url::Url;

/// Default forwarder deployment shared by the public environments.
pub const DEFAULT_FORWARDER: Address = address!("84194C00E190dE7A10180853f6a28502Ad1A1029");

/// Which contract address the forward-message EIP-712 domain binds to.
///
/// The protocol's history is inconsistent here. The binding must match what
/// the deployed forwarder reconstructs during recovery, so it is an explicit
/// configuration knob rather than a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DomainBinding {
    /// Bind to the forwarder contract (the default for current deployments).
    #[default]
    Forwarder,
    /// Bind to the target contract.
    Target,
}

/// Bounded retry schedule for receipt polling. The backoff doubles per
/// attempt up to `max_backoff`; exhausting `max_attempts` surfaces
/// [`ConveyorError::ReceiptTimeout`](crate::ConveyorError::ReceiptTimeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// A deployment environment with its relay endpoint pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConveyorEnvironment {
    Production,
    Staging,
}

impl ConveyorEnvironment {
    /// Equivalent relay endpoints for this environment.
    pub fn relay_endpoints(&self) -> Vec<Url> {
        let urls: &[&str] = match self {
            Self::Production => &["https://conveyor-geode.ata.network"],
            Self::Staging => &["https://conveyor-geode-staging.ata.network"],
        };
        urls.iter()
            .map(|url| Url::parse(url).expect("static endpoint URL is valid"))
            .collect()
    }
}

/// Resolved configuration for one chain and one relay environment.
#[derive(Debug, Clone)]
pub struct ConveyorConfig {
    pub chain_id: u64,
    pub forwarder: Address,
    pub relay_endpoints: Vec<Url>,
    pub domain_binding: DomainBinding,
    pub receipt_policy: ReceiptPolicy,
}

impl ConveyorConfig {
    pub fn new(chain_id: u64, forwarder: Address, relay_endpoints: Vec<Url>) -> Self {
        Self {
            chain_id,
            forwarder,
            relay_endpoints,
            domain_binding: DomainBinding::default(),
            receipt_policy: ReceiptPolicy::default(),
        }
    }

    /// Configuration for a public environment with its default forwarder
    /// deployment and endpoint pool.
    pub fn for_environment(environment: ConveyorEnvironment, chain_id: u64) -> Self {
        Self::new(chain_id, DEFAULT_FORWARDER, environment.relay_endpoints())
    }

    pub fn with_domain_binding(mut self, binding: DomainBinding) -> Self {
        self.domain_binding = binding;
        self
    }

    pub fn with_receipt_policy(mut self, policy: ReceiptPolicy) -> Self {
        self.receipt_policy = policy;
        self
    }
}
