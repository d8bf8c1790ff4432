//! The meta-transaction orchestrator.
//!
//! [`Conveyor`] drives a gas-sponsored call end to end: check the target's
//! sponsorship flag, quote the fee, build and sign the forward message (and
//! optionally a permit), pick the relay operation, dispatch, and resolve the
//! true outcome from the receipt. When sponsorship is disabled on the target
//! the call is submitted as an ordinary transaction instead, with no signing
//! protocol and no relay involved.
//!
//! There is no retry loop here: a failed dispatch or a failed verification is
//! reported, not retried. Concurrent submissions from the same caller race on
//! the forwarder's on-chain nonce by design.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::{TransactionReceipt, TransactionRequest};
use tracing::{debug, info};

use crate::config::{ConveyorConfig, DomainBinding};
use crate::contracts::{IConveyorBase, IConveyorForwarder, IERC20Permit};
use crate::error::ConveyorError;
use crate::fee::{CoinGeckoPriceSource, FeeQuoter, PriceSource};
use crate::networks::{self, PermitKind};
use crate::receipt::ReceiptVerifier;
use crate::relay::{RelayClient, RelayMethod, SignerKind, build_relay_request};
use crate::signing::{self, Eip712Signer};
use crate::types::{ForwardRequest, RelayOutcome, RelayResponse};

/// Per-call parameters for a sponsored submission. `calldata` is the exact
/// encoded call the target will execute; ABI encoding happens upstream.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    pub target: Address,
    pub calldata: Bytes,
    pub fee_token: Address,
    pub gas_limit: u128,
    pub gas_price: u128,
    /// Seconds until the forward request expires.
    pub duration_secs: u64,
    /// EIP-712 domain name the forwarder verifies against.
    pub domain_name: String,
    pub use_oracle_price_feed: bool,
    pub extend_categories: Vec<u64>,
}

/// The orchestrator façade over one chain, one signer, and one relay
/// environment. Independent instances do not share state.
pub struct Conveyor<P, S> {
    provider: P,
    signer: S,
    config: ConveyorConfig,
    fee_quoter: FeeQuoter,
    relay: RelayClient,
}

impl<P, S> Conveyor<P, S>
where
    P: Provider,
    S: Eip712Signer + Sync,
{
    /// Builds an orchestrator with the default CoinGecko price source.
    pub fn new(provider: P, signer: S, config: ConveyorConfig) -> Result<Self, ConveyorError> {
        let source = Arc::new(CoinGeckoPriceSource::new());
        Self::with_price_source(provider, signer, config, source)
    }

    pub fn with_price_source(
        provider: P,
        signer: S,
        config: ConveyorConfig,
        source: Arc<dyn PriceSource>,
    ) -> Result<Self, ConveyorError> {
        let relay = RelayClient::new(config.relay_endpoints.clone())?;
        Ok(Self {
            provider,
            signer,
            config,
            fee_quoter: FeeQuoter::new(source),
            relay,
        })
    }

    fn verifier(&self) -> ReceiptVerifier<&P> {
        ReceiptVerifier::new(&self.provider, self.config.receipt_policy.clone())
    }

    /// Whether the target contract has opted into Conveyor protection.
    pub async fn conveyor_status(&self, target: Address) -> Result<bool, ConveyorError> {
        let status = IConveyorBase::new(target, &self.provider)
            .conveyorIsEnabled()
            .call()
            .await?;
        Ok(status)
    }

    /// Submits a sponsored call, falling back to direct submission when the
    /// target has sponsorship disabled. Requires an existing fee-token
    /// allowance for the forwarder (see [`Conveyor::approve_forwarder`]).
    pub async fn submit(&self, options: &SubmitOptions) -> Result<RelayResponse, ConveyorError> {
        self.submit_inner(options, false).await
    }

    /// Same as [`Conveyor::submit`], but bundles a permit signature so the
    /// fee token needs no prior on-chain approval.
    pub async fn submit_with_permit(
        &self,
        options: &SubmitOptions,
    ) -> Result<RelayResponse, ConveyorError> {
        self.submit_inner(options, true).await
    }

    async fn submit_inner(
        &self,
        options: &SubmitOptions,
        with_permit: bool,
    ) -> Result<RelayResponse, ConveyorError> {
        if !self.conveyor_status(options.target).await? {
            info!(target = %options.target, "sponsorship disabled, submitting directly");
            return self.submit_direct(options.target, options.calldata.clone()).await;
        }

        let chain_id = self.config.chain_id;
        let from = self.signer.address();
        let caller_is_contract = !self.provider.get_code_at(from).await?.is_empty();

        let max_token_amount = if options.fee_token == Address::ZERO {
            U256::ZERO
        } else {
            let decimals = IERC20Permit::new(options.fee_token, &self.provider)
                .decimals()
                .call()
                .await?;
            let gas_cost = U256::from(options.gas_limit) * U256::from(options.gas_price);
            self.fee_quoter
                .quote(chain_id, options.fee_token, decimals, gas_cost)
                .await?
        };

        let nonce = IConveyorForwarder::new(self.config.forwarder, &self.provider)
            .nonces(from)
            .call()
            .await?;
        let deadline = U256::from(unix_now() + options.duration_secs);

        let request = ForwardRequest {
            from,
            to: options.target,
            fee_token: options.fee_token,
            use_oracle_price_feed: options.use_oracle_price_feed,
            max_token_amount,
            deadline,
            nonce,
            data: options.calldata.clone(),
            extend_categories: options
                .extend_categories
                .iter()
                .map(|category| U256::from(*category))
                .collect(),
        };

        let verifying_contract = match self.config.domain_binding {
            DomainBinding::Forwarder => self.config.forwarder,
            DomainBinding::Target => options.target,
        };
        let forward = signing::build_forward_message(
            &self.signer,
            chain_id,
            verifying_contract,
            &options.domain_name,
            request,
            caller_is_contract,
        )
        .await?;

        let (permit, permit_kind) = if with_permit && options.fee_token != Address::ZERO {
            let kind = networks::permit_kind(chain_id, options.fee_token);
            let token_nonce = IERC20Permit::new(options.fee_token, &self.provider)
                .nonces(from)
                .call()
                .await?;
            let package = signing::build_permit_message(
                &self.signer,
                chain_id,
                options.fee_token,
                kind,
                self.config.forwarder,
                deadline,
                token_nonce,
                caller_is_contract,
            )
            .await?;
            (Some(package), Some(kind))
        } else {
            (None, None)
        };

        let method = RelayMethod::select(permit_kind, caller_is_contract);
        let signer_kind = if caller_is_contract {
            SignerKind::Contract
        } else {
            SignerKind::KeyHolder
        };
        let relay_request = build_relay_request(method, &forward, permit.as_ref(), signer_kind)?;
        debug!(?method, permit = permit.is_some(), "dispatching sponsored call");

        let response = self.relay.dispatch(&relay_request).await?;
        if response.result.success {
            // The relay's acknowledgment is not the final truth; resolve the
            // forwarded call's outcome from the receipt logs.
            self.verifier().resolve(response).await
        } else {
            Ok(response)
        }
    }

    /// Submits the call as an ordinary transaction from the caller's wallet.
    /// Node errors propagate untouched. The call may still revert on-chain if
    /// the target protects the method with its forwarder-only guard.
    pub async fn submit_direct(
        &self,
        target: Address,
        calldata: Bytes,
    ) -> Result<RelayResponse, ConveyorError> {
        let request = TransactionRequest::default()
            .with_from(self.signer.address())
            .with_to(target)
            .with_input(calldata);
        let pending = self.provider.send_transaction(request).await?;
        let txn_hash = *pending.tx_hash();
        let receipt = self.verifier().wait_for_receipt(txn_hash).await?;
        Ok(response_from_receipt(&receipt))
    }

    /// Toggles Conveyor protection on the target contract.
    pub async fn toggle_conveyor_protection(
        &self,
        target: Address,
        enabled: bool,
    ) -> Result<RelayResponse, ConveyorError> {
        let contract = IConveyorBase::new(target, &self.provider);
        let pending = if enabled {
            contract.enableConveyorProtection().send().await?
        } else {
            contract.disableConveyorProtection().send().await?
        };
        let txn_hash = *pending.tx_hash();
        let receipt = self.verifier().wait_for_receipt(txn_hash).await?;
        Ok(response_from_receipt(&receipt))
    }

    /// Grants the forwarder an allowance on `token`. First-time callers must
    /// do this (or use [`Conveyor::submit_with_permit`]) before a sponsored
    /// call can charge its fee.
    pub async fn approve_forwarder(
        &self,
        token: Address,
        amount: U256,
    ) -> Result<RelayResponse, ConveyorError> {
        let pending = IERC20Permit::new(token, &self.provider)
            .approve(self.config.forwarder, amount)
            .send()
            .await?;
        let txn_hash = *pending.tx_hash();
        let receipt = self.verifier().wait_for_receipt(txn_hash).await?;
        Ok(response_from_receipt(&receipt))
    }

    /// Net `fee_token` amount actually retained by `fee_collector` in a
    /// relayed transaction, accounting for refunds of an over-estimated fee.
    pub async fn charged_fee(
        &self,
        txn_hash: TxHash,
        fee_token: Address,
        fee_collector: Address,
    ) -> Result<U256, ConveyorError> {
        self.verifier()
            .compute_charged_fee(txn_hash, fee_token, fee_collector)
            .await
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the UNIX epoch")
        .as_secs()
}

/// Uniform outcome shape for non-relayed transactions.
fn response_from_receipt(receipt: &TransactionReceipt) -> RelayResponse {
    let success = receipt.status();
    RelayResponse {
        id: 1,
        jsonrpc: "2.0".to_string(),
        result: RelayOutcome {
            success,
            error_message: if success {
                None
            } else {
                Some("Transaction Reverted".to_string())
            },
            txn_hash: Some(receipt.transaction_hash),
        },
    }
}
