//! Builds and signs the EIP-712 documents the forwarder verifies.
//!
//! Correctness here depends on exact byte-level agreement between the signed
//! hash and what the forwarder contract reconstructs: the signed struct
//! covers exactly the seven fields of the `Forwarder` type, and the domain
//! binds the signature to one chain and one verifying contract. After every
//! signing round-trip the signer is recovered from the hash and compared to
//! the expected address; the only exception is a smart-contract caller, whose
//! signature cannot be recovered with ECDSA and is verified by the forwarder
//! itself.

use alloy_primitives::{Address, B256, Signature, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolStruct, eip712_domain};
use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ConveyorError;
use crate::networks::PermitKind;
use crate::types::{
    AllowancePermit, Forwarder, ForwardRequest, PermitAuthorization, SignaturePackage,
    SigningDomain, StandardPermit, TypedDataTypes, TypedDocument, allowance_permit,
    permit_ceiling, standard_permit,
};

/// The injected signing capability. Abstracts over owned and `Arc`-shared
/// signers; the signing call may prompt a user and is the only side effect of
/// message construction.
#[async_trait]
pub trait Eip712Signer {
    /// The address expected to be recovered from produced signatures.
    fn address(&self) -> Address;

    /// Signs a 32-byte EIP-712 hash.
    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error>;
}

#[async_trait]
impl Eip712Signer for PrivateKeySigner {
    fn address(&self) -> Address {
        PrivateKeySigner::address(self)
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

#[async_trait]
impl<T: Eip712Signer + Send + Sync> Eip712Signer for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}

/// Builds the forward-request document and obtains its signature.
///
/// `verifying_contract` must be the address the forwarder uses when it
/// reconstructs the domain. With `caller_is_contract` set, recovery-based
/// verification is skipped and deferred to the forwarder.
pub async fn build_forward_message<S>(
    signer: &S,
    chain_id: u64,
    verifying_contract: Address,
    domain_name: &str,
    request: ForwardRequest,
    caller_is_contract: bool,
) -> Result<SignaturePackage<ForwardRequest>, ConveyorError>
where
    S: Eip712Signer + Sync,
{
    let domain = eip712_domain! {
        name: domain_name.to_string(),
        version: "1",
        chain_id: chain_id,
        verifying_contract: verifying_contract,
    };

    // The signed struct must mirror `request` exactly: the forwarder rebuilds
    // it from the relayed message to recover the signer.
    let message = Forwarder {
        from: request.from,
        to: request.to,
        feeToken: request.fee_token,
        maxTokenAmount: request.max_token_amount,
        deadline: request.deadline,
        nonce: request.nonce,
        data: request.data.clone(),
    };

    let hash = message.eip712_signing_hash(&domain);
    let signature = signer.sign_hash(&hash).await?;
    if !caller_is_contract {
        verify_recovery(&signature, &hash, request.from)?;
    }

    let document = TypedDocument {
        types: TypedDataTypes::forwarder(),
        domain: SigningDomain::new(domain_name, chain_id, verifying_contract),
        primary_type: "Forwarder".to_string(),
        message: request,
    };
    Ok(SignaturePackage {
        document,
        signature,
    })
}

/// Builds and signs a spending permit for the fee token, in the schema the
/// token understands. The permit's domain binds to the token contract.
pub async fn build_permit_message<S>(
    signer: &S,
    chain_id: u64,
    fee_token: Address,
    kind: PermitKind,
    spender: Address,
    deadline: U256,
    token_nonce: U256,
    caller_is_contract: bool,
) -> Result<SignaturePackage<PermitAuthorization>, ConveyorError>
where
    S: Eip712Signer + Sync,
{
    let owner = signer.address();
    let domain = eip712_domain! {
        name: "Permit".to_string(),
        version: "1",
        chain_id: chain_id,
        verifying_contract: fee_token,
    };

    let (hash, types, message) = match kind {
        PermitKind::Standard => {
            let value = permit_ceiling();
            let signed = standard_permit::Permit {
                owner,
                spender,
                value,
                nonce: token_nonce,
                deadline,
            };
            (
                signed.eip712_signing_hash(&domain),
                TypedDataTypes::standard_permit(),
                PermitAuthorization::Standard(StandardPermit {
                    owner,
                    spender,
                    value,
                    nonce: token_nonce,
                    deadline,
                }),
            )
        }
        PermitKind::Allowance => {
            let signed = allowance_permit::Permit {
                holder: owner,
                spender,
                nonce: token_nonce,
                expiry: deadline,
                allowed: true,
            };
            (
                signed.eip712_signing_hash(&domain),
                TypedDataTypes::allowance_permit(),
                PermitAuthorization::Allowance(AllowancePermit {
                    holder: owner,
                    spender,
                    nonce: token_nonce,
                    expiry: deadline,
                    allowed: true,
                }),
            )
        }
    };

    let signature = signer.sign_hash(&hash).await?;
    if !caller_is_contract {
        verify_recovery(&signature, &hash, owner)?;
    }

    let document = TypedDocument {
        types,
        domain: SigningDomain::new("Permit", chain_id, fee_token),
        primary_type: "Permit".to_string(),
        message,
    };
    Ok(SignaturePackage {
        document,
        signature,
    })
}

/// Recovers the signer from `(hash, signature)` and requires it to equal
/// `expected` and not be the zero address.
fn verify_recovery(
    signature: &Signature,
    hash: &B256,
    expected: Address,
) -> Result<(), ConveyorError> {
    let recovered = signature
        .recover_address_from_prehash(hash)
        .map_err(|_| ConveyorError::SignatureVerificationFailed {
            expected,
            recovered: Address::ZERO,
        })?;
    if recovered == Address::ZERO || recovered != expected {
        return Err(ConveyorError::SignatureVerificationFailed {
            expected,
            recovered,
        });
    }
    Ok(())
}
