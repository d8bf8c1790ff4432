//! Wire and signing types for the Conveyor protocol.
//!
//! The relay consumes EIP-712 typed-data documents serialized as JSON, so the
//! types here exist in two parallel shapes:
//!
//! - [`sol!`] structs ([`Forwarder`], [`standard_permit::Permit`],
//!   [`allowance_permit::Permit`]) used only to compute the EIP-712 signing
//!   hash. Their names and field order define the type hash the forwarder
//!   contract reconstructs, so they must never drift from the deployed
//!   contract.
//! - Serde types ([`ForwardRequest`], [`PermitAuthorization`],
//!   [`TypedDocument`]) that carry the full message to the relay. A
//!   [`ForwardRequest`] carries two fields (`useOraclePriceFeed`,
//!   `extendCategories`) that the relay needs but that are *not* part of the
//!   signed type.
//!
//! A signature and the document it was computed over always travel together
//! as a [`SignaturePackage`]; neither is ever reconstructed from the other.

use alloy_primitives::{Address, Bytes, Signature, TxHash, U256};
use alloy_sol_types::sol;
use serde::{Deserialize, Serialize};

sol! {
    /// The signed portion of a forward request. The struct name is the
    /// EIP-712 primary type, so it stays `Forwarder` to match the type string
    /// hashed by the deployed forwarder contract.
    struct Forwarder {
        address from;
        address to;
        address feeToken;
        uint256 maxTokenAmount;
        uint256 deadline;
        uint256 nonce;
        bytes data;
    }
}

/// EIP-2612 permit. Lives in its own module so the struct can keep the
/// `Permit` type name the token contract expects.
pub mod standard_permit {
    use alloy_sol_types::sol;

    sol! {
        struct Permit {
            address owner;
            address spender;
            uint256 value;
            uint256 nonce;
            uint256 deadline;
        }
    }
}

/// DAI-style permit: boolean allowance with an `expiry` instead of a value
/// ceiling with a `deadline`. Same `Permit` type name, different fields.
pub mod allowance_permit {
    use alloy_sol_types::sol;

    sol! {
        struct Permit {
            address holder;
            address spender;
            uint256 nonce;
            uint256 expiry;
            bool allowed;
        }
    }
}

/// One authorized call, as the relay receives it. Constructed fresh per call;
/// invalid as soon as the nonce is consumed on-chain or the deadline passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    pub from: Address,
    pub to: Address,
    pub fee_token: Address,
    pub use_oracle_price_feed: bool,
    pub max_token_amount: U256,
    /// Absolute UNIX timestamp after which the forwarder rejects execution.
    pub deadline: U256,
    /// Must equal the forwarder's current nonce for `from` at signing time.
    pub nonce: U256,
    /// Exact encoded call the target executes. Any mutation after signing
    /// invalidates the signature.
    pub data: Bytes,
    pub extend_categories: Vec<U256>,
}

/// EIP-712 domain as serialized into the typed-data document. Binds a
/// signature to exactly one chain and one verifying contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningDomain {
    pub name: String,
    pub version: String,
    pub chain_id: U256,
    pub verifying_contract: Address,
}

impl SigningDomain {
    /// Domain with the protocol-wide version `"1"`.
    pub fn new(name: impl Into<String>, chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            name: name.into(),
            version: "1".to_string(),
            chain_id: U256::from(chain_id),
            verifying_contract,
        }
    }
}

/// A single field of an EIP-712 type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl TypedDataField {
    fn new(name: &str, ty: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
        }
    }
}

/// The `types` section of a typed-data document. Explicit fields instead of a
/// map so serialization order is deterministic and round-trips exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataTypes {
    #[serde(rename = "EIP712Domain")]
    pub eip712_domain: Vec<TypedDataField>,
    #[serde(rename = "Forwarder", default, skip_serializing_if = "Option::is_none")]
    pub forwarder: Option<Vec<TypedDataField>>,
    #[serde(rename = "Permit", default, skip_serializing_if = "Option::is_none")]
    pub permit: Option<Vec<TypedDataField>>,
}

impl TypedDataTypes {
    fn domain_type() -> Vec<TypedDataField> {
        vec![
            TypedDataField::new("name", "string"),
            TypedDataField::new("version", "string"),
            TypedDataField::new("chainId", "uint256"),
            TypedDataField::new("verifyingContract", "address"),
        ]
    }

    /// Type section for a forward request document.
    pub fn forwarder() -> Self {
        Self {
            eip712_domain: Self::domain_type(),
            forwarder: Some(vec![
                TypedDataField::new("from", "address"),
                TypedDataField::new("to", "address"),
                TypedDataField::new("feeToken", "address"),
                TypedDataField::new("maxTokenAmount", "uint256"),
                TypedDataField::new("deadline", "uint256"),
                TypedDataField::new("nonce", "uint256"),
                TypedDataField::new("data", "bytes"),
            ]),
            permit: None,
        }
    }

    /// Type section for an EIP-2612 permit document.
    pub fn standard_permit() -> Self {
        Self {
            eip712_domain: Self::domain_type(),
            forwarder: None,
            permit: Some(vec![
                TypedDataField::new("owner", "address"),
                TypedDataField::new("spender", "address"),
                TypedDataField::new("value", "uint256"),
                TypedDataField::new("nonce", "uint256"),
                TypedDataField::new("deadline", "uint256"),
            ]),
        }
    }

    /// Type section for a DAI-style permit document.
    pub fn allowance_permit() -> Self {
        Self {
            eip712_domain: Self::domain_type(),
            forwarder: None,
            permit: Some(vec![
                TypedDataField::new("holder", "address"),
                TypedDataField::new("spender", "address"),
                TypedDataField::new("nonce", "uint256"),
                TypedDataField::new("expiry", "uint256"),
                TypedDataField::new("allowed", "bool"),
            ]),
        }
    }
}

/// A complete EIP-712 typed-data document as sent to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDocument<M> {
    pub types: TypedDataTypes,
    pub domain: SigningDomain,
    #[serde(rename = "primaryType")]
    pub primary_type: String,
    pub message: M,
}

/// A token spending authorization, in one of the two permit shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermitAuthorization {
    Standard(StandardPermit),
    Allowance(AllowancePermit),
}

/// EIP-2612 permit message. `value` is a fixed very-large ceiling rather than
/// the fee amount so one permit covers many future calls without re-signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardPermit {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub nonce: U256,
    pub deadline: U256,
}

/// DAI-style permit message: `allowed = true` with an expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowancePermit {
    pub holder: Address,
    pub spender: Address,
    pub nonce: U256,
    pub expiry: U256,
    pub allowed: bool,
}

/// Allowance ceiling authorized by a standard permit: `10^30` token units.
pub fn permit_ceiling() -> U256 {
    U256::from(10u8).pow(U256::from(30u8))
}

/// A signed typed-data document. The signature was computed over exactly
/// `document`; the pair is never split.
#[derive(Debug, Clone, PartialEq)]
pub struct SignaturePackage<M> {
    pub document: TypedDocument<M>,
    pub signature: Signature,
}

/// The relay's JSON-RPC reply envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub id: u64,
    pub jsonrpc: String,
    pub result: RelayOutcome,
}

/// The relay's immediate acknowledgment. `success` here is not the final
/// truth about the forwarded call; see
/// [`ReceiptVerifier`](crate::receipt::ReceiptVerifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn_hash: Option<TxHash>,
}
