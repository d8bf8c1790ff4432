//! Relay request assembly and dispatch.
//!
//! A relay request is a single JSON-RPC style call at a versioned method
//! path, carrying the signed document(s) and split signature components as
//! ordered parameters. Once built, a request is immutable; dispatch picks one
//! endpoint at random from the configured pool of equivalents.

use alloy_primitives::{B256, Signature};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::ConveyorError;
use crate::networks::PermitKind;
use crate::types::{ForwardRequest, PermitAuthorization, RelayResponse, SignaturePackage};

/// The relay operations, each addressed at its own method path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMethod {
    /// Plain forwarded execution.
    Execute,
    /// Execution with a bundled EIP-2612 permit.
    ExecuteWithPermit,
    /// Execution with a bundled DAI-style permit.
    ExecuteWithDaiPermit,
    /// Execution on behalf of a caller whose authentication kind must be
    /// tagged so the relay applies the right verification path.
    ExecuteV2,
}

impl RelayMethod {
    /// Selects the operation from the shape of the inputs. Pure function: a
    /// contract-account caller always takes the tagged variant; otherwise the
    /// permit's schema decides.
    pub fn select(permit: Option<PermitKind>, caller_is_contract: bool) -> Self {
        if caller_is_contract {
            return Self::ExecuteV2;
        }
        match permit {
            None => Self::Execute,
            Some(PermitKind::Allowance) => Self::ExecuteWithDaiPermit,
            Some(PermitKind::Standard) => Self::ExecuteWithPermit,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Execute => "/v3/metaTx/execute",
            Self::ExecuteWithPermit => "/v3/metaTx/executeWithPermit",
            Self::ExecuteWithDaiPermit => "/v3/metaTx/executeWithDAIPermit",
            Self::ExecuteV2 => "/v3/metaTx/executeV2",
        }
    }
}

/// How the relay should verify the caller's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerKind {
    /// Key-holding account; ECDSA recovery applies.
    KeyHolder,
    /// Smart-contract account; the forwarder verifies via the contract.
    Contract,
}

impl SignerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyHolder => "eoa",
            Self::Contract => "contract",
        }
    }
}

/// One immutable JSON-RPC request to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

/// Assembles the relay payload for `method` from the signed forward message
/// and, for the permit variants, the signed permit.
///
/// Parameter order is part of the wire contract: the typed document followed
/// by the decimal `v` and hex `r`/`s` of its signature, then the same four
/// for the permit when present, then the signer-kind tag for [`RelayMethod::ExecuteV2`].
pub fn build_relay_request(
    method: RelayMethod,
    forward: &SignaturePackage<ForwardRequest>,
    permit: Option<&SignaturePackage<PermitAuthorization>>,
    signer_kind: SignerKind,
) -> Result<RelayRequest, ConveyorError> {
    let mut params = Vec::with_capacity(9);
    push_signed_document(&mut params, &forward.document, &forward.signature)?;
    if let Some(permit) = permit {
        push_signed_document(&mut params, &permit.document, &permit.signature)?;
    }
    if method == RelayMethod::ExecuteV2 {
        params.push(Value::from(signer_kind.as_str()));
    }
    Ok(RelayRequest {
        jsonrpc: "2.0".to_string(),
        id: 1,
        method: method.path().to_string(),
        params,
    })
}

fn push_signed_document<M: Serialize>(
    params: &mut Vec<Value>,
    document: &M,
    signature: &Signature,
) -> Result<(), ConveyorError> {
    let (v, r, s) = split_signature(signature);
    params.push(serde_json::to_value(document)?);
    params.push(Value::from(v.to_string()));
    params.push(Value::from(r.to_string()));
    params.push(Value::from(s.to_string()));
    Ok(())
}

/// Splits a signature into the legacy `(v, r, s)` triple the relay expects,
/// with `v` in `{27, 28}`.
pub fn split_signature(signature: &Signature) -> (u8, B256, B256) {
    let v = if signature.v() { 28 } else { 27 };
    let r = B256::from(signature.r().to_be_bytes::<32>());
    let s = B256::from(signature.s().to_be_bytes::<32>());
    (v, r, s)
}

/// HTTP client for the relay transport.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    endpoints: Vec<Url>,
}

impl RelayClient {
    /// Builds a client over a pool of equivalent endpoints.
    pub fn new(endpoints: Vec<Url>) -> Result<Self, ConveyorError> {
        if endpoints.is_empty() {
            return Err(ConveyorError::Config(
                "relay endpoint pool is empty".to_string(),
            ));
        }
        Ok(Self {
            http: Client::new(),
            endpoints,
        })
    }

    /// POSTs the request to a randomly selected endpoint and parses the
    /// relay's acknowledgment. The reply is not the final truth about the
    /// forwarded call; callers resolve it against the receipt.
    pub async fn dispatch(&self, request: &RelayRequest) -> Result<RelayResponse, ConveyorError> {
        let endpoint = {
            let index = rand::rng().random_range(0..self.endpoints.len());
            &self.endpoints[index]
        };
        debug!(%endpoint, method = %request.method, "dispatching relay request");
        let response = self
            .http
            .post(endpoint.clone())
            .json(request)
            .send()
            .await?;
        Ok(response.error_for_status()?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SigningDomain, TypedDataTypes, TypedDocument};
    use alloy_primitives::{Bytes, U256, address};
    use alloy_signer_local::PrivateKeySigner;

    async fn signed_forward() -> SignaturePackage<ForwardRequest> {
        let signer = PrivateKeySigner::random();
        let request = ForwardRequest {
            from: signer.address(),
            to: address!("2222222222222222222222222222222222222222"),
            fee_token: address!("3333333333333333333333333333333333333333"),
            use_oracle_price_feed: false,
            max_token_amount: U256::from(9u64),
            deadline: U256::from(1_700_000_000u64),
            nonce: U256::from(1u64),
            data: Bytes::from(vec![0xaa]),
            extend_categories: vec![U256::from(3u64)],
        };
        crate::signing::build_forward_message(
            &signer,
            1,
            address!("84194C00E190dE7A10180853f6a28502Ad1A1029"),
            "Test",
            request,
            false,
        )
        .await
        .unwrap()
    }

    #[test]
    fn operation_selection_is_pure() {
        assert_eq!(RelayMethod::select(None, false), RelayMethod::Execute);
        assert_eq!(
            RelayMethod::select(Some(PermitKind::Standard), false),
            RelayMethod::ExecuteWithPermit
        );
        assert_eq!(
            RelayMethod::select(Some(PermitKind::Allowance), false),
            RelayMethod::ExecuteWithDaiPermit
        );
        assert_eq!(RelayMethod::select(None, true), RelayMethod::ExecuteV2);
        assert_eq!(
            RelayMethod::select(Some(PermitKind::Standard), true),
            RelayMethod::ExecuteV2
        );
    }

    #[tokio::test]
    async fn payload_round_trips_document_and_signature() {
        let forward = signed_forward().await;
        let request =
            build_relay_request(RelayMethod::Execute, &forward, None, SignerKind::KeyHolder)
                .unwrap();
        assert_eq!(request.method, "/v3/metaTx/execute");
        assert_eq!(request.params.len(), 4);

        let parsed: TypedDocument<ForwardRequest> =
            serde_json::from_value(request.params[0].clone()).unwrap();
        assert_eq!(parsed, forward.document);

        let v: u8 = request.params[1].as_str().unwrap().parse().unwrap();
        let r: B256 = request.params[2].as_str().unwrap().parse().unwrap();
        let s: B256 = request.params[3].as_str().unwrap().parse().unwrap();
        let rebuilt = Signature::new(r.into(), s.into(), v == 28);
        assert_eq!(rebuilt, forward.signature);
    }

    #[tokio::test]
    async fn execute_v2_appends_the_signer_kind_tag() {
        let forward = signed_forward().await;
        let request =
            build_relay_request(RelayMethod::ExecuteV2, &forward, None, SignerKind::Contract)
                .unwrap();
        assert_eq!(request.method, "/v3/metaTx/executeV2");
        assert_eq!(request.params.last().unwrap(), "contract");
    }

    #[tokio::test]
    async fn permit_parameters_follow_the_forward_message() {
        let forward = signed_forward().await;
        let signer = PrivateKeySigner::random();
        let permit = crate::signing::build_permit_message(
            &signer,
            1,
            address!("6B175474E89094C44Da98b954EedeAC495271d0F"),
            PermitKind::Allowance,
            address!("84194C00E190dE7A10180853f6a28502Ad1A1029"),
            U256::from(1_700_000_000u64),
            U256::ZERO,
            false,
        )
        .await
        .unwrap();
        let request = build_relay_request(
            RelayMethod::ExecuteWithDaiPermit,
            &forward,
            Some(&permit),
            SignerKind::KeyHolder,
        )
        .unwrap();
        assert_eq!(request.method, "/v3/metaTx/executeWithDAIPermit");
        assert_eq!(request.params.len(), 8);
        let parsed: TypedDocument<PermitAuthorization> =
            serde_json::from_value(request.params[4].clone()).unwrap();
        assert_eq!(parsed, permit.document);
    }

    #[test]
    fn split_signature_yields_legacy_v() {
        let signature = Signature::new(U256::from(1u64), U256::from(2u64), true);
        let (v, r, s) = split_signature(&signature);
        assert_eq!(v, 28);
        assert_eq!(U256::from_be_bytes(r.0), U256::from(1u64));
        assert_eq!(U256::from_be_bytes(s.0), U256::from(2u64));
    }

    mod dispatch {
        use super::*;
        use serde_json::json;
        use wiremock::matchers::{body_partial_json, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        #[tokio::test]
        async fn posts_the_payload_and_parses_the_acknowledgment() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(body_partial_json(json!({
                    "jsonrpc": "2.0",
                    "method": "/v3/metaTx/execute"
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": 1,
                    "jsonrpc": "2.0",
                    "result": {
                        "success": true,
                        "errorMessage": "",
                        "txnHash":
                            "0x1111111111111111111111111111111111111111111111111111111111111111"
                    }
                })))
                .expect(1)
                .mount(&server)
                .await;

            let forward = signed_forward().await;
            let request =
                build_relay_request(RelayMethod::Execute, &forward, None, SignerKind::KeyHolder)
                    .unwrap();
            let client = RelayClient::new(vec![server.uri().parse().unwrap()]).unwrap();
            let response = client.dispatch(&request).await.unwrap();
            assert!(response.result.success);
            assert!(response.result.txn_hash.is_some());
        }

        #[test]
        fn empty_endpoint_pool_is_rejected() {
            assert!(matches!(
                RelayClient::new(vec![]),
                Err(ConveyorError::Config(_))
            ));
        }
    }
}
