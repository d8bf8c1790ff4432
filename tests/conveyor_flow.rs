//! End-to-end orchestrator tests against mocked JSON-RPC and relay servers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256, address};
use alloy_provider::RootProvider;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use conveyor_rs::{
    Conveyor, ConveyorConfig, ConveyorError, PriceSource, ReceiptPolicy, SubmitOptions,
};

const TARGET: Address = address!("2222222222222222222222222222222222222222");
const FORWARDER: Address = address!("84194C00E190dE7A10180853f6a28502Ad1A1029");
const FEE_TOKEN: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
const TX_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

/// Price source that records how often it is consulted.
struct CountingPriceSource {
    calls: AtomicUsize,
}

impl CountingPriceSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PriceSource for CountingPriceSource {
    async fn token_price(
        &self,
        _platform: &str,
        _token: Address,
        _quote: &str,
    ) -> Result<Option<Decimal>, ConveyorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Decimal::ONE))
    }

    async fn native_price(
        &self,
        _coin_id: &str,
        _quote: &str,
    ) -> Result<Option<Decimal>, ConveyorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Decimal::ONE))
    }
}

fn fast_policy() -> ReceiptPolicy {
    ReceiptPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(20),
    }
}

fn options() -> SubmitOptions {
    SubmitOptions {
        target: TARGET,
        calldata: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
        fee_token: FEE_TOKEN,
        gas_limit: 210_000,
        gas_price: 30_000_000_000,
        duration_secs: 600,
        domain_name: "Test Protocol".to_string(),
        use_oracle_price_feed: false,
        extend_categories: vec![],
    }
}

fn receipt_json(logs: serde_json::Value) -> serde_json::Value {
    json!({
        "transactionHash": TX_HASH,
        "transactionIndex": "0x0",
        "blockHash": "0x3333333333333333333333333333333333333333333333333333333333333333",
        "blockNumber": "0x10",
        "from": "0x1111111111111111111111111111111111111111",
        "to": TARGET.to_string(),
        "cumulativeGasUsed": "0x5208",
        "gasUsed": "0x5208",
        "contractAddress": null,
        "logs": logs,
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "status": "0x1",
        "type": "0x2",
        "effectiveGasPrice": "0x3b9aca00"
    })
}

/// Mounts an `eth_call` mock returning one 32-byte word.
async fn mount_eth_call(server: &MockServer, word: &str) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_call"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1, "result": word
        })))
        .mount(server)
        .await;
}

/// Sponsorship disabled on the target: the orchestrator must take the direct
/// path only, with no price lookup and no relay traffic at all.
#[tokio::test]
async fn disabled_sponsorship_submits_directly_without_relay_or_pricing() {
    let rpc = MockServer::start().await;
    let relay = MockServer::start().await;

    // conveyorIsEnabled() -> false
    let word_false = format!("0x{}", "00".repeat(32));
    mount_eth_call(&rpc, &word_false).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_sendTransaction"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1, "result": TX_HASH
        })))
        .expect(1)
        .mount(&rpc)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionReceipt"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1, "result": receipt_json(json!([]))
        })))
        .mount(&rpc)
        .await;

    // The relay must never be contacted.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&relay)
        .await;

    let provider = RootProvider::new_http(rpc.uri().parse().unwrap());
    let signer = PrivateKeySigner::random();
    let config = ConveyorConfig::new(1, FORWARDER, vec![relay.uri().parse().unwrap()])
        .with_receipt_policy(fast_policy());
    let prices = CountingPriceSource::new();
    let conveyor =
        Conveyor::with_price_source(provider, signer, config, prices.clone()).unwrap();

    let response = conveyor.submit(&options()).await.unwrap();
    assert!(response.result.success);
    assert_eq!(
        response.result.txn_hash.unwrap().to_string(),
        TX_HASH
    );
    assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
}

/// Sponsorship enabled, relay accepts, but the forwarder's status event in
/// the receipt reports the forwarded call failed: the resolved outcome must
/// flip to failure with the decoded reason and the original hash.
#[tokio::test]
async fn relayed_call_failure_is_resolved_from_the_status_event() {
    use alloy_sol_types::SolEvent;

    let rpc = MockServer::start().await;
    let relay = MockServer::start().await;

    // conveyorIsEnabled() -> true; the later decimals() and nonces() calls
    // are served by narrower mocks mounted first.
    let selector_mocks = [
        // decimals() -> 6
        ("0x313ce567", format!("0x{:064x}", 6)),
        // forwarder nonces(address) and token nonces(address) -> 0
        ("0x7ecebe00", format!("0x{}", "00".repeat(32))),
    ];
    for (selector, word) in &selector_mocks {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_call"})))
            .and(wiremock::matchers::body_string_contains(*selector))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": word
            })))
            .mount(&rpc)
            .await;
    }
    let word_true = format!("0x{}{}", "00".repeat(31), "01");
    mount_eth_call(&rpc, &word_true).await;
    // No code at the caller address.
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getCode"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1, "result": "0x"
        })))
        .mount(&rpc)
        .await;

    let status_event = conveyor_rs::contracts::MetaStatus {
        sender: address!("1111111111111111111111111111111111111111"),
        success: false,
        error: "INSUFFICIENT_BALANCE".to_string(),
    }
    .encode_log_data();
    let status_log = json!({
        "address": FORWARDER.to_string(),
        "topics": status_event
            .topics()
            .iter()
            .map(|topic| topic.to_string())
            .collect::<Vec<_>>(),
        "data": status_event.data.to_string(),
        "blockNumber": "0x10",
        "transactionHash": TX_HASH,
        "transactionIndex": "0x0",
        "blockHash": "0x3333333333333333333333333333333333333333333333333333333333333333",
        "logIndex": "0x0",
        "removed": false
    });
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionReceipt"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1, "result": receipt_json(json!([status_log]))
        })))
        .mount(&rpc)
        .await;

    // Relay accepts the sponsored call.
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "/v3/metaTx/execute"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "jsonrpc": "2.0",
            "result": { "success": true, "errorMessage": "", "txnHash": TX_HASH }
        })))
        .expect(1)
        .mount(&relay)
        .await;

    let provider = RootProvider::new_http(rpc.uri().parse().unwrap());
    let signer = PrivateKeySigner::random();
    let config = ConveyorConfig::new(1, FORWARDER, vec![relay.uri().parse().unwrap()])
        .with_receipt_policy(fast_policy());
    let prices = CountingPriceSource::new();
    let conveyor =
        Conveyor::with_price_source(provider, signer, config, prices.clone()).unwrap();

    let response = conveyor.submit(&options()).await.unwrap();
    assert!(!response.result.success);
    assert_eq!(
        response.result.error_message.as_deref(),
        Some("INSUFFICIENT_BALANCE")
    );
    assert_eq!(response.result.txn_hash.unwrap().to_string(), TX_HASH);
    // The fee was quoted exactly once, before signing.
    assert_eq!(prices.calls.load(Ordering::SeqCst), 1);
}
