//! Registry of chains the Conveyor protocol runs on.
//!
//! Each [`NetworkInfo`] records what the fee quoter needs to know about a
//! chain: whether it is a test network (sponsorship is free there), which
//! price-source platform serves its token prices, and how its native asset is
//! quoted. Chains whose native asset has no direct quote pair (Polygon,
//! Moonriver) carry a `native_coin_id` and are priced through a BNB bridge.
//!
//! The registry also knows the per-chain deployments of allowance-style
//! (DAI-like) permit tokens, which determines the permit schema used when a
//! fee token is paid with a bundled permit signature.

use std::collections::HashMap;
use std::sync::LazyLock;

use alloy_primitives::{Address, address};

/// Which EIP-712 permit schema a fee token understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitKind {
    /// EIP-2612 `Permit(owner,spender,value,nonce,deadline)`.
    Standard,
    /// DAI-style `Permit(holder,spender,nonce,expiry,allowed)`.
    Allowance,
}

/// A known network and its fee-quoting parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Human-readable network name.
    pub name: &'static str,
    /// True for test networks, where sponsorship is free.
    pub testnet: bool,
    /// Price-source platform slug for token lookups, if the chain has price
    /// coverage at all.
    pub platform: Option<&'static str>,
    /// Quote currency the native asset trades against ("eth" or "bnb").
    pub quote_currency: &'static str,
    /// Native-asset coin id for the two-hop conversion route. `Some` means
    /// the native asset is not directly quotable and token prices must be
    /// bridged through the quote currency.
    pub native_coin_id: Option<&'static str>,
    /// Native asset decimals.
    pub native_decimals: u32,
}

macro_rules! mainnet {
    ($id:expr, $name:expr, $platform:expr, $quote:expr, $hop:expr) => {
        NetworkInfo {
            chain_id: $id,
            name: $name,
            testnet: false,
            platform: Some($platform),
            quote_currency: $quote,
            native_coin_id: $hop,
            native_decimals: 18,
        }
    };
}

macro_rules! testnet {
    ($id:expr, $name:expr) => {
        NetworkInfo {
            chain_id: $id,
            name: $name,
            testnet: true,
            platform: None,
            quote_currency: "eth",
            native_coin_id: None,
            native_decimals: 18,
        }
    };
}

/// All networks the protocol recognizes.
pub static KNOWN_NETWORKS: &[NetworkInfo] = &[
    mainnet!(1, "mainnet", "ethereum", "eth", None),
    mainnet!(56, "bsc", "binance-smart-chain", "bnb", None),
    mainnet!(137, "polygon", "polygon-pos", "bnb", Some("matic-network")),
    mainnet!(42161, "arbitrum", "arbitrum-one", "eth", None),
    mainnet!(1285, "moonriver", "moonriver", "bnb", Some("moonriver")),
    testnet!(3, "ropsten"),
    testnet!(4, "rinkeby"),
    testnet!(5, "goerli"),
    testnet!(42, "kovan"),
    testnet!(65, "okex-testnet"),
    testnet!(97, "bsc-testnet"),
    testnet!(256, "heco-testnet"),
    testnet!(1287, "moonbase"),
    testnet!(4002, "fantom-testnet"),
    testnet!(43113, "fuji"),
    testnet!(80001, "mumbai"),
    testnet!(421611, "arbitrum-testnet"),
    testnet!(1666700000, "harmony-testnet"),
    testnet!(11297108099, "palm-testnet"),
];

static NETWORKS_BY_ID: LazyLock<HashMap<u64, &'static NetworkInfo>> = LazyLock::new(|| {
    KNOWN_NETWORKS
        .iter()
        .map(|network| (network.chain_id, network))
        .collect()
});

/// Per-chain deployments of the allowance-style permit token (DAI).
static ALLOWANCE_PERMIT_TOKENS: LazyLock<HashMap<u64, Address>> = LazyLock::new(|| {
    HashMap::from([
        (1u64, address!("6B175474E89094C44Da98b954EedeAC495271d0F")),
        (137u64, address!("8f3Cf7ad23Cd3CaDbD9735AFf958023239c6A063")),
    ])
});

/// Looks up a network by chain id.
pub fn by_chain_id(chain_id: u64) -> Option<&'static NetworkInfo> {
    NETWORKS_BY_ID.get(&chain_id).copied()
}

/// True if the chain is a recognized test network.
pub fn is_testnet(chain_id: u64) -> bool {
    by_chain_id(chain_id).is_some_and(|network| network.testnet)
}

/// Resolves which permit schema applies to a fee token on a chain. Unknown
/// tokens default to the standard EIP-2612 schema.
pub fn permit_kind(chain_id: u64, fee_token: Address) -> PermitKind {
    match ALLOWANCE_PERMIT_TOKENS.get(&chain_id) {
        Some(dai) if *dai == fee_token => PermitKind::Allowance,
        _ => PermitKind::Standard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_chains_have_price_platforms() {
        for chain_id in [1u64, 56, 137, 42161, 1285] {
            let network = by_chain_id(chain_id).unwrap();
            assert!(!network.testnet);
            assert!(network.platform.is_some());
        }
    }

    #[test]
    fn two_hop_routes_only_where_native_asset_is_unquotable() {
        assert!(by_chain_id(1).unwrap().native_coin_id.is_none());
        assert_eq!(
            by_chain_id(137).unwrap().native_coin_id,
            Some("matic-network")
        );
        assert_eq!(by_chain_id(1285).unwrap().native_coin_id, Some("moonriver"));
    }

    #[test]
    fn testnets_are_recognized() {
        assert!(is_testnet(5));
        assert!(is_testnet(80001));
        assert!(!is_testnet(1));
        assert!(!is_testnet(999999));
    }

    #[test]
    fn dai_selects_allowance_permit() {
        let dai = address!("6B175474E89094C44Da98b954EedeAC495271d0F");
        let usdc = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
        assert_eq!(permit_kind(1, dai), PermitKind::Allowance);
        assert_eq!(permit_kind(1, usdc), PermitKind::Standard);
        // Mainnet DAI address means nothing on BSC.
        assert_eq!(permit_kind(56, dai), PermitKind::Standard);
    }
}
