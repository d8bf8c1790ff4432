//! Converts a gas-cost estimate into an equivalent fee-token amount.
//!
//! Prices come from an external [`PriceSource`]; absence of price data is a
//! hard failure, never a zero fee. Sponsorship is free on test networks and
//! for the zero-address sentinel token. A computed fee that rounds below one
//! whole token unit is clamped up to one so a nonzero fee is never forgiven
//! by rounding.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;
use url::Url;

use crate::error::ConveyorError;
use crate::networks;

/// External price source, queried per fee token and quote currency.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Price of `token` on `platform` in `quote` units. `None` when the
    /// source has no data for the token.
    async fn token_price(
        &self,
        platform: &str,
        token: Address,
        quote: &str,
    ) -> Result<Option<Decimal>, ConveyorError>;

    /// Price of a native asset (by coin id) in `quote` units.
    async fn native_price(
        &self,
        coin_id: &str,
        quote: &str,
    ) -> Result<Option<Decimal>, ConveyorError>;
}

/// CoinGecko-backed [`PriceSource`].
pub struct CoinGeckoPriceSource {
    http: Client,
    base_url: Url,
}

impl CoinGeckoPriceSource {
    const DEFAULT_BASE_URL: &'static str = "https://api.coingecko.com/api/v3/";

    pub fn new() -> Self {
        Self::with_base_url(
            Url::parse(Self::DEFAULT_BASE_URL).expect("static base URL is valid"),
        )
    }

    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    async fn fetch_price_map(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<HashMap<String, HashMap<String, Decimal>>, ConveyorError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ConveyorError::Config(format!("bad price source URL: {e}")))?;
        let response = self.http.get(url).query(query).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }
}

impl Default for CoinGeckoPriceSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceSource for CoinGeckoPriceSource {
    async fn token_price(
        &self,
        platform: &str,
        token: Address,
        quote: &str,
    ) -> Result<Option<Decimal>, ConveyorError> {
        let path = format!("simple/token_price/{platform}");
        let contract = token.to_string().to_lowercase();
        let prices = self
            .fetch_price_map(&path, &[("contract_addresses", &contract), ("vs_currencies", quote)])
            .await?;
        Ok(prices
            .values()
            .next()
            .and_then(|quotes| quotes.get(quote))
            .copied())
    }

    async fn native_price(
        &self,
        coin_id: &str,
        quote: &str,
    ) -> Result<Option<Decimal>, ConveyorError> {
        let prices = self
            .fetch_price_map("simple/price", &[("ids", coin_id), ("vs_currencies", quote)])
            .await?;
        Ok(prices
            .get(coin_id)
            .and_then(|quotes| quotes.get(quote))
            .copied())
    }
}

/// Converts gas costs into fee-token amounts through a [`PriceSource`].
#[derive(Clone)]
pub struct FeeQuoter {
    source: Arc<dyn PriceSource>,
}

impl FeeQuoter {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self { source }
    }

    /// Quotes the fee-token amount equivalent to `gas_cost` native-asset
    /// base units (wei), for a token with `token_decimals`.
    ///
    /// Zero for the sentinel token and on test networks. Otherwise the price
    /// is fetched directly against the chain's quote currency, or bridged
    /// through it when the native asset has no direct pair. The result is
    /// rounded half-up to whole token units and clamped to at least one.
    pub async fn quote(
        &self,
        chain_id: u64,
        fee_token: Address,
        token_decimals: u8,
        gas_cost: U256,
    ) -> Result<U256, ConveyorError> {
        if fee_token == Address::ZERO {
            return Ok(U256::ZERO);
        }
        let network =
            networks::by_chain_id(chain_id).ok_or(ConveyorError::UnsupportedChain(chain_id))?;
        if network.testnet {
            return Ok(U256::ZERO);
        }
        let platform = network
            .platform
            .ok_or(ConveyorError::UnsupportedChain(chain_id))?;

        let token_price = self
            .source
            .token_price(platform, fee_token, network.quote_currency)
            .await?
            .ok_or(ConveyorError::UnsupportedFeeToken(fee_token))?;

        // Price of one whole token expressed in native base units, adjusted
        // so dividing the wei-denominated gas cost yields token base units.
        let adjusted = {
            let scale = pow10(network.native_decimals)? / pow10(u32::from(token_decimals))?;
            let direct = token_price * scale;
            match network.native_coin_id {
                None => direct,
                // Two-hop route: token and native asset are both quoted in
                // the bridge currency.
                Some(coin_id) => {
                    let native_price = self
                        .source
                        .native_price(coin_id, network.quote_currency)
                        .await?
                        .ok_or(ConveyorError::UnsupportedChain(chain_id))?;
                    if native_price.is_zero() {
                        return Err(ConveyorError::FeeComputation(
                            "native asset price is zero".to_string(),
                        ));
                    }
                    direct / native_price
                }
            }
        };
        if adjusted.is_zero() {
            return Err(ConveyorError::FeeComputation(
                "fee token price is zero".to_string(),
            ));
        }

        let gas_cost = u128::try_from(gas_cost)
            .ok()
            .and_then(Decimal::from_u128)
            .ok_or_else(|| {
                ConveyorError::FeeComputation("gas cost out of range".to_string())
            })?;
        let fee = (gas_cost / adjusted)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let fee = fee.to_u128().ok_or_else(|| {
            ConveyorError::FeeComputation("fee amount out of range".to_string())
        })?;
        debug!(chain_id, %fee_token, fee, "computed fee quote");

        // A nonzero fee owed must never round down to zero.
        Ok(U256::from(fee.max(1)))
    }
}

fn pow10(exp: u32) -> Result<Decimal, ConveyorError> {
    10u128
        .checked_pow(exp)
        .and_then(Decimal::from_u128)
        .ok_or_else(|| ConveyorError::FeeComputation(format!("10^{exp} is out of range")))
}
