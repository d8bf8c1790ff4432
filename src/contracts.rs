//! On-chain interfaces and event shapes the client consumes.
//!
//! These are read/approve surfaces only; deployment and administration of the
//! forwarder and target contracts are out of scope.

use alloy_primitives::{B256, b256};
use alloy_sol_types::sol;

/// Topic of the forwarder's status event. The forwarder emits this instead of
/// reverting when the forwarded call fails, so the fee can still be charged.
pub const META_STATUS_TOPIC: B256 =
    b256!("f624f223d0e1427abaf1ac2d9cf7c8487cad3018f0a93b5dafa867aed96165a3");

/// Standard ERC-20 `Transfer(address,address,uint256)` topic.
pub const TRANSFER_TOPIC: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

sol! {
    /// Sponsorship surface exposed by a Conveyor-protected target contract.
    #[sol(rpc)]
    interface IConveyorBase {
        function conveyorIsEnabled() external view returns (bool);
        function enableConveyorProtection() external;
        function disableConveyorProtection() external;
    }

    /// The forwarder's per-sender nonce, authoritative for replay protection.
    #[sol(rpc)]
    interface IConveyorForwarder {
        function nonces(address from) external view returns (uint256);
    }

    /// The slice of an ERC-20 permit token the fee flow reads and approves.
    #[sol(rpc)]
    interface IERC20Permit {
        function decimals() external view returns (uint8);
        function nonces(address owner) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    /// Emitted by the forwarder with the forwarded call's true outcome.
    #[derive(Debug)]
    event MetaStatus(address sender, bool success, string error);

    /// Standard ERC-20 transfer event, used to difference the net fee
    /// retained by the fee collector.
    #[derive(Debug)]
    event Transfer(address indexed from, address indexed to, uint256 value);
}
