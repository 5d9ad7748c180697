//! Classification of interop payloads.
//!
//! A transaction that routes an operation across layers carries an opaque
//! ABI-encoded payload inside one of its messenger logs. This module decodes
//! that payload far enough to tell a user what the transaction *does*: a
//! deposit, a withdrawal, or something the relayer does not recognize, plus
//! the human-scaled amount involved. Classification is display metadata only;
//! nothing in the finalization pipeline branches on it.

use alloy_primitives::{utils::format_ether, Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolValue};
use serde::{Deserialize, Serialize};

use crate::rpc::{LogRecord, SourceReceipt, SYSTEM_MESSENGER};

sol! {
    /// The inner unit of work embedded in an interop message payload.
    struct ShadowOp {
        address target;
        uint256 value;
        bytes data;
    }

    function depositETH(address pool, address onBehalfOf, uint16 referralCode);
    function withdraw(address asset, uint256 amount, address to);
}

/// The user-meaningful intent of a cross-layer transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TxAction {
    Deposit,
    Withdrawal,
    #[default]
    Unknown,
}

impl std::fmt::Display for TxAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxAction::Deposit => f.write_str("Deposit"),
            TxAction::Withdrawal => f.write_str("Withdrawal"),
            TxAction::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Classified intent and amount for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMetadata {
    pub action: TxAction,
    /// Transfer amount as a trimmed decimal string, e.g. `"0.5"`.
    pub amount: String,
}

impl Default for TxMetadata {
    fn default() -> Self {
        Self {
            action: TxAction::Unknown,
            amount: "0".to_string(),
        }
    }
}

/// Classifies a receipt by the first operation of its interop payload.
///
/// Any shape mismatch along the way (no messenger log directed at the
/// interop center, an undecodable payload, an operation matching neither
/// known call) yields `{Unknown, "0"}` rather than an error.
pub fn classify_receipt(receipt: &SourceReceipt, interop_center: Address) -> TxMetadata {
    interop_payload_log(receipt, interop_center)
        .and_then(|log| decode_ops(&log.data))
        .map(|ops| classify_ops(&ops))
        .unwrap_or_default()
}

/// Finds the messenger log whose first indexed topic carries the interop
/// center address.
fn interop_payload_log<'a>(
    receipt: &'a SourceReceipt,
    interop_center: Address,
) -> Option<&'a LogRecord> {
    receipt.logs.iter().find(|log| {
        log.address == SYSTEM_MESSENGER
            && log
                .topics
                .get(1)
                .is_some_and(|topic| Address::from_slice(&topic[12..]) == interop_center)
    })
}

/// Unwraps the two nested encodings of a messenger log payload: an outer
/// `bytes` wrapper, then `(address caller, ShadowOp[] ops)`.
fn decode_ops(data: &[u8]) -> Option<Vec<ShadowOp>> {
    let payload = Bytes::abi_decode(data).ok()?;
    let (_caller, ops) = <(Address, Vec<ShadowOp>)>::abi_decode(&payload).ok()?;
    Some(ops)
}

/// Matches the first operation's calldata against the known call shapes.
fn classify_ops(ops: &[ShadowOp]) -> TxMetadata {
    let Some(first) = ops.first() else {
        return TxMetadata::default();
    };

    if depositETHCall::abi_decode(&first.data).is_ok() {
        return TxMetadata {
            action: TxAction::Deposit,
            amount: format_base_units(first.value),
        };
    }

    if let Ok(call) = withdrawCall::abi_decode(&first.data) {
        return TxMetadata {
            action: TxAction::Withdrawal,
            amount: format_base_units(call.amount),
        };
    }

    TxMetadata::default()
}

/// Converts a base-unit (18 decimals) amount into a trimmed decimal string:
/// `1000000000000000000` becomes `"1"`, `500000000000000000` becomes `"0.5"`.
pub fn format_base_units(value: U256) -> String {
    let formatted = format_ether(value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
