//! The chain access boundary.
//!
//! Everything the relayer needs from either chain flows through the
//! [`ChainClient`] trait: receipt lookups with cross-layer logs on the source
//! chain, Merkle proof retrieval, base-asset withdrawal status, and
//! finalization submission on the destination chain. The embedding host
//! supplies the live implementation; integration tests supply a programmable
//! mock. The relayer itself never speaks a wire protocol.

use std::time::Duration;

use alloy_primitives::{address, Address, Bytes, B256};
use anyhow::Result;
use async_trait::async_trait;

/// The source chain's messenger system contract. Cross-layer logs are emitted
/// under this sender, with the real emitter packed into the log's key field.
pub const SYSTEM_MESSENGER: Address = address!("0x0000000000000000000000000000000000008008");

/// A source-chain transaction receipt enriched with its cross-layer logs.
#[derive(Debug, Clone)]
pub struct SourceReceipt {
    pub tx_hash: B256,
    /// Whether the transaction executed successfully.
    pub success: bool,
    /// Proof-bearing log entries destined for the destination chain.
    pub cross_layer_logs: Vec<CrossLayerLog>,
    /// The ordinary event logs of the transaction.
    pub logs: Vec<LogRecord>,
}

/// One cross-layer log entry: the provable fact that this transaction emitted
/// a message for the destination chain.
#[derive(Debug, Clone)]
pub struct CrossLayerLog {
    /// The emitting contract as recorded by the messenger. For user messages
    /// this is [`SYSTEM_MESSENGER`], with the real sender in `key`.
    pub sender: Address,
    /// Messenger key field; the low 20 bytes carry the emitting contract.
    pub key: B256,
    /// Messenger value field; the keccak256 hash of the message payload.
    pub value: B256,
    pub tx_number_in_block: u16,
}

impl CrossLayerLog {
    /// The address packed into the low 20 bytes of the key field.
    pub fn key_address(&self) -> Address {
        Address::from_slice(&self.key[12..])
    }
}

/// An ordinary event log from the source-chain receipt.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// A Merkle inclusion proof binding a cross-layer log to a destination-chain
/// verifiable batch.
#[derive(Debug, Clone)]
pub struct MessageProof {
    pub batch_number: u64,
    /// The message index within the batch.
    pub id: u64,
    pub proof: Vec<B256>,
}

/// Status of a base-asset withdrawal as reported by the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalPhase {
    Finalized,
    ReadyToFinalize,
    /// Any phase the relayer does not act on; carried verbatim for logging.
    Other(String),
}

impl std::fmt::Display for WithdrawalPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalPhase::Finalized => f.write_str("FINALIZED"),
            WithdrawalPhase::ReadyToFinalize => f.write_str("READY_TO_FINALIZE"),
            WithdrawalPhase::Other(phase) => f.write_str(phase),
        }
    }
}

/// The assembled parameter set for one destination-chain finalization call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeCall {
    pub chain_id: u64,
    pub batch_number: u64,
    pub message_index: u64,
    pub sender: Address,
    pub tx_number_in_batch: u16,
    pub merkle_proof: Vec<B256>,
    pub message: Bytes,
}

/// A destination-chain receipt for a submitted finalization call.
#[derive(Debug, Clone)]
pub struct DestinationReceipt {
    pub tx_hash: B256,
    pub success: bool,
    pub block_number: u64,
    pub gas_used: u128,
}

/// A trait abstracting over all chain operations the relayer consumes.
///
/// Implementations wrap whatever SDK the host uses to reach the two chains.
/// Errors are surfaced as [`anyhow::Error`]; where the relayer must
/// distinguish outcomes it matches on the provider's message text (proof not
/// yet available, message already finalized), exactly as the providers
/// report them.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetches a source-chain receipt together with its cross-layer logs.
    /// Returns `None` if the transaction is unknown to the chain.
    async fn receipt_with_cross_layer_logs(&self, tx_hash: B256) -> Result<Option<SourceReceipt>>;

    /// Fetches the Merkle proof for the cross-layer log at `log_index`.
    /// Errors until the containing batch has been executed on the
    /// destination chain.
    async fn cross_layer_log_proof(&self, tx_hash: B256, log_index: usize) -> Result<MessageProof>;

    /// Queries the phase of a base-asset withdrawal initiated by `tx_hash`.
    async fn withdrawal_status(&self, tx_hash: B256) -> Result<WithdrawalPhase>;

    /// Submits the finalization of a ready base-asset withdrawal.
    async fn finalize_withdrawal(&self, tx_hash: B256) -> Result<()>;

    /// Waits until the base-asset withdrawal for `tx_hash` reports finalized.
    async fn wait_for_withdrawal(&self, tx_hash: B256) -> Result<()>;

    /// Reads the destination chain's current gas price in wei.
    async fn destination_gas_price(&self) -> Result<u128>;

    /// Submits the interop finalization call to `handler` on the destination
    /// chain and returns the transaction hash.
    async fn submit_finalization(
        &self,
        handler: Address,
        call: &FinalizeCall,
        gas_price: u128,
    ) -> Result<B256>;

    /// Waits up to `timeout` for the destination-chain receipt of `tx_hash`.
    /// Returns `Ok(None)` when the wait times out with the transaction still
    /// pending.
    async fn wait_for_destination_receipt(
        &self,
        tx_hash: B256,
        timeout: Duration,
    ) -> Result<Option<DestinationReceipt>>;
}
