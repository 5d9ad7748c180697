//! The per-transaction finalization state machine.
//!
//! Each attempt restarts from the source-chain receipt: locate the
//! cross-layer log emitted through the interop center, obtain its Merkle
//! proof, reassemble the message bytes, and submit the finalization call on
//! the destination chain. Every attempt ends in a tagged [`FinalizeOutcome`];
//! the engine itself never returns an error. Retry policy lives with the
//! queue worker, which interprets the failure reasons.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{keccak256, Address, Bytes, B256};
use anyhow::Result;

use crate::config::RelayerConfig;
use crate::rpc::{
    ChainClient, CrossLayerLog, FinalizeCall, MessageProof, SourceReceipt, WithdrawalPhase,
    SYSTEM_MESSENGER,
};

/// Why an attempt concluded with nothing left to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessReason {
    /// The transaction emitted no cross-layer logs at all.
    NoLogs,
    /// Cross-layer logs exist, but none originate from the interop center.
    NoInteropLogs,
    /// The destination chain reported the message as already consumed.
    AlreadyFinalized,
    /// A destination transaction was submitted and confirmed.
    Finalized,
}

impl std::fmt::Display for SuccessReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            SuccessReason::NoLogs => "no_logs",
            SuccessReason::NoInteropLogs => "no_interop_logs",
            SuccessReason::AlreadyFinalized => "already_finalized",
            SuccessReason::Finalized => "finalized",
        };
        f.write_str(tag)
    }
}

/// Why an attempt did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The transaction is unknown to the source chain or reverted there.
    TxNotFound,
    /// A base-asset withdrawal precedes the message and is not finalizable
    /// yet.
    WithdrawalNotReady,
    /// The containing batch has not been executed on the destination chain.
    ProofNotReady,
    /// No raw log reproduces the message recorded in the cross-layer log.
    NoMessage,
    /// The destination transaction was submitted but its receipt did not
    /// arrive within the wait window.
    DestinationPending,
    /// The destination transaction reverted.
    TxFailed,
    /// The cross-layer log disappeared between lookup and assembly.
    NoLog,
    /// Any error that escaped the pipeline.
    Error,
}

impl FailureReason {
    /// Reasons that resolve themselves with time and should keep the record
    /// queued. Everything else is permanent: retrying will not manufacture a
    /// missing log or un-revert a transaction.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureReason::ProofNotReady
                | FailureReason::DestinationPending
                | FailureReason::WithdrawalNotReady
                | FailureReason::Error
        )
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            FailureReason::TxNotFound => "tx_not_found",
            FailureReason::WithdrawalNotReady => "withdrawal_not_ready",
            FailureReason::ProofNotReady => "proof_not_ready",
            FailureReason::NoMessage => "no_message",
            FailureReason::DestinationPending => "l1_pending",
            FailureReason::TxFailed => "tx_failed",
            FailureReason::NoLog => "no_log",
            FailureReason::Error => "error",
        };
        f.write_str(tag)
    }
}

/// The result of one finalization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Success {
        reason: SuccessReason,
        account_address: Address,
        /// The destination transaction hash, when one was submitted.
        tx_hash: Option<B256>,
    },
    Failure {
        reason: FailureReason,
        error: Option<String>,
    },
}

impl FinalizeOutcome {
    fn success(reason: SuccessReason, account_address: Address, tx_hash: Option<B256>) -> Self {
        FinalizeOutcome::Success {
            reason,
            account_address,
            tx_hash,
        }
    }

    fn failure(reason: FailureReason) -> Self {
        FinalizeOutcome::Failure {
            reason,
            error: None,
        }
    }
}

/// Drives a single source transaction toward finalization.
pub struct FinalizeEngine {
    config: Arc<RelayerConfig>,
    rpc: Arc<dyn ChainClient>,
}

impl FinalizeEngine {
    pub fn new(config: Arc<RelayerConfig>, rpc: Arc<dyn ChainClient>) -> Self {
        Self { config, rpc }
    }

    /// Runs one finalization attempt for `tx_hash`.
    ///
    /// Never returns an error: anything that escapes the pipeline is folded
    /// into `Failure { reason: Error }` with the message attached.
    pub async fn finalize(&self, tx_hash: B256, account_address: Address) -> FinalizeOutcome {
        tracing::info!(tx = %tx_hash, "attempting finalization");
        match self.try_finalize(tx_hash, account_address).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(tx = %tx_hash, error = %err, "finalization attempt errored");
                FinalizeOutcome::Failure {
                    reason: FailureReason::Error,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn try_finalize(&self, tx_hash: B256, account_address: Address) -> Result<FinalizeOutcome> {
        let Some(receipt) = self.rpc.receipt_with_cross_layer_logs(tx_hash).await? else {
            tracing::warn!(tx = %tx_hash, "transaction not found");
            return Ok(FinalizeOutcome::failure(FailureReason::TxNotFound));
        };
        if !receipt.success {
            tracing::warn!(tx = %tx_hash, "transaction did not succeed on the source chain");
            return Ok(FinalizeOutcome::failure(FailureReason::TxNotFound));
        }

        if receipt.cross_layer_logs.is_empty() {
            tracing::info!(tx = %tx_hash, "no cross-layer logs, nothing to finalize");
            return Ok(FinalizeOutcome::success(
                SuccessReason::NoLogs,
                account_address,
                None,
            ));
        }
        tracing::debug!(tx = %tx_hash, count = receipt.cross_layer_logs.len(), "found cross-layer logs");

        if let Some(outcome) = self.settle_base_withdrawal(&receipt).await? {
            return Ok(outcome);
        }

        // The interop center address lives in the log's key field; the sender
        // field holds the messenger system contract.
        let Some(log_index) = self.interop_log_index(&receipt) else {
            tracing::info!(tx = %tx_hash, "no interop-center logs, nothing to finalize");
            return Ok(FinalizeOutcome::success(
                SuccessReason::NoInteropLogs,
                account_address,
                None,
            ));
        };

        let Some(proof) = self.fetch_proof(tx_hash, log_index).await? else {
            tracing::info!(tx = %tx_hash, "proof not available yet, will retry");
            return Ok(FinalizeOutcome::failure(FailureReason::ProofNotReady));
        };
        tracing::debug!(batch = proof.batch_number, index = proof.id, "proof obtained");

        let call = match self.build_call(&receipt, log_index, &proof) {
            Ok(call) => call,
            Err(reason) => {
                tracing::warn!(tx = %tx_hash, %reason, "could not assemble finalization call");
                return Ok(FinalizeOutcome::failure(reason));
            }
        };

        self.execute_on_destination(&call, account_address).await
    }

    /// Handles the base-asset withdrawal sub-flow, when one of the
    /// cross-layer logs is attributable to the base-token system contract.
    /// Returns an outcome only when the attempt should stop here.
    async fn settle_base_withdrawal(
        &self,
        receipt: &SourceReceipt,
    ) -> Result<Option<FinalizeOutcome>> {
        let base_token = self.config.contracts.base_token;
        let has_base_log = receipt.cross_layer_logs.iter().any(|log| {
            log.sender == base_token
                || log
                    .key
                    .as_slice()
                    .windows(Address::len_bytes())
                    .any(|window| window == base_token.as_slice())
        });
        if !has_base_log {
            return Ok(None);
        }

        let tx_hash = receipt.tx_hash;
        tracing::info!(tx = %tx_hash, "base-token withdrawal log detected");
        let phase = self.rpc.withdrawal_status(tx_hash).await?;
        match phase {
            WithdrawalPhase::Finalized => {
                // An interop message may still need finalizing.
                tracing::info!(tx = %tx_hash, "withdrawal already finalized");
                Ok(None)
            }
            WithdrawalPhase::ReadyToFinalize => {
                tracing::info!(tx = %tx_hash, "withdrawal ready, finalizing now");
                self.rpc.finalize_withdrawal(tx_hash).await?;
                self.rpc.wait_for_withdrawal(tx_hash).await?;
                tracing::info!(tx = %tx_hash, "withdrawal finalized");
                Ok(None)
            }
            WithdrawalPhase::Other(phase) => {
                tracing::info!(tx = %tx_hash, %phase, "withdrawal not ready, will retry");
                Ok(Some(FinalizeOutcome::failure(
                    FailureReason::WithdrawalNotReady,
                )))
            }
        }
    }

    fn interop_log_index(&self, receipt: &SourceReceipt) -> Option<usize> {
        receipt
            .cross_layer_logs
            .iter()
            .position(|log| log.key_address() == self.config.contracts.interop_center)
    }

    /// Fetches the Merkle proof for the interop log. `None` means the proof
    /// is not available yet; any other provider error propagates.
    async fn fetch_proof(&self, tx_hash: B256, log_index: usize) -> Result<Option<MessageProof>> {
        match self.rpc.cross_layer_log_proof(tx_hash, log_index).await {
            Ok(proof) => Ok(Some(proof)),
            Err(err) => {
                let text = err.to_string();
                if text.contains("not been executed yet") || text.contains("proof not available") {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Assembles the destination-chain call parameters from the receipt, the
    /// interop log, and its proof.
    fn build_call(
        &self,
        receipt: &SourceReceipt,
        log_index: usize,
        proof: &MessageProof,
    ) -> std::result::Result<FinalizeCall, FailureReason> {
        let log = receipt
            .cross_layer_logs
            .get(log_index)
            .ok_or(FailureReason::NoLog)?;

        // The messenger masks the real sender; recover it from the key field.
        let sender = if log.sender == SYSTEM_MESSENGER {
            log.key_address()
        } else {
            log.sender
        };

        let message = recover_message(receipt, log, self.config.contracts.interop_center)
            .ok_or(FailureReason::NoMessage)?;

        Ok(FinalizeCall {
            chain_id: self.config.contracts.source_chain_id,
            batch_number: proof.batch_number,
            message_index: proof.id,
            sender,
            tx_number_in_batch: log.tx_number_in_block,
            merkle_proof: proof.proof.clone(),
            message,
        })
    }

    async fn execute_on_destination(
        &self,
        call: &FinalizeCall,
        account_address: Address,
    ) -> Result<FinalizeOutcome> {
        let base_gas_price = self.rpc.destination_gas_price().await?;
        let bumped =
            base_gas_price + base_gas_price * self.config.finalize.gas_bump_percent as u128 / 100;
        tracing::debug!(base = base_gas_price, bumped, "destination gas price");

        let handler = self.config.contracts.interop_handler;
        let finalize_hash = match self.rpc.submit_finalization(handler, call, bumped).await {
            Ok(hash) => hash,
            Err(err) => {
                let text = err.to_string();
                if text.contains("already finalized")
                    || text.contains("AlreadyExecuted")
                    || text.contains("MessageAlreadyFinalized")
                {
                    tracing::info!("message already finalized on the destination chain");
                    return Ok(FinalizeOutcome::success(
                        SuccessReason::AlreadyFinalized,
                        account_address,
                        None,
                    ));
                }
                // Bubbles to the top-level catch and stays queued for retry.
                return Err(err);
            }
        };

        tracing::info!(tx = %finalize_hash, "finalization submitted, waiting for confirmation");
        let timeout = Duration::from_secs(self.config.finalize.receipt_timeout_secs);
        let Some(receipt) = self
            .rpc
            .wait_for_destination_receipt(finalize_hash, timeout)
            .await?
        else {
            tracing::info!(tx = %finalize_hash, "destination transaction still pending");
            return Ok(FinalizeOutcome::failure(FailureReason::DestinationPending));
        };

        if receipt.success {
            tracing::info!(
                tx = %finalize_hash,
                block = receipt.block_number,
                gas_used = receipt.gas_used,
                "message finalized"
            );
            Ok(FinalizeOutcome::success(
                SuccessReason::Finalized,
                account_address,
                Some(finalize_hash),
            ))
        } else {
            tracing::warn!(tx = %finalize_hash, "finalization transaction reverted");
            Ok(FinalizeOutcome::failure(FailureReason::TxFailed))
        }
    }
}

/// Recovers the raw message bytes for a cross-layer log from the receipt's
/// ordinary logs.
///
/// Candidate logs carry an ABI `bytes` head (offset and length, 64 bytes)
/// before the payload. The payload whose keccak256 hash matches the
/// cross-layer log's value field is the message; failing that, fall back to
/// the interop center's own log, then to the first candidate.
fn recover_message(
    receipt: &SourceReceipt,
    log: &CrossLayerLog,
    interop_center: Address,
) -> Option<Bytes> {
    let candidates: Vec<&crate::rpc::LogRecord> = receipt
        .logs
        .iter()
        .filter(|entry| entry.data.len() > 64)
        .collect();

    for entry in &candidates {
        let payload = &entry.data[64..];
        if keccak256(payload) == log.value {
            return Some(Bytes::copy_from_slice(payload));
        }
    }

    let fallback = candidates
        .iter()
        .find(|entry| entry.address == interop_center)
        .or_else(|| candidates.first())?;
    Some(Bytes::copy_from_slice(&fallback.data[64..]))
}
