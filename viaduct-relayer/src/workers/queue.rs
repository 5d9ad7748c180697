use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

use crate::config::RelayerConfig;
use crate::finalize::{FinalizeEngine, FinalizeOutcome};
use crate::metadata::classify_receipt;
use crate::rpc::ChainClient;
use crate::state::{FinalizedRecord, PendingRecord, StateStore};

/// Drains the pending set through the finalization engine.
///
/// One pass loads both record sets, drives every pending record through an
/// attempt, and persists the results whole at the end. Passes are strictly
/// single-flight: a trigger that arrives while a pass is running is skipped,
/// not queued, so the state files never see two writers and no record is
/// submitted twice concurrently.
pub struct QueueProcessor {
    config: Arc<RelayerConfig>,
    rpc: Arc<dyn ChainClient>,
    store: Arc<StateStore>,
    engine: FinalizeEngine,
    in_flight: Mutex<()>,
}

impl QueueProcessor {
    pub fn new(
        config: Arc<RelayerConfig>,
        rpc: Arc<dyn ChainClient>,
        store: Arc<StateStore>,
    ) -> Self {
        let engine = FinalizeEngine::new(config.clone(), rpc.clone());
        Self {
            config,
            rpc,
            store,
            engine,
            in_flight: Mutex::new(()),
        }
    }

    /// Runs one queue pass. A no-op while another pass is in flight.
    pub async fn process_queue(&self) -> Result<()> {
        let Ok(_pass) = self.in_flight.try_lock() else {
            tracing::debug!("skipping queue pass, one is already in progress");
            return Ok(());
        };

        let pending = self.store.load_pending(None)?;
        let mut finalized = self.store.load_finalized(None)?;

        if pending.is_empty() {
            tracing::debug!("no pending transactions to process");
            return Ok(());
        }
        tracing::info!(count = pending.len(), "processing pending transactions");

        let total = pending.len();
        let mut still_pending = Vec::new();

        for (position, mut record) in pending.into_iter().enumerate() {
            // Records written by older versions may predate classification.
            if record.needs_metadata() {
                self.backfill_metadata(&mut record).await;
            }

            let outcome = self
                .engine
                .finalize(record.source_tx_hash, record.account_address)
                .await;

            match outcome {
                FinalizeOutcome::Success {
                    reason, tx_hash, ..
                } => {
                    tracing::info!(tx = %record.source_tx_hash, %reason, "removed from queue");
                    finalized.insert(
                        0,
                        FinalizedRecord {
                            source_tx_hash: record.source_tx_hash,
                            finalize_tx_hash: tx_hash,
                            finalized_at: Utc::now(),
                            action: record.action,
                            amount: record.amount.clone(),
                            account_address: record.account_address,
                        },
                    );
                }
                FinalizeOutcome::Failure { reason, .. } if reason.is_retryable() => {
                    tracing::info!(tx = %record.source_tx_hash, %reason, "still pending");
                    record.updated_at = Some(Utc::now());
                    still_pending.push(record);
                }
                FinalizeOutcome::Failure { reason, error } => {
                    tracing::warn!(
                        tx = %record.source_tx_hash,
                        %reason,
                        error = error.as_deref().unwrap_or(""),
                        "failed permanently, dropping"
                    );
                }
            }

            // Throttle between records to stay under RPC rate limits.
            if position + 1 < total {
                sleep(Duration::from_millis(self.config.queue.record_delay_ms)).await;
            }
        }

        finalized.truncate(self.config.queue.finalized_history_limit);
        self.store.save_pending(&still_pending)?;
        self.store.save_finalized(&finalized)?;
        tracing::info!(remaining = still_pending.len(), "queue updated");

        Ok(())
    }

    /// Re-classifies a record from its receipt; on any failure the
    /// classifier defaults stay in place rather than aborting the pass.
    async fn backfill_metadata(&self, record: &mut PendingRecord) {
        match self
            .rpc
            .receipt_with_cross_layer_logs(record.source_tx_hash)
            .await
        {
            Ok(Some(receipt)) => {
                let metadata = classify_receipt(&receipt, self.config.contracts.interop_center);
                record.action = metadata.action;
                record.amount = metadata.amount;
                tracing::debug!(
                    tx = %record.source_tx_hash,
                    action = %record.action,
                    amount = %record.amount,
                    "backfilled metadata"
                );
            }
            Ok(None) => {}
            Err(err) => {
                tracing::debug!(
                    tx = %record.source_tx_hash,
                    error = %err,
                    "metadata backfill failed, keeping defaults"
                );
            }
        }
    }
}
