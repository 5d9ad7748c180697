//! # Relayer Service & Queue Worker
//!
//! This module defines the `Relayer`, which owns the background work of
//! driving pending interop messages to finalization.
//!
//! ## Core Components
//!
//! - [`Relayer`]: The runner that periodically drains the pending queue. It
//!   is consumed when its `run` method is called.
//! - [`RelayerHandle`]: A clonable, thread-safe handle providing the public
//!   API around the running service: enqueueing freshly observed
//!   transactions, querying pending/finalized state, triggering an immediate
//!   pass, and shutting down.
//! - [`QueueProcessor`]: One single-flight pass over the pending set.

mod queue;

pub use queue::QueueProcessor;

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::RelayerConfig;
use crate::error::StateError;
use crate::metadata::{classify_receipt, TxAction, TxMetadata};
use crate::rpc::{ChainClient, SourceReceipt};
use crate::state::{FinalizedRecord, PendingRecord, StateStore};

/// A clonable, thread-safe handle for interacting with a running [`Relayer`].
///
/// The handle is the ingestion surface: an HTTP layer (or any other host
/// component) uses it to enqueue observed transactions and to answer status
/// queries, while the runner works the queue in the background.
#[derive(Clone)]
pub struct RelayerHandle {
    config: Arc<RelayerConfig>,
    rpc: Arc<dyn ChainClient>,
    store: Arc<StateStore>,
    processor: Arc<QueueProcessor>,
    shutdown: watch::Sender<bool>,
}

impl RelayerHandle {
    /// Classifies a receipt against the configured interop center.
    pub fn classify(&self, receipt: &SourceReceipt) -> TxMetadata {
        classify_receipt(receipt, self.config.contracts.interop_center)
    }

    /// Validates and enqueues a freshly observed source-chain transaction.
    ///
    /// Fetches the receipt, classifies it, and rejects transactions that do
    /// not carry a recognizable interop operation. Returns the classified
    /// metadata on acceptance.
    pub async fn submit_transaction(
        &self,
        tx_hash: B256,
        account_address: Address,
    ) -> Result<TxMetadata> {
        let receipt = self
            .rpc
            .receipt_with_cross_layer_logs(tx_hash)
            .await
            .context("failed to fetch the transaction receipt")?
            .with_context(|| format!("transaction {tx_hash} not found"))?;

        let metadata = self.classify(&receipt);
        if metadata.action == TxAction::Unknown {
            bail!("transaction {tx_hash} does not carry a recognizable interop operation");
        }

        self.enqueue(tx_hash, &metadata, account_address)?;
        Ok(metadata)
    }

    /// Idempotently adds a transaction to the pending queue. Returns whether
    /// a record was actually added.
    pub fn enqueue(
        &self,
        tx_hash: B256,
        metadata: &TxMetadata,
        account_address: Address,
    ) -> Result<bool, StateError> {
        let added = self.store.add_pending(tx_hash, metadata, account_address)?;
        if added {
            tracing::info!(tx = %tx_hash, account = %account_address, "queued for finalization");
        } else {
            tracing::debug!(tx = %tx_hash, "already tracked, enqueue skipped");
        }
        Ok(added)
    }

    /// The transactions currently awaiting finalization, optionally filtered
    /// to one account.
    pub fn pending(&self, account: Option<Address>) -> Result<Vec<PendingRecord>, StateError> {
        self.store.load_pending(account)
    }

    /// Completed finalizations, most recent first, optionally filtered to
    /// one account.
    pub fn finalized(&self, account: Option<Address>) -> Result<Vec<FinalizedRecord>, StateError> {
        self.store.load_finalized(account)
    }

    /// Runs a queue pass outside the timer. A no-op if one is already in
    /// flight.
    pub async fn trigger(&self) -> Result<()> {
        self.processor.process_queue().await
    }

    /// Signals the runner to stop after its current pass.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// The background service that works the finalization queue.
///
/// Created once together with its [`RelayerHandle`]; its [`run()`] method is
/// spawned as a long-running task and consumes the runner, leaving the handle
/// as the only way to interact with the service.
///
/// [`run()`]: Relayer::run
pub struct Relayer {
    config: Arc<RelayerConfig>,
    processor: Arc<QueueProcessor>,
    shutdown: watch::Receiver<bool>,
}

impl Relayer {
    /// Creates a new `Relayer` and its associated [`RelayerHandle`].
    ///
    /// # Arguments
    ///
    /// * `config` - The shared relayer configuration.
    /// * `rpc` - The chain client supplied by the embedding host.
    /// * `store` - The shared state store backing the two record files.
    pub fn new(
        config: Arc<RelayerConfig>,
        rpc: Arc<dyn ChainClient>,
        store: Arc<StateStore>,
    ) -> (Self, RelayerHandle) {
        let processor = Arc::new(QueueProcessor::new(
            config.clone(),
            rpc.clone(),
            store.clone(),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let runner = Self {
            config: config.clone(),
            processor: processor.clone(),
            shutdown: shutdown_rx,
        };
        let handle = RelayerHandle {
            config,
            rpc,
            store,
            processor,
            shutdown: shutdown_tx,
        };

        (runner, handle)
    }

    /// Works the queue on a fixed interval until stopped.
    ///
    /// The first pass runs immediately; afterwards one pass starts per
    /// interval tick. A failed pass is logged and the ticking continues.
    pub async fn run(mut self) {
        let period = Duration::from_secs(self.config.queue.poll_interval_secs);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = period.as_secs(), "relayer queue worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.processor.process_queue().await {
                        tracing::error!(error = %err, "queue pass failed");
                    }
                }
                _ = self.shutdown.changed() => {
                    tracing::info!("relayer shutting down");
                    return;
                }
            }
        }
    }
}
