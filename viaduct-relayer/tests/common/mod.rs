//! Shared test harness: a programmable in-memory `ChainClient` plus fixture
//! builders for receipts, logs, and interop payloads.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{address, keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolValue};
use anyhow::{bail, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use viaduct_relayer::config::RelayerConfig;
use viaduct_relayer::rpc::{
    ChainClient, CrossLayerLog, DestinationReceipt, FinalizeCall, LogRecord, MessageProof,
    SourceReceipt, WithdrawalPhase, SYSTEM_MESSENGER,
};

sol! {
    struct ShadowOp {
        address target;
        uint256 value;
        bytes data;
    }

    function depositETH(address pool, address onBehalfOf, uint16 referralCode);
    function withdraw(address asset, uint256 amount, address to);
}

pub const INTEROP_CENTER: Address = address!("0x1111111111111111111111111111111111111111");
pub const INTEROP_HANDLER: Address = address!("0x2222222222222222222222222222222222222222");
pub const ACCOUNT: Address = address!("0x3333333333333333333333333333333333333333");
pub const DEST_TX: B256 = B256::repeat_byte(0xfe);

pub fn tx(n: u8) -> B256 {
    B256::repeat_byte(n)
}

/// A relayer configuration pointing its state files into `dir`, with the
/// inter-record delay zeroed so passes run at test speed.
pub fn test_config(dir: &TempDir) -> RelayerConfig {
    let mut config = RelayerConfig::default();
    config.contracts.interop_center = INTEROP_CENTER;
    config.contracts.interop_handler = INTEROP_HANDLER;
    config.state.pending_file = dir.path().join("pending-txs.json");
    config.state.finalized_file = dir.path().join("finalized-txs.json");
    config.queue.record_delay_ms = 0;
    config
}

pub fn pad_address(addr: Address) -> B256 {
    B256::left_padding_from(addr.as_slice())
}

/// A cross-layer log as the messenger emits it: the real emitter packed into
/// the key field, the message hash in the value field.
pub fn cross_layer_log(emitter: Address, message_hash: B256) -> CrossLayerLog {
    CrossLayerLog {
        sender: SYSTEM_MESSENGER,
        key: pad_address(emitter),
        value: message_hash,
        tx_number_in_block: 7,
    }
}

/// A raw log whose data carries an ABI `bytes` head (offset and length)
/// followed by `message`, unpadded so the payload round-trips exactly.
pub fn message_log(address: Address, message: &[u8]) -> LogRecord {
    let mut data = Vec::with_capacity(64 + message.len());
    data.extend_from_slice(&U256::from(32).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(message.len()).to_be_bytes::<32>());
    data.extend_from_slice(message);
    LogRecord {
        address,
        topics: Vec::new(),
        data: data.into(),
    }
}

/// A successful receipt carrying one interop-center cross-layer log and the
/// raw log that reproduces `message`.
pub fn interop_receipt(tx_hash: B256, message: &[u8]) -> SourceReceipt {
    SourceReceipt {
        tx_hash,
        success: true,
        cross_layer_logs: vec![cross_layer_log(INTEROP_CENTER, keccak256(message))],
        logs: vec![message_log(INTEROP_CENTER, message)],
    }
}

/// A successful receipt with no cross-layer logs at all.
pub fn plain_receipt(tx_hash: B256) -> SourceReceipt {
    SourceReceipt {
        tx_hash,
        success: true,
        cross_layer_logs: Vec::new(),
        logs: Vec::new(),
    }
}

pub fn proof() -> MessageProof {
    MessageProof {
        batch_number: 42,
        id: 3,
        proof: vec![B256::repeat_byte(0x0f), B256::repeat_byte(0xf0)],
    }
}

/// The messenger log wrapping `ops` the way the interop center emits them:
/// `abi.encode(bytes)` around `abi.encode(caller, ops)`.
pub fn payload_log(ops: Vec<ShadowOp>) -> LogRecord {
    let caller = address!("0x4444444444444444444444444444444444444444");
    let payload = (caller, ops).abi_encode();
    let data = Bytes::from(payload).abi_encode();
    LogRecord {
        address: SYSTEM_MESSENGER,
        topics: vec![B256::ZERO, pad_address(INTEROP_CENTER)],
        data: data.into(),
    }
}

/// A receipt whose ordinary logs classify as a deposit of `value` base units.
pub fn deposit_receipt(tx_hash: B256, value: U256) -> SourceReceipt {
    let call = depositETHCall {
        pool: address!("0x5555555555555555555555555555555555555555"),
        onBehalfOf: ACCOUNT,
        referralCode: 0,
    };
    let op = ShadowOp {
        target: call.pool,
        value,
        data: call.abi_encode().into(),
    };
    SourceReceipt {
        tx_hash,
        success: true,
        cross_layer_logs: Vec::new(),
        logs: vec![payload_log(vec![op])],
    }
}

/// A receipt whose ordinary logs classify as a withdrawal of `amount`.
pub fn withdraw_receipt(tx_hash: B256, amount: U256) -> SourceReceipt {
    let call = withdrawCall {
        asset: address!("0x6666666666666666666666666666666666666666"),
        amount,
        to: ACCOUNT,
    };
    let op = ShadowOp {
        target: call.asset,
        value: U256::ZERO,
        data: call.abi_encode().into(),
    };
    SourceReceipt {
        tx_hash,
        success: true,
        cross_layer_logs: Vec::new(),
        logs: vec![payload_log(vec![op])],
    }
}

/// An in-memory `ChainClient` with programmable responses and call counters.
#[derive(Default)]
pub struct MockChain {
    pub receipts: Mutex<HashMap<B256, SourceReceipt>>,
    pub proofs: Mutex<HashMap<B256, MessageProof>>,
    /// Error text returned instead of a proof for the given transaction.
    pub proof_errors: Mutex<HashMap<B256, String>>,
    pub withdrawal_phases: Mutex<HashMap<B256, WithdrawalPhase>>,
    /// Error text returned from every submission attempt.
    pub submit_error: Mutex<Option<String>>,
    /// Calls submitted to the destination chain, with their gas prices.
    pub submitted: Mutex<Vec<(FinalizeCall, u128)>>,
    /// When set, destination receipt waits report a timeout.
    pub dest_timeout: AtomicBool,
    /// When set, the destination receipt reports a revert.
    pub dest_revert: AtomicBool,
    /// Artificial latency injected into every receipt fetch.
    pub receipt_delay: Mutex<Option<Duration>>,
    pub receipt_calls: AtomicUsize,
    pub withdrawal_finalize_calls: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put_receipt(&self, receipt: SourceReceipt) {
        self.receipts
            .lock()
            .unwrap()
            .insert(receipt.tx_hash, receipt);
    }

    pub fn put_proof(&self, tx_hash: B256, proof: MessageProof) {
        self.proofs.lock().unwrap().insert(tx_hash, proof);
    }

    pub fn fail_proof(&self, tx_hash: B256, message: &str) {
        self.proof_errors
            .lock()
            .unwrap()
            .insert(tx_hash, message.to_string());
    }

    pub fn put_withdrawal_phase(&self, tx_hash: B256, phase: WithdrawalPhase) {
        self.withdrawal_phases.lock().unwrap().insert(tx_hash, phase);
    }

    pub fn fail_submissions(&self, message: &str) {
        *self.submit_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn submissions(&self) -> Vec<(FinalizeCall, u128)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn receipt_with_cross_layer_logs(&self, tx_hash: B256) -> Result<Option<SourceReceipt>> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.receipt_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.receipts.lock().unwrap().get(&tx_hash).cloned())
    }

    async fn cross_layer_log_proof(&self, tx_hash: B256, _log_index: usize) -> Result<MessageProof> {
        if let Some(message) = self.proof_errors.lock().unwrap().get(&tx_hash) {
            bail!("{message}");
        }
        match self.proofs.lock().unwrap().get(&tx_hash) {
            Some(proof) => Ok(proof.clone()),
            None => bail!("the batch containing this log has not been executed yet"),
        }
    }

    async fn withdrawal_status(&self, tx_hash: B256) -> Result<WithdrawalPhase> {
        Ok(self
            .withdrawal_phases
            .lock()
            .unwrap()
            .get(&tx_hash)
            .cloned()
            .unwrap_or(WithdrawalPhase::Other("PENDING".to_string())))
    }

    async fn finalize_withdrawal(&self, _tx_hash: B256) -> Result<()> {
        self.withdrawal_finalize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_withdrawal(&self, _tx_hash: B256) -> Result<()> {
        Ok(())
    }

    async fn destination_gas_price(&self) -> Result<u128> {
        Ok(100)
    }

    async fn submit_finalization(
        &self,
        _handler: Address,
        call: &FinalizeCall,
        gas_price: u128,
    ) -> Result<B256> {
        if let Some(message) = self.submit_error.lock().unwrap().clone() {
            bail!("{message}");
        }
        self.submitted.lock().unwrap().push((call.clone(), gas_price));
        Ok(DEST_TX)
    }

    async fn wait_for_destination_receipt(
        &self,
        tx_hash: B256,
        _timeout: Duration,
    ) -> Result<Option<DestinationReceipt>> {
        if self.dest_timeout.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(DestinationReceipt {
            tx_hash,
            success: !self.dest_revert.load(Ordering::SeqCst),
            block_number: 1,
            gas_used: 21_000,
        }))
    }
}
