//! Durable pending/finalized record storage.
//!
//! Two JSON files hold the whole truth: an array of records awaiting
//! finalization and an array of completed outcomes kept for display. Both are
//! read whole and written whole, so recovery after a restart is simply
//! re-reading the files. The pending file additionally tolerates hand-written
//! `/* ... */` and `//` comments so an operator can annotate it between runs.

use std::fs;
use std::path::{Path, PathBuf};

use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StateConfig;
use crate::error::StateError;
use crate::metadata::{TxAction, TxMetadata};

/// A transaction awaiting finalization on the destination chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRecord {
    pub source_tx_hash: B256,
    pub account_address: Address,
    #[serde(default)]
    pub action: TxAction,
    #[serde(default = "default_amount")]
    pub amount: String,
    pub added_at: DateTime<Utc>,
    /// Informational only; nothing branches on it.
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_finalize_hash: Option<B256>,
    /// Last time the record was requeued as still-pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_amount() -> String {
    "0".to_string()
}

fn default_status() -> String {
    "pending".to_string()
}

impl PendingRecord {
    pub fn new(source_tx_hash: B256, metadata: &TxMetadata, account_address: Address) -> Self {
        Self {
            source_tx_hash,
            account_address,
            action: metadata.action,
            amount: metadata.amount.clone(),
            added_at: Utc::now(),
            status: default_status(),
            last_finalize_hash: None,
            updated_at: None,
        }
    }

    /// Whether the record still carries the classifier defaults and should be
    /// re-classified from its receipt.
    pub fn needs_metadata(&self) -> bool {
        self.action == TxAction::Unknown && self.amount == default_amount()
    }
}

/// A completed finalization outcome, retained for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedRecord {
    pub source_tx_hash: B256,
    /// The destination-chain transaction that consumed the message; `null`
    /// when finalization required no destination transaction.
    pub finalize_tx_hash: Option<B256>,
    pub finalized_at: DateTime<Utc>,
    pub action: TxAction,
    pub amount: String,
    pub account_address: Address,
}

/// File-backed storage for the pending and finalized record sets.
///
/// Constructed once at startup and shared by reference; the queue worker is
/// the only writer, so the files never see concurrent mutation.
#[derive(Debug, Clone)]
pub struct StateStore {
    pending_path: PathBuf,
    finalized_path: PathBuf,
}

impl StateStore {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            pending_path: config.pending_file.clone(),
            finalized_path: config.finalized_file.clone(),
        }
    }

    /// Loads the pending set, optionally filtered to one account. A missing
    /// file, or one that is blank once comments are stripped, is an empty
    /// set.
    pub fn load_pending(&self, account: Option<Address>) -> Result<Vec<PendingRecord>, StateError> {
        let Some(raw) = read_if_exists(&self.pending_path)? else {
            return Ok(Vec::new());
        };
        let sanitized = strip_comments(&raw);
        if sanitized.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut records: Vec<PendingRecord> =
            serde_json::from_str(&sanitized).map_err(|source| StateError::Parse {
                path: self.pending_path.clone(),
                source,
            })?;
        if let Some(account) = account {
            records.retain(|record| record.account_address == account);
        }
        Ok(records)
    }

    /// Overwrites the pending file with the full record set.
    pub fn save_pending(&self, records: &[PendingRecord]) -> Result<(), StateError> {
        write_pretty(&self.pending_path, records)
    }

    /// Loads the finalized set, optionally filtered to one account.
    pub fn load_finalized(
        &self,
        account: Option<Address>,
    ) -> Result<Vec<FinalizedRecord>, StateError> {
        let Some(raw) = read_if_exists(&self.finalized_path)? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut records: Vec<FinalizedRecord> =
            serde_json::from_str(&raw).map_err(|source| StateError::Parse {
                path: self.finalized_path.clone(),
                source,
            })?;
        if let Some(account) = account {
            records.retain(|record| record.account_address == account);
        }
        Ok(records)
    }

    /// Overwrites the finalized file with the full record set.
    pub fn save_finalized(&self, records: &[FinalizedRecord]) -> Result<(), StateError> {
        write_pretty(&self.finalized_path, records)
    }

    /// Idempotently inserts a new pending record. A hash already present in
    /// either set is left untouched; returns whether a record was added.
    pub fn add_pending(
        &self,
        source_tx_hash: B256,
        metadata: &TxMetadata,
        account_address: Address,
    ) -> Result<bool, StateError> {
        let mut pending = self.load_pending(None)?;
        let finalized = self.load_finalized(None)?;

        let already_tracked = pending
            .iter()
            .any(|record| record.source_tx_hash == source_tx_hash)
            || finalized
                .iter()
                .any(|record| record.source_tx_hash == source_tx_hash);
        if already_tracked {
            return Ok(false);
        }

        pending.push(PendingRecord::new(source_tx_hash, metadata, account_address));
        self.save_pending(&pending)?;
        Ok(true)
    }
}

fn read_if_exists(path: &Path) -> Result<Option<String>, StateError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StateError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_pretty<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StateError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| StateError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }
    let contents = serde_json::to_string_pretty(records).map_err(|source| StateError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, contents).map_err(|source| StateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Removes `/* ... */` blocks and lines starting with `//` so hand-annotated
/// pending files still parse. An unterminated block is left in place, exactly
/// like the file content it is.
fn strip_comments(input: &str) -> String {
    let mut without_blocks = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("/*") {
        without_blocks.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                without_blocks.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    without_blocks.push_str(rest);

    without_blocks
        .lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}
