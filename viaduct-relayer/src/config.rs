use std::path::PathBuf;

use alloy_primitives::{address, Address};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The top-level configuration for the `viaduct-relayer` library.
///
/// This struct aggregates all necessary settings: the interop contract
/// addresses, finalization behavior, queue scheduling, and state file
/// locations. It is typically deserialized from a configuration file and
/// passed to the `Relayer` upon initialization.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct RelayerConfig {
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub finalize: FinalizeConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub state: StateConfig,
}

/// The on-chain addresses and identifiers the relayer is bound to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContractsConfig {
    /// The source-chain contract whose emitted messages this relayer
    /// finalizes.
    pub interop_center: Address,
    /// The destination-chain contract that consumes finalized messages.
    pub interop_handler: Address,
    /// The source chain's base-token system contract. Cross-layer logs from
    /// it indicate a base-asset withdrawal that must finalize first.
    pub base_token: Address,
    /// The source chain's id, passed through in every finalization call.
    pub source_chain_id: u64,
}

/// Tuning for the per-transaction finalization attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FinalizeConfig {
    /// How long to wait for the destination-chain receipt before reporting
    /// the attempt as still pending.
    pub receipt_timeout_secs: u64,
    /// Percentage bump applied to the destination gas price on submission.
    pub gas_bump_percent: u64,
}

/// Scheduling behavior for the queue worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueueConfig {
    /// The interval in seconds between queue passes. The first pass runs
    /// immediately on startup.
    pub poll_interval_secs: u64,
    /// Delay in milliseconds between records within one pass, throttling
    /// against RPC rate limits.
    pub record_delay_ms: u64,
    /// Maximum number of finalized records retained, most recent first.
    pub finalized_history_limit: usize,
}

/// Locations of the durable state files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StateConfig {
    pub pending_file: PathBuf,
    pub finalized_file: PathBuf,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            interop_center: Address::ZERO,
            interop_handler: Address::ZERO,
            base_token: address!("0x000000000000000000000000000000000000800a"),
            source_chain_id: 8022833,
        }
    }
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            receipt_timeout_secs: 300,
            gas_bump_percent: 20,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            record_delay_ms: 1000,
            finalized_history_limit: 50,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            pending_file: PathBuf::from("./txn-state/pending-txs.json"),
            finalized_file: PathBuf::from("./txn-state/finalized-txs.json"),
        }
    }
}

/// Loads the relayer configuration from a TOML file, with `VIADUCT__`
/// prefixed environment variables layered on top.
pub fn load_config(path: &str) -> Result<RelayerConfig> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("VIADUCT").separator("__"));

    let settings: RelayerConfig = builder
        .build()
        .context(format!("Failed to build configuration from '{}'", path))?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    Ok(settings)
}
