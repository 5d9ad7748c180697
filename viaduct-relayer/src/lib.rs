//! A core Rust library for finalizing L2-to-L1 interop messages.
//!
//! This crate provides the building blocks for a backend service that observes
//! source-chain (L2) transactions carrying cross-layer messages and drives
//! each of them to completion on the destination chain (L1): fetching Merkle
//! proofs as they become available, submitting the finalization call, and
//! persisting pending/finalized state so no message is lost or
//! double-finalized across process restarts.
//!
//! # Key Components
//!
//! *   [`rpc::ChainClient`]: The trait through which all chain access flows.
//!     The embedding host supplies the live implementation; tests supply a
//!     mock one.
//! *   [`workers::Relayer`]: The main entry point. It owns the periodic queue
//!     worker and is consumed when its `run` method is called.
//! *   [`workers::RelayerHandle`]: A clonable handle exposing the ingestion
//!     surface (enqueue, status queries) and graceful shutdown.
//! *   [`state::StateStore`]: Durable, file-backed pending/finalized record
//!     storage.
/// Defines configuration structures for the relayer.
pub mod config;
/// Typed errors for storage and configuration loading.
pub mod error;
/// The per-transaction finalization state machine.
pub mod finalize;
/// Classification of interop payloads into user-meaningful actions.
pub mod metadata;
/// The chain access trait and the wire-shaped types it yields.
pub mod rpc;
/// Durable pending/finalized record storage.
pub mod state;
/// The background queue worker and the relayer service runner.
pub mod workers;
