//! hashledger - A single-process, hash-chained proof-of-work ledger
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the chain, validation and the interchange snapshot
//! - [`transaction`] - Transfer records and their content-derived ids
//! - [`mempool`] - Pending transactions awaiting a block
//! - [`canonical`] - Byte-exact encoding fed to the hash function
//!
//! ## Consensus
//! - [`miner`] - Cancellable proof-of-work sealing
//!
//! ## Runtime
//! - [`node`] - Shared ledger handle and node lifecycle
//! - [`persistence`] - Snapshot files
//!
//! ## Integration
//! - [`api`] - REST API (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`cli`] - CLI utilities

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod canonical;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Runtime
// ============================================================================
pub mod node;
pub mod persistence;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod cli;
pub mod config;
pub mod error;
