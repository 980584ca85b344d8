// Thin re-export module: implementation is in `blockchain/core.rs`, split
// into chain management, the optional query index, validation, and the
// interchange snapshot.

pub mod core;
pub use core::*;
