//! Core type definitions for the Crowdsale funding engine.
//!
//! This crate provides the shared vocabulary. No business logic, just types:
//! identifiers, amounts, the project lifecycle enum and the error taxonomy.

#![deny(unsafe_code)]

pub mod error;
pub mod ids;
pub mod state;

pub use error::{CrowdsaleError, CrowdsaleResult, ErrorKind};
pub use ids::{Address, ProjectId, TxIndex, VaultId};
pub use state::ProjectState;

/// Exact integer units of value (lamports, cents, wei-like minor units).
pub type Amount = u64;
