//! # cadence
//!
//! Drives a fleet of accounts through paired wrap / unwrap transactions on
//! a per-account daily schedule, failing over between RPC endpoints and
//! persisting each account's daily progress so restarts resume where they
//! left off.

pub mod chain;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod state;
pub mod wallet;
