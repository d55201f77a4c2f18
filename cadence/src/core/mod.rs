//! # Core Scheduling Engine
//!
//! The components every account worker is assembled from.
//!
//! ## Sub-modules
//!
//! - **`endpoint_pool`**: The shared RPC endpoint list and its failover cursor.
//!
//! - **`executor`**: Drives a single wrap or unwrap to a terminal outcome,
//!   owning the balance check, nonce refresh and retry / failover policy.
//!
//! - **`scheduler`**: Rolls each day's quota, blackout window and slot
//!   interval, and draws per-slot gas price, amount and pair delay.
//!
//! - **`tracker`**: Durable per-account record of slots per UTC date.
//!
//! - **`clock`**: The UTC wall clock, swappable in tests.

pub mod clock;
pub mod endpoint_pool;
pub mod executor;
pub mod scheduler;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;
