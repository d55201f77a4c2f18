//! # Endpoint Pool - Failover Cursor
//!
//! Holds the ordered list of RPC endpoints shared by every account worker and
//! a single cursor naming the active one. Rotation is the only recovery
//! mechanism for transport-level failures: a worker that sees a malformed
//! response moves the cursor on and retries against the next endpoint.
//!
//! The cursor is an `AtomicUsize`. Concurrent rotations from several workers
//! may interleave in any order; callers only rely on eventually reaching a
//! different endpoint, never on a specific one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::chain::ChainEndpoint;
use crate::error::PoolError;

#[derive(Debug)]
pub struct EndpointPool<E> {
    endpoints: Vec<Arc<E>>,
    cursor: AtomicUsize,
}

impl<E: ChainEndpoint> EndpointPool<E> {
    pub fn new(endpoints: Vec<E>) -> Result<Self, PoolError> {
        if endpoints.is_empty() {
            return Err(PoolError::Empty);
        }

        info!("🌐 EndpointPool initialized with {} endpoints", endpoints.len());
        for endpoint in &endpoints {
            info!("   📡 {}", endpoint.url());
        }

        Ok(Self {
            endpoints: endpoints.into_iter().map(Arc::new).collect(),
            cursor: AtomicUsize::new(0),
        })
    }

    /// The endpoint under the cursor.
    pub fn current(&self) -> Arc<E> {
        self.endpoints[self.index()].clone()
    }

    /// Advances the cursor to `(i + 1) mod N` and returns the new current endpoint.
    pub fn rotate(&self) -> Arc<E> {
        let len = self.endpoints.len();
        let previous = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
            .unwrap_or_else(|i| i);
        let next = &self.endpoints[(previous + 1) % len];
        if len == 1 {
            warn!("Only one RPC endpoint configured; retrying {}", next.url());
        } else {
            info!("Switching to RPC: {}", next.url());
        }
        next.clone()
    }

    pub fn index(&self) -> usize {
        self.cursor.load(Ordering::Acquire) % self.endpoints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::ScriptedEndpoint;

    fn pool(n: usize) -> EndpointPool<ScriptedEndpoint> {
        let endpoints = (0..n)
            .map(|i| ScriptedEndpoint::new(&format!("http://rpc-{i}")))
            .collect();
        EndpointPool::new(endpoints).unwrap()
    }

    #[test]
    fn empty_pool_is_rejected() {
        let result = EndpointPool::<ScriptedEndpoint>::new(Vec::new());
        assert_eq!(result.err(), Some(PoolError::Empty));
    }

    #[test]
    fn rotation_is_cyclic() {
        let pool = pool(5);
        assert_eq!(pool.index(), 0);
        assert_eq!(pool.current().url(), "http://rpc-0");

        assert_eq!(pool.rotate().url(), "http://rpc-1");
        assert_eq!(pool.current().url(), "http://rpc-1");

        for _ in 0..4 {
            pool.rotate();
        }
        assert_eq!(pool.index(), 0);
    }

    #[test]
    fn single_endpoint_rotates_onto_itself() {
        let pool = pool(1);
        assert_eq!(pool.rotate().url(), "http://rpc-0");
        assert_eq!(pool.index(), 0);
    }

    #[test]
    fn concurrent_rotations_stay_in_range() {
        let pool = Arc::new(pool(3));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..300 {
                        pool.rotate();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // 2400 rotations over 3 endpoints land back on 0.
        assert_eq!(pool.index(), 0);
    }
}
