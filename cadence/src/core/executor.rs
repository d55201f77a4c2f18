//! # Transaction Executor
//!
//! Drives one action (wrap or unwrap) for one account to a terminal outcome.
//!
//! ## Attempt Flow
//!
//! 1.  **Cost Check:** `gas_limit × gas_price` against the account balance read
//!     from the current endpoint. Not enough funds ends the action without retry.
//!
//! 2.  **Nonce:** The pending nonce is fetched on every attempt. A failed
//!     attempt may already have been seen by the node, so nothing is cached.
//!
//! 3.  **Dispatch:** A fresh `TransactionIntent` goes to the endpoint.
//!
//! 4.  **Recovery:** Failures are classified:
//!     - transport errors rotate the `EndpointPool` and retry at once;
//!     - nonce conflicts retry at once with a new nonce;
//!     - node-reported insufficient funds end the action;
//!     - everything else sleeps the backoff interval and retries.
//!
//! Retries are unbounded unless `RetryPolicy::max_attempts` is set, in which
//! case the executor reports `GaveUp` once the ceiling is reached.

use alloy::primitives::{TxHash, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::endpoint_pool::EndpointPool;
use crate::chain::ChainEndpoint;
use crate::error::ActionError;
use crate::state::{ActionKind, TransactionIntent};
use crate::wallet::Account;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries until success or insufficient funds.
    pub max_attempts: Option<u32>,
    pub backoff: Duration,
    /// Ceiling for the doubling backoff. Equal to `backoff` for a fixed interval.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before the `n`th consecutive backoff (1-based).
    pub fn backoff_for(&self, n: u32) -> Duration {
        if self.max_backoff <= self.backoff {
            return self.backoff;
        }
        let factor = 1u32 << n.saturating_sub(1).min(16);
        self.backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Terminal result of `TransactionExecutor::execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Sent(TxHash),
    /// Returned by the balance pre-check, and also without retry when the node
    /// rejects a submission for insufficient funds. `balance` is `None` in the
    /// latter case.
    InsufficientFunds { required: U256, balance: Option<U256> },
    GaveUp { attempts: u32, last_error: ActionError },
}

enum Attempt {
    Sent(TxHash),
    Underfunded(U256),
}

pub struct TransactionExecutor<E> {
    pool: Arc<EndpointPool<E>>,
    gas_limit: u64,
    retry: RetryPolicy,
}

impl<E> Clone for TransactionExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            gas_limit: self.gas_limit,
            retry: self.retry.clone(),
        }
    }
}

impl<E: ChainEndpoint> TransactionExecutor<E> {
    pub fn new(pool: Arc<EndpointPool<E>>, gas_limit: u64, retry: RetryPolicy) -> Self {
        Self {
            pool,
            gas_limit,
            retry,
        }
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn total_cost(&self, gas_price_wei: u128) -> U256 {
        U256::from(self.gas_limit) * U256::from(gas_price_wei)
    }

    pub async fn execute(
        &self,
        kind: ActionKind,
        amount: U256,
        gas_price_wei: u128,
        account: &Account,
        slot: u32,
    ) -> ExecutionOutcome {
        let required = self.total_cost(gas_price_wei);
        let mut attempts = 0u32;
        let mut backoffs = 0u32;

        loop {
            attempts += 1;
            let endpoint = self.pool.current();
            let err = match self
                .attempt(endpoint.as_ref(), kind, amount, gas_price_wei, account, required)
                .await
            {
                Ok(Attempt::Sent(hash)) => return ExecutionOutcome::Sent(hash),
                Ok(Attempt::Underfunded(balance)) => {
                    warn!(
                        "{}: Insufficient funds for tx cost ({} < {} wei), {} skipped.",
                        account.label(),
                        balance,
                        required,
                        kind
                    );
                    return ExecutionOutcome::InsufficientFunds {
                        required,
                        balance: Some(balance),
                    };
                }
                Err(err) => err,
            };

            error!(
                "{}, Transaction {}: Error executing {} (attempt {} via {}): {}",
                account.label(),
                slot,
                kind,
                attempts,
                endpoint.url(),
                err
            );

            if let ActionError::InsufficientFunds(_) = err {
                return ExecutionOutcome::InsufficientFunds {
                    required,
                    balance: None,
                };
            }
            if self.retry.max_attempts.is_some_and(|max| attempts >= max) {
                warn!(
                    "{}, Transaction {}: giving up {} after {} attempts",
                    account.label(),
                    slot,
                    kind,
                    attempts
                );
                return ExecutionOutcome::GaveUp {
                    attempts,
                    last_error: err,
                };
            }

            match err {
                ActionError::Transport(_) => {
                    info!("Retrying on next endpoint...");
                    self.pool.rotate();
                }
                ActionError::NonceConflict(_) => {
                    info!("Nonce conflict, retrying with new nonce...");
                }
                _ => {
                    backoffs += 1;
                    tokio::time::sleep(self.retry.backoff_for(backoffs)).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        endpoint: &E,
        kind: ActionKind,
        amount: U256,
        gas_price_wei: u128,
        account: &Account,
        required: U256,
    ) -> Result<Attempt, ActionError> {
        let balance = endpoint.balance(account.address).await?;
        if balance < required {
            return Ok(Attempt::Underfunded(balance));
        }
        let nonce = endpoint.pending_nonce(account.address).await?;
        let intent = TransactionIntent {
            kind,
            amount,
            gas_price_wei,
            nonce,
            account,
        };
        endpoint.perform(&intent).await.map(Attempt::Sent)
    }
}
