//! Scripted chain endpoint for unit tests.

use alloy::primitives::{Address, TxHash, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::chain::ChainEndpoint;
use crate::error::ActionError;
use crate::state::{ActionKind, TransactionIntent};
use crate::wallet::Account;

pub const ETHER: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

pub fn hash(n: u8) -> TxHash {
    TxHash::with_last_byte(n)
}

pub fn test_account(index: usize) -> Account {
    Account::new(index, PrivateKeySigner::random())
}

#[derive(Debug)]
struct Script {
    balance: U256,
    nonce: u64,
    nonce_fetches: usize,
    performs: VecDeque<Result<TxHash, ActionError>>,
    performed: Vec<ActionKind>,
    seen_nonces: Vec<u64>,
    next_hash: u8,
}

/// Endpoint whose `perform` results are queued up front. Once the queue is
/// empty every action succeeds with a fresh hash. Clones share the script.
#[derive(Debug, Clone)]
pub struct ScriptedEndpoint {
    url: String,
    script: Arc<Mutex<Script>>,
}

impl ScriptedEndpoint {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            script: Arc::new(Mutex::new(Script {
                balance: ETHER,
                nonce: 0,
                nonce_fetches: 0,
                performs: VecDeque::new(),
                performed: Vec::new(),
                seen_nonces: Vec::new(),
                next_hash: 100,
            })),
        }
    }

    pub fn with_balance(self, balance: U256) -> Self {
        self.script.lock().balance = balance;
        self
    }

    pub fn set_balance(&self, balance: U256) {
        self.script.lock().balance = balance;
    }

    pub fn push_perform(&self, result: Result<TxHash, ActionError>) {
        self.script.lock().performs.push_back(result);
    }

    pub fn performed(&self) -> Vec<ActionKind> {
        self.script.lock().performed.clone()
    }

    pub fn seen_nonces(&self) -> Vec<u64> {
        self.script.lock().seen_nonces.clone()
    }

    pub fn nonce_fetches(&self) -> usize {
        self.script.lock().nonce_fetches
    }
}

#[async_trait]
impl ChainEndpoint for ScriptedEndpoint {
    fn url(&self) -> &str {
        &self.url
    }

    async fn balance(&self, _address: Address) -> Result<U256, ActionError> {
        Ok(self.script.lock().balance)
    }

    async fn pending_nonce(&self, _address: Address) -> Result<u64, ActionError> {
        let mut script = self.script.lock();
        script.nonce_fetches += 1;
        Ok(script.nonce)
    }

    async fn perform(&self, intent: &TransactionIntent<'_>) -> Result<TxHash, ActionError> {
        let mut script = self.script.lock();
        script.performed.push(intent.kind);
        script.seen_nonces.push(intent.nonce);
        let result = match script.performs.pop_front() {
            Some(result) => result,
            None => {
                script.next_hash = script.next_hash.wrapping_add(1);
                Ok(hash(script.next_hash))
            }
        };
        // A submitted or conflicting nonce is consumed from the node's view.
        if matches!(result, Ok(_) | Err(ActionError::NonceConflict(_))) {
            script.nonce += 1;
        }
        result
    }
}
