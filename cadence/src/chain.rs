//! # Chain Layer
//!
//! The action interface seen by the executor, and its `alloy`-backed
//! implementation for a WETH-style wrapped native token.
//!
//! `RpcEndpoint` builds, signs and submits legacy-priced transactions:
//! - **Wrap:** `deposit()` with `value = amount`.
//! - **Unwrap:** `withdraw(amount)`, followed after a fixed delay by an optional
//!   auxiliary payment to a configured recipient. That payment is best effort
//!   and never fails the unwrap.
//!
//! Every RPC failure is mapped onto `ActionError` so the executor can decide
//! between rotating endpoints, re-fetching the nonce and backing off.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::eth::TransactionRequest;
use alloy::sol_types::SolCall;
use alloy::transports::http::{Client, Http};
use alloy::transports::{RpcError, TransportError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ActionError;
use crate::state::{ActionKind, TransactionIntent};
use crate::wallet::Account;

pub const WEI_PER_GWEI: f64 = 1e9;
pub const WEI_PER_MICRO_ETH: u128 = 1_000_000_000_000;

alloy::sol! {
    interface IWrappedNative {
        function deposit() external payable;
        function withdraw(uint256 wad) external;
    }
}

/// A single RPC endpoint able to read account state and perform actions.
#[async_trait]
pub trait ChainEndpoint: Send + Sync + 'static {
    fn url(&self) -> &str;

    async fn balance(&self, address: Address) -> Result<U256, ActionError>;

    /// Nonce including transactions still in the node's pool.
    async fn pending_nonce(&self, address: Address) -> Result<u64, ActionError>;

    async fn perform(&self, intent: &TransactionIntent<'_>) -> Result<TxHash, ActionError>;
}

/// Converts a native-unit amount to wei at micro-ether precision.
pub fn eth_to_wei(eth: f64) -> U256 {
    let micros = (eth * 1e6).round().max(0.0) as u128;
    U256::from(micros * WEI_PER_MICRO_ETH)
}

#[derive(Debug, Clone)]
pub struct TaxPayment {
    pub recipient: Address,
    pub amount: U256,
    pub delay: Duration,
}

/// Chain parameters shared by every endpoint.
#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub chain_id: u64,
    pub gas_limit: u64,
    pub wrapped_native: Address,
    pub tax: Option<TaxPayment>,
}

impl ChainSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let wrapped_native = Address::from_str(&config.wrapped_native).with_context(|| {
            format!("invalid wrapped_native address '{}'", config.wrapped_native)
        })?;
        let tax = match &config.tax.recipient {
            Some(recipient) => Some(TaxPayment {
                recipient: Address::from_str(recipient)
                    .with_context(|| format!("invalid tax.recipient '{}'", recipient))?,
                amount: eth_to_wei(config.tax.amount_eth),
                delay: Duration::from_millis(config.tax.delay_ms),
            }),
            None => None,
        };
        Ok(Self {
            chain_id: config.chain_id,
            gas_limit: config.gas.gas_limit,
            wrapped_native,
            tax,
        })
    }
}

pub struct RpcEndpoint {
    url: String,
    provider: RootProvider<Http<Client>>,
    settings: Arc<ChainSettings>,
}

impl RpcEndpoint {
    pub fn connect(url: &str, settings: Arc<ChainSettings>) -> Result<Self> {
        let parsed = url
            .parse()
            .with_context(|| format!("invalid RPC url '{}'", url))?;
        Ok(Self {
            url: url.to_string(),
            provider: RootProvider::new_http(parsed),
            settings,
        })
    }

    async fn submit(
        &self,
        account: &Account,
        request: TransactionRequest,
        gas_price_wei: u128,
        nonce: u64,
    ) -> Result<TxHash, ActionError> {
        let wallet = EthereumWallet::from(account.signer().clone());
        let mut request = request
            .with_chain_id(self.settings.chain_id)
            .with_nonce(nonce)
            .with_gas_limit(self.settings.gas_limit)
            .with_gas_price(gas_price_wei);
        request.from = Some(account.address);

        let envelope = request
            .build(&wallet)
            .await
            .map_err(|e| ActionError::Rejected(format!("signing failed: {e}")))?;
        let pending = self
            .provider
            .send_raw_transaction(&envelope.encoded_2718())
            .await
            .map_err(classify_rpc_error)?;
        Ok(*pending.tx_hash())
    }

    async fn pay_tax(&self, account: &Account, gas_price_wei: u128, tax: &TaxPayment) {
        tokio::time::sleep(tax.delay).await;
        let result: Result<TxHash, ActionError> = async {
            let nonce = self.pending_nonce(account.address).await?;
            let request = TransactionRequest::default()
                .with_to(tax.recipient)
                .with_value(tax.amount);
            self.submit(account, request, gas_price_wei, nonce).await
        }
        .await;
        match result {
            Ok(hash) => debug!("{}: auxiliary payment sent: {}", account.label(), hash),
            Err(e) => warn!("{}: auxiliary payment failed: {}", account.label(), e),
        }
    }
}

#[async_trait]
impl ChainEndpoint for RpcEndpoint {
    fn url(&self) -> &str {
        &self.url
    }

    async fn balance(&self, address: Address) -> Result<U256, ActionError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(classify_rpc_error)
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, ActionError> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(classify_rpc_error)
    }

    async fn perform(&self, intent: &TransactionIntent<'_>) -> Result<TxHash, ActionError> {
        let contract = self.settings.wrapped_native;
        let request = match intent.kind {
            ActionKind::Wrap => TransactionRequest::default()
                .with_to(contract)
                .with_input(IWrappedNative::depositCall {}.abi_encode())
                .with_value(intent.amount),
            ActionKind::Unwrap => TransactionRequest::default()
                .with_to(contract)
                .with_input(IWrappedNative::withdrawCall { wad: intent.amount }.abi_encode()),
        };

        let hash = self
            .submit(intent.account, request, intent.gas_price_wei, intent.nonce)
            .await?;
        info!(
            "📤 {} {} submitted via {}: {}",
            intent.account.label(),
            intent.kind,
            self.url,
            hash
        );

        if intent.kind == ActionKind::Unwrap {
            if let Some(tax) = &self.settings.tax {
                self.pay_tax(intent.account, intent.gas_price_wei, tax).await;
            }
        }
        Ok(hash)
    }
}

/// Maps an `alloy` transport error to the executor's recovery classes.
fn classify_rpc_error(err: TransportError) -> ActionError {
    match &err {
        RpcError::ErrorResp(payload) => ActionError::classify(payload.message.to_string()),
        RpcError::NullResp | RpcError::DeserError { .. } | RpcError::Transport(_) => {
            ActionError::Transport(err.to_string())
        }
        _ => ActionError::classify(err.to_string()),
    }
}
