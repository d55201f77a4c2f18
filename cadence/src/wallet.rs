//! # Wallet Manager
//!
//! Loads the account fleet from the environment. Each account is an
//! `(address, private key)` pair supplied as `WALLET_ADDRESS_N` /
//! `PRIVATE_KEY_N`, numbered from 1. The keys never leave this module except
//! as an `alloy` signer handed to the chain layer.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{anyhow, bail, Context, Result};
use std::{env, fmt, str::FromStr};
use tracing::info;

pub const ADDRESS_ENV_PREFIX: &str = "WALLET_ADDRESS_";
pub const KEY_ENV_PREFIX: &str = "PRIVATE_KEY_";

/// An independently keyed account driven by one worker.
#[derive(Clone)]
pub struct Account {
    /// 1-based position in the credential list; names the tracker file.
    pub index: usize,
    pub address: Address,
    signer: PrivateKeySigner,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("index", &self.index)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Account {
    pub fn new(index: usize, signer: PrivateKeySigner) -> Self {
        Self {
            index,
            address: signer.address(),
            signer,
        }
    }

    /// Parses a hex private key and checks it against the declared address.
    pub fn from_credentials(index: usize, address: &str, private_key: &str) -> Result<Self> {
        let declared = Address::from_str(address.trim())
            .with_context(|| format!("wallet {}: invalid address '{}'", index, address))?;
        let key = private_key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        let signer = PrivateKeySigner::from_str(key)
            .map_err(|e| anyhow!("wallet {}: invalid private key: {}", index, e))?;
        if signer.address() != declared {
            bail!(
                "wallet {}: private key belongs to {}, not {}",
                index,
                signer.address(),
                declared
            );
        }
        Ok(Self::new(index, signer))
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn label(&self) -> String {
        format!("Wallet {}", self.index)
    }
}

/// Builds accounts from ordered `(address, key)` pairs.
pub fn accounts_from_pairs<I, A, K>(pairs: I) -> Result<Vec<Account>>
where
    I: IntoIterator<Item = (A, K)>,
    A: AsRef<str>,
    K: AsRef<str>,
{
    pairs
        .into_iter()
        .enumerate()
        .map(|(i, (address, key))| Account::from_credentials(i + 1, address.as_ref(), key.as_ref()))
        .collect()
}

/// Reads `WALLET_ADDRESS_N` / `PRIVATE_KEY_N` for N = 1.. until the first gap.
pub fn load_accounts_from_env() -> Result<Vec<Account>> {
    let mut pairs = Vec::new();
    for n in 1.. {
        let address = env::var(format!("{ADDRESS_ENV_PREFIX}{n}"));
        let key = env::var(format!("{KEY_ENV_PREFIX}{n}"));
        match (address, key) {
            (Ok(address), Ok(key)) => pairs.push((address, key)),
            (Err(_), Err(_)) => break,
            _ => bail!(
                "wallet {n}: both {ADDRESS_ENV_PREFIX}{n} and {KEY_ENV_PREFIX}{n} must be set"
            ),
        }
    }
    if pairs.is_empty() {
        bail!("no accounts configured; set {ADDRESS_ENV_PREFIX}1 and {KEY_ENV_PREFIX}1");
    }
    let accounts = accounts_from_pairs(pairs)?;
    for account in &accounts {
        info!("✅ {} loaded: {}", account.label(), account.address);
    }
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (anvil account 0).
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn credentials_must_match_address() {
        let account = Account::from_credentials(1, DEV_ADDRESS, DEV_KEY).unwrap();
        assert_eq!(account.address, Address::from_str(DEV_ADDRESS).unwrap());
        assert_eq!(account.label(), "Wallet 1");

        let other = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
        assert!(Account::from_credentials(1, other, DEV_KEY).is_err());
        assert!(Account::from_credentials(1, DEV_ADDRESS, "not-a-key").is_err());
    }

    #[test]
    fn pairs_are_numbered_from_one() {
        let accounts =
            accounts_from_pairs([(DEV_ADDRESS, DEV_KEY), (DEV_ADDRESS, DEV_KEY)]).unwrap();
        assert_eq!(accounts[0].index, 1);
        assert_eq!(accounts[1].index, 2);
    }
}
