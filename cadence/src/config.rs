//! # Central Configuration Module
//!
//! This module defines the global configuration structure for the scheduler.
//! It uses `serde` to deserialize a `config.toml` file into a strongly-typed
//! `Config` struct.
//!
//! ## Core Principles
//!
//! - **Centralization:** All tunable parameters live here, grouped by concern
//!   (`[schedule]`, `[gas]`, `[amount]`, `[retry]`, `[tax]`).
//! - **Resilience:** The binary runs with a minimal or even non-existent config
//!   file by falling back to default values for every parameter.
//! - **Validation:** Values that would break the scheduler (empty endpoint list,
//!   inverted ranges, zero quota) are rejected at startup by `validate`.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::{env, fs, time::Duration};
use tracing::warn;

use crate::core::executor::RetryPolicy;

pub const CONFIG_PATH_ENV: &str = "CADENCE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Daily budget and blackout parameters, `[schedule]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_min_per_day")]
    pub min_per_day: u32,
    #[serde(default = "default_max_per_day")]
    pub max_per_day: u32,
    /// Hard ceiling on recorded slots per account per UTC day.
    #[serde(default = "default_max_transactions_per_day")]
    pub max_transactions_per_day: u32,
    #[serde(default = "default_blackout_hours")]
    pub blackout_hours: u32,
    /// Blackout start hour is drawn from `[0, blackout_start_range)`.
    #[serde(default = "default_blackout_start_range")]
    pub blackout_start_range: u32,
    #[serde(default = "default_blackout_counts_toward_quota")]
    pub blackout_counts_toward_quota: bool,
    #[serde(default = "default_day_length_ms")]
    pub day_length_ms: u64,
    #[serde(default = "default_pair_delay_max_ms")]
    pub pair_delay_max_ms: u64,
    #[serde(default = "default_rollover_poll_ms")]
    pub rollover_poll_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            min_per_day: default_min_per_day(),
            max_per_day: default_max_per_day(),
            max_transactions_per_day: default_max_transactions_per_day(),
            blackout_hours: default_blackout_hours(),
            blackout_start_range: default_blackout_start_range(),
            blackout_counts_toward_quota: default_blackout_counts_toward_quota(),
            day_length_ms: default_day_length_ms(),
            pair_delay_max_ms: default_pair_delay_max_ms(),
            rollover_poll_ms: default_rollover_poll_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GasConfig {
    #[serde(default = "default_min_gwei")]
    pub min_gwei: f64,
    #[serde(default = "default_max_gwei")]
    pub max_gwei: f64,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            min_gwei: default_min_gwei(),
            max_gwei: default_max_gwei(),
            gas_limit: default_gas_limit(),
        }
    }
}

/// Wrap amount band in native units, `[amount]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct AmountConfig {
    #[serde(default = "default_min_eth")]
    pub min_eth: f64,
    #[serde(default = "default_max_eth")]
    pub max_eth: f64,
}

impl Default for AmountConfig {
    fn default() -> Self {
        Self {
            min_eth: default_min_eth(),
            max_eth: default_max_eth(),
        }
    }
}

/// Retry ceiling for the executor. No `max_attempts` means retry forever.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default)]
    pub max_backoff_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: None,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        let backoff = Duration::from_millis(self.backoff_ms);
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff,
            max_backoff: self
                .max_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(backoff),
        }
    }
}

/// Auxiliary payment sent after every unwrap, `[tax]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxConfig {
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default = "default_tax_amount_eth")]
    pub amount_eth: f64,
    #[serde(default = "default_tax_delay_ms")]
    pub delay_ms: u64,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            recipient: None,
            amount_eth: default_tax_amount_eth(),
            delay_ms: default_tax_delay_ms(),
        }
    }
}

/// The main configuration structure for the application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // -- Network Settings --
    #[serde(default = "default_rpc_endpoints")]
    pub rpc_endpoints: Vec<String>,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_wrapped_native")]
    pub wrapped_native: String,
    #[serde(default = "default_explorer_tx_url")]
    pub explorer_tx_url: String,

    // -- Persistence --
    #[serde(default = "default_tracker_dir")]
    pub tracker_dir: String,

    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub amount: AmountConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub tax: TaxConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_endpoints: default_rpc_endpoints(),
            chain_id: default_chain_id(),
            wrapped_native: default_wrapped_native(),
            explorer_tx_url: default_explorer_tx_url(),
            tracker_dir: default_tracker_dir(),
            schedule: ScheduleConfig::default(),
            gas: GasConfig::default(),
            amount: AmountConfig::default(),
            retry: RetryConfig::default(),
            tax: TaxConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from `config.toml`, or from the path in `CADENCE_CONFIG`.
    /// If the file doesn't exist or fails to parse, it returns a default configuration.
    pub fn load() -> Self {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        match fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                warn!("Failed to parse {}: {}. Using default values.", path, e);
                Config::default()
            }),
            Err(_) => {
                warn!("{} not found. Using default values.", path);
                Config::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Rejects settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.rpc_endpoints.is_empty() {
            bail!("rpc_endpoints must contain at least one endpoint");
        }
        let s = &self.schedule;
        if s.min_per_day == 0 || s.min_per_day > s.max_per_day {
            bail!(
                "schedule.min_per_day ({}) must be in 1..=max_per_day ({})",
                s.min_per_day,
                s.max_per_day
            );
        }
        if s.max_transactions_per_day == 0 {
            bail!("schedule.max_transactions_per_day must be positive");
        }
        if s.blackout_hours > 24 {
            bail!("schedule.blackout_hours ({}) exceeds a day", s.blackout_hours);
        }
        if s.blackout_start_range == 0 || s.blackout_start_range > 24 {
            bail!("schedule.blackout_start_range must be in 1..=24");
        }
        if s.day_length_ms == 0 {
            bail!("schedule.day_length_ms must be positive");
        }
        if !(self.gas.min_gwei > 0.0 && self.gas.min_gwei <= self.gas.max_gwei) {
            bail!(
                "gas band {}..{} gwei is invalid",
                self.gas.min_gwei,
                self.gas.max_gwei
            );
        }
        if !(self.amount.min_eth > 0.0 && self.amount.min_eth <= self.amount.max_eth) {
            bail!(
                "amount band {}..{} is invalid",
                self.amount.min_eth,
                self.amount.max_eth
            );
        }
        if self.retry.max_attempts == Some(0) {
            bail!("retry.max_attempts must be positive when set");
        }
        Ok(())
    }
}

// --- Default value functions for serde ---

fn default_rpc_endpoints() -> Vec<String> {
    [
        "https://rpc.taiko.xyz",
        "https://rpc.mainnet.taiko.xyz",
        "https://rpc.ankr.com/taiko",
        "https://rpc.taiko.tools",
        "https://taiko.blockpi.network/v1/rpc/public",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_chain_id() -> u64 { 167_000 }
fn default_wrapped_native() -> String { "0xA51894664A773981C6C112C43ce576f315d5b1B6".to_string() }
fn default_explorer_tx_url() -> String { "https://taikoscan.io/tx/".to_string() }
fn default_tracker_dir() -> String { ".".to_string() }

// Schedule defaults
fn default_min_per_day() -> u32 { 130 }
fn default_max_per_day() -> u32 { 140 }
fn default_max_transactions_per_day() -> u32 { 145 }
fn default_blackout_hours() -> u32 { 4 }
fn default_blackout_start_range() -> u32 { 20 }
fn default_blackout_counts_toward_quota() -> bool { true }
fn default_day_length_ms() -> u64 { 86_400_000 }
fn default_pair_delay_max_ms() -> u64 { 300_000 }
fn default_rollover_poll_ms() -> u64 { 60_000 }

// Gas and amount defaults
fn default_min_gwei() -> f64 { 0.05 }
fn default_max_gwei() -> f64 { 0.054 }
fn default_gas_limit() -> u64 { 500_000 }
fn default_min_eth() -> f64 { 0.0003 }
fn default_max_eth() -> f64 { 0.0004 }

fn default_backoff_ms() -> u64 { 5_000 }
fn default_tax_amount_eth() -> f64 { 0.00002 }
fn default_tax_delay_ms() -> u64 { 10_000 }
