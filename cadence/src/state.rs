//! # Scheduler State
//!
//! Core data structures shared by the executor, tracker and orchestrator:
//! the action kinds, the per-attempt transaction intent and the per-account
//! daily tracker state.

use alloy::primitives::U256;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

use crate::wallet::Account;

/// The two linked on-chain actions of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Native asset into the wrapped token.
    Wrap,
    /// Wrapped token back into the native asset.
    Unwrap,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Wrap => f.write_str("Wrap"),
            ActionKind::Unwrap => f.write_str("Unwrap"),
        }
    }
}

/// A single submission attempt. Built fresh for every attempt so the nonce
/// always reflects what the node reports as pending right now.
#[derive(Debug, Clone)]
pub struct TransactionIntent<'a> {
    pub kind: ActionKind,
    /// Amount in wei.
    pub amount: U256,
    pub gas_price_wei: u128,
    pub nonce: u64,
    pub account: &'a Account,
}

/// One calendar day of activity for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub count: u32,
    /// Quota rolled for this day, kept so a restart reuses it.
    pub quota: Option<u32>,
    pub blackout_start_hour: Option<u32>,
}

impl DailyRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            count: 0,
            quota: None,
            blackout_start_hour: None,
        }
    }
}

/// Per-account history, keyed by UTC date. Records are never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    records: BTreeMap<NaiveDate, DailyRecord>,
    /// Lifetime counter from the flat legacy file form. Carried through
    /// writes, never consulted for quotas.
    pub legacy_count: Option<u64>,
}

impl TrackerState {
    pub fn record(&self, date: NaiveDate) -> Option<&DailyRecord> {
        self.records.get(&date)
    }

    pub fn records(&self) -> impl Iterator<Item = &DailyRecord> {
        self.records.values()
    }

    pub fn count_for(&self, date: NaiveDate) -> u32 {
        self.records.get(&date).map_or(0, |r| r.count)
    }

    /// Returns the record for `date`, creating a zero-count one on rollover.
    pub fn entry(&mut self, date: NaiveDate) -> &mut DailyRecord {
        self.records
            .entry(date)
            .or_insert_with(|| DailyRecord::new(date))
    }

    /// Increments the count for `date` without passing `ceiling`.
    /// Returns the count after the call.
    pub fn increment(&mut self, date: NaiveDate, ceiling: u32) -> u32 {
        let record = self.entry(date);
        if record.count < ceiling {
            record.count += 1;
        }
        record.count
    }

    pub fn insert(&mut self, record: DailyRecord) {
        self.records.insert(record.date, record);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.legacy_count.is_none()
    }
}
