//! # Rate Scheduler
//!
//! Decides how much an account does on a given UTC day and how each slot
//! looks:
//!
//! - **Daily plan:** a quota drawn from the configured band, a multi-hour
//!   blackout window with a random start hour, and an inter-slot interval that
//!   spreads the quota evenly over the day.
//! - **Per slot:** a gas price, a wrap amount rounded to micro-ether, and a
//!   jitter delay between the wrap and its paired unwrap.
//!
//! Each worker owns its scheduler, so the random stream is never shared.

use alloy::primitives::U256;
use chrono::NaiveDate;
use std::time::Duration;

use crate::chain::{WEI_PER_GWEI, WEI_PER_MICRO_ETH};
use crate::config::Config;

const HOURS_PER_DAY: u32 = 24;

/// A contiguous, wrap-around-aware range of UTC hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlackoutWindow {
    pub start_hour: u32,
    pub hours: u32,
}

impl BlackoutWindow {
    pub fn new(start_hour: u32, hours: u32) -> Self {
        Self {
            start_hour: start_hour % HOURS_PER_DAY,
            hours: hours.min(HOURS_PER_DAY),
        }
    }

    /// Inclusive start, exclusive end, modulo 24.
    pub fn contains(&self, hour: u32) -> bool {
        let offset = (hour % HOURS_PER_DAY + HOURS_PER_DAY - self.start_hour) % HOURS_PER_DAY;
        offset < self.hours
    }

    pub fn end_hour(&self) -> u32 {
        (self.start_hour + self.hours) % HOURS_PER_DAY
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyPlan {
    pub date: NaiveDate,
    pub quota: u32,
    pub blackout: BlackoutWindow,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub min_per_day: u32,
    pub max_per_day: u32,
    pub max_transactions_per_day: u32,
    pub blackout_hours: u32,
    pub blackout_start_range: u32,
    pub day_length: Duration,
    pub pair_delay_max: Duration,
    pub min_gas_price_wei: u128,
    pub max_gas_price_wei: u128,
    pub min_amount_micro_eth: u64,
    pub max_amount_micro_eth: u64,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        let s = &config.schedule;
        Self {
            min_per_day: s.min_per_day,
            max_per_day: s.max_per_day,
            max_transactions_per_day: s.max_transactions_per_day,
            blackout_hours: s.blackout_hours,
            blackout_start_range: s.blackout_start_range,
            day_length: Duration::from_millis(s.day_length_ms),
            pair_delay_max: Duration::from_millis(s.pair_delay_max_ms),
            min_gas_price_wei: (config.gas.min_gwei * WEI_PER_GWEI).round() as u128,
            max_gas_price_wei: (config.gas.max_gwei * WEI_PER_GWEI).round() as u128,
            min_amount_micro_eth: (config.amount.min_eth * 1e6).round() as u64,
            max_amount_micro_eth: (config.amount.max_eth * 1e6).round() as u64,
        }
    }
}

pub struct RateScheduler {
    settings: SchedulerSettings,
    rng: fastrand::Rng,
}

impl RateScheduler {
    pub fn new(settings: SchedulerSettings) -> Self {
        Self::with_rng(settings, fastrand::Rng::new())
    }

    pub fn with_rng(settings: SchedulerSettings, rng: fastrand::Rng) -> Self {
        Self { settings, rng }
    }

    /// Draws a fresh plan for `date`.
    pub fn roll_day(&mut self, date: NaiveDate) -> DailyPlan {
        let s = &self.settings;
        let quota = self.rng.u32(s.min_per_day..=s.max_per_day.max(s.min_per_day));
        let start = self.rng.u32(0..s.blackout_start_range.max(1));
        self.plan(date, quota, start)
    }

    /// Rebuilds a plan from stored parts, clamping the quota to the hard ceiling.
    pub fn plan(&self, date: NaiveDate, quota: u32, blackout_start_hour: u32) -> DailyPlan {
        let quota = quota.clamp(1, self.settings.max_transactions_per_day.max(1));
        DailyPlan {
            date,
            quota,
            blackout: BlackoutWindow::new(blackout_start_hour, self.settings.blackout_hours),
            interval: slot_interval(self.settings.day_length, quota),
        }
    }

    pub fn draw_gas_price(&mut self) -> u128 {
        let (min, max) = (self.settings.min_gas_price_wei, self.settings.max_gas_price_wei);
        if max <= min {
            return min;
        }
        self.rng.u128(min..=max)
    }

    pub fn draw_wrap_amount(&mut self) -> U256 {
        let (min, max) = (
            self.settings.min_amount_micro_eth,
            self.settings.max_amount_micro_eth,
        );
        let micros = if max <= min { min } else { self.rng.u64(min..=max) };
        U256::from(micros as u128 * WEI_PER_MICRO_ETH)
    }

    pub fn draw_pair_delay(&mut self) -> Duration {
        let max_ms = self.settings.pair_delay_max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.u64(0..max_ms))
    }
}

/// Even spacing of `quota` slots over `day_length`.
pub fn slot_interval(day_length: Duration, quota: u32) -> Duration {
    day_length / quota.max(1)
}
