//! # Account Worker - Per-Account Orchestrator
//!
//! One `AccountWorker` runs per account, as an independent tokio task, for
//! the lifetime of the process. It connects the scheduler, executor and
//! tracker and implements the daily loop.
//!
//! ## State Machine
//!
//! ```text
//! Scheduling ─▶ Executing(Wrap) ─▶ PairDelay ─▶ Executing(Unwrap) ─▶ Recording ─▶ Sleeping ─┐
//!     ▲  │                                                                                  │
//!     │  └─▶ DayComplete ─▶ WaitForRollover ─┐                                              │
//!     └──────────────────────────────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! - **Scheduling:** reuse today's persisted plan or roll a new one, then
//!   compare today's count against the quota.
//! - **Blackout:** a slot falling in the blackout window skips the chain
//!   actions; whether it still counts toward the quota is configurable.
//! - **Early stop:** insufficient funds or an exhausted retry budget on the
//!   wrap ends the day without touching the unwrap.
//! - **Recording:** every completed slot increments today's count and is
//!   written through the tracker. A failed write leaves the in-memory state
//!   authoritative until the next successful one.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    chain::ChainEndpoint,
    config::Config,
    core::{
        clock::Clock,
        executor::{ExecutionOutcome, TransactionExecutor},
        scheduler::{DailyPlan, RateScheduler},
        tracker::TrackerStore,
    },
    state::{ActionKind, TrackerState},
    wallet::Account,
};

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub max_transactions_per_day: u32,
    pub blackout_counts_toward_quota: bool,
    pub rollover_poll: Duration,
    pub explorer_tx_url: String,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_transactions_per_day: config.schedule.max_transactions_per_day,
            blackout_counts_toward_quota: config.schedule.blackout_counts_toward_quota,
            rollover_poll: Duration::from_millis(config.schedule.rollover_poll_ms),
            explorer_tx_url: config.explorer_tx_url.clone(),
        }
    }
}

/// Why a day's loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOutcome {
    QuotaReached { count: u32 },
    InsufficientFunds,
    GaveUp,
    /// The UTC date changed while the loop was still running.
    RolledOver,
}

enum SlotOutcome {
    Completed,
    Halted(DayOutcome),
}

pub struct AccountWorker<E, S> {
    account: Arc<Account>,
    executor: TransactionExecutor<E>,
    scheduler: RateScheduler,
    tracker: S,
    clock: Arc<dyn Clock>,
    settings: WorkerSettings,
    state: TrackerState,
}

impl<E: ChainEndpoint, S: TrackerStore + 'static> AccountWorker<E, S> {
    /// Builds a worker and loads the account's tracker history.
    pub fn new(
        account: Arc<Account>,
        executor: TransactionExecutor<E>,
        scheduler: RateScheduler,
        tracker: S,
        clock: Arc<dyn Clock>,
        settings: WorkerSettings,
    ) -> Self {
        let state = tracker.read(account.index);
        let today = clock.today();
        info!(
            "{}: tracker loaded, {} recorded today ({})",
            account.label(),
            state.count_for(today),
            today
        );
        Self {
            account,
            executor,
            scheduler,
            tracker,
            clock,
            settings,
            state,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Spawns the worker loop as a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("⚙️ {} worker started.", self.account.label());
            self.run().await;
        })
    }

    /// Runs day after day, forever.
    pub async fn run(mut self) {
        loop {
            let day = self.clock.today();
            let outcome = self.run_day().await;
            debug!("{}: day {} ended with {:?}", self.account.label(), day, outcome);
            if outcome != DayOutcome::RolledOver {
                self.wait_for_rollover(day).await;
            }
        }
    }

    /// Runs today's slots until the quota is met or the day ends early.
    pub async fn run_day(&mut self) -> DayOutcome {
        let plan = self.plan_today();
        info!(
            "{}: plan for {}: {} slots, every {}s, blackout {:02}:00-{:02}:00 UTC",
            self.account.label(),
            plan.date,
            plan.quota,
            plan.interval.as_secs(),
            plan.blackout.start_hour,
            plan.blackout.end_hour()
        );

        loop {
            if self.clock.today() != plan.date {
                return DayOutcome::RolledOver;
            }

            let count = self.state.count_for(plan.date);
            if count >= plan.quota {
                info!(
                    "{}: Already reached {} transactions for today ({}), skipping.",
                    self.account.label(),
                    count,
                    plan.date
                );
                return DayOutcome::QuotaReached { count };
            }

            let hour = self.clock.hour();
            if plan.blackout.contains(hour) {
                info!(
                    "{}: Transactions skipped during the UTC hour {}.",
                    self.account.label(),
                    hour
                );
                if self.settings.blackout_counts_toward_quota {
                    self.record_slot(&plan);
                }
            } else {
                match self.run_slot(&plan, count + 1).await {
                    SlotOutcome::Completed => self.record_slot(&plan),
                    SlotOutcome::Halted(outcome) => return outcome,
                }
            }

            info!(
                "{}: Waiting for {} seconds before the next transaction.",
                self.account.label(),
                plan.interval.as_secs()
            );
            tokio::time::sleep(plan.interval).await;
        }
    }

    /// Today's persisted plan if there is one, otherwise a freshly rolled and
    /// persisted plan.
    fn plan_today(&mut self) -> DailyPlan {
        let today = self.clock.today();
        if let Some(record) = self.state.record(today) {
            if let (Some(quota), Some(start)) = (record.quota, record.blackout_start_hour) {
                return self.scheduler.plan(today, quota, start);
            }
        }

        let plan = self.scheduler.roll_day(today);
        let record = self.state.entry(today);
        record.quota = Some(plan.quota);
        record.blackout_start_hour = Some(plan.blackout.start_hour);
        self.persist();
        plan
    }

    async fn run_slot(&mut self, plan: &DailyPlan, slot: u32) -> SlotOutcome {
        let label = self.account.label();
        let gas_price = self.scheduler.draw_gas_price();
        let amount = self.scheduler.draw_wrap_amount();

        info!("UTC Date and Time: {}", self.clock.now().to_rfc3339());
        info!("{}, Transaction {}/{}:", label, slot, plan.quota);
        info!(
            "Gas Limit: {}, Gas Price: {} wei, Total Tx Cost: {} wei",
            self.executor.gas_limit(),
            gas_price,
            self.executor.total_cost(gas_price)
        );

        match self
            .executor
            .execute(ActionKind::Wrap, amount, gas_price, &self.account, slot)
            .await
        {
            ExecutionOutcome::Sent(hash) => info!(
                "{}, Transaction {}: Wrap Transaction sent: {}{}, Amount: {} wei",
                label, slot, self.settings.explorer_tx_url, hash, amount
            ),
            ExecutionOutcome::InsufficientFunds { .. } => {
                warn!("{}: stopping for today, not enough funds to wrap.", label);
                return SlotOutcome::Halted(DayOutcome::InsufficientFunds);
            }
            ExecutionOutcome::GaveUp { attempts, last_error } => {
                warn!(
                    "{}: stopping for today, wrap failed {} times: {}",
                    label, attempts, last_error
                );
                return SlotOutcome::Halted(DayOutcome::GaveUp);
            }
        }

        let delay = self.scheduler.draw_pair_delay();
        info!(
            "{}, Transaction {}: Waiting {} seconds before Unwrap.",
            label,
            slot,
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;

        match self
            .executor
            .execute(ActionKind::Unwrap, amount, gas_price, &self.account, slot)
            .await
        {
            ExecutionOutcome::Sent(hash) => info!(
                "{}, Transaction {}: Unwrap Transaction sent: {}{}",
                label, slot, self.settings.explorer_tx_url, hash
            ),
            ExecutionOutcome::InsufficientFunds { .. } => {
                warn!("{}, Transaction {}: Unwrap skipped, insufficient funds.", label, slot)
            }
            ExecutionOutcome::GaveUp { attempts, last_error } => warn!(
                "{}, Transaction {}: Unwrap abandoned after {} attempts: {}",
                label, slot, attempts, last_error
            ),
        }
        SlotOutcome::Completed
    }

    fn record_slot(&mut self, plan: &DailyPlan) {
        let ceiling = plan.quota.min(self.settings.max_transactions_per_day);
        let count = self.state.increment(plan.date, ceiling);
        info!(
            "{}: Daily transaction count updated to {} for {}.",
            self.account.label(),
            count,
            plan.date
        );
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.tracker.write(self.account.index, &self.state) {
            warn!(
                "{}: Error updating tracker, keeping progress in memory: {}",
                self.account.label(),
                e
            );
        }
    }

    async fn wait_for_rollover(&self, day: NaiveDate) {
        info!("{}: day {} complete, waiting for the next UTC day.", self.account.label(), day);
        while self.clock.today() == day {
            tokio::time::sleep(self.settings.rollover_poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::clock::ManualClock;
    use crate::core::endpoint_pool::EndpointPool;
    use crate::core::executor::RetryPolicy;
    use crate::core::scheduler::SchedulerSettings;
    use crate::core::test_support::{test_account, ScriptedEndpoint};
    use crate::core::tracker::FileTracker;
    use alloy::primitives::U256;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    struct Harness {
        endpoint: ScriptedEndpoint,
        clock: Arc<ManualClock>,
        tracker: FileTracker,
        dir: TempDir,
    }

    fn config(quota: u32) -> Config {
        let mut config = Config::default();
        config.schedule.min_per_day = quota;
        config.schedule.max_per_day = quota;
        config
    }

    fn harness(hour: u32) -> Harness {
        let dir = TempDir::new().unwrap();
        Harness {
            endpoint: ScriptedEndpoint::new("http://rpc-0"),
            clock: Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
            )),
            tracker: FileTracker::new(dir.path()),
            dir,
        }
    }

    fn worker(
        h: &Harness,
        config: &Config,
        seed: u64,
    ) -> AccountWorker<ScriptedEndpoint, FileTracker> {
        let pool = Arc::new(EndpointPool::new(vec![h.endpoint.clone()]).unwrap());
        let executor = TransactionExecutor::new(pool, config.gas.gas_limit, RetryPolicy::default());
        let scheduler = RateScheduler::with_rng(
            SchedulerSettings::from_config(config),
            fastrand::Rng::with_seed(seed),
        );
        AccountWorker::new(
            Arc::new(test_account(1)),
            executor,
            scheduler,
            h.tracker.clone(),
            h.clock.clone(),
            WorkerSettings::from_config(config),
        )
    }

    /// Picks a seed whose blackout window avoids `hour`.
    fn open_seed(config: &Config, hour: u32) -> u64 {
        let settings = SchedulerSettings::from_config(config);
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        (0..1_000)
            .find(|seed| {
                let mut scheduler =
                    RateScheduler::with_rng(settings.clone(), fastrand::Rng::with_seed(*seed));
                !scheduler.roll_day(date).blackout.contains(hour)
            })
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn day_runs_until_quota() {
        let h = harness(21);
        let config = config(3);
        let mut worker = worker(&h, &config, open_seed(&config, 21));

        let outcome = worker.run_day().await;
        assert_eq!(outcome, DayOutcome::QuotaReached { count: 3 });
        assert_eq!(
            h.endpoint.performed(),
            vec![
                ActionKind::Wrap,
                ActionKind::Unwrap,
                ActionKind::Wrap,
                ActionKind::Unwrap,
                ActionKind::Wrap,
                ActionKind::Unwrap,
            ]
        );

        let persisted = h.tracker.read(1);
        let today = h.clock.today();
        assert_eq!(persisted.count_for(today), 3);
        assert_eq!(persisted.record(today).unwrap().quota, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn insufficient_funds_on_wrap_skips_unwrap_and_ends_day() {
        let h = harness(21);
        h.endpoint.set_balance(U256::ZERO);
        let config = config(5);
        let mut worker = worker(&h, &config, open_seed(&config, 21));

        let outcome = worker.run_day().await;
        assert_eq!(outcome, DayOutcome::InsufficientFunds);
        assert!(h.endpoint.performed().is_empty());
        assert_eq!(worker.state().count_for(h.clock.today()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_resumes_persisted_plan() {
        let h = harness(21);
        let config = config(4);
        let seed = open_seed(&config, 21);
        let mut first = worker(&h, &config, seed);
        // Run two slots worth, then "crash".
        let today = h.clock.today();
        let plan = first.plan_today();
        first.record_slot(&plan);
        first.record_slot(&plan);
        drop(first);

        // A different quota band must not change today's stored quota.
        let mut second = worker(&h, &self::config(9), seed);
        assert_eq!(second.state().count_for(today), 2);
        let outcome = second.run_day().await;
        assert_eq!(outcome, DayOutcome::QuotaReached { count: 4 });
        assert_eq!(h.endpoint.performed().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn blackout_slots_count_when_configured() {
        let h = harness(0);
        let config = config(2);
        let today = h.clock.today();
        // Blackout 22:00-02:00 covers the whole run at hour 0.
        let mut record = crate::state::DailyRecord::new(today);
        record.quota = Some(2);
        record.blackout_start_hour = Some(22);
        let mut state = TrackerState::default();
        state.insert(record);
        h.tracker.write(1, &state).unwrap();

        let mut worker = worker(&h, &config, 1);
        let outcome = worker.run_day().await;
        assert_eq!(outcome, DayOutcome::QuotaReached { count: 2 });
        assert!(h.endpoint.performed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn blackout_slots_do_not_count_when_disabled() {
        let h = harness(23);
        let mut config = config(2);
        config.schedule.blackout_counts_toward_quota = false;
        let today = h.clock.today();
        let mut record = crate::state::DailyRecord::new(today);
        record.quota = Some(2);
        record.blackout_start_hour = Some(22);
        let mut state = TrackerState::default();
        state.insert(record);
        h.tracker.write(1, &state).unwrap();

        let mut worker = worker(&h, &config, 1);
        let clock = h.clock.clone();
        // Move past midnight while the worker is still skipping.
        let day = tokio::spawn(async move {
            let outcome = worker.run_day().await;
            (outcome, worker)
        });
        tokio::time::sleep(Duration::from_secs(3 * 3_600)).await;
        clock.advance(chrono::Duration::hours(1));
        let (outcome, worker) = day.await.unwrap();

        assert_eq!(outcome, DayOutcome::RolledOver);
        assert_eq!(worker.state().count_for(today), 0);
        assert!(h.endpoint.performed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tracker_write_keeps_memory_state() {
        let h = harness(21);
        let config = config(2);
        let seed = open_seed(&config, 21);
        let pool = Arc::new(EndpointPool::new(vec![h.endpoint.clone()]).unwrap());
        let mut worker = AccountWorker::new(
            Arc::new(test_account(1)),
            TransactionExecutor::new(pool, config.gas.gas_limit, RetryPolicy::default()),
            RateScheduler::with_rng(
                SchedulerSettings::from_config(&config),
                fastrand::Rng::with_seed(seed),
            ),
            FileTracker::new(h.dir.path().join("missing")),
            h.clock.clone(),
            WorkerSettings::from_config(&config),
        );

        let outcome = worker.run_day().await;
        assert_eq!(outcome, DayOutcome::QuotaReached { count: 2 });
        assert_eq!(worker.state().count_for(h.clock.today()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rollover_wait_polls_until_date_changes() {
        let h = harness(23);
        let config = config(1);
        let worker = worker(&h, &config, 1);
        let day = h.clock.today();
        let clock = h.clock.clone();

        let waiter = tokio::spawn(async move { worker.wait_for_rollover(day).await });
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(!waiter.is_finished());

        clock.advance(chrono::Duration::hours(1));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(waiter.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn run_rolls_a_new_plan_after_each_day() {
        let h = harness(21);
        let mut config = config(2);
        config.schedule.blackout_hours = 0;
        let first_day = h.clock.today();
        let second_day = first_day.succ_opt().unwrap();

        let task = worker(&h, &config, 3).spawn();
        tokio::time::sleep(Duration::from_secs(2 * 86_400)).await;
        assert_eq!(h.tracker.read(1).count_for(first_day), 2);
        assert!(h.tracker.read(1).record(second_day).is_none());

        h.clock.advance(chrono::Duration::days(1));
        tokio::time::sleep(Duration::from_secs(2 * 86_400)).await;
        task.abort();

        let persisted = h.tracker.read(1);
        assert_eq!(persisted.count_for(first_day), 2);
        let next = persisted.record(second_day).unwrap();
        assert_eq!(next.count, 2);
        assert_eq!(next.quota, Some(2));
        assert!(next.blackout_start_hour.is_some());
        assert_eq!(h.endpoint.performed().len(), 8);
    }
}
