//! Boundary-aligned sampling loop with a single-flight guard.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use contest_core::traits::{LeaderboardStore, MergeSummary};
use contest_core::types::Account;

use crate::clock::next_cycle_delay;
use crate::cycle::CycleRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    Idle,
    Running,
}

/// Drives sampling cycles on 5-minute wall-clock boundaries.
///
/// The scheduler owns the roster and its lifecycle state. At most one
/// cycle sequence runs at a time: starting it again while running is a
/// logged no-op. Cycle failures are caught here and answered with a
/// delayed retry, never a process exit.
pub struct CycleScheduler {
    accounts: Vec<Account>,
    runner: CycleRunner,
    store: Arc<dyn LeaderboardStore>,
    state: Mutex<SchedulerState>,
    /// Pause before retrying after a failed cycle.
    cycle_retry_delay: Duration,
}

impl CycleScheduler {
    #[must_use]
    pub fn new(
        accounts: Vec<Account>,
        runner: CycleRunner,
        store: Arc<dyn LeaderboardStore>,
        cycle_retry_delay: Duration,
    ) -> Self {
        Self {
            accounts,
            runner,
            store,
            state: Mutex::new(SchedulerState::Idle),
            cycle_retry_delay,
        }
    }

    /// Runs cycles forever, sleeping to the next boundary in between.
    ///
    /// Returns immediately if another cycle sequence already holds the
    /// guard. Otherwise this only ends with process shutdown.
    pub async fn run(&self) {
        if !self.try_begin().await {
            warn!("scheduler already running, ignoring duplicate start");
            return;
        }

        info!(accounts = self.accounts.len(), "monitor loop started");

        loop {
            match self.run_cycle().await {
                Ok(_) => {
                    let delay = next_cycle_delay(Local::now());
                    info!(
                        sleep_secs = delay.as_secs(),
                        "sleeping until the next cycle boundary"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(error = %e, "cycle failed, retrying after delay");
                    tokio::time::sleep(self.cycle_retry_delay).await;
                }
            }
        }
    }

    /// Runs exactly one guarded cycle.
    ///
    /// Returns `None` when another cycle sequence is already in flight.
    ///
    /// # Errors
    /// Returns an error if the cycle could not be started against the
    /// store, for example when the latched account set is unreadable.
    pub async fn run_once(&self) -> Result<Option<MergeSummary>> {
        if !self.try_begin().await {
            warn!("a cycle is already in flight, skipping");
            return Ok(None);
        }

        let result = self.run_cycle().await;
        self.finish().await;
        result.map(Some)
    }

    async fn try_begin(&self) -> bool {
        let mut state = self.state.lock().await;
        if *state == SchedulerState::Running {
            return false;
        }
        *state = SchedulerState::Running;
        true
    }

    async fn finish(&self) {
        *self.state.lock().await = SchedulerState::Idle;
    }

    /// One full pass: sample the roster, merge, aggregate.
    ///
    /// Persistence failures after the sampling phase are logged and
    /// dropped; the next cycle carries fresh data anyway.
    async fn run_cycle(&self) -> Result<MergeSummary> {
        let started = Instant::now();

        let latched = self
            .store
            .latched_accounts()
            .await
            .context("latched account set unavailable")?;

        let reports = self.runner.run_pass(&self.accounts, &latched).await;
        if reports.is_empty() {
            warn!("cycle produced no reports");
        }

        let summary = match self.store.merge_reports(&reports).await {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "leaderboard merge failed, dropping this cycle's rows");
                MergeSummary::default()
            }
        };

        if let Err(e) = self.store.aggregate_metadata(&reports).await {
            error!(error = %e, "metadata aggregation failed, keeping the previous summary");
        }

        info!(
            sampled = reports.len(),
            applied = summary.applied,
            latched = summary.latched,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle complete"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use contest_core::types::AccountInfo;
    use contest_store::MemoryLeaderboard;
    use contest_terminal::{SimScript, SimTerminal};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn account(id: &str, name: &str) -> Account {
        Account {
            account_id: id.to_string(),
            server: "Demo-Server".to_string(),
            password: "secret".to_string(),
            contestant_name: name.to_string(),
        }
    }

    fn info(balance: Decimal, equity: Decimal) -> AccountInfo {
        AccountInfo { balance, equity }
    }

    fn limits() -> contest_core::breach::RiskLimits {
        contest_core::breach::RiskLimits {
            initial_balance: dec!(100000),
            daily_drawdown_factor: dec!(0.97),
            max_drawdown_factor: dec!(0.95),
        }
    }

    fn scheduler(
        terminal: Arc<SimTerminal>,
        store: Arc<MemoryLeaderboard>,
        accounts: Vec<Account>,
    ) -> CycleScheduler {
        let runner = CycleRunner::new(
            terminal,
            store.clone(),
            limits(),
            Utc.with_ymd_and_hms(2025, 1, 19, 0, 0, 0).unwrap(),
            Duration::ZERO,
        );
        CycleScheduler::new(accounts, runner, store, Duration::ZERO)
    }

    // ==== Full cycle ====

    #[tokio::test]
    async fn run_once_merges_and_aggregates() {
        let terminal = Arc::new(
            SimTerminal::new()
                .with_account("101", SimScript::healthy(info(dec!(100500), dec!(100400))))
                .with_account("102", SimScript::healthy(info(dec!(99800), dec!(99750)))),
        );
        let store = Arc::new(MemoryLeaderboard::new());
        let scheduler = scheduler(
            terminal,
            store.clone(),
            vec![account("101", "Alice"), account("102", "Bob")],
        );

        let summary = scheduler.run_once().await.unwrap().unwrap();

        assert_eq!(summary.applied, 2);
        assert_eq!(summary.latched, 0);
        assert_eq!(store.entries().await.len(), 2);
        assert!(store.metadata().await.is_some());
    }

    #[tokio::test]
    async fn breached_account_latches_and_drops_out_of_later_cycles() {
        let terminal = Arc::new(
            SimTerminal::new()
                .with_account("101", SimScript::healthy(info(dec!(98500), dec!(96000)))),
        );
        let store = Arc::new(MemoryLeaderboard::new());
        let scheduler = scheduler(terminal.clone(), store.clone(), vec![account("101", "Alice")]);

        scheduler.run_once().await.unwrap().unwrap();
        let entry = store.entry("101").await.unwrap();
        assert!(entry.breached);
        assert_eq!(entry.balance, dec!(96000));
        assert_eq!(terminal.connect_count(), 1);

        // The latched set keeps the account away from the terminal entirely.
        let summary = scheduler.run_once().await.unwrap().unwrap();
        assert_eq!(summary.applied, 0);
        assert_eq!(terminal.connect_count(), 1);
    }

    #[tokio::test]
    async fn empty_cycle_still_overwrites_metadata() {
        let deal = contest_core::types::Deal {
            ticket: 1,
            symbol: "XAUUSD".to_string(),
            volume: dec!(0.1),
            profit: dec!(50),
            time: Utc.with_ymd_and_hms(2025, 1, 20, 10, 0, 0).unwrap(),
        };
        let terminal = Arc::new(SimTerminal::new().with_account(
            "101",
            SimScript::healthy(info(dec!(100050), dec!(100050))).with_deals(vec![deal]),
        ));
        let store = Arc::new(MemoryLeaderboard::new());
        let scheduler = scheduler(terminal, store.clone(), vec![account("101", "Alice")]);

        scheduler.run_once().await.unwrap().unwrap();
        let populated = store.metadata().await.unwrap();
        assert_eq!(populated.global_trade_counts.get("XAUUSD"), Some(&1));

        // A roster with no reachable accounts yields no reports, but the
        // summary is still recomputed from the (empty) batch.
        let empty_terminal = Arc::new(SimTerminal::new());
        let empty = self::scheduler(empty_terminal, store.clone(), vec![account("102", "Bob")]);
        let summary = empty.run_once().await.unwrap().unwrap();
        assert_eq!(summary, MergeSummary::default());

        let recomputed = store.metadata().await.unwrap();
        assert!(recomputed.global_trade_counts.is_empty());
        assert_eq!(recomputed.most_traded_symbol, None);
    }

    // ==== Single flight ====

    #[tokio::test]
    async fn second_begin_is_refused_until_finish() {
        let terminal = Arc::new(SimTerminal::new());
        let store = Arc::new(MemoryLeaderboard::new());
        let scheduler = scheduler(terminal, store, Vec::new());

        assert!(scheduler.try_begin().await);
        assert!(!scheduler.try_begin().await);

        scheduler.finish().await;
        assert!(scheduler.try_begin().await);
    }

    #[tokio::test]
    async fn run_once_skips_while_running() {
        let terminal = Arc::new(SimTerminal::new());
        let store = Arc::new(MemoryLeaderboard::new());
        let scheduler = scheduler(terminal, store, Vec::new());

        assert!(scheduler.try_begin().await);
        let skipped = scheduler.run_once().await.unwrap();
        assert!(skipped.is_none());
    }
}
