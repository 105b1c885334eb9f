//! Per-account sampling: one terminal session per account per cycle.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tracing::{info, warn};

use contest_core::breach::{assess, RiskLimits};
use contest_core::metrics::MetricsSnapshot;
use contest_core::report::AccountReport;
use contest_core::traits::{LeaderboardStore, TerminalClient};
use contest_core::types::Account;

use crate::clock::in_reset_window;

/// Samples accounts one at a time through a shared terminal session.
///
/// A failure on one account never aborts the pass: the account is
/// skipped with a warning and the loop moves on. The terminal session
/// is torn down after every account, sampled or not.
pub struct CycleRunner {
    terminal: Arc<dyn TerminalClient>,
    store: Arc<dyn LeaderboardStore>,
    limits: RiskLimits,
    /// Start of the deal history window applied to every account.
    history_start: DateTime<Utc>,
    /// Pause between accounts, respecting terminal connection churn limits.
    account_pause: Duration,
}

impl CycleRunner {
    #[must_use]
    pub fn new(
        terminal: Arc<dyn TerminalClient>,
        store: Arc<dyn LeaderboardStore>,
        limits: RiskLimits,
        history_start: DateTime<Utc>,
        account_pause: Duration,
    ) -> Self {
        Self {
            terminal,
            store,
            limits,
            history_start,
            account_pause,
        }
    }

    /// Samples every account not in `skip`, in roster order.
    ///
    /// The reset window is checked once here so every account in the
    /// pass sees the same decision.
    pub async fn run_pass(
        &self,
        accounts: &[Account],
        skip: &HashSet<String>,
    ) -> Vec<AccountReport> {
        let reset_window = in_reset_window(&Local::now());
        self.run_pass_inner(accounts, skip, reset_window).await
    }

    async fn run_pass_inner(
        &self,
        accounts: &[Account],
        skip: &HashSet<String>,
        reset_window: bool,
    ) -> Vec<AccountReport> {
        let mut reports = Vec::new();

        for (index, account) in accounts.iter().enumerate() {
            if skip.contains(&account.account_id) {
                info!(
                    account_id = %account.account_id,
                    "account is latched as breached, skipping"
                );
                continue;
            }

            if let Some(report) = self.sample_account(account, reset_window).await {
                reports.push(report);
            }

            if index + 1 < accounts.len() {
                tokio::time::sleep(self.account_pause).await;
            }
        }

        reports
    }

    /// One account: connect, sample, disconnect.
    async fn sample_account(&self, account: &Account, reset_window: bool) -> Option<AccountReport> {
        if !self.terminal.connect(account).await {
            warn!(
                account_id = %account.account_id,
                "terminal refused the session, skipping account"
            );
            return None;
        }

        // Capture the result first so the session is torn down on every path.
        let sampled = self.sample_connected(account, reset_window).await;
        self.terminal.disconnect().await;
        sampled
    }

    async fn sample_connected(
        &self,
        account: &Account,
        reset_window: bool,
    ) -> Option<AccountReport> {
        let Some(info) = self.terminal.account_info().await else {
            warn!(
                account_id = %account.account_id,
                "terminal returned no account info, skipping account"
            );
            return None;
        };

        let persisted = match self.store.starting_day_balance(&account.account_id).await {
            Ok(value) => value,
            Err(e) => {
                // Evaluating breaches against the default baseline instead of
                // the real one could latch the account falsely. Skip instead.
                warn!(
                    account_id = %account.account_id,
                    error = %e,
                    "starting day balance unreadable, skipping account"
                );
                return None;
            }
        };

        let mut starting_day_balance = persisted.unwrap_or(self.limits.initial_balance);
        if reset_window {
            starting_day_balance = info.equity;
            match self
                .store
                .update_starting_day_balance(&account.account_id, info.equity)
                .await
            {
                Ok(()) => info!(
                    account_id = %account.account_id,
                    equity = %info.equity,
                    "starting day balance reset"
                ),
                // The fresh value still reaches the row through the batch
                // merge at the end of this pass.
                Err(e) => warn!(
                    account_id = %account.account_id,
                    error = %e,
                    "starting day balance persist failed"
                ),
            }
        }

        let now = Utc::now();
        let deals = self.terminal.history_deals(self.history_start, now).await;
        let open_positions = self.terminal.open_positions().await;

        let metrics = MetricsSnapshot::compute(&deals, info.balance, self.limits.initial_balance);
        let assessment = assess(
            account,
            info.equity,
            info.balance,
            starting_day_balance,
            &self.limits,
            now,
        );

        if assessment.breached {
            warn!(
                account_id = %account.account_id,
                equity = %info.equity,
                kind = assessment.events[0].kind.as_str(),
                "drawdown breach detected"
            );
        }

        Some(AccountReport {
            account_id: account.account_id.clone(),
            contestant_name: account.contestant_name.clone(),
            balance: assessment.adjusted_balance,
            equity: info.equity,
            starting_day_balance,
            daily_dd_limit: assessment.daily_limit,
            metrics,
            open_positions,
            breaches: assessment.events,
            breached: assessment.breached,
            generated_at: now,
        })
    }
}
