//! In-memory store mirroring the merge semantics of the real tables.
//!
//! Backs monitor tests and dry runs. The latch behaves exactly as the
//! SQL merge does: a breached row is frozen, late merges are reported
//! as [`MergeOutcome::Latched`] and leave the row untouched.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use contest_core::breach::BreachEvent;
use contest_core::metrics::{MetadataSummary, MetricsSnapshot};
use contest_core::report::AccountReport;
use contest_core::traits::{LeaderboardStore, MergeOutcome, MergeSummary};
use contest_core::types::OpenPosition;

/// One in-memory row, the same shape a leaderboard table row takes.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub account_id: String,
    pub contestant_name: String,
    pub balance: Decimal,
    pub equity: Decimal,
    pub starting_day_balance: Decimal,
    pub daily_dd_limit: Decimal,
    pub metrics: MetricsSnapshot,
    pub open_positions: Vec<OpenPosition>,
    /// Accumulated breach log, appended on the pass that latched the row.
    pub breaches: Vec<BreachEvent>,
    pub breached: bool,
    pub last_update_time: DateTime<Utc>,
}

impl MemoryEntry {
    fn from_report(report: &AccountReport) -> Self {
        Self {
            account_id: report.account_id.clone(),
            contestant_name: report.contestant_name.clone(),
            balance: report.balance,
            equity: report.equity,
            starting_day_balance: report.starting_day_balance,
            daily_dd_limit: report.daily_dd_limit,
            metrics: report.metrics.clone(),
            open_positions: report.open_positions.clone(),
            breaches: report.breaches.clone(),
            breached: report.breached,
            last_update_time: report.generated_at,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: IndexMap<String, MemoryEntry>,
    metadata: Option<MetadataSummary>,
}

impl MemoryState {
    fn merge(&mut self, report: &AccountReport) -> MergeOutcome {
        match self.entries.get_mut(&report.account_id) {
            Some(entry) if entry.breached => MergeOutcome::Latched,
            Some(entry) => {
                let mut log = entry.breaches.clone();
                log.extend(report.breaches.iter().cloned());
                *entry = MemoryEntry::from_report(report);
                entry.breaches = log;
                MergeOutcome::Applied
            }
            None => {
                self.entries
                    .insert(report.account_id.clone(), MemoryEntry::from_report(report));
                MergeOutcome::Applied
            }
        }
    }
}

/// Leaderboard state held in memory instead of `PostgreSQL`.
#[derive(Debug, Default)]
pub struct MemoryLeaderboard {
    state: Mutex<MemoryState>,
}

impl MemoryLeaderboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one row, `None` if the account was never merged.
    pub async fn entry(&self, account_id: &str) -> Option<MemoryEntry> {
        self.state.lock().await.entries.get(account_id).cloned()
    }

    /// All rows in first-merge order.
    pub async fn entries(&self) -> Vec<MemoryEntry> {
        self.state.lock().await.entries.values().cloned().collect()
    }

    /// Metadata from the latest aggregation, `None` before the first pass.
    pub async fn metadata(&self) -> Option<MetadataSummary> {
        self.state.lock().await.metadata.clone()
    }
}

#[async_trait]
impl LeaderboardStore for MemoryLeaderboard {
    async fn merge_report(&self, report: &AccountReport) -> Result<MergeOutcome> {
        Ok(self.state.lock().await.merge(report))
    }

    async fn merge_reports(&self, reports: &[AccountReport]) -> Result<MergeSummary> {
        let mut state = self.state.lock().await;
        let mut summary = MergeSummary::default();
        for report in reports {
            match state.merge(report) {
                MergeOutcome::Applied => summary.applied += 1,
                MergeOutcome::Latched => summary.latched += 1,
            }
        }
        Ok(summary)
    }

    async fn aggregate_metadata(&self, reports: &[AccountReport]) -> Result<()> {
        let summary = MetadataSummary::from_snapshots(reports.iter().map(|r| &r.metrics));
        self.state.lock().await.metadata = Some(summary);
        Ok(())
    }

    async fn starting_day_balance(&self, account_id: &str) -> Result<Option<Decimal>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .get(account_id)
            .map(|entry| entry.starting_day_balance))
    }

    async fn update_starting_day_balance(&self, account_id: &str, value: Decimal) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.entries.get_mut(account_id) {
            if !entry.breached {
                entry.starting_day_balance = value;
            }
        }
        Ok(())
    }

    async fn latched_accounts(&self) -> Result<HashSet<String>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .values()
            .filter(|entry| entry.breached)
            .map(|entry| entry.account_id.clone())
            .collect())
    }
}
