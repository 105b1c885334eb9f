//! Scripted in-memory terminal for tests and dry runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contest_core::traits::TerminalClient;
use contest_core::types::{Account, AccountInfo, Deal, OpenPosition};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Canned terminal data for one account.
#[derive(Debug, Clone, Default)]
pub struct SimScript {
    /// Whether `connect` succeeds for this account.
    pub accept_connection: bool,
    /// Balance and equity returned after a successful connect.
    pub info: Option<AccountInfo>,
    pub deals: Vec<Deal>,
    pub positions: Vec<OpenPosition>,
}

impl SimScript {
    /// A healthy account with the given balances and no history.
    #[must_use]
    pub const fn healthy(balance: AccountInfo) -> Self {
        Self {
            accept_connection: true,
            info: Some(balance),
            deals: Vec::new(),
            positions: Vec::new(),
        }
    }

    /// An account the terminal refuses to open a session for.
    #[must_use]
    pub const fn unreachable() -> Self {
        Self {
            accept_connection: false,
            info: None,
            deals: Vec::new(),
            positions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_deals(mut self, deals: Vec<Deal>) -> Self {
        self.deals = deals;
        self
    }

    #[must_use]
    pub fn with_positions(mut self, positions: Vec<OpenPosition>) -> Self {
        self.positions = positions;
        self
    }
}

/// Deterministic [`TerminalClient`] backed by per-account scripts.
///
/// Makes zero network calls. Accounts without a script behave like a
/// terminal that cannot log them in.
pub struct SimTerminal {
    scripts: HashMap<String, SimScript>,
    session: Mutex<Option<String>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl SimTerminal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            session: Mutex::new(None),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Registers the script used when `account_id` connects.
    #[must_use]
    pub fn with_account(mut self, account_id: impl Into<String>, script: SimScript) -> Self {
        self.scripts.insert(account_id.into(), script);
        self
    }

    /// Number of successful connects so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of disconnects so far, successful sessions or not.
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    async fn current_script(&self) -> Option<&SimScript> {
        let session = self.session.lock().await;
        session.as_deref().and_then(|id| self.scripts.get(id))
    }
}

impl Default for SimTerminal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TerminalClient for SimTerminal {
    async fn connect(&self, account: &Account) -> bool {
        let accepted = self
            .scripts
            .get(&account.account_id)
            .is_some_and(|script| script.accept_connection);

        let mut session = self.session.lock().await;
        if accepted {
            *session = Some(account.account_id.clone());
            self.connects.fetch_add(1, Ordering::SeqCst);
        } else {
            *session = None;
        }

        accepted
    }

    async fn account_info(&self) -> Option<AccountInfo> {
        self.current_script().await.and_then(|script| script.info)
    }

    async fn history_deals(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Deal> {
        match self.current_script().await {
            Some(script) => script
                .deals
                .iter()
                .filter(|deal| deal.time >= from && deal.time <= to)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    async fn open_positions(&self) -> Vec<OpenPosition> {
        self.current_script()
            .await
            .map(|script| script.positions.clone())
            .unwrap_or_default()
    }

    async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        *session = None;
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}
