//! HTTP client for the MT5 bridge gateway with rate limiting.
//!
//! The gateway wraps a MetaTrader 5 terminal behind a small REST surface:
//! one session at a time, opened per account and torn down after sampling.
//! Requests are paced with the governor crate so a tight sampling loop
//! cannot hammer the terminal.

use crate::error::{Result, TerminalError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contest_core::traits::TerminalClient;
use contest_core::types::{Account, AccountInfo, Deal, OpenPosition};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the bridge gateway client.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Base URL of the gateway.
    pub base_url: String,

    /// Requests per second limit.
    pub requests_per_second: NonZeroU32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            requests_per_second: nonzero!(10u32),
            timeout_secs: 10,
        }
    }
}

impl BridgeConfig {
    /// Builds a configuration from the application's terminal section.
    #[must_use]
    pub fn from_app(config: &contest_core::TerminalConfig) -> Self {
        Self {
            base_url: config.bridge_url.clone(),
            requests_per_second: NonZeroU32::new(config.requests_per_second)
                .unwrap_or(nonzero!(10u32)),
            timeout_secs: config.timeout_secs,
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the rate limit.
    #[must_use]
    pub const fn with_rate_limit(mut self, requests_per_second: NonZeroU32) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

// =============================================================================
// Gateway payloads
// =============================================================================

#[derive(Debug, Serialize)]
struct ConnectRequest<'a> {
    account_id: &'a str,
    password: &'a str,
    server: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConnectResponse {
    connected: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawAccountInfo {
    balance: Option<Decimal>,
    equity: Option<Decimal>,
}

impl RawAccountInfo {
    fn into_info(self) -> Result<AccountInfo> {
        match (self.balance, self.equity) {
            (Some(balance), Some(equity)) => Ok(AccountInfo { balance, equity }),
            _ => Err(TerminalError::Payload(
                "account info missing balance or equity".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawDealsResponse {
    deals: Option<Vec<RawDeal>>,
}

/// Raw deal leg from the gateway. Incomplete legs are dropped.
#[derive(Debug, Clone, Deserialize)]
struct RawDeal {
    ticket: Option<i64>,
    symbol: Option<String>,
    volume: Option<Decimal>,
    profit: Option<Decimal>,
    time: Option<String>,
}

impl RawDeal {
    fn into_deal(self) -> Option<Deal> {
        let symbol = self.symbol?;
        let volume = self.volume?;
        let profit = self.profit?;
        let time = DateTime::parse_from_rfc3339(self.time.as_deref()?)
            .ok()?
            .with_timezone(&Utc);

        Some(Deal {
            ticket: self.ticket.unwrap_or(0),
            symbol,
            volume,
            profit,
            time,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawPositionsResponse {
    positions: Option<Vec<RawPosition>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPosition {
    ticket: Option<i64>,
    symbol: Option<String>,
    volume: Option<Decimal>,
    profit: Option<Decimal>,
}

impl RawPosition {
    fn into_position(self) -> Option<OpenPosition> {
        Some(OpenPosition {
            ticket: self.ticket.unwrap_or(0),
            symbol: self.symbol?,
            volume: self.volume?,
            profit: self.profit?,
        })
    }
}

// =============================================================================
// BridgeTerminal
// =============================================================================

/// Rate-limited client for the MT5 bridge gateway.
///
/// Implements [`TerminalClient`]: transport failures are logged and reported
/// through the trait's degraded return values instead of errors.
pub struct BridgeTerminal {
    /// Configuration.
    config: BridgeConfig,

    /// HTTP client.
    http: Client,

    /// Rate limiter.
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,

    /// Account id of the currently open session, for log context.
    session: Mutex<Option<String>>,
}

impl std::fmt::Debug for BridgeTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeTerminal")
            .field("base_url", &self.config.base_url)
            .field("requests_per_second", &self.config.requests_per_second)
            .finish_non_exhaustive()
    }
}

impl BridgeTerminal {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TerminalError::Network(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_second(config.requests_per_second);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            config,
            http,
            rate_limiter,
            session: Mutex::new(None),
        })
    }

    /// Returns the gateway base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Waits for the rate limiter and makes a GET request.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url, path);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Waits for the rate limiter and makes a POST request.
    async fn post<T: serde::de::DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url, path);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handles a gateway response, converting errors appropriately.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(TerminalError::rate_limit(retry_after));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TerminalError::api(status.as_u16(), text));
        }

        let body = response.json::<T>().await?;
        Ok(body)
    }

    async fn session_account(&self) -> Result<String> {
        self.session.lock().await.clone().ok_or_else(|| {
            TerminalError::NoSession("no account connected to the bridge".to_string())
        })
    }

    // =========================================================================
    // Gateway endpoints
    // =========================================================================

    async fn try_connect(&self, account: &Account) -> Result<bool> {
        let request = ConnectRequest {
            account_id: &account.account_id,
            password: &account.password,
            server: &account.server,
        };

        let response: RawConnectResponse = self.post("/connect", &request).await?;
        let connected = response.connected.unwrap_or(false);

        let mut session = self.session.lock().await;
        *session = connected.then(|| account.account_id.clone());

        Ok(connected)
    }

    async fn try_account_info(&self) -> Result<AccountInfo> {
        self.session_account().await?;
        let raw: RawAccountInfo = self.get("/account-info").await?;
        raw.into_info()
    }

    async fn try_history_deals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Deal>> {
        let account_id = self.session_account().await?;
        let path = format!(
            "/history-deals?from={}&to={}",
            from.timestamp(),
            to.timestamp()
        );

        let raw: RawDealsResponse = self.get(&path).await?;
        let raw_deals = raw.deals.unwrap_or_default();
        let total = raw_deals.len();

        let deals: Vec<Deal> = raw_deals
            .into_iter()
            .filter_map(RawDeal::into_deal)
            .collect();

        if deals.len() < total {
            debug!(
                account_id = %account_id,
                dropped = total - deals.len(),
                "dropped incomplete deal legs from gateway payload"
            );
        }

        Ok(deals)
    }

    async fn try_open_positions(&self) -> Result<Vec<OpenPosition>> {
        self.session_account().await?;
        let raw: RawPositionsResponse = self.get("/positions").await?;

        Ok(raw
            .positions
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawPosition::into_position)
            .collect())
    }

    async fn try_disconnect(&self) -> Result<()> {
        let _: serde_json::Value = self.post("/disconnect", &serde_json::json!({})).await?;
        let mut session = self.session.lock().await;
        *session = None;
        Ok(())
    }
}

#[async_trait]
impl TerminalClient for BridgeTerminal {
    async fn connect(&self, account: &Account) -> bool {
        match self.try_connect(account).await {
            Ok(connected) => {
                if !connected {
                    warn!(account_id = %account.account_id, "bridge refused the session");
                }
                connected
            }
            Err(e) => {
                warn!(account_id = %account.account_id, error = %e, "connect failed");
                false
            }
        }
    }

    async fn account_info(&self) -> Option<AccountInfo> {
        match self.try_account_info().await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(error = %e, "account info fetch failed");
                None
            }
        }
    }

    async fn history_deals(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Deal> {
        match self.try_history_deals(from, to).await {
            Ok(deals) => deals,
            Err(e) => {
                warn!(error = %e, "deal history fetch failed");
                Vec::new()
            }
        }
    }

    async fn open_positions(&self) -> Vec<OpenPosition> {
        match self.try_open_positions().await {
            Ok(positions) => positions,
            Err(e) => {
                warn!(error = %e, "open positions fetch failed");
                Vec::new()
            }
        }
    }

    async fn disconnect(&self) {
        if let Err(e) = self.try_disconnect().await {
            warn!(error = %e, "disconnect failed");
        }
    }
}
