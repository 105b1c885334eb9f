use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::breach::RiskLimits;
use crate::types::Account;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    /// Contest roster. Credentials live in configuration, never in code.
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Base URL of the MT5 bridge gateway.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Start of the deal history window used for every metrics pass.
    #[serde(default = "default_history_start")]
    pub history_start: DateTime<Utc>,
    /// Pause between accounts within a cycle, in milliseconds.
    #[serde(default = "default_account_pause_ms")]
    pub account_pause_ms: u64,
    /// Delay before retrying after a failed cycle, in seconds.
    #[serde(default = "default_cycle_retry_delay_secs")]
    pub cycle_retry_delay_secs: u64,
    #[serde(default = "default_store_retry_attempts")]
    pub store_retry_attempts: u32,
    #[serde(default = "default_store_retry_delay_secs")]
    pub store_retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Balance every contest account starts with.
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,
    #[serde(default = "default_daily_drawdown_factor")]
    pub daily_drawdown_factor: Decimal,
    #[serde(default = "default_max_drawdown_factor")]
    pub max_drawdown_factor: Decimal,
}

impl RiskConfig {
    #[must_use]
    pub const fn limits(&self) -> RiskLimits {
        RiskLimits {
            initial_balance: self.initial_balance,
            daily_drawdown_factor: self.daily_drawdown_factor,
            max_drawdown_factor: self.max_drawdown_factor,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "postgresql://localhost/contest_leaderboard".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_requests_per_second() -> u32 {
    10
}

fn default_history_start() -> DateTime<Utc> {
    // Contest opening day.
    Utc.with_ymd_and_hms(2025, 1, 19, 0, 0, 0).unwrap()
}

const fn default_account_pause_ms() -> u64 {
    500
}

const fn default_cycle_retry_delay_secs() -> u64 {
    30
}

const fn default_store_retry_attempts() -> u32 {
    3
}

const fn default_store_retry_delay_secs() -> u64 {
    2
}

fn default_initial_balance() -> Decimal {
    Decimal::from(100_000)
}

fn default_daily_drawdown_factor() -> Decimal {
    Decimal::new(97, 2)
}

fn default_max_drawdown_factor() -> Decimal {
    Decimal::new(95, 2)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            timeout_secs: default_timeout_secs(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_start: default_history_start(),
            account_pause_ms: default_account_pause_ms(),
            cycle_retry_delay_secs: default_cycle_retry_delay_secs(),
            store_retry_attempts: default_store_retry_attempts(),
            store_retry_delay_secs: default_store_retry_delay_secs(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            initial_balance: default_initial_balance(),
            daily_drawdown_factor: default_daily_drawdown_factor(),
            max_drawdown_factor: default_max_drawdown_factor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::{Format, Toml};
    use figment::Figment;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_match_contest_rules() {
        let config = AppConfig::default();
        assert_eq!(config.risk.initial_balance, dec!(100000));
        assert_eq!(config.risk.daily_drawdown_factor, dec!(0.97));
        assert_eq!(config.risk.max_drawdown_factor, dec!(0.95));
        assert_eq!(config.monitor.account_pause_ms, 500);
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn partial_toml_fills_missing_fields() {
        let config: AppConfig = Figment::new()
            .merge(Toml::string(
                r#"
                [monitor]
                account_pause_ms = 250

                [[accounts]]
                account_id = "101"
                server = "Demo-Server"
                password = "secret"
                contestant_name = "Alice"
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(config.monitor.account_pause_ms, 250);
        assert_eq!(config.monitor.cycle_retry_delay_secs, 30);
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.accounts[0].contestant_name, "Alice");
    }

    #[test]
    fn risk_limits_conversion_keeps_values() {
        let limits = RiskConfig::default().limits();
        assert_eq!(limits.daily_limit(dec!(100000)), dec!(97000.00));
        assert_eq!(limits.max_limit(), dec!(95000.00));
    }
}
