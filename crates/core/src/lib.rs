pub mod breach;
pub mod config;
pub mod config_loader;
pub mod metrics;
pub mod report;
pub mod traits;
pub mod types;

pub use breach::{assess, BreachAssessment, BreachEvent, BreachKind, RiskLimits};
pub use config::{
    AppConfig, DatabaseConfig, MonitorConfig, RiskConfig, ServerConfig, TerminalConfig,
};
pub use config_loader::ConfigLoader;
pub use metrics::{MetadataSummary, MetricsSnapshot};
pub use report::AccountReport;
pub use traits::{LeaderboardStore, MergeOutcome, MergeSummary, TerminalClient};
pub use types::{Account, AccountInfo, Deal, OpenPosition};
