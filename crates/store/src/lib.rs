//! `PostgreSQL` persistence for the contest leaderboard.
//!
//! This crate provides:
//! - Connection handling with embedded migrations
//! - Row models for the `leaderboard` and `leaderboard_metadata` tables
//! - A repository implementing the shared [`LeaderboardStore`] contract
//! - An in-memory store for exercising the monitor without a database
//!
//! [`LeaderboardStore`]: contest_core::traits::LeaderboardStore

pub mod database;
pub mod leaderboard_repo;
pub mod memory;
pub mod models;
pub mod retry;

pub use database::DatabaseClient;
pub use leaderboard_repo::LeaderboardRepository;
pub use memory::{MemoryEntry, MemoryLeaderboard};
pub use models::{LeaderboardEntryRecord, MetadataRecord};
pub use retry::RetryPolicy;
