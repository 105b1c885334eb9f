//! Read-only JSON API over the persisted leaderboard.
//!
//! Two endpoints, both read-only:
//! - `GET /data` - the full leaderboard document: metadata, ranked rows
//!   and a flattened breach log
//! - `GET /health` - liveness probe
//!
//! The API shares nothing with the monitor loop except the database
//! pool; it never writes.

pub mod handlers;
pub mod server;

pub use server::ApiServer;
