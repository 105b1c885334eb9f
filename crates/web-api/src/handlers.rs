use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::error;

use contest_core::breach::BreachEvent;
use contest_store::{LeaderboardEntryRecord, LeaderboardRepository, MetadataRecord};

/// The `GET /data` response: everything a leaderboard page needs in one call.
#[derive(Debug, Serialize)]
pub struct LeaderboardDocument {
    pub metadata: MetadataDocument,
    /// Rows ranked by profit, best first.
    pub data: Vec<LeaderboardEntryRecord>,
    /// Every breach across all accounts, in row rank order.
    pub breaches: Vec<BreachEvent>,
}

#[derive(Debug, Serialize)]
pub struct MetadataDocument {
    pub global_trade_counts: IndexMap<String, i64>,
    pub most_traded_overall: Option<MostTraded>,
    pub last_update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct MostTraded {
    pub symbol: String,
    #[serde(rename = "total_trades")]
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Assembles the response document from ranked rows and the metadata row.
///
/// The per-row breach logs are the source of truth; the document-level
/// `breaches` array is a flattened view of them, row rank first, event
/// time within a row.
#[must_use]
pub fn build_document(
    rows: Vec<LeaderboardEntryRecord>,
    metadata: Option<MetadataRecord>,
) -> LeaderboardDocument {
    let metadata = match metadata {
        Some(record) => MetadataDocument {
            global_trade_counts: record.global_trade_counts.0,
            most_traded_overall: record.most_traded_symbol.map(|symbol| MostTraded {
                symbol,
                count: record.most_traded_count,
            }),
            last_update_time: Some(record.last_update_time),
        },
        None => MetadataDocument {
            global_trade_counts: IndexMap::new(),
            most_traded_overall: None,
            last_update_time: None,
        },
    };

    let breaches = rows
        .iter()
        .flat_map(|row| row.breaches.0.iter().cloned())
        .collect();

    LeaderboardDocument {
        metadata,
        data: rows,
        breaches,
    }
}

/// Serves the full leaderboard document.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if the database cannot
/// be read.
pub async fn get_data(
    State(repo): State<Arc<LeaderboardRepository>>,
) -> Result<Json<LeaderboardDocument>, StatusCode> {
    let rows = repo.fetch_leaderboard().await.map_err(|e| {
        error!(error = %e, "leaderboard read failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let metadata = repo.fetch_metadata().await.map_err(|e| {
        error!(error = %e, "metadata read failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(build_document(rows, metadata)))
}

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
    })
}
