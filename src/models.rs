// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Fraction of a video's duration at which a viewing pass counts as finished.
pub const COMPLETION_RATIO: f64 = 0.95;

/// Position of the current viewing pass for one (owner, video) pair.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WatchSession {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub video_id: Uuid,
    pub total_duration: f64,
    pub timestamp: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WatchSession {
    /// Inclusive: a position of exactly 95% completes the pass.
    pub fn is_completed(&self, video_duration: f64) -> bool {
        self.timestamp >= video_duration * COMPLETION_RATIO
    }
}

/// Cumulative watch history for one (owner, video) pair.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WatchHistoryEntry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub video_id: Uuid,
    pub total_duration: f64,
    pub repeated: i32,
    pub last_watched_at: DateTime<Utc>,
    // Weak reference, the session may already be gone
    pub watched_session: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OwnerProfile {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub duration: f64,
    pub views: i64,
    pub owner: OwnerProfile,
}

/// Ledger entry joined with its video, as returned by the history listing.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: Uuid,
    pub total_duration: f64,
    pub repeated: i32,
    pub last_watched_at: DateTime<Utc>,
    pub watched_session: Option<Uuid>,
    pub video: Video,
}

impl HistoryItem {
    pub fn join(entry: WatchHistoryEntry, video: Video) -> Self {
        Self {
            id: entry.id,
            total_duration: entry.total_duration,
            repeated: entry.repeated,
            last_watched_at: entry.last_watched_at,
            watched_session: entry.watched_session,
            video,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct HistoryPage {
    pub items: Vec<HistoryItem>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

/// Body of POST/PATCH progress reports. Missing fields count as zero.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub watched_duration: Option<f64>,
    pub timestamp: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Claims {
    pub sub: String, // owner id
    pub exp: usize,
}
