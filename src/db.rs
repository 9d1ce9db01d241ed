// src/db.rs
use crate::error::Result;
use crate::models::{HistoryItem, OwnerProfile, Video, WatchHistoryEntry, WatchSession};
use crate::store::{HistoryLedger, SessionStore, VideoDirectory};
use async_trait::async_trait;
use moka::future::Cache;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use uuid::Uuid;

const SESSION_COLUMNS: &str =
    r#"id, owner_id, video_id, total_duration, "timestamp", created_at, updated_at"#;

const HISTORY_COLUMNS: &str =
    "id, owner_id, video_id, total_duration, repeated, last_watched_at, watched_session, created_at";

pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Postgres-backed implementation of every storage seam.
///
/// `videos` and `users` belong to the wider platform; only the watch tables
/// are owned by this service.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    videos: Cache<Uuid, Video>,
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("cached_videos", &self.videos.entry_count())
            .finish_non_exhaustive()
    }
}

impl PgStore {
    pub fn new(pool: PgPool, video_cache_capacity: u64, video_cache_ttl: Duration) -> Self {
        Self {
            pool,
            videos: Cache::builder()
                .max_capacity(video_cache_capacity)
                .time_to_live(video_cache_ttl)
                .build(),
        }
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn get(&self, owner: Uuid, video: Uuid) -> Result<Option<WatchSession>> {
        let session = sqlx::query_as::<_, WatchSession>(&format!(
            "SELECT {} FROM watch_sessions WHERE owner_id = $1 AND video_id = $2",
            SESSION_COLUMNS
        ))
        .bind(owner)
        .bind(video)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn create_or_replace(
        &self,
        owner: Uuid,
        video: Uuid,
        total_duration: f64,
        timestamp: f64,
    ) -> Result<WatchSession> {
        // A fresh id marks the replacement as a new session
        let session = sqlx::query_as::<_, WatchSession>(&format!(
            r#"INSERT INTO watch_sessions (id, owner_id, video_id, total_duration, "timestamp", created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            ON CONFLICT (owner_id, video_id) DO UPDATE SET
                id = EXCLUDED.id,
                total_duration = EXCLUDED.total_duration,
                "timestamp" = EXCLUDED."timestamp",
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            RETURNING {}"#,
            SESSION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(video)
        .bind(total_duration)
        .bind(timestamp)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn update(
        &self,
        session: &WatchSession,
        delta_duration: f64,
        new_timestamp: f64,
    ) -> Result<WatchSession> {
        let session = sqlx::query_as::<_, WatchSession>(&format!(
            r#"UPDATE watch_sessions
            SET total_duration = total_duration + $1, "timestamp" = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING {}"#,
            SESSION_COLUMNS
        ))
        .bind(delta_duration)
        .bind(new_timestamp)
        .bind(session.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete(&self, owner: Uuid, video: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM watch_sessions WHERE owner_id = $1 AND video_id = $2")
            .bind(owner)
            .bind(video)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_by_id(&self, session_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM watch_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryLedger for PgStore {
    async fn get(&self, owner: Uuid, video: Uuid) -> Result<Option<WatchHistoryEntry>> {
        let entry = sqlx::query_as::<_, WatchHistoryEntry>(&format!(
            "SELECT {} FROM watch_histories WHERE owner_id = $1 AND video_id = $2",
            HISTORY_COLUMNS
        ))
        .bind(owner)
        .bind(video)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn create(
        &self,
        owner: Uuid,
        video: Uuid,
        initial_duration: f64,
        session_ref: Option<Uuid>,
    ) -> Result<WatchHistoryEntry> {
        let entry = sqlx::query_as::<_, WatchHistoryEntry>(&format!(
            "INSERT INTO watch_histories
                (id, owner_id, video_id, total_duration, repeated, last_watched_at, watched_session, created_at)
            VALUES ($1, $2, $3, $4, 0, NOW(), $5, NOW())
            RETURNING {}",
            HISTORY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(video)
        .bind(initial_duration)
        .bind(session_ref)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn accumulate(
        &self,
        entry: &WatchHistoryEntry,
        added_duration: f64,
        session_ref: Option<Uuid>,
    ) -> Result<WatchHistoryEntry> {
        let entry = sqlx::query_as::<_, WatchHistoryEntry>(&format!(
            "UPDATE watch_histories
            SET total_duration = total_duration + $1, last_watched_at = NOW(), watched_session = $2
            WHERE id = $3
            RETURNING {}",
            HISTORY_COLUMNS
        ))
        .bind(added_duration)
        .bind(session_ref)
        .bind(entry.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn mark_repeat(&self, entry: &WatchHistoryEntry) -> Result<WatchHistoryEntry> {
        let entry = sqlx::query_as::<_, WatchHistoryEntry>(&format!(
            "UPDATE watch_histories SET repeated = repeated + 1 WHERE id = $1 RETURNING {}",
            HISTORY_COLUMNS
        ))
        .bind(entry.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn delete(&self, owner: Uuid, video: Uuid) -> Result<Option<WatchHistoryEntry>> {
        let entry = sqlx::query_as::<_, WatchHistoryEntry>(&format!(
            "DELETE FROM watch_histories WHERE owner_id = $1 AND video_id = $2 RETURNING {}",
            HISTORY_COLUMNS
        ))
        .bind(owner)
        .bind(video)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn list(&self, owner: Uuid, offset: i64, limit: i64) -> Result<Vec<HistoryItem>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT h.id, h.owner_id, h.video_id, h.total_duration, h.repeated,
                h.last_watched_at, h.watched_session, h.created_at,
                v.title, v.thumbnail_url, v.duration, v.views,
                u.id AS video_owner_id, u.name AS video_owner_name,
                u.username AS video_owner_username, u.avatar_url AS video_owner_avatar_url
            FROM watch_histories h
            JOIN videos v ON v.id = h.video_id
            JOIN users u ON u.id = v.owner_id
            WHERE h.owner_id = $1
            ORDER BY h.last_watched_at DESC
            OFFSET $2 LIMIT $3",
        )
        .bind(owner)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(HistoryItem::from).collect())
    }

    async fn count(&self, owner: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM watch_histories WHERE owner_id = $1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[derive(FromRow)]
struct VideoRow {
    id: Uuid,
    title: String,
    thumbnail_url: Option<String>,
    duration: f64,
    views: i64,
    owner_id: Uuid,
    owner_name: String,
    owner_username: String,
    owner_avatar_url: Option<String>,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Video {
            id: row.id,
            title: row.title,
            thumbnail_url: row.thumbnail_url,
            duration: row.duration,
            views: row.views,
            owner: OwnerProfile {
                id: row.owner_id,
                name: row.owner_name,
                username: row.owner_username,
                avatar_url: row.owner_avatar_url,
            },
        }
    }
}

#[derive(FromRow)]
struct HistoryRow {
    #[sqlx(flatten)]
    entry: WatchHistoryEntry,
    title: String,
    thumbnail_url: Option<String>,
    duration: f64,
    views: i64,
    video_owner_id: Uuid,
    video_owner_name: String,
    video_owner_username: String,
    video_owner_avatar_url: Option<String>,
}

impl From<HistoryRow> for HistoryItem {
    fn from(row: HistoryRow) -> Self {
        let video = Video {
            id: row.entry.video_id,
            title: row.title,
            thumbnail_url: row.thumbnail_url,
            duration: row.duration,
            views: row.views,
            owner: OwnerProfile {
                id: row.video_owner_id,
                name: row.video_owner_name,
                username: row.video_owner_username,
                avatar_url: row.video_owner_avatar_url,
            },
        };
        HistoryItem::join(row.entry, video)
    }
}

#[async_trait]
impl VideoDirectory for PgStore {
    async fn find_by_id(&self, video: Uuid) -> Result<Option<Video>> {
        if let Some(cached) = self.videos.get(&video).await {
            tracing::debug!("Video cache hit for {}", video);
            return Ok(Some(cached));
        }

        let row = sqlx::query_as::<_, VideoRow>(
            "SELECT v.id, v.title, v.thumbnail_url, v.duration, v.views,
                u.id AS owner_id, u.name AS owner_name, u.username AS owner_username,
                u.avatar_url AS owner_avatar_url
            FROM videos v
            JOIN users u ON u.id = v.owner_id
            WHERE v.id = $1",
        )
        .bind(video)
        .fetch_optional(&self.pool)
        .await?;

        let found = row.map(Video::from);
        if let Some(v) = &found {
            self.videos.insert(video, v.clone()).await;
        }
        Ok(found)
    }

    async fn increment_views(&self, video: Uuid) -> Result<()> {
        sqlx::query("UPDATE videos SET views = views + 1 WHERE id = $1")
            .bind(video)
            .execute(&self.pool)
            .await?;
        self.videos.invalidate(&video).await;
        Ok(())
    }
}
