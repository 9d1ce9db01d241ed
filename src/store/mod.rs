// src/store/mod.rs
//! Storage seams used by the progress reconciler.
//!
//! Each trait covers one record kind. Implementations are expected to make
//! single-record read-modify-writes atomic; nothing here spans two records.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{HistoryItem, Video, WatchHistoryEntry, WatchSession};

#[cfg(test)]
pub mod memory;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, owner: Uuid, video: Uuid) -> Result<Option<WatchSession>>;

    /// Drops any prior session for the pair before inserting.
    async fn create_or_replace(
        &self,
        owner: Uuid,
        video: Uuid,
        total_duration: f64,
        timestamp: f64,
    ) -> Result<WatchSession>;

    async fn update(
        &self,
        session: &WatchSession,
        delta_duration: f64,
        new_timestamp: f64,
    ) -> Result<WatchSession>;

    /// No-op when absent.
    async fn delete(&self, owner: Uuid, video: Uuid) -> Result<()>;

    async fn delete_by_id(&self, session_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait HistoryLedger: Send + Sync {
    async fn get(&self, owner: Uuid, video: Uuid) -> Result<Option<WatchHistoryEntry>>;

    async fn create(
        &self,
        owner: Uuid,
        video: Uuid,
        initial_duration: f64,
        session_ref: Option<Uuid>,
    ) -> Result<WatchHistoryEntry>;

    /// Adds to the running total, stamps `last_watched_at` and repoints the session reference.
    async fn accumulate(
        &self,
        entry: &WatchHistoryEntry,
        added_duration: f64,
        session_ref: Option<Uuid>,
    ) -> Result<WatchHistoryEntry>;

    async fn mark_repeat(&self, entry: &WatchHistoryEntry) -> Result<WatchHistoryEntry>;

    async fn delete(&self, owner: Uuid, video: Uuid) -> Result<Option<WatchHistoryEntry>>;

    /// Entries joined with their video and its owner, most recently watched
    /// first. Entries whose video is gone are left out before paging.
    async fn list(&self, owner: Uuid, offset: i64, limit: i64) -> Result<Vec<HistoryItem>>;

    /// Counts every entry, including those whose video is gone.
    async fn count(&self, owner: Uuid) -> Result<i64>;
}

#[async_trait]
pub trait VideoDirectory: Send + Sync {
    async fn find_by_id(&self, video: Uuid) -> Result<Option<Video>>;

    async fn increment_views(&self, video: Uuid) -> Result<()>;
}
