// src/store/memory.rs
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{HistoryLedger, SessionStore, VideoDirectory};
use crate::error::{Result, WatchError};
use crate::models::{HistoryItem, OwnerProfile, Video, WatchHistoryEntry, WatchSession};

/// Write operations that can be made to fail on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fault {
    SessionWrite,
    LedgerWrite,
}

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<(Uuid, Uuid), WatchSession>,
    histories: HashMap<(Uuid, Uuid), WatchHistoryEntry>,
    videos: HashMap<Uuid, Video>,
    faults: Vec<Fault>,
}

impl MemoryState {
    fn check(&self, fault: Fault) -> Result<()> {
        if self.faults.contains(&fault) {
            return Err(WatchError::StorageFailure(format!("injected {:?} failure", fault).into()));
        }
        Ok(())
    }
}

/// Map-backed store implementing every storage seam.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("MemoryStore");
        match self.state.try_lock() {
            Ok(state) => {
                debug
                    .field("sessions", &state.sessions.len())
                    .field("histories", &state.histories.len())
                    .field("videos", &state.videos.len());
            }
            Err(_) => {
                debug.field("state", &"<locked>");
            }
        }
        debug.finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_video(&self, duration: f64) -> Video {
        let video = Video {
            id: Uuid::new_v4(),
            title: "Test video".to_string(),
            thumbnail_url: None,
            duration,
            views: 0,
            owner: OwnerProfile {
                id: Uuid::new_v4(),
                name: "Channel".to_string(),
                username: "channel".to_string(),
                avatar_url: None,
            },
        };
        self.state.lock().await.videos.insert(video.id, video.clone());
        video
    }

    pub async fn remove_video(&self, video: Uuid) {
        self.state.lock().await.videos.remove(&video);
    }

    pub async fn video(&self, video: Uuid) -> Option<Video> {
        self.state.lock().await.videos.get(&video).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    pub async fn history_count(&self) -> usize {
        self.state.lock().await.histories.len()
    }

    pub async fn inject(&self, fault: Fault) {
        self.state.lock().await.faults.push(fault);
    }

    pub async fn clear_faults(&self) {
        self.state.lock().await.faults.clear();
    }

    /// Rewinds `last_watched_at` so ordering tests do not depend on clock resolution.
    pub async fn backdate(&self, owner: Uuid, video: Uuid, seconds: i64) {
        if let Some(entry) = self.state.lock().await.histories.get_mut(&(owner, video)) {
            entry.last_watched_at = entry.last_watched_at - chrono::Duration::seconds(seconds);
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, owner: Uuid, video: Uuid) -> Result<Option<WatchSession>> {
        Ok(self.state.lock().await.sessions.get(&(owner, video)).cloned())
    }

    async fn create_or_replace(
        &self,
        owner: Uuid,
        video: Uuid,
        total_duration: f64,
        timestamp: f64,
    ) -> Result<WatchSession> {
        let mut state = self.state.lock().await;
        state.check(Fault::SessionWrite)?;
        let now = Utc::now();
        let session = WatchSession {
            id: Uuid::new_v4(),
            owner_id: owner,
            video_id: video,
            total_duration,
            timestamp,
            created_at: now,
            updated_at: now,
        };
        state.sessions.insert((owner, video), session.clone());
        Ok(session)
    }

    async fn update(
        &self,
        session: &WatchSession,
        delta_duration: f64,
        new_timestamp: f64,
    ) -> Result<WatchSession> {
        let mut state = self.state.lock().await;
        state.check(Fault::SessionWrite)?;
        let stored = state
            .sessions
            .get_mut(&(session.owner_id, session.video_id))
            .filter(|s| s.id == session.id)
            .ok_or_else(|| WatchError::not_found("Watch session not found"))?;
        stored.total_duration += delta_duration;
        stored.timestamp = new_timestamp;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, owner: Uuid, video: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check(Fault::SessionWrite)?;
        state.sessions.remove(&(owner, video));
        Ok(())
    }

    async fn delete_by_id(&self, session_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check(Fault::SessionWrite)?;
        state.sessions.retain(|_, s| s.id != session_id);
        Ok(())
    }
}

#[async_trait]
impl HistoryLedger for MemoryStore {
    async fn get(&self, owner: Uuid, video: Uuid) -> Result<Option<WatchHistoryEntry>> {
        Ok(self.state.lock().await.histories.get(&(owner, video)).cloned())
    }

    async fn create(
        &self,
        owner: Uuid,
        video: Uuid,
        initial_duration: f64,
        session_ref: Option<Uuid>,
    ) -> Result<WatchHistoryEntry> {
        let mut state = self.state.lock().await;
        state.check(Fault::LedgerWrite)?;
        if state.histories.contains_key(&(owner, video)) {
            return Err(WatchError::StorageFailure("duplicate watch history entry".into()));
        }
        let now = Utc::now();
        let entry = WatchHistoryEntry {
            id: Uuid::new_v4(),
            owner_id: owner,
            video_id: video,
            total_duration: initial_duration,
            repeated: 0,
            last_watched_at: now,
            watched_session: session_ref,
            created_at: now,
        };
        state.histories.insert((owner, video), entry.clone());
        Ok(entry)
    }

    async fn accumulate(
        &self,
        entry: &WatchHistoryEntry,
        added_duration: f64,
        session_ref: Option<Uuid>,
    ) -> Result<WatchHistoryEntry> {
        let mut state = self.state.lock().await;
        state.check(Fault::LedgerWrite)?;
        let stored = state
            .histories
            .get_mut(&(entry.owner_id, entry.video_id))
            .ok_or_else(|| WatchError::not_found("Watch history not found"))?;
        stored.total_duration += added_duration;
        stored.last_watched_at = Utc::now();
        stored.watched_session = session_ref;
        Ok(stored.clone())
    }

    async fn mark_repeat(&self, entry: &WatchHistoryEntry) -> Result<WatchHistoryEntry> {
        let mut state = self.state.lock().await;
        state.check(Fault::LedgerWrite)?;
        let stored = state
            .histories
            .get_mut(&(entry.owner_id, entry.video_id))
            .ok_or_else(|| WatchError::not_found("Watch history not found"))?;
        stored.repeated += 1;
        Ok(stored.clone())
    }

    async fn delete(&self, owner: Uuid, video: Uuid) -> Result<Option<WatchHistoryEntry>> {
        let mut state = self.state.lock().await;
        state.check(Fault::LedgerWrite)?;
        Ok(state.histories.remove(&(owner, video)))
    }

    async fn list(&self, owner: Uuid, offset: i64, limit: i64) -> Result<Vec<HistoryItem>> {
        let state = self.state.lock().await;
        let mut items: Vec<HistoryItem> = state
            .histories
            .values()
            .filter(|e| e.owner_id == owner)
            .filter_map(|e| {
                let video = state.videos.get(&e.video_id)?;
                Some(HistoryItem::join(e.clone(), video.clone()))
            })
            .collect();
        items.sort_by(|a, b| b.last_watched_at.cmp(&a.last_watched_at));
        Ok(items
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self, owner: Uuid) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state.histories.values().filter(|e| e.owner_id == owner).count() as i64)
    }
}

#[async_trait]
impl VideoDirectory for MemoryStore {
    async fn find_by_id(&self, video: Uuid) -> Result<Option<Video>> {
        Ok(self.state.lock().await.videos.get(&video).cloned())
    }

    async fn increment_views(&self, video: Uuid) -> Result<()> {
        if let Some(v) = self.state.lock().await.videos.get_mut(&video) {
            v.views += 1;
        }
        Ok(())
    }
}
