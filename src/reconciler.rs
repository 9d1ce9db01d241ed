// src/reconciler.rs
//! Watch-progress reconciliation.
//!
//! Every progress report touches two records for the same (owner, video) pair:
//! the session, which tracks the position of the current viewing pass, and the
//! ledger entry, which keeps the running total across all passes. The two
//! writes are not atomic. A failure between them is surfaced to the caller and
//! the next report picks up from whatever state was left behind.
//!
//! Rollover is decided from the session as it was *before* the incoming report
//! is applied, so a report that itself crosses 95% is only rolled over on the
//! following call.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Result, WatchError};
use crate::models::{HistoryPage, HistoryQuery, ProgressReport, Video, WatchHistoryEntry};
use crate::store::{HistoryLedger, SessionStore, VideoDirectory};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

/// Which transition a progress report went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// First-ever report for the pair: ledger and session created.
    Created,
    /// Ledger existed without a session: a fresh session was opened.
    Resumed,
    /// Session still in progress: position and totals advanced.
    Continued,
    /// Previous pass had finished: repeat counted and a new session opened.
    RolledOver,
}

#[derive(Clone, Debug)]
pub struct ReportOutcome {
    pub transition: Transition,
    pub entry: WatchHistoryEntry,
}

impl ReportOutcome {
    pub fn created(&self) -> bool {
        self.transition == Transition::Created
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Progress {
    watched: f64,
    timestamp: f64,
}

impl TryFrom<ProgressReport> for Progress {
    type Error = WatchError;

    fn try_from(report: ProgressReport) -> Result<Self> {
        Ok(Self {
            watched: non_negative("watchedDuration", report.watched_duration)?,
            timestamp: non_negative("timestamp", report.timestamp)?,
        })
    }
}

fn non_negative(field: &str, value: Option<f64>) -> Result<f64> {
    let value = value.unwrap_or(0.0);
    if !value.is_finite() {
        return Err(WatchError::invalid(format!("{} must be a finite number", field)));
    }
    if value < 0.0 {
        return Err(WatchError::invalid(format!("{} must not be negative", field)));
    }
    Ok(value)
}

#[derive(Clone)]
pub struct ProgressReconciler {
    sessions: Arc<dyn SessionStore>,
    ledger: Arc<dyn HistoryLedger>,
    videos: Arc<dyn VideoDirectory>,
}

impl std::fmt::Debug for ProgressReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReconciler").finish_non_exhaustive()
    }
}

impl ProgressReconciler {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        ledger: Arc<dyn HistoryLedger>,
        videos: Arc<dyn VideoDirectory>,
    ) -> Self {
        Self {
            sessions,
            ledger,
            videos,
        }
    }

    /// Create-or-update entry point. Only a missing video is an error here.
    pub async fn report_progress(
        &self,
        owner: Uuid,
        video_id: Uuid,
        report: ProgressReport,
    ) -> Result<ReportOutcome> {
        let progress = Progress::try_from(report)?;
        let video = self.find_video(video_id).await?;

        match self.ledger.get(owner, video_id).await? {
            Some(entry) => self.reconcile(owner, &video, entry, progress).await,
            None => self.first_report(owner, &video, progress).await,
        }
    }

    /// Like [`Self::report_progress`], but the pair must already have history.
    pub async fn update_progress(
        &self,
        owner: Uuid,
        video_id: Uuid,
        report: ProgressReport,
    ) -> Result<ReportOutcome> {
        let progress = Progress::try_from(report)?;
        let video = self.find_video(video_id).await?;

        let entry = self
            .ledger
            .get(owner, video_id)
            .await?
            .ok_or_else(|| WatchError::not_found("Watch history not found"))?;

        self.reconcile(owner, &video, entry, progress).await
    }

    pub async fn get_history(&self, owner: Uuid, query: &HistoryQuery) -> Result<HistoryPage> {
        let page = query.page.unwrap_or(DEFAULT_PAGE);
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        if page == 0 {
            return Err(WatchError::invalid("page must be at least 1"));
        }
        if limit == 0 {
            return Err(WatchError::invalid("limit must be at least 1"));
        }

        let offset = (i64::from(page) - 1) * i64::from(limit);
        let items = self.ledger.list(owner, offset, i64::from(limit)).await?;
        let total = self.ledger.count(owner).await?;

        Ok(HistoryPage {
            items,
            total,
            page,
            limit,
        })
    }

    pub async fn delete_history(&self, owner: Uuid, video_id: Uuid) -> Result<WatchHistoryEntry> {
        let entry = self
            .ledger
            .delete(owner, video_id)
            .await?
            .ok_or_else(|| WatchError::not_found("Watch history not found"))?;

        match entry.watched_session {
            Some(session_id) => self.sessions.delete_by_id(session_id).await?,
            None => self.sessions.delete(owner, video_id).await?,
        }

        tracing::info!("Deleted watch history for owner {} video {}", owner, video_id);
        Ok(entry)
    }

    async fn find_video(&self, video_id: Uuid) -> Result<Video> {
        self.videos
            .find_by_id(video_id)
            .await?
            .ok_or_else(|| WatchError::not_found("Video not found"))
    }

    async fn first_report(&self, owner: Uuid, video: &Video, progress: Progress) -> Result<ReportOutcome> {
        // Ledger is written only once its session exists
        let session = self
            .sessions
            .create_or_replace(owner, video.id, progress.watched, progress.timestamp)
            .await?;
        let entry = self
            .ledger
            .create(owner, video.id, progress.watched, Some(session.id))
            .await?;
        self.videos.increment_views(video.id).await?;

        tracing::info!("Created watch history for owner {} video {}", owner, video.id);
        Ok(ReportOutcome {
            transition: Transition::Created,
            entry,
        })
    }

    async fn reconcile(
        &self,
        owner: Uuid,
        video: &Video,
        entry: WatchHistoryEntry,
        progress: Progress,
    ) -> Result<ReportOutcome> {
        let current = self.sessions.get(owner, video.id).await?;

        let (transition, entry, session_id) = match current {
            None => {
                let session = self
                    .sessions
                    .create_or_replace(owner, video.id, progress.watched, progress.timestamp)
                    .await?;
                (Transition::Resumed, entry, session.id)
            }
            Some(session) if session.is_completed(video.duration) => {
                let fresh = self
                    .sessions
                    .create_or_replace(owner, video.id, progress.watched, progress.timestamp)
                    .await?;
                let entry = self.ledger.mark_repeat(&entry).await?;
                (Transition::RolledOver, entry, fresh.id)
            }
            Some(session) => {
                let session = self
                    .sessions
                    .update(&session, progress.watched, progress.timestamp)
                    .await?;
                (Transition::Continued, entry, session.id)
            }
        };

        let entry = self
            .ledger
            .accumulate(&entry, progress.watched, Some(session_id))
            .await?;

        tracing::debug!(
            "Watch progress {:?} for owner {} video {}: total {}s, repeated {}",
            transition,
            owner,
            video.id,
            entry.total_duration,
            entry.repeated
        );
        Ok(ReportOutcome { transition, entry })
    }
}
