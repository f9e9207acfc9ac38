//! In-memory download job registry.
//!
//! Single source of bot-side truth for which downloads exist, which chat
//! owns them and what the last poll reported. All mutation happens behind
//! one `RwLock`, shared by the submit/cancel handlers and the tracker loop.
//! Nothing here survives a restart; state is rebuilt from Aria2 at startup.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use teloxide::types::ChatId;

use crate::aria2::{TaskState, TaskStatus};
use crate::utils::{format_size, format_speed, format_eta, html_escape, progress_bar};

/// Bot-side view of a download's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Submitted, no poll result yet (or still queued/paused in the daemon).
    Pending,
    /// The daemon is transferring data.
    Active,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Active => "downloading",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }
}

/// One tracked download.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    /// Chat-visible handle, registry-assigned. Never the GID.
    pub handle: String,
    /// Aria2's task identifier.
    pub gid: String,
    pub uri: String,
    pub name: String,
    pub status: JobStatus,
    /// Completed fraction in `0.0..=1.0`.
    pub progress: f64,
    pub completed_bytes: u64,
    pub total_bytes: u64,
    /// Bytes per second from the last poll.
    pub speed: u64,
    pub error: Option<String>,
    /// Owning chat. Jobs adopted from the daemon at startup have none.
    pub chat: Option<ChatId>,
    pub created_at: DateTime<Utc>,
    /// Set when the job first reached a terminal status; drives eviction.
    finished_at: Option<Instant>,
}

impl DownloadJob {
    /// Multi-line HTML status card shown in progress messages and
    /// `/status <handle>` replies.
    pub fn status_card(&self) -> String {
        let name = html_escape(&self.name);
        match self.status {
            JobStatus::Complete => format!(
                "✅ <b>Completed: {}</b>\nSize: {}",
                name,
                format_size(self.total_bytes)
            ),
            JobStatus::Failed => format!(
                "❌ <b>Failed: {}</b>\nError: {}",
                name,
                html_escape(self.error.as_deref().unwrap_or("unknown error"))
            ),
            JobStatus::Pending | JobStatus::Active => {
                let percent = self.progress * 100.0;
                format!(
                    "📦 <b>{}</b> (<code>{}</code>)\nProgress: {:.1}%\n[{}]\nStatus: {}\nSize: {} / {}\nSpeed: {}\nETA: {}",
                    name,
                    self.handle,
                    percent,
                    progress_bar(self.progress),
                    self.status.label(),
                    format_size(self.completed_bytes),
                    format_size(self.total_bytes),
                    format_speed(self.speed),
                    format_eta(self.completed_bytes, self.total_bytes, self.speed),
                )
            }
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    by_handle: HashMap<String, DownloadJob>,
    gid_to_handle: HashMap<String, String>,
    next_id: u64,
}

/// Registry of all known jobs, shared across handlers and the tracker.
pub struct JobRegistry {
    inner: RwLock<RegistryInner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Register a freshly submitted download and assign it a handle.
    ///
    /// GIDs are unique in the registry: inserting a GID that already exists
    /// returns the existing job instead of creating a second entry.
    pub fn insert(
        &self,
        chat: Option<ChatId>,
        gid: String,
        uri: String,
        name: String,
    ) -> DownloadJob {
        let mut inner = self.inner.write();

        if let Some(handle) = inner.gid_to_handle.get(&gid) {
            let handle = handle.clone();
            return inner.by_handle[&handle].clone();
        }

        inner.next_id += 1;
        let handle = format!("dl-{}", inner.next_id);

        let job = DownloadJob {
            handle: handle.clone(),
            gid: gid.clone(),
            uri,
            name,
            status: JobStatus::Pending,
            progress: 0.0,
            completed_bytes: 0,
            total_bytes: 0,
            speed: 0,
            error: None,
            chat,
            created_at: Utc::now(),
            finished_at: None,
        };

        inner.gid_to_handle.insert(gid, handle.clone());
        inner.by_handle.insert(handle, job.clone());
        job
    }

    pub fn get(&self, handle: &str) -> Option<DownloadJob> {
        self.inner.read().by_handle.get(handle).cloned()
    }

    pub fn contains_gid(&self, gid: &str) -> bool {
        self.inner.read().gid_to_handle.contains_key(gid)
    }

    /// Drop a job. Returns the removed entry, `None` for unknown handles
    /// (in which case nothing changes).
    pub fn remove(&self, handle: &str) -> Option<DownloadJob> {
        let mut inner = self.inner.write();
        let job = inner.by_handle.remove(handle)?;
        inner.gid_to_handle.remove(&job.gid);
        Some(job)
    }

    /// All jobs owned by one chat, submission order.
    pub fn jobs_for_chat(&self, chat: ChatId) -> Vec<DownloadJob> {
        let mut jobs: Vec<DownloadJob> = self
            .inner
            .read()
            .by_handle
            .values()
            .filter(|job| job.chat == Some(chat))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    /// Number of non-terminal jobs a chat currently owns.
    pub fn active_count_for_chat(&self, chat: ChatId) -> usize {
        self.inner
            .read()
            .by_handle
            .values()
            .filter(|job| job.chat == Some(chat) && !job.status.is_terminal())
            .count()
    }

    /// Snapshot of every non-terminal job, for the poll tick.
    pub fn active_jobs(&self) -> Vec<DownloadJob> {
        self.inner
            .read()
            .by_handle
            .values()
            .filter(|job| !job.status.is_terminal())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_handle.is_empty()
    }

    /// Fold a `tellStatus` snapshot into the job. Returns the updated job,
    /// `None` for unknown handles.
    pub fn update_from_status(&self, handle: &str, status: &TaskStatus) -> Option<DownloadJob> {
        let mut inner = self.inner.write();
        let job = inner.by_handle.get_mut(handle)?;

        if let Some(name) = status.display_name() {
            job.name = name;
        }
        job.progress = status.progress();
        job.completed_bytes = status.completed_bytes();
        job.total_bytes = status.total_bytes();
        job.speed = status.speed();

        job.status = match status.status {
            TaskState::Active => JobStatus::Active,
            TaskState::Waiting | TaskState::Paused => JobStatus::Pending,
            TaskState::Complete => JobStatus::Complete,
            TaskState::Error | TaskState::Removed => JobStatus::Failed,
        };

        if job.status == JobStatus::Failed {
            job.error = status
                .error_message
                .clone()
                .filter(|msg| !msg.is_empty())
                .or_else(|| Some("removed or failed in the daemon".to_string()));
        }

        if job.status.is_terminal() && job.finished_at.is_none() {
            job.finished_at = Some(Instant::now());
        }

        Some(job.clone())
    }

    /// Mark a job failed without a daemon status (e.g. the GID vanished).
    pub fn mark_failed(&self, handle: &str, error: impl Into<String>) -> Option<DownloadJob> {
        let mut inner = self.inner.write();
        let job = inner.by_handle.get_mut(handle)?;
        job.status = JobStatus::Failed;
        job.error = Some(error.into());
        if job.finished_at.is_none() {
            job.finished_at = Some(Instant::now());
        }
        Some(job.clone())
    }

    /// Evict terminal jobs older than `retention`. Returns the evicted jobs
    /// so the caller can release any per-job resources.
    pub fn evict_finished(&self, retention: Duration) -> Vec<DownloadJob> {
        let mut inner = self.inner.write();
        let expired: Vec<String> = inner
            .by_handle
            .values()
            .filter(|job| {
                job.finished_at
                    .map(|at| at.elapsed() >= retention)
                    .unwrap_or(false)
            })
            .map(|job| job.handle.clone())
            .collect();

        let mut evicted = Vec::with_capacity(expired.len());
        for handle in expired {
            if let Some(job) = inner.by_handle.remove(&handle) {
                inner.gid_to_handle.remove(&job.gid);
                evicted.push(job);
            }
        }
        evicted
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_json(gid: &str, state: &str, completed: u64, total: u64) -> TaskStatus {
        serde_json::from_value(serde_json::json!({
            "gid": gid,
            "status": state,
            "totalLength": total.to_string(),
            "completedLength": completed.to_string(),
            "downloadSpeed": "1024",
        }))
        .unwrap()
    }

    #[test]
    fn test_handles_are_sequential_and_distinct_from_gid() {
        let registry = JobRegistry::new();
        let a = registry.insert(Some(ChatId(1)), "gid-a".into(), "u".into(), "a".into());
        let b = registry.insert(Some(ChatId(1)), "gid-b".into(), "u".into(), "b".into());

        assert_eq!(a.handle, "dl-1");
        assert_eq!(b.handle, "dl-2");
        assert_ne!(a.handle, a.gid);
    }

    #[test]
    fn test_duplicate_gid_returns_existing_job() {
        let registry = JobRegistry::new();
        let first = registry.insert(Some(ChatId(1)), "gid-a".into(), "u".into(), "a".into());
        let second = registry.insert(Some(ChatId(2)), "gid-a".into(), "u".into(), "b".into());

        assert_eq!(first.handle, second.handle);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_unknown_is_a_noop() {
        let registry = JobRegistry::new();
        registry.insert(Some(ChatId(1)), "gid-a".into(), "u".into(), "a".into());

        assert!(registry.remove("dl-99").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_jobs_for_chat_filters_by_owner() {
        let registry = JobRegistry::new();
        registry.insert(Some(ChatId(1)), "gid-a".into(), "u".into(), "a".into());
        registry.insert(Some(ChatId(2)), "gid-b".into(), "u".into(), "b".into());
        registry.insert(None, "gid-c".into(), "u".into(), "c".into());

        let mine = registry.jobs_for_chat(ChatId(1));
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].gid, "gid-a");
    }

    #[test]
    fn test_update_from_status_maps_states() {
        let registry = JobRegistry::new();
        let job = registry.insert(Some(ChatId(1)), "gid-a".into(), "u".into(), "a".into());

        let updated = registry
            .update_from_status(&job.handle, &status_json("gid-a", "active", 50, 200))
            .unwrap();
        assert_eq!(updated.status, JobStatus::Active);
        assert!((updated.progress - 0.25).abs() < f64::EPSILON);

        let done = registry
            .update_from_status(&job.handle, &status_json("gid-a", "complete", 200, 200))
            .unwrap();
        assert_eq!(done.status, JobStatus::Complete);
    }

    #[test]
    fn test_evict_finished_honors_retention() {
        let registry = JobRegistry::new();
        let job = registry.insert(Some(ChatId(1)), "gid-a".into(), "u".into(), "a".into());
        registry.update_from_status(&job.handle, &status_json("gid-a", "complete", 1, 1));

        // Long retention keeps the job around for late /status queries.
        assert!(registry.evict_finished(Duration::from_secs(3600)).is_empty());
        assert_eq!(registry.len(), 1);

        // Zero retention evicts immediately.
        let evicted = registry.evict_finished(Duration::ZERO);
        assert_eq!(evicted.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_active_count_ignores_terminal_jobs() {
        let registry = JobRegistry::new();
        let a = registry.insert(Some(ChatId(1)), "gid-a".into(), "u".into(), "a".into());
        registry.insert(Some(ChatId(1)), "gid-b".into(), "u".into(), "b".into());
        registry.update_from_status(&a.handle, &status_json("gid-a", "complete", 1, 1));

        assert_eq!(registry.active_count_for_chat(ChatId(1)), 1);
    }

    #[test]
    fn test_status_card_shows_progress_and_handle() {
        let registry = JobRegistry::new();
        let job = registry.insert(Some(ChatId(1)), "gid-a".into(), "u".into(), "file.iso".into());
        let updated = registry
            .update_from_status(&job.handle, &status_json("gid-a", "active", 50, 100))
            .unwrap();

        let card = updated.status_card();
        assert!(card.contains("50.0%"));
        assert!(card.contains("dl-1"));
    }
}
