//! RPC bridge between chat commands and the Aria2 daemon.
//!
//! Translates dispatcher intents into RPC calls, owns the job registry and
//! the idempotency window, and retries transient transport failures with
//! bounded exponential backoff. Nothing here blocks longer than one RPC
//! round-trip (the client carries a request timeout).

pub mod registry;

use std::time::Duration;

use anyhow::anyhow;
use backon::{ExponentialBuilder, Retryable};
use moka::sync::Cache;
use serde_json::{json, Value};
use teloxide::types::ChatId;
use tracing::{info, warn};

use crate::aria2::{Aria2Client, Aria2Error, GlobalStat};
use crate::error::BridgeError;
use crate::utils::SourceUri;

pub use registry::{DownloadJob, JobRegistry, JobStatus};

/// Transport retries after the first attempt.
const SUBMIT_RETRIES: usize = 3;

/// First backoff delay; doubles per retry.
const RETRY_MIN_DELAY: Duration = Duration::from_millis(500);

/// Sent on HTTP(S) submissions so plain-browser mirrors don't reject us.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/107.0.0.0 Safari/537.36";

/// Result of a submission, flagging idempotency-window hits.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub job: DownloadJob,
    /// True when the URI matched a recent submission and no new download
    /// was created.
    pub deduplicated: bool,
}

pub struct RpcBridge {
    client: Aria2Client,
    registry: JobRegistry,
    /// Normalized URI -> handle, expiring after the idempotency window.
    recent: Cache<String, String>,
    download_dir: Option<String>,
}

impl RpcBridge {
    pub fn new(client: Aria2Client, download_dir: Option<String>, dedup_window: Duration) -> Self {
        let recent = Cache::builder()
            .max_capacity(1024)
            .time_to_live(dedup_window)
            .build();

        Self {
            client,
            registry: JobRegistry::new(),
            recent,
            download_dir,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Submit a validated URI. Duplicate submissions within the idempotency
    /// window return the existing job.
    pub async fn submit(
        &self,
        chat: ChatId,
        source: &SourceUri,
    ) -> Result<SubmitOutcome, BridgeError> {
        let key = source.idempotency_key();
        if let Some(existing) = self.lookup_recent(&key) {
            return Ok(SubmitOutcome {
                job: existing,
                deduplicated: true,
            });
        }

        let options = self.uri_options(source);
        let uri = source.as_str();

        let gid = (|| async { self.client.add_uri(uri, options.clone()).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(RETRY_MIN_DELAY)
                    .with_max_times(SUBMIT_RETRIES),
            )
            .when(Aria2Error::is_transport)
            .notify(|err: &Aria2Error, dur: Duration| {
                warn!("aria2 submit failed, retrying in {:?}: {}", dur, err);
            })
            .await
            .map_err(Self::map_rpc_error)?;

        info!(%gid, %uri, "download submitted");

        let job = self
            .registry
            .insert(Some(chat), gid, uri.to_string(), source.display_name());
        self.recent.insert(key, job.handle.clone());

        Ok(SubmitOutcome {
            job,
            deduplicated: false,
        })
    }

    /// Submit a `.torrent` blob (already base64-encoded). Deduplicated by
    /// blob content, same window as URIs.
    pub async fn submit_torrent(
        &self,
        chat: ChatId,
        file_name: &str,
        torrent_b64: &str,
    ) -> Result<SubmitOutcome, BridgeError> {
        let key = format!("torrent:{}", torrent_b64);
        if let Some(existing) = self.lookup_recent(&key) {
            return Ok(SubmitOutcome {
                job: existing,
                deduplicated: true,
            });
        }

        let options = self.base_options();
        let gid = (|| async { self.client.add_torrent(torrent_b64, options.clone()).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(RETRY_MIN_DELAY)
                    .with_max_times(SUBMIT_RETRIES),
            )
            .when(Aria2Error::is_transport)
            .notify(|err: &Aria2Error, dur: Duration| {
                warn!("aria2 torrent submit failed, retrying in {:?}: {}", dur, err);
            })
            .await
            .map_err(Self::map_rpc_error)?;

        info!(%gid, file_name, "torrent submitted");

        let job = self.registry.insert(
            Some(chat),
            gid,
            format!("torrent:{}", file_name),
            file_name.to_string(),
        );
        self.recent.insert(key, job.handle.clone());

        Ok(SubmitOutcome {
            job,
            deduplicated: false,
        })
    }

    /// Refresh one job from the daemon and return the updated snapshot.
    ///
    /// Terminal jobs are returned from the registry without an RPC call; a
    /// GID the daemon no longer knows marks the job failed.
    pub async fn poll(&self, handle: &str) -> Result<DownloadJob, BridgeError> {
        let job = self
            .registry
            .get(handle)
            .ok_or_else(|| BridgeError::NotFound(handle.to_string()))?;

        if job.status.is_terminal() {
            return Ok(job);
        }

        match self.client.tell_status(&job.gid).await {
            Ok(status) => self
                .registry
                .update_from_status(handle, &status)
                .ok_or_else(|| BridgeError::NotFound(handle.to_string())),
            Err(Aria2Error::Rpc { message, .. }) => {
                warn!(handle, %message, "gid unknown to the daemon, marking failed");
                self.registry
                    .mark_failed(handle, "removed by the daemon")
                    .ok_or_else(|| BridgeError::NotFound(handle.to_string()))
            }
            Err(err) => Err(Self::map_rpc_error(err)),
        }
    }

    /// Cancel one job: remove it in the daemon and evict it from the
    /// registry. Unknown handles return `NotFound` with no side effect.
    pub async fn cancel(&self, handle: &str) -> Result<DownloadJob, BridgeError> {
        let job = self
            .registry
            .get(handle)
            .ok_or_else(|| BridgeError::NotFound(handle.to_string()))?;

        match self.client.remove(&job.gid).await {
            Ok(_) => {}
            // Already gone from the daemon; evicting our entry is still right.
            Err(Aria2Error::Rpc { message, .. }) => {
                warn!(handle, %message, "remove on a gid the daemon no longer knows");
            }
            Err(err) => return Err(Self::map_rpc_error(err)),
        }

        self.registry.remove(handle);
        info!(handle, gid = %job.gid, "download cancelled");
        Ok(job)
    }

    /// Cancel every non-terminal job and purge the daemon's result list.
    pub async fn cancel_all(&self) -> Result<usize, BridgeError> {
        let jobs = self.registry.active_jobs();
        let mut cancelled = 0;
        for job in &jobs {
            match self.client.remove(&job.gid).await {
                Ok(_) | Err(Aria2Error::Rpc { .. }) => {
                    self.registry.remove(&job.handle);
                    cancelled += 1;
                }
                Err(err) => return Err(Self::map_rpc_error(err)),
            }
        }

        if let Err(err) = self.client.purge_download_result().await {
            warn!("purgeDownloadResult failed: {}", err);
        }

        Ok(cancelled)
    }

    pub async fn pause_all(&self) -> Result<(), BridgeError> {
        self.client.pause_all().await.map_err(Self::map_rpc_error)
    }

    pub async fn resume_all(&self) -> Result<(), BridgeError> {
        self.client.unpause_all().await.map_err(Self::map_rpc_error)
    }

    pub async fn global_stat(&self) -> Result<GlobalStat, BridgeError> {
        self.client.global_stat().await.map_err(Self::map_rpc_error)
    }

    /// Rebuild registry entries for downloads already running in the daemon.
    /// Adopted jobs have no owning chat; the daemon, not the registry, is
    /// the source of truth here. Returns how many were adopted.
    pub async fn reconcile(&self) -> Result<usize, BridgeError> {
        let active = self
            .client
            .tell_active()
            .await
            .map_err(Self::map_rpc_error)?;

        let mut adopted = 0;
        for status in active {
            if self.registry.contains_gid(&status.gid) {
                continue;
            }
            let name = status
                .display_name()
                .unwrap_or_else(|| format!("download {}", status.gid));
            let job = self
                .registry
                .insert(None, status.gid.clone(), String::new(), name);
            self.registry.update_from_status(&job.handle, &status);
            adopted += 1;
        }

        if adopted > 0 {
            info!(adopted, "adopted downloads already running in aria2");
        }
        Ok(adopted)
    }

    fn lookup_recent(&self, key: &str) -> Option<DownloadJob> {
        let handle = self.recent.get(key)?;
        self.registry.get(&handle)
    }

    fn base_options(&self) -> Value {
        let mut options = serde_json::Map::new();
        if let Some(dir) = &self.download_dir {
            options.insert("dir".to_string(), json!(dir));
        }
        Value::Object(options)
    }

    fn uri_options(&self, source: &SourceUri) -> Value {
        let mut options = serde_json::Map::new();
        if let Some(dir) = &self.download_dir {
            options.insert("dir".to_string(), json!(dir));
        }
        if let Some(out) = source.out_name() {
            options.insert("out".to_string(), json!(out));
            options.insert("user-agent".to_string(), json!(BROWSER_USER_AGENT));
        }
        Value::Object(options)
    }

    fn map_rpc_error(err: Aria2Error) -> BridgeError {
        if err.is_transport() {
            BridgeError::RpcUnavailable(err)
        } else {
            BridgeError::Internal(anyhow!(err))
        }
    }
}

impl std::fmt::Debug for RpcBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcBridge")
            .field("client", &self.client)
            .field("jobs", &self.registry.len())
            .finish()
    }
}
