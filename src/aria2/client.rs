//! HTTP JSON-RPC client for the Aria2 daemon.
//!
//! One method per RPC call used by the bot. Requests carry a bounded
//! timeout and fail closed; the shared secret is prepended as the first
//! params element (`token:<secret>`) when configured.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use super::protocol::{GlobalStat, RpcRequest, RpcResponse, TaskStatus};

#[derive(Debug, Error)]
pub enum Aria2Error {
    /// Network-level failure (connect, timeout, non-2xx, body read).
    #[error("transport error talking to aria2: {0}")]
    Transport(#[from] reqwest::Error),

    /// The daemon answered with a JSON-RPC error object.
    #[error("aria2 rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The daemon answered 200 but the body was not what we expected.
    #[error("malformed aria2 response: {0}")]
    Protocol(String),
}

impl Aria2Error {
    /// Transport failures are worth retrying; RPC/protocol errors are not.
    pub fn is_transport(&self) -> bool {
        matches!(self, Aria2Error::Transport(_))
    }
}

pub struct Aria2Client {
    http: reqwest::Client,
    endpoint: String,
    secret: Option<String>,
    request_id: AtomicU64,
}

impl Aria2Client {
    pub fn new(
        endpoint: impl Into<String>,
        secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, Aria2Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            secret,
            request_id: AtomicU64::new(1),
        })
    }

    /// Issue one JSON-RPC call and unwrap the `result` field.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, Aria2Error> {
        let mut full_params = Vec::with_capacity(params.len() + 1);
        if let Some(secret) = &self.secret {
            full_params.push(json!(format!("token:{}", secret)));
        }
        full_params.extend(params);

        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: format!("ariadne-{}", id),
            method: method.to_string(),
            params: full_params,
        };

        debug!(method, id, "aria2 rpc call");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: RpcResponse = response.json().await?;

        if let Some(error) = body.error {
            return Err(Aria2Error::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        body.result
            .ok_or_else(|| Aria2Error::Protocol("response has neither result nor error".to_string()))
    }

    fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, Aria2Error> {
        serde_json::from_value(value).map_err(|e| Aria2Error::Protocol(e.to_string()))
    }

    /// `aria2.addUri`: queue a magnet link or URL; returns the new GID.
    pub async fn add_uri(&self, uri: &str, options: Value) -> Result<String, Aria2Error> {
        let result = self
            .call("aria2.addUri", vec![json!([uri]), options])
            .await?;
        Self::decode(result)
    }

    /// `aria2.addTorrent`: queue a base64-encoded `.torrent` blob.
    pub async fn add_torrent(&self, torrent_b64: &str, options: Value) -> Result<String, Aria2Error> {
        // Params: torrent blob, webseed URIs (none), options.
        let result = self
            .call(
                "aria2.addTorrent",
                vec![json!(torrent_b64), Value::Array(vec![]), options],
            )
            .await?;
        Self::decode(result)
    }

    /// `aria2.tellStatus`: status snapshot for one GID.
    pub async fn tell_status(&self, gid: &str) -> Result<TaskStatus, Aria2Error> {
        let result = self.call("aria2.tellStatus", vec![json!(gid)]).await?;
        Self::decode(result)
    }

    /// `aria2.tellActive`: all downloads the daemon is currently running.
    pub async fn tell_active(&self) -> Result<Vec<TaskStatus>, Aria2Error> {
        let result = self.call("aria2.tellActive", vec![]).await?;
        Self::decode(result)
    }

    /// `aria2.remove`: stop and discard one download.
    pub async fn remove(&self, gid: &str) -> Result<String, Aria2Error> {
        let result = self.call("aria2.remove", vec![json!(gid)]).await?;
        Self::decode(result)
    }

    /// `aria2.pauseAll`.
    pub async fn pause_all(&self) -> Result<(), Aria2Error> {
        self.call("aria2.pauseAll", vec![]).await.map(|_| ())
    }

    /// `aria2.unpauseAll`.
    pub async fn unpause_all(&self) -> Result<(), Aria2Error> {
        self.call("aria2.unpauseAll", vec![]).await.map(|_| ())
    }

    /// `aria2.purgeDownloadResult`: drop finished/errored results from the
    /// daemon's memory.
    pub async fn purge_download_result(&self) -> Result<(), Aria2Error> {
        self.call("aria2.purgeDownloadResult", vec![])
            .await
            .map(|_| ())
    }

    /// `aria2.getGlobalStat`.
    pub async fn global_stat(&self) -> Result<GlobalStat, Aria2Error> {
        let result = self.call("aria2.getGlobalStat", vec![]).await?;
        Self::decode(result)
    }
}

impl std::fmt::Debug for Aria2Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The secret stays out of Debug output.
        f.debug_struct("Aria2Client")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.secret.is_some())
            .finish()
    }
}
