//! Aria2 JSON-RPC wire types.
//!
//! Aria2 serializes every numeric field as a decimal string; the accessors
//! parse them defensively instead of trusting the daemon.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: String,
    pub params: Vec<Value>,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// Error object inside a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Download state as reported by `aria2.tellStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Active,
    Waiting,
    Paused,
    Error,
    Complete,
    Removed,
}

impl TaskState {
    /// True once the daemon will never progress this download further.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Error | TaskState::Complete | TaskState::Removed)
    }
}

/// Snapshot of one download from `aria2.tellStatus` / `aria2.tellActive`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub gid: String,
    pub status: TaskState,
    #[serde(default)]
    total_length: String,
    #[serde(default)]
    completed_length: String,
    #[serde(default)]
    download_speed: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    bittorrent: Option<BittorrentMeta>,
    #[serde(default)]
    files: Vec<TaskFile>,
}

#[derive(Debug, Clone, Deserialize)]
struct BittorrentMeta {
    #[serde(default)]
    info: Option<BittorrentInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct BittorrentInfo {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TaskFile {
    #[serde(default)]
    path: String,
}

impl TaskStatus {
    pub fn total_bytes(&self) -> u64 {
        self.total_length.parse().unwrap_or(0)
    }

    pub fn completed_bytes(&self) -> u64 {
        self.completed_length.parse().unwrap_or(0)
    }

    pub fn speed(&self) -> u64 {
        self.download_speed.parse().unwrap_or(0)
    }

    /// Completed fraction in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        let total = self.total_bytes();
        if total == 0 {
            return 0.0;
        }
        (self.completed_bytes() as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// Best available display name: torrent metadata first, then the first
    /// file path's basename.
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self
            .bittorrent
            .as_ref()
            .and_then(|bt| bt.info.as_ref())
            .map(|info| info.name.as_str())
            .filter(|name| !name.is_empty())
        {
            return Some(name.to_string());
        }

        self.files
            .first()
            .and_then(|file| file.path.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
    }
}

/// Daemon-wide counters from `aria2.getGlobalStat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStat {
    #[serde(default)]
    num_active: String,
    #[serde(default)]
    num_waiting: String,
    #[serde(default)]
    num_stopped: String,
    #[serde(default)]
    download_speed: String,
    #[serde(default)]
    upload_speed: String,
}

impl GlobalStat {
    pub fn num_active(&self) -> u64 {
        self.num_active.parse().unwrap_or(0)
    }

    pub fn num_waiting(&self) -> u64 {
        self.num_waiting.parse().unwrap_or(0)
    }

    pub fn num_stopped(&self) -> u64 {
        self.num_stopped.parse().unwrap_or(0)
    }

    pub fn download_speed(&self) -> u64 {
        self.download_speed.parse().unwrap_or(0)
    }

    pub fn upload_speed(&self) -> u64 {
        self.upload_speed.parse().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_parses_string_numerics() {
        let status: TaskStatus = serde_json::from_value(serde_json::json!({
            "gid": "2089b05ecca3d829",
            "status": "active",
            "totalLength": "34896138",
            "completedLength": "8724034",
            "downloadSpeed": "524288",
            "files": [{"path": "/downloads/ubuntu.iso"}]
        }))
        .unwrap();

        assert_eq!(status.total_bytes(), 34_896_138);
        assert_eq!(status.completed_bytes(), 8_724_034);
        assert_eq!(status.speed(), 524_288);
        assert!((status.progress() - 0.25).abs() < 0.01);
        assert_eq!(status.display_name().as_deref(), Some("ubuntu.iso"));
        assert!(!status.status.is_terminal());
    }

    #[test]
    fn test_torrent_name_preferred_over_file_path() {
        let status: TaskStatus = serde_json::from_value(serde_json::json!({
            "gid": "2089b05ecca3d829",
            "status": "complete",
            "bittorrent": {"info": {"name": "Some Torrent"}},
            "files": [{"path": "/downloads/some-torrent/a.bin"}]
        }))
        .unwrap();

        assert_eq!(status.display_name().as_deref(), Some("Some Torrent"));
        assert!(status.status.is_terminal());
    }

    #[test]
    fn test_garbage_numerics_parse_to_zero() {
        let status: TaskStatus = serde_json::from_value(serde_json::json!({
            "gid": "x",
            "status": "waiting",
            "totalLength": "not-a-number"
        }))
        .unwrap();

        assert_eq!(status.total_bytes(), 0);
        assert_eq!(status.progress(), 0.0);
        assert_eq!(status.display_name(), None);
    }
}
