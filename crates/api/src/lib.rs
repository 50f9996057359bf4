//! Shared API types for the xharvest backend.
//!
//! This crate is the single source of truth for every request/response body
//! the controller exchanges with the backend over HTTP: the lifecycle
//! endpoints (existing-file checks and prepare operations), the scheduler
//! endpoints (start/continue/cancel and the polled state snapshot), the
//! read-only settings endpoint, and the open-folder helper. Error bodies
//! carry a `detail` string; the client treats anything else as raw text.

use serde::{Deserialize, Serialize};

pub use xharvest_core::{AccountConfig, RowStats, TaskStatus};

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// How existing on-disk files are handled when starting a fresh task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    /// Delete everything and start over.
    Delete,
    /// Keep existing files; the new run replaces duplicates by content hash.
    IgnoreReplace,
    /// Archive existing files to a zip, then start fresh.
    Pack,
}

/// How files downloaded so far are handled when cancelling a running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelMode {
    Keep,
    Delete,
}

/// Response of `GET /api/lifecycle/check/{handle}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingFilesResponse {
    pub handle: String,
    pub has_files: bool,
    pub image_count: u64,
    pub video_count: u64,
    pub total_count: u64,
}

/// Body of `POST /api/lifecycle/prepare-start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareStartRequest {
    pub handle: String,
    pub mode: StartMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareStartResponse {
    pub success: bool,
    pub mode: StartMode,
    #[serde(default)]
    pub files_deleted: u64,
    #[serde(default)]
    pub files_archived: u64,
    #[serde(default)]
    pub archive_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /api/lifecycle/prepare-cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareCancelRequest {
    pub handle: String,
    pub mode: CancelMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareCancelResponse {
    pub success: bool,
    pub mode: CancelMode,
    #[serde(default)]
    pub files_deleted: u64,
    #[serde(default)]
    pub error: Option<String>,
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

/// Body of `POST /api/scheduler/start` and `/api/scheduler/continue`.
///
/// `start_mode` is present only when the user chose how to handle existing
/// files; a start with no prior artifacts omits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub handle: String,
    pub account_config: AccountConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_mode: Option<StartMode>,
}

/// Body of `POST /api/scheduler/cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub handle: String,
}

/// One handle's authoritative task state as reported by the scheduler.
///
/// Returned by every scheduler mutation and, in bulk, by the polled state
/// snapshot. The stat fields ride flattened beside the status so older
/// backends that omit them still deserialize to zeroes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleState {
    pub handle: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub queued_position: Option<u32>,
    #[serde(flatten)]
    pub stats: RowStats,
}

/// Response of `GET /api/scheduler/state`, polled by the reconciliation
/// loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub max_concurrent: u32,
    pub running_count: u32,
    pub queued_count: u32,
    pub handles: Vec<HandleState>,
}

// ─── Settings ────────────────────────────────────────────────────────────────

/// Which credential parts are set; secrets themselves are never returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsStatus {
    pub configured: bool,
    #[serde(default)]
    pub auth_token_set: bool,
    #[serde(default)]
    pub ct0_set: bool,
    #[serde(default)]
    pub twid_set: bool,
}

/// Response of `GET /api/settings`, consumed read-only for gating and the
/// downloads-folder path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub credentials: CredentialsStatus,
    #[serde(default)]
    pub download_root: String,
    #[serde(default)]
    pub max_concurrent: u32,
}

// ─── Os ──────────────────────────────────────────────────────────────────────

/// Body of `POST /api/os/open-folder`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenFolderRequest {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenFolderResponse {
    pub success: bool,
    pub opened_path: String,
}
