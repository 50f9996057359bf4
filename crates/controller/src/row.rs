//! State owned by a single account row.

use xharvest_api::HandleState;
use xharvest_core::{AccountConfig, ProfileUrlError, RowStats, TaskStatus, parse_profile_url};

pub type RowId = u64;

/// A confirmation the rendering layer owes us before a protocol proceeds.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingConfirm {
    /// Start requested while files from a previous run exist on disk.
    Start,
    /// Cancel requested on a running task.
    Cancel,
}

/// One account row: validation result, task status, queue position, filter
/// config and run statistics. Mutated only by the controller engine.
#[derive(Debug, Clone)]
pub struct RowState {
    pub id: RowId,
    pub raw_url: String,
    pub validation: Result<String, ProfileUrlError>,
    pub status: TaskStatus,
    pub queued_position: Option<u32>,
    pub config: AccountConfig,
    pub stats: RowStats,
    /// Most recent surfaced failure reason, if any.
    pub last_error: Option<String>,
    pub pending: Option<PendingConfirm>,
}

impl RowState {
    pub fn new(id: RowId) -> Self {
        Self {
            id,
            raw_url: String::new(),
            validation: Err(ProfileUrlError::Empty),
            status: TaskStatus::Idle,
            queued_position: None,
            config: AccountConfig::default(),
            stats: RowStats::default(),
            last_error: None,
            pending: None,
        }
    }

    /// The resolved handle, when validation currently passes.
    pub fn handle(&self) -> Option<&str> {
        self.validation.as_deref().ok()
    }

    pub fn is_locked(&self) -> bool {
        self.status.is_locked()
    }

    /// Re-validate after a URL edit. Must only be called while unlocked
    /// (the handle is frozen for the whole locked window).
    ///
    /// When the resolved identity changes — including valid → invalid —
    /// any accumulated task state belongs to the old identity and is
    /// dropped: status back to `Idle`, queue position and stats cleared.
    /// Returns whether that reset happened.
    pub fn set_url(&mut self, raw: &str) -> bool {
        debug_assert!(!self.is_locked(), "URL edits are gated off while locked");
        let previous = self.handle().map(str::to_owned);
        self.raw_url = raw.to_string();
        self.validation = parse_profile_url(raw);
        let identity_changed = self.handle() != previous.as_deref();
        if identity_changed {
            self.reset_task_state();
        }
        identity_changed
    }

    /// Adopt an authoritative handle state from the scheduler — either a
    /// protocol response or a reconciliation snapshot entry. Queue position
    /// only survives while actually queued.
    pub fn adopt(&mut self, state: &HandleState) {
        self.status = state.status;
        self.queued_position = if state.status == TaskStatus::Queued {
            state.queued_position
        } else {
            None
        };
        self.stats = state.stats;
    }

    fn reset_task_state(&mut self) {
        self.status = TaskStatus::Idle;
        self.queued_position = None;
        self.stats.reset();
        self.last_error = None;
        self.pending = None;
    }
}
