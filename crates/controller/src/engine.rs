//! The controller engine: one update entry point for every event.
//!
//! All row mutations happen in [`Engine::handle_event`], which turns an
//! incoming [`ControllerEvent`] into a [`Step`]: network side effects to
//! execute ([`Command`]) and notifications for the rendering boundary
//! ([`UiEffect`]). The async driver ([`run_controller`]) owns the engine on
//! a single `tokio::select!` loop; spawned network calls re-enter the loop
//! as `CallCompleted` events, so anything may interleave between a request
//! and its response and the engine re-checks row state when the completion
//! arrives.
//!
//! Ordering is last-applied-write-wins: a completion is dropped only when
//! the row's resolved handle changed while the call was in flight (the
//! identity it was issued for no longer exists). There are no per-row
//! sequence numbers, so a stale completion can briefly shadow a newer poll
//! tick; the next tick re-asserts the backend's view.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use xharvest_api::{
    CancelMode, CancelRequest, ExistingFilesResponse, HandleState, OpenFolderRequest,
    PrepareCancelRequest, PrepareStartRequest, RunRequest, SchedulerSnapshot, SettingsResponse,
    StartMode,
};
use xharvest_api_client::{ApiClient, ApiError};
use xharvest_core::{AccountConfig, RowStats, TaskStatus, stats::downloads_path};

use crate::clipboard::ConfigClipboard;
use crate::collection::{DeleteRowError, RowCollection};
use crate::gating::{RowGating, compute_gating};
use crate::row::{PendingConfirm, RowId};

/// Read-only view of the global settings the controller gates on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettingsView {
    pub credentials_configured: bool,
    #[serde(default)]
    pub download_root: String,
}

impl From<SettingsResponse> for GlobalSettingsView {
    fn from(resp: SettingsResponse) -> Self {
        Self {
            credentials_configured: resp.credentials.configured,
            download_root: resp.download_root,
        }
    }
}

/// Why an issued network call failed, flattened for event transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallError {
    pub status: Option<u16>,
    pub message: String,
}

impl CallError {
    pub fn is_conflict(&self) -> bool {
        self.status == Some(409)
    }
}

impl From<ApiError> for CallError {
    fn from(err: ApiError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Completion of a spawned network call, tagged with the handle the call
/// was issued for so stale completions can be recognized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum CallOutcome {
    ExistingChecked {
        handle: String,
        result: Result<ExistingFilesResponse, CallError>,
    },
    StartFinished {
        handle: String,
        result: Result<HandleState, CallError>,
    },
    ContinueFinished {
        handle: String,
        result: Result<HandleState, CallError>,
    },
    CancelFinished {
        handle: String,
        result: Result<HandleState, CallError>,
        /// Present only when file deletion was requested and the cancel
        /// itself succeeded.
        cleanup: Option<Result<(), CallError>>,
    },
    FolderOpened {
        result: Result<(), CallError>,
    },
}

/// Everything that can drive the controller: user actions from the
/// rendering boundary, call completions, reconciliation snapshots and
/// settings changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerEvent {
    AddRow,
    DeleteRow { row: RowId },
    UrlEdited { row: RowId, url: String },
    ConfigEdited { row: RowId, config: AccountConfig },
    CopyConfig { row: RowId },
    PasteConfig { row: RowId },
    ClearClipboard,
    StartRequested { row: RowId },
    ContinueRequested { row: RowId },
    StartConfirmed { row: RowId, mode: StartMode },
    CancelRequested { row: RowId },
    CancelConfirmed { row: RowId, mode: CancelMode },
    ConfirmAborted { row: RowId },
    OpenFolderRequested { row: RowId },
    SettingsChanged { settings: GlobalSettingsView },
    SnapshotReceived { snapshot: SchedulerSnapshot },
    CallCompleted { row: RowId, outcome: CallOutcome },
}

/// A network side effect requested by the engine. Executed off the loop;
/// its completion re-enters as `CallCompleted`.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CheckExisting {
        row: RowId,
        handle: String,
    },
    SubmitStart {
        row: RowId,
        handle: String,
        config: AccountConfig,
        mode: Option<StartMode>,
    },
    SubmitContinue {
        row: RowId,
        handle: String,
        config: AccountConfig,
    },
    SubmitCancel {
        row: RowId,
        handle: String,
        delete_files: bool,
    },
    OpenFolder {
        row: RowId,
        path: String,
    },
}

/// Snapshot of one row for the rendering boundary.
#[derive(Debug, Clone, Serialize)]
pub struct RowView {
    pub row: RowId,
    pub url: String,
    pub handle: Option<String>,
    pub validation_error: Option<String>,
    pub status: TaskStatus,
    pub queued_position: Option<u32>,
    pub stats: RowStats,
    pub last_error: Option<String>,
    pub gating: RowGating,
}

/// Outbound notification for the rendering boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum UiEffect {
    Row { view: RowView },
    RowRemoved { row: RowId },
    /// Existing files found: ask how to treat them before starting.
    AskStartMode {
        row: RowId,
        existing: ExistingFilesResponse,
    },
    /// Cancelling a running task: ask whether to keep downloaded files.
    AskCancelMode { row: RowId },
    /// Secondary, non-reverting problem (e.g. cleanup after a committed
    /// cancel failed) or a refused destructive action.
    Warning { row: RowId, message: String },
    ClipboardChanged { has_content: bool },
}

/// The result of handling one event.
#[derive(Debug, Default)]
pub struct Step {
    pub commands: Vec<Command>,
    pub effects: Vec<UiEffect>,
}

impl Step {
    fn row(&mut self, engine: &Engine, id: RowId) {
        if let Some(view) = engine.row_view(id) {
            self.effects.push(UiEffect::Row { view });
        }
    }
}

/// Owns every row and applies the transition table. Exactly one engine
/// exists per process, driven by [`run_controller`].
pub struct Engine {
    rows: RowCollection,
    settings: GlobalSettingsView,
    clipboard: ConfigClipboard,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            rows: RowCollection::new(),
            settings: GlobalSettingsView::default(),
            clipboard: ConfigClipboard::new(),
        }
    }

    pub fn rows(&self) -> &RowCollection {
        &self.rows
    }

    pub fn clipboard(&self) -> &ConfigClipboard {
        &self.clipboard
    }

    pub fn row_view(&self, id: RowId) -> Option<RowView> {
        let row = self.rows.get(id)?;
        Some(RowView {
            row: row.id,
            url: row.raw_url.clone(),
            handle: row.handle().map(str::to_owned),
            validation_error: row.validation.as_ref().err().map(|e| e.to_string()),
            status: row.status,
            queued_position: row.queued_position,
            stats: row.stats,
            last_error: row.last_error.clone(),
            gating: compute_gating(row, self.settings.credentials_configured),
        })
    }

    /// The single update entry point: every mutation of row state goes
    /// through here.
    pub fn handle_event(&mut self, event: ControllerEvent) -> Step {
        let mut step = Step::default();
        match event {
            ControllerEvent::AddRow => {
                let id = self.rows.add_row();
                step.row(self, id);
            }
            ControllerEvent::DeleteRow { row } => self.delete_row(row, &mut step),
            ControllerEvent::UrlEdited { row, url } => self.edit_url(row, &url, &mut step),
            ControllerEvent::ConfigEdited { row, config } => {
                self.edit_config(row, config, &mut step)
            }
            ControllerEvent::CopyConfig { row } => self.copy_config(row, &mut step),
            ControllerEvent::PasteConfig { row } => self.paste_config(row, &mut step),
            ControllerEvent::ClearClipboard => {
                self.clipboard.clear();
                step.effects.push(UiEffect::ClipboardChanged {
                    has_content: false,
                });
            }
            ControllerEvent::StartRequested { row } => self.request_start(row, &mut step),
            ControllerEvent::ContinueRequested { row } => self.request_continue(row, &mut step),
            ControllerEvent::StartConfirmed { row, mode } => {
                self.confirm_start(row, mode, &mut step)
            }
            ControllerEvent::CancelRequested { row } => self.request_cancel(row, &mut step),
            ControllerEvent::CancelConfirmed { row, mode } => {
                self.confirm_cancel(row, mode, &mut step)
            }
            ControllerEvent::ConfirmAborted { row } => {
                if let Some(state) = self.rows.get_mut(row) {
                    state.pending = None;
                }
            }
            ControllerEvent::OpenFolderRequested { row } => self.open_folder(row, &mut step),
            ControllerEvent::SettingsChanged { settings } => {
                self.settings = settings;
                // Gating depends on the credentials flag: refresh every row.
                let ids: Vec<RowId> = self.rows.rows().iter().map(|r| r.id).collect();
                for id in ids {
                    step.row(self, id);
                }
            }
            ControllerEvent::SnapshotReceived { snapshot } => {
                for id in self.rows.apply_snapshot(&snapshot) {
                    step.row(self, id);
                }
            }
            ControllerEvent::CallCompleted { row, outcome } => {
                self.apply_outcome(row, outcome, &mut step)
            }
        }
        step
    }

    fn delete_row(&mut self, id: RowId, step: &mut Step) {
        match self.rows.delete_row(id) {
            Ok(replacement) => {
                step.effects.push(UiEffect::RowRemoved { row: id });
                if let Some(new_id) = replacement {
                    step.row(self, new_id);
                }
            }
            Err(DeleteRowError::Locked) => {
                step.effects.push(UiEffect::Warning {
                    row: id,
                    message: DeleteRowError::Locked.to_string(),
                });
            }
            Err(DeleteRowError::NotFound) => debug!("delete for unknown row {id}"),
        }
    }

    fn edit_url(&mut self, id: RowId, url: &str, step: &mut Step) {
        let Some(row) = self.rows.get_mut(id) else {
            return;
        };
        if row.is_locked() {
            // Gating disables the input; drop anything that slips through.
            warn!("ignoring URL edit on locked row {id}");
            return;
        }
        if row.set_url(url) {
            debug!("row {id} identity changed, task state reset");
        }
        step.row(self, id);
    }

    fn edit_config(&mut self, id: RowId, mut config: AccountConfig, step: &mut Step) {
        let Some(row) = self.rows.get_mut(id) else {
            return;
        };
        if row.is_locked() {
            warn!("ignoring config edit on locked row {id}");
            return;
        }
        config.normalize();
        row.config = config;
        step.row(self, id);
    }

    fn copy_config(&mut self, id: RowId, step: &mut Step) {
        // Reading a locked row's config is fine — only writes are frozen.
        let Some(row) = self.rows.get(id) else {
            return;
        };
        self.clipboard.copy(row.config.clone());
        step.effects.push(UiEffect::ClipboardChanged {
            has_content: self.clipboard.has_content(),
        });
    }

    fn paste_config(&mut self, id: RowId, step: &mut Step) {
        let Some(config) = self.clipboard.paste() else {
            debug!("paste with empty clipboard");
            return;
        };
        let Some(row) = self.rows.get_mut(id) else {
            return;
        };
        if row.is_locked() {
            warn!("ignoring paste on locked row {id}");
            return;
        }
        row.config = config;
        step.row(self, id);
    }

    fn request_start(&mut self, id: RowId, step: &mut Step) {
        let Some(row) = self.rows.get_mut(id) else {
            return;
        };
        let gate = compute_gating(row, self.settings.credentials_configured).start;
        if !gate.enabled {
            row.last_error = gate.reason;
            step.row(self, id);
            return;
        }
        let handle = row.handle().expect("gating guarantees a handle").to_string();
        row.pending = None;
        row.last_error = None;
        step.commands.push(Command::CheckExisting { row: id, handle });
        step.row(self, id);
    }

    fn request_continue(&mut self, id: RowId, step: &mut Step) {
        let Some(row) = self.rows.get_mut(id) else {
            return;
        };
        let gate = compute_gating(row, self.settings.credentials_configured).r#continue;
        if !gate.enabled {
            row.last_error = gate.reason;
            step.row(self, id);
            return;
        }
        let handle = row.handle().expect("gating guarantees a handle").to_string();
        row.last_error = None;
        step.commands.push(Command::SubmitContinue {
            row: id,
            handle,
            config: row.config.clone(),
        });
        step.row(self, id);
    }

    fn confirm_start(&mut self, id: RowId, mode: StartMode, step: &mut Step) {
        let Some(row) = self.rows.get_mut(id) else {
            return;
        };
        if row.pending != Some(PendingConfirm::Start) {
            debug!("start confirmation without a pending start on row {id}");
            return;
        }
        row.pending = None;
        // Status may have moved under the confirmation dialog (e.g. another
        // client started this handle and a tick brought it in) — re-check.
        let gate = compute_gating(row, self.settings.credentials_configured).start;
        if !gate.enabled {
            row.last_error = gate.reason;
            step.row(self, id);
            return;
        }
        let handle = row.handle().expect("gating guarantees a handle").to_string();
        step.commands.push(Command::SubmitStart {
            row: id,
            handle,
            config: row.config.clone(),
            mode: Some(mode),
        });
    }

    fn request_cancel(&mut self, id: RowId, step: &mut Step) {
        let Some(row) = self.rows.get_mut(id) else {
            return;
        };
        match row.status {
            TaskStatus::Running => {
                row.pending = Some(PendingConfirm::Cancel);
                step.effects.push(UiEffect::AskCancelMode { row: id });
            }
            TaskStatus::Queued => {
                // Queued tasks have produced no files yet: no confirmation,
                // no cleanup.
                let handle = match row.handle() {
                    Some(h) => h.to_string(),
                    None => return,
                };
                step.commands.push(Command::SubmitCancel {
                    row: id,
                    handle,
                    delete_files: false,
                });
            }
            _ => {
                row.last_error = Some(crate::gating::NOTHING_TO_CANCEL_REASON.to_string());
                step.row(self, id);
            }
        }
    }

    fn confirm_cancel(&mut self, id: RowId, mode: CancelMode, step: &mut Step) {
        let Some(row) = self.rows.get_mut(id) else {
            return;
        };
        if row.pending != Some(PendingConfirm::Cancel) {
            debug!("cancel confirmation without a pending cancel on row {id}");
            return;
        }
        row.pending = None;
        if !row.is_locked() {
            // The task finished while the dialog was open; nothing to do.
            debug!("cancel confirmed but row {id} is no longer locked");
            step.row(self, id);
            return;
        }
        let handle = match row.handle() {
            Some(h) => h.to_string(),
            None => return,
        };
        step.commands.push(Command::SubmitCancel {
            row: id,
            handle,
            delete_files: mode == CancelMode::Delete,
        });
    }

    fn open_folder(&mut self, id: RowId, step: &mut Step) {
        let Some(row) = self.rows.get(id) else {
            return;
        };
        let Some(handle) = row.handle() else {
            return;
        };
        match downloads_path(&self.settings.download_root, handle) {
            Some(path) => step.commands.push(Command::OpenFolder { row: id, path }),
            None => step.effects.push(UiEffect::Warning {
                row: id,
                message: "downloads folder is not configured".to_string(),
            }),
        }
    }

    /// Apply a call completion. The completion carries the handle it was
    /// issued for; if the row's identity moved on in the meantime the
    /// result belongs to nobody and is dropped.
    fn apply_outcome(&mut self, id: RowId, outcome: CallOutcome, step: &mut Step) {
        match outcome {
            CallOutcome::ExistingChecked { handle, result } => {
                if !self.row_still_owns(id, &handle) {
                    return;
                }
                match result {
                    Ok(existing) if existing.has_files => {
                        let row = self.rows.get_mut(id).expect("checked above");
                        row.pending = Some(PendingConfirm::Start);
                        step.effects.push(UiEffect::AskStartMode { row: id, existing });
                    }
                    Ok(_) => {
                        // Nothing on disk: go straight to the scheduler.
                        let row = self.rows.get(id).expect("checked above");
                        let gate =
                            compute_gating(row, self.settings.credentials_configured).start;
                        if !gate.enabled {
                            debug!("start preconditions lost while checking row {id}");
                            return;
                        }
                        step.commands.push(Command::SubmitStart {
                            row: id,
                            handle,
                            config: row.config.clone(),
                            mode: None,
                        });
                    }
                    Err(err) => {
                        let row = self.rows.get_mut(id).expect("checked above");
                        row.last_error = Some(err.message);
                        step.row(self, id);
                    }
                }
            }
            CallOutcome::StartFinished { handle, result }
            | CallOutcome::ContinueFinished { handle, result } => {
                if !self.row_still_owns(id, &handle) {
                    return;
                }
                let row = self.rows.get_mut(id).expect("checked above");
                match result {
                    Ok(state) => {
                        row.adopt(&state);
                        row.last_error = None;
                        info!("row {id} ({handle}) now {}", state.status);
                    }
                    Err(err) => {
                        // Status untouched — including the 409 conflict,
                        // whose detail already names the active task.
                        row.last_error = Some(err.message);
                    }
                }
                step.row(self, id);
            }
            CallOutcome::CancelFinished {
                handle,
                result,
                cleanup,
            } => {
                if !self.row_still_owns(id, &handle) {
                    return;
                }
                let row = self.rows.get_mut(id).expect("checked above");
                match result {
                    Ok(state) => {
                        row.adopt(&state);
                        row.last_error = None;
                        if let Some(Err(err)) = cleanup {
                            // Cancellation is committed; the cleanup failure
                            // must not revert it.
                            step.effects.push(UiEffect::Warning {
                                row: id,
                                message: format!(
                                    "task cancelled, but file cleanup failed: {err}"
                                ),
                            });
                        }
                    }
                    Err(err) => {
                        row.last_error = Some(err.message);
                    }
                }
                step.row(self, id);
            }
            CallOutcome::FolderOpened { result } => {
                if let Err(err) = result {
                    step.effects.push(UiEffect::Warning {
                        row: id,
                        message: format!("could not open folder: {err}"),
                    });
                }
            }
        }
    }

    fn row_still_owns(&self, id: RowId, handle: &str) -> bool {
        match self.rows.get(id) {
            Some(row) if row.handle() == Some(handle) => true,
            Some(_) => {
                debug!("dropping stale completion for row {id} ({handle})");
                false
            }
            None => {
                debug!("dropping completion for deleted row {id}");
                false
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive the engine: receive events, apply them, execute the resulting
/// commands off-loop and forward effects to the rendering boundary.
pub async fn run_controller(
    client: Arc<ApiClient>,
    mut engine: Engine,
    mut events: mpsc::UnboundedReceiver<ControllerEvent>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    effects_tx: mpsc::UnboundedSender<UiEffect>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                let step = engine.handle_event(event);
                for effect in step.effects {
                    if effects_tx.send(effect).is_err() {
                        debug!("effect receiver gone");
                    }
                }
                for command in step.commands {
                    let client = Arc::clone(&client);
                    let tx = events_tx.clone();
                    tokio::spawn(async move {
                        let (row, outcome) = execute_command(&client, command).await;
                        let _ = tx.send(ControllerEvent::CallCompleted { row, outcome });
                    });
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Controller shutting down");
                    break;
                }
            }
        }
    }
}

/// Run one command against the backend, reducing it to a `CallOutcome`.
async fn execute_command(client: &ApiClient, command: Command) -> (RowId, CallOutcome) {
    match command {
        Command::CheckExisting { row, handle } => {
            let result = client
                .check_existing_files(&handle)
                .await
                .map_err(CallError::from);
            (row, CallOutcome::ExistingChecked { handle, result })
        }
        Command::SubmitStart {
            row,
            handle,
            config,
            mode,
        } => {
            let result = submit_start(client, &handle, config, mode).await;
            (row, CallOutcome::StartFinished { handle, result })
        }
        Command::SubmitContinue {
            row,
            handle,
            config,
        } => {
            let result = client
                .continue_run(&RunRequest {
                    handle: handle.clone(),
                    account_config: config,
                    start_mode: None,
                })
                .await
                .map_err(CallError::from);
            (row, CallOutcome::ContinueFinished { handle, result })
        }
        Command::SubmitCancel {
            row,
            handle,
            delete_files,
        } => {
            let result = client
                .cancel_run(&CancelRequest {
                    handle: handle.clone(),
                })
                .await
                .map_err(CallError::from);
            let cleanup = if result.is_ok() && delete_files {
                Some(
                    client
                        .prepare_cancel(&PrepareCancelRequest {
                            handle: handle.clone(),
                            mode: CancelMode::Delete,
                        })
                        .await
                        .map(|_| ())
                        .map_err(CallError::from),
                )
            } else {
                None
            };
            (
                row,
                CallOutcome::CancelFinished {
                    handle,
                    result,
                    cleanup,
                },
            )
        }
        Command::OpenFolder { row, path } => {
            let result = client
                .open_folder(&OpenFolderRequest { path })
                .await
                .map(|_| ())
                .map_err(CallError::from);
            (row, CallOutcome::FolderOpened { result })
        }
    }
}

/// The two-step start: apply the chosen existing-file treatment first, and
/// only submit to the scheduler once it succeeded.
async fn submit_start(
    client: &ApiClient,
    handle: &str,
    config: AccountConfig,
    mode: Option<StartMode>,
) -> Result<HandleState, CallError> {
    if let Some(mode) = mode {
        let prepared = client
            .prepare_start(&PrepareStartRequest {
                handle: handle.to_string(),
                mode,
            })
            .await
            .map_err(CallError::from)?;
        if !prepared.success {
            return Err(CallError {
                status: None,
                message: prepared
                    .error
                    .unwrap_or_else(|| "prepare-start failed".to_string()),
            });
        }
    }
    client
        .start_run(&RunRequest {
            handle: handle.to_string(),
            account_config: config,
            start_mode: mode,
        })
        .await
        .map_err(CallError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gating::CREDENTIALS_REASON;
    use xharvest_core::MediaTypeFilter;

    fn engine_with_credentials() -> (Engine, RowId) {
        let mut engine = Engine::new();
        engine.handle_event(ControllerEvent::SettingsChanged {
            settings: GlobalSettingsView {
                credentials_configured: true,
                download_root: "downloads".into(),
            },
        });
        let id = engine.rows().rows()[0].id;
        (engine, id)
    }

    fn set_url(engine: &mut Engine, row: RowId, url: &str) {
        engine.handle_event(ControllerEvent::UrlEdited {
            row,
            url: url.into(),
        });
    }

    fn handle_state(handle: &str, status: TaskStatus, position: Option<u32>) -> HandleState {
        HandleState {
            handle: handle.into(),
            status,
            run_id: Some("r-1".into()),
            queued_position: position,
            stats: RowStats::default(),
        }
    }

    fn snapshot_of(entries: Vec<HandleState>) -> SchedulerSnapshot {
        SchedulerSnapshot {
            max_concurrent: 3,
            running_count: 0,
            queued_count: 0,
            handles: entries,
        }
    }

    fn completed(engine: &mut Engine, row: RowId, outcome: CallOutcome) -> Step {
        engine.handle_event(ControllerEvent::CallCompleted { row, outcome })
    }

    /// Start → no artifacts → scheduler call → adopt the server state.
    #[test]
    fn start_without_artifacts_goes_straight_to_the_scheduler() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");

        let step = engine.handle_event(ControllerEvent::StartRequested { row });
        assert_eq!(
            step.commands,
            vec![Command::CheckExisting {
                row,
                handle: "alice".into()
            }]
        );

        let step = completed(
            &mut engine,
            row,
            CallOutcome::ExistingChecked {
                handle: "alice".into(),
                result: Ok(ExistingFilesResponse {
                    handle: "alice".into(),
                    has_files: false,
                    image_count: 0,
                    video_count: 0,
                    total_count: 0,
                }),
            },
        );
        assert_eq!(
            step.commands,
            vec![Command::SubmitStart {
                row,
                handle: "alice".into(),
                config: AccountConfig::default(),
                mode: None,
            }]
        );

        completed(
            &mut engine,
            row,
            CallOutcome::StartFinished {
                handle: "alice".into(),
                result: Ok(handle_state("alice", TaskStatus::Queued, Some(2))),
            },
        );
        let state = engine.rows().get(row).unwrap();
        assert_eq!(state.status, TaskStatus::Queued);
        assert_eq!(state.queued_position, Some(2));
    }

    #[test]
    fn start_with_artifacts_waits_for_the_mode_choice() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        engine.handle_event(ControllerEvent::StartRequested { row });

        let existing = ExistingFilesResponse {
            handle: "alice".into(),
            has_files: true,
            image_count: 10,
            video_count: 2,
            total_count: 12,
        };
        let step = completed(
            &mut engine,
            row,
            CallOutcome::ExistingChecked {
                handle: "alice".into(),
                result: Ok(existing.clone()),
            },
        );
        assert!(step.commands.is_empty(), "no call before the user chose");
        assert!(
            step.effects
                .iter()
                .any(|e| matches!(e, UiEffect::AskStartMode { existing: e, .. } if e.has_files)),
            "expected AskStartMode, got {:?}",
            step.effects
        );

        let step = engine.handle_event(ControllerEvent::StartConfirmed {
            row,
            mode: StartMode::Pack,
        });
        assert_eq!(
            step.commands,
            vec![Command::SubmitStart {
                row,
                handle: "alice".into(),
                config: AccountConfig::default(),
                mode: Some(StartMode::Pack),
            }]
        );
    }

    #[test]
    fn aborting_the_confirmation_issues_no_call_and_touches_nothing() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        engine.handle_event(ControllerEvent::StartRequested { row });
        completed(
            &mut engine,
            row,
            CallOutcome::ExistingChecked {
                handle: "alice".into(),
                result: Ok(ExistingFilesResponse {
                    handle: "alice".into(),
                    has_files: true,
                    image_count: 1,
                    video_count: 0,
                    total_count: 1,
                }),
            },
        );

        let step = engine.handle_event(ControllerEvent::ConfirmAborted { row });
        assert!(step.commands.is_empty());
        let state = engine.rows().get(row).unwrap();
        assert_eq!(state.status, TaskStatus::Idle);
        assert_eq!(state.pending, None);

        // A confirmation arriving after the abort is stale and ignored.
        let step = engine.handle_event(ControllerEvent::StartConfirmed {
            row,
            mode: StartMode::Delete,
        });
        assert!(step.commands.is_empty());
    }

    #[test]
    fn conflict_on_start_leaves_the_row_idle_with_the_reason() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        engine.handle_event(ControllerEvent::StartRequested { row });

        completed(
            &mut engine,
            row,
            CallOutcome::StartFinished {
                handle: "alice".into(),
                result: Err(CallError {
                    status: Some(409),
                    message: "HTTP 409: account alice already has an active task (Queued/Running)"
                        .into(),
                }),
            },
        );
        let state = engine.rows().get(row).unwrap();
        assert_eq!(state.status, TaskStatus::Idle);
        assert_eq!(state.queued_position, None);
        assert!(
            state
                .last_error
                .as_deref()
                .is_some_and(|e| e.contains("already has an active task")),
            "got {:?}",
            state.last_error
        );
    }

    #[test]
    fn start_blocked_without_credentials_names_them() {
        let mut engine = Engine::new();
        let row = engine.rows().rows()[0].id;
        set_url(&mut engine, row, "https://x.com/alice");

        let step = engine.handle_event(ControllerEvent::StartRequested { row });
        assert!(step.commands.is_empty(), "must not reach the network");
        let state = engine.rows().get(row).unwrap();
        assert_eq!(state.last_error.as_deref(), Some(CREDENTIALS_REASON));
    }

    #[test]
    fn continue_skips_the_artifact_check() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");

        let step = engine.handle_event(ControllerEvent::ContinueRequested { row });
        assert_eq!(
            step.commands,
            vec![Command::SubmitContinue {
                row,
                handle: "alice".into(),
                config: AccountConfig::default(),
            }]
        );
    }

    #[test]
    fn cancel_on_running_asks_for_the_file_mode_first() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        engine.handle_event(ControllerEvent::SnapshotReceived {
            snapshot: snapshot_of(vec![handle_state("alice", TaskStatus::Running, None)]),
        });

        let step = engine.handle_event(ControllerEvent::CancelRequested { row });
        assert!(step.commands.is_empty());
        assert!(
            step.effects
                .iter()
                .any(|e| matches!(e, UiEffect::AskCancelMode { .. }))
        );

        let step = engine.handle_event(ControllerEvent::CancelConfirmed {
            row,
            mode: CancelMode::Delete,
        });
        assert_eq!(
            step.commands,
            vec![Command::SubmitCancel {
                row,
                handle: "alice".into(),
                delete_files: true,
            }]
        );
    }

    #[test]
    fn cancel_on_queued_needs_no_confirmation() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        engine.handle_event(ControllerEvent::SnapshotReceived {
            snapshot: snapshot_of(vec![handle_state("alice", TaskStatus::Queued, Some(1))]),
        });

        let step = engine.handle_event(ControllerEvent::CancelRequested { row });
        assert_eq!(
            step.commands,
            vec![Command::SubmitCancel {
                row,
                handle: "alice".into(),
                delete_files: false,
            }]
        );
        assert!(
            !step
                .effects
                .iter()
                .any(|e| matches!(e, UiEffect::AskCancelMode { .. }))
        );
    }

    /// Cancel commits, cleanup fails: the terminal status stays and the
    /// failure surfaces as a warning only.
    #[test]
    fn cleanup_failure_does_not_revert_a_committed_cancel() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        engine.handle_event(ControllerEvent::SnapshotReceived {
            snapshot: snapshot_of(vec![handle_state("alice", TaskStatus::Running, None)]),
        });
        engine.handle_event(ControllerEvent::CancelRequested { row });
        engine.handle_event(ControllerEvent::CancelConfirmed {
            row,
            mode: CancelMode::Delete,
        });

        let step = completed(
            &mut engine,
            row,
            CallOutcome::CancelFinished {
                handle: "alice".into(),
                result: Ok(handle_state("alice", TaskStatus::Cancelled, None)),
                cleanup: Some(Err(CallError {
                    status: Some(500),
                    message: "HTTP 500: delete failed".into(),
                })),
            },
        );
        let state = engine.rows().get(row).unwrap();
        assert_eq!(state.status, TaskStatus::Cancelled);
        assert!(
            step.effects.iter().any(|e| matches!(
                e,
                UiEffect::Warning { message, .. } if message.contains("cleanup failed")
            )),
            "expected a secondary warning, got {:?}",
            step.effects
        );
    }

    #[test]
    fn failed_cancel_call_leaves_status_unchanged() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        engine.handle_event(ControllerEvent::SnapshotReceived {
            snapshot: snapshot_of(vec![handle_state("alice", TaskStatus::Queued, Some(1))]),
        });
        engine.handle_event(ControllerEvent::CancelRequested { row });

        completed(
            &mut engine,
            row,
            CallOutcome::CancelFinished {
                handle: "alice".into(),
                result: Err(CallError {
                    status: None,
                    message: "request failed: connection refused".into(),
                }),
                cleanup: None,
            },
        );
        let state = engine.rows().get(row).unwrap();
        assert_eq!(state.status, TaskStatus::Queued);
        assert_eq!(state.queued_position, Some(1));
        assert!(state.last_error.is_some());
    }

    /// The snapshot is authoritative even right after a local optimistic
    /// write adopted the protocol response.
    #[test]
    fn snapshot_overwrites_the_optimistic_protocol_response() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        completed(
            &mut engine,
            row,
            CallOutcome::StartFinished {
                handle: "alice".into(),
                result: Ok(handle_state("alice", TaskStatus::Queued, Some(3))),
            },
        );
        assert_eq!(engine.rows().get(row).unwrap().queued_position, Some(3));

        engine.handle_event(ControllerEvent::SnapshotReceived {
            snapshot: snapshot_of(vec![handle_state("alice", TaskStatus::Running, None)]),
        });
        let state = engine.rows().get(row).unwrap();
        assert_eq!(state.status, TaskStatus::Running);
        assert_eq!(state.queued_position, None);
    }

    /// A completion for a handle the row no longer resolves to is stale
    /// and must be dropped.
    #[test]
    fn stale_completion_after_identity_change_is_dropped() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        engine.handle_event(ControllerEvent::StartRequested { row });
        // The user re-targets the row while the start is in flight.
        set_url(&mut engine, row, "https://x.com/bob");

        completed(
            &mut engine,
            row,
            CallOutcome::StartFinished {
                handle: "alice".into(),
                result: Ok(handle_state("alice", TaskStatus::Running, None)),
            },
        );
        let state = engine.rows().get(row).unwrap();
        assert_eq!(state.status, TaskStatus::Idle, "stale response must not apply");
        assert_eq!(state.handle(), Some("bob"));
    }

    #[test]
    fn url_edit_resets_status_and_stats_for_a_new_identity() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        let mut entry = handle_state("alice", TaskStatus::Running, None);
        entry.stats.images_downloaded = 12;
        engine.handle_event(ControllerEvent::SnapshotReceived {
            snapshot: snapshot_of(vec![entry]),
        });
        // Running locks the row; bring it to a terminal state first. The
        // terminal entry still carries the run's stats.
        let mut done = handle_state("alice", TaskStatus::Done, None);
        done.stats.images_downloaded = 12;
        engine.handle_event(ControllerEvent::SnapshotReceived {
            snapshot: snapshot_of(vec![done]),
        });
        assert_eq!(
            engine.rows().get(row).unwrap().stats.images_downloaded,
            12
        );

        set_url(&mut engine, row, "https://x.com/bob");
        let state = engine.rows().get(row).unwrap();
        assert_eq!(state.status, TaskStatus::Idle);
        assert_eq!(state.stats, RowStats::default());
    }

    #[test]
    fn locked_rows_ignore_url_and_config_edits() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        engine.handle_event(ControllerEvent::SnapshotReceived {
            snapshot: snapshot_of(vec![handle_state("alice", TaskStatus::Running, None)]),
        });

        set_url(&mut engine, row, "https://x.com/bob");
        let state = engine.rows().get(row).unwrap();
        assert_eq!(state.handle(), Some("alice"), "handle is frozen while locked");

        engine.handle_event(ControllerEvent::ConfigEdited {
            row,
            config: AccountConfig {
                media_type: MediaTypeFilter::Images,
                ..Default::default()
            },
        });
        let state = engine.rows().get(row).unwrap();
        assert_eq!(state.config, AccountConfig::default());
    }

    #[test]
    fn copy_paste_moves_the_whole_config_between_rows() {
        let (mut engine, first) = engine_with_credentials();
        let second = match engine.handle_event(ControllerEvent::AddRow).effects.first() {
            Some(UiEffect::Row { view }) => view.row,
            other => panic!("expected a row effect, got {other:?}"),
        };

        let config = AccountConfig {
            media_type: MediaTypeFilter::Videos,
            min_short_side: Some(720),
            ..Default::default()
        };
        engine.handle_event(ControllerEvent::ConfigEdited {
            row: first,
            config: config.clone(),
        });
        let step = engine.handle_event(ControllerEvent::CopyConfig { row: first });
        assert!(
            step.effects
                .iter()
                .any(|e| matches!(e, UiEffect::ClipboardChanged { has_content: true }))
        );

        engine.handle_event(ControllerEvent::PasteConfig { row: second });
        assert_eq!(engine.rows().get(second).unwrap().config, config);

        // Pasting into a locked row is refused.
        set_url(&mut engine, second, "https://x.com/bob");
        engine.handle_event(ControllerEvent::SnapshotReceived {
            snapshot: snapshot_of(vec![handle_state("bob", TaskStatus::Queued, Some(1))]),
        });
        engine.handle_event(ControllerEvent::ConfigEdited {
            row: first,
            config: AccountConfig::default(),
        });
        engine.handle_event(ControllerEvent::CopyConfig { row: first });
        engine.handle_event(ControllerEvent::PasteConfig { row: second });
        assert_eq!(
            engine.rows().get(second).unwrap().config,
            config,
            "locked row keeps its config"
        );

        let step = engine.handle_event(ControllerEvent::ClearClipboard);
        assert!(
            step.effects
                .iter()
                .any(|e| matches!(e, UiEffect::ClipboardChanged { has_content: false }))
        );
        assert!(!engine.clipboard().has_content());
    }

    #[test]
    fn deleting_the_last_row_leaves_one_fresh_default_row() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");

        let step = engine.handle_event(ControllerEvent::DeleteRow { row });
        assert!(
            step.effects
                .iter()
                .any(|e| matches!(e, UiEffect::RowRemoved { row: r } if *r == row))
        );
        assert_eq!(engine.rows().rows().len(), 1);
        let fresh = &engine.rows().rows()[0];
        assert_ne!(fresh.id, row);
        assert_eq!(fresh.status, TaskStatus::Idle);
        assert_eq!(fresh.config, AccountConfig::default());
    }

    #[test]
    fn deleting_a_locked_row_warns_and_keeps_it() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        engine.handle_event(ControllerEvent::SnapshotReceived {
            snapshot: snapshot_of(vec![handle_state("alice", TaskStatus::Running, None)]),
        });

        let step = engine.handle_event(ControllerEvent::DeleteRow { row });
        assert!(
            step.effects
                .iter()
                .any(|e| matches!(e, UiEffect::Warning { .. }))
        );
        assert!(engine.rows().get(row).is_some());
    }

    #[test]
    fn settings_change_regates_every_row() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");

        let step = engine.handle_event(ControllerEvent::SettingsChanged {
            settings: GlobalSettingsView::default(),
        });
        let Some(UiEffect::Row { view }) = step.effects.first() else {
            panic!("expected a row effect");
        };
        assert_eq!(view.row, row);
        assert!(!view.gating.start.enabled);
    }

    #[test]
    fn open_folder_builds_the_row_path() {
        let (mut engine, row) = engine_with_credentials();
        set_url(&mut engine, row, "https://x.com/alice");
        let step = engine.handle_event(ControllerEvent::OpenFolderRequested { row });
        assert_eq!(
            step.commands,
            vec![Command::OpenFolder {
                row,
                path: "downloads/alice".into(),
            }]
        );
    }
}

