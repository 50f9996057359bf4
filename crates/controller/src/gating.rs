//! Per-control enable/disable decisions for one row.
//!
//! Pure function of the row state and the credentials-configured flag:
//! callable at any time, no side effects, recomputed after every local
//! event and every reconciliation tick. When several reasons apply, the
//! locked-state reason outranks missing credentials, which outranks the
//! validation error.

use serde::Serialize;

use crate::row::RowState;
use xharvest_core::TaskStatus;

pub const CREDENTIALS_REASON: &str =
    "credentials not configured: set auth_token/ct0 in global settings first";
pub const NOTHING_TO_CANCEL_REASON: &str = "no active task to cancel";
pub const LOCKED_DELETE_REASON: &str = "row has an active task (Queued/Running); cancel it first";

/// One control's decision plus the user-facing reason when disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gate {
    pub enabled: bool,
    pub reason: Option<String>,
}

impl Gate {
    fn on() -> Self {
        Self {
            enabled: true,
            reason: None,
        }
    }

    fn off(reason: impl Into<String>) -> Self {
        Self {
            enabled: false,
            reason: Some(reason.into()),
        }
    }
}

/// Gating for every interactive control of one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowGating {
    pub url_input: Gate,
    pub config_edit: Gate,
    pub paste_config: Gate,
    pub start: Gate,
    pub r#continue: Gate,
    pub cancel: Gate,
    pub delete_row: Gate,
}

/// The lock reason, most specific first: queued-with-position, queued,
/// running.
fn locked_reason(row: &RowState) -> Option<String> {
    match (row.status, row.queued_position) {
        (TaskStatus::Queued, Some(position)) => Some(format!("task queued at position {position}")),
        (TaskStatus::Queued, None) => Some("task queued".to_string()),
        (TaskStatus::Running, _) => Some("task running".to_string()),
        _ => None,
    }
}

pub fn compute_gating(row: &RowState, credentials_configured: bool) -> RowGating {
    let locked = locked_reason(row);

    let edit = match &locked {
        Some(reason) => Gate::off(reason.clone()),
        None => Gate::on(),
    };

    let action = if let Some(reason) = &locked {
        Gate::off(reason.clone())
    } else if !credentials_configured {
        Gate::off(CREDENTIALS_REASON)
    } else if let Err(err) = &row.validation {
        Gate::off(err.to_string())
    } else {
        Gate::on()
    };

    let cancel = if locked.is_some() {
        Gate::on()
    } else {
        Gate::off(NOTHING_TO_CANCEL_REASON)
    };

    let delete_row = if locked.is_some() {
        Gate::off(LOCKED_DELETE_REASON)
    } else {
        Gate::on()
    };

    RowGating {
        url_input: edit.clone(),
        config_edit: edit.clone(),
        paste_config: edit,
        start: action.clone(),
        r#continue: action,
        cancel,
        delete_row,
    }
}
