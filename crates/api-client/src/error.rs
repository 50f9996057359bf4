use reqwest::StatusCode;

/// Error from an API call.
///
/// Transport failures (connect, timeout, body read) keep the raw reqwest
/// message; non-success responses keep the status code plus a best-effort
/// `detail` extracted from the body. The distinction matters to callers:
/// a 409 on start/continue is the documented "already has an active task"
/// conflict, everything else is just surfaced to the user.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },
}

impl ApiError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Status { status: 409, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }

    /// Build a `Status` error from a non-success response, consuming its
    /// body for the detail text.
    pub(crate) async fn from_response(resp: reqwest::Response) -> Self {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Self::Status {
            status: status.as_u16(),
            detail: extract_detail(status, &body),
        }
    }
}

/// Best-effort error detail: the JSON `detail` field if the body parses,
/// else the raw body, else the status line's canonical reason.
fn extract_detail(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(detail) = value.get("detail").and_then(|d| d.as_str()) {
            return detail.to_string();
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}
