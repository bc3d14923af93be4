use thiserror::Error;

/// Errors surfaced by the session controller. Every variant leaves the state
/// machine in a stable phase; none of these abort the bridge.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("permission denied: {missing}")]
    PermissionDenied { missing: String },

    #[error("tracker not ready{}", guidance(.posture_direction))]
    NotReady { posture_direction: Option<String> },

    #[error("a workout session is already active")]
    AlreadyActive,

    #[error("no active workout session")]
    NotActive,
}

fn guidance(posture_direction: &Option<String>) -> String {
    match posture_direction {
        Some(direction) => format!(", move {direction}"),
        None => String::new(),
    }
}

/// Submission failures, folded into a `SubmissionResult` at the submitter
/// boundary so the controller always returns to Idle.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no auth token available")]
    NoAuthToken,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server rejected submission (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
}
