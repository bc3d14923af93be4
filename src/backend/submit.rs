use async_trait::async_trait;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ExerciseClient, SessionPatch};
use crate::errors::SubmitError;
use crate::session::SessionSnapshot;

/// Outcome of posting a finished session, surfaced to the UI as
/// success/failure feedback. Ephemeral; never persisted locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub accepted: bool,
    pub server_score: Option<u32>,
    pub error_message: Option<String>,
}

impl SubmissionResult {
    pub fn accepted(server_score: Option<u32>) -> Self {
        Self {
            accepted: true,
            server_score,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            server_score: None,
            error_message: Some(message.into()),
        }
    }
}

/// Where finished sessions go. The controller depends on this seam, not on
/// the HTTP client, so Stop handling is testable without a network.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn submit(&self, snapshot: &SessionSnapshot) -> SubmissionResult;
}

/// Posts session summaries to the exercise backend. One request per Stop; a
/// failure is reported, never retried — the user may start a new session.
pub struct ResultSubmitter {
    client: ExerciseClient,
    exercise: String,
    /// The backend owns scoring; hosts that still compute a client-side
    /// score can inject it here. Absent by default.
    score_override: Option<u32>,
}

impl ResultSubmitter {
    pub fn new(client: ExerciseClient, exercise: impl Into<String>) -> Self {
        Self {
            client,
            exercise: exercise.into(),
            score_override: None,
        }
    }

    pub fn with_score_override(mut self, score: u32) -> Self {
        self.score_override = Some(score);
        self
    }
}

#[async_trait]
impl ResultSink for ResultSubmitter {
    async fn submit(&self, snapshot: &SessionSnapshot) -> SubmissionResult {
        let patch = SessionPatch {
            session_reps: snapshot.rep_count,
            session_score: self.score_override,
        };

        match self.client.patch_session(&self.exercise, &patch).await {
            Ok(body) => {
                let server_score = extract_server_score(&body);
                info!(
                    "session {} submitted: {} reps in {}s",
                    snapshot.session_id, snapshot.rep_count, snapshot.elapsed_seconds
                );
                SubmissionResult::accepted(server_score)
            }
            Err(err) => {
                error!("session {} submission failed: {err}", snapshot.session_id);
                SubmissionResult::failed(match err {
                    SubmitError::NoAuthToken => "no auth session".to_string(),
                    other => other.to_string(),
                })
            }
        }
    }
}

fn extract_server_score(body: &Value) -> Option<u32> {
    let score = body.get("score")?.as_f64()?;
    if score.is_finite() && score >= 0.0 {
        Some(score.round().min(f64::from(u32::MAX)) as u32)
    } else {
        None
    }
}
