//! Client for the hosted exercise API.
//!
//! Thin bearer-authenticated CRUD against `{api_base}/{exercise}`. The token
//! comes from the auth collaborator at call time and is never cached here.

pub mod submit;

pub use submit::{ResultSink, ResultSubmitter, SubmissionResult};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::errors::SubmitError;

/// Supplies the current bearer token. Backed by the hosted auth service in
/// production; absence of a token is a hard failure, never retried.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Option<String>;
}

/// One workout session appended to an exercise record.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionPatch {
    pub session_reps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_score: Option<u32>,
}

/// The caller's per-exercise record as the backend stores it. Aggregates are
/// computed server-side; every field beyond the history is best-effort.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExerciseRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub history: Vec<u32>,
    #[serde(default)]
    pub max_reps: Option<u32>,
    #[serde(default)]
    pub avg_reps: Option<f64>,
    #[serde(default)]
    pub last_tracked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Clone)]
pub struct ExerciseClient {
    client: Client,
    api_base: String,
    tokens: Arc<dyn TokenProvider>,
}

impl ExerciseClient {
    pub fn new(api_base: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client: Client::new(),
            api_base: trim_trailing_slash(api_base.into()),
            tokens,
        }
    }

    /// Fetch the caller's record for `exercise`; `Ok(None)` when none exists.
    pub async fn get_record(&self, exercise: &str) -> Result<Option<ExerciseRecord>> {
        let response = self
            .request(Method::GET, exercise)
            .await?
            .send()
            .await
            .with_context(|| format!("failed to fetch {exercise} record"))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .with_context(|| format!("{exercise} record fetch rejected"))?;
        let record = response
            .json()
            .await
            .with_context(|| format!("invalid {exercise} record body"))?;
        Ok(Some(record))
    }

    /// Create the caller's record, optionally seeded with a first session.
    /// The backend is idempotent: an existing record is returned as-is.
    pub async fn create_record(
        &self,
        exercise: &str,
        seed: Option<&SessionPatch>,
    ) -> Result<ExerciseRecord> {
        let mut request = self.request(Method::POST, exercise).await?;
        if let Some(seed) = seed {
            request = request.json(seed);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to create {exercise} record"))?
            .error_for_status()
            .with_context(|| format!("{exercise} record create rejected"))?;
        response
            .json()
            .await
            .with_context(|| format!("invalid {exercise} record body"))
    }

    /// Append one session to the record. This is the submission path: exactly
    /// one call per Stop, typed errors so the submitter can fold them into
    /// user-visible feedback.
    pub async fn patch_session(
        &self,
        exercise: &str,
        patch: &SessionPatch,
    ) -> std::result::Result<Value, SubmitError> {
        let token = self
            .tokens
            .access_token()
            .await
            .ok_or(SubmitError::NoAuthToken)?;

        let response = self
            .client
            .patch(self.url(exercise))
            .bearer_auth(token)
            .json(patch)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                message: extract_error_message(status.as_u16(), &text),
            });
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    async fn request(&self, method: Method, exercise: &str) -> Result<RequestBuilder> {
        let token = self
            .tokens
            .access_token()
            .await
            .ok_or_else(|| anyhow!("no auth token available"))?;
        Ok(self
            .client
            .request(method, self.url(exercise))
            .bearer_auth(token))
    }

    fn url(&self, exercise: &str) -> String {
        format!("{}/{exercise}", self.api_base)
    }
}

fn trim_trailing_slash(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

/// Best-effort error text from a failed response: the JSON `detail` field
/// when present, otherwise the raw body, otherwise the status code.
pub(crate) fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(detail) = value.get("detail").and_then(Value::as_str) {
            return detail.to_string();
        }
    }
    if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", body.trim())
    }
}
