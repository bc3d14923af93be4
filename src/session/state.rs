use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    Active,
    Submitting,
}

impl Default for SessionPhase {
    fn default() -> Self {
        SessionPhase::Idle
    }
}

/// Live workout session state. Exclusively owned and mutated by the
/// `SessionController`; the bridge and timer only supply inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub phase: SessionPhase,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub rep_count: u32,
    pub ready: bool,
    pub posture_direction: Option<String>,
    /// Monotonic start anchor; combines with the wall clock only for display.
    #[serde(skip)]
    pub running_anchor: Option<Instant>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            session_id: None,
            started_at: None,
            elapsed_seconds: 0,
            rep_count: 0,
            ready: false,
            posture_direction: None,
            running_anchor: None,
        }
    }
}

/// Immutable capture of a finished session, taken at the instant of Stop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub rep_count: u32,
    pub elapsed_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Enter the Active phase. Counter and elapsed time always restart from 0
    /// regardless of the previous session's ending values.
    pub fn begin(&mut self, session_id: String, started_at: DateTime<Utc>, now: Instant) {
        self.phase = SessionPhase::Active;
        self.session_id = Some(session_id);
        self.started_at = Some(started_at);
        self.elapsed_seconds = 0;
        self.rep_count = 0;
        self.running_anchor = Some(now);
    }

    /// Counter updates only land while a session is running. A late counter
    /// event arriving after Stop must not resurrect a stale count.
    pub fn apply_counter(&mut self, count: u32) -> bool {
        if self.phase != SessionPhase::Active {
            return false;
        }
        self.rep_count = count;
        true
    }

    /// Readiness applies in any phase; it can be known before a session
    /// starts and gates the next Start, not the current session.
    pub fn apply_readiness(&mut self, ready: bool, posture_direction: Option<String>) {
        self.ready = ready;
        self.posture_direction = posture_direction;
    }

    pub fn sync_elapsed_from_anchor(&mut self) {
        if let (SessionPhase::Active, Some(anchor)) = (self.phase, self.running_anchor) {
            self.elapsed_seconds = anchor.elapsed().as_secs();
        }
    }

    /// Freeze the session's final values into a snapshot and move to
    /// Submitting, resetting the live counters so a rapid re-Start is not
    /// polluted by stale values.
    pub fn capture_snapshot(&mut self, stopped_at: DateTime<Utc>) -> Option<SessionSnapshot> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        self.sync_elapsed_from_anchor();

        let snapshot = SessionSnapshot {
            session_id: self.session_id.take()?,
            rep_count: self.rep_count,
            elapsed_seconds: self.elapsed_seconds,
            started_at: self.started_at.take().unwrap_or(stopped_at),
            stopped_at,
        };

        self.phase = SessionPhase::Submitting;
        self.rep_count = 0;
        self.elapsed_seconds = 0;
        self.running_anchor = None;

        Some(snapshot)
    }

    /// Return to Idle after a submission settles, success or failure.
    pub fn settle(&mut self) {
        self.phase = SessionPhase::Idle;
    }
}
