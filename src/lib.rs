//! Live workout session bridge for pose-tracked exercise tests.
//!
//! Wires the embedded pose-estimation surface to a workout state machine:
//! raw tracker messages flow through [`bridge::TrackerBridge`] into the
//! [`session::SessionController`], which owns the session lifecycle, the
//! elapsed-time ticker, and result submission to the exercise backend.

pub mod backend;
pub mod bridge;
pub mod errors;
pub mod permissions;
pub mod session;
pub mod settings;
mod utils;

pub use backend::{
    ExerciseClient, ExerciseRecord, ResultSink, ResultSubmitter, SessionPatch, SubmissionResult,
    TokenProvider,
};
pub use bridge::{decode_raw, decode_value, RawMessageSender, TrackerBridge, TrackingEvent};
pub use errors::{SessionError, SubmitError};
pub use permissions::{CapabilityGate, CapabilityStatus, StaticGate};
pub use session::{SessionController, SessionPhase, SessionSnapshot, SessionState};
pub use settings::{SettingsStore, TrackerSettings};

/// Initialize logging from `RUST_LOG`, defaulting to Info.
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
