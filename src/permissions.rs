use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Resolved camera/microphone authorization, the two capabilities a live
/// workout needs before it may start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatus {
    pub camera_granted: bool,
    pub microphone_granted: bool,
}

impl CapabilityStatus {
    pub fn granted() -> Self {
        Self {
            camera_granted: true,
            microphone_granted: true,
        }
    }

    pub fn all_granted(&self) -> bool {
        self.camera_granted && self.microphone_granted
    }

    /// Human-readable list of the denied capabilities, for error messages.
    pub fn missing(&self) -> String {
        match (self.camera_granted, self.microphone_granted) {
            (false, false) => "camera and microphone".to_string(),
            (false, true) => "camera".to_string(),
            (true, false) => "microphone".to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Gate over the platform permission APIs. `request_missing` may trigger
/// OS-level dialogs; a denial is not retried automatically, the controller
/// simply re-runs the gate on the next Start attempt.
#[async_trait]
pub trait CapabilityGate: Send + Sync {
    async fn check(&self) -> CapabilityStatus;
    async fn request_missing(&self) -> CapabilityStatus;
}

/// Gate backed by statuses the host resolved out-of-band. Useful when the
/// embedding layer owns the actual permission prompts.
pub struct StaticGate {
    status: CapabilityStatus,
}

impl StaticGate {
    pub fn new(status: CapabilityStatus) -> Self {
        Self { status }
    }
}

#[async_trait]
impl CapabilityGate for StaticGate {
    async fn check(&self) -> CapabilityStatus {
        self.status
    }

    async fn request_missing(&self) -> CapabilityStatus {
        self.status
    }
}
