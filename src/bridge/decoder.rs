use serde_json::Value;

/// Decoded message from the embedded pose-tracking surface.
///
/// The surface's message shape is not contractually fixed, so decoding is
/// total: every input maps to exactly one variant and nothing here can fail.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    /// Rep counter update: `{"type": "counter", "current_count": <n>}`.
    Counter { count: u32 },
    /// Readiness/info blob: any other JSON object. Absence of an explicit
    /// `ready: false` counts as ready.
    Readiness {
        ready: bool,
        posture_direction: Option<String>,
    },
    /// Anything that is not JSON or not an object. Carried for logging,
    /// never applied to session state.
    Unknown { raw: String },
}

/// Decode a raw textual message from the tracking surface.
pub fn decode_raw(raw: &str) -> TrackingEvent {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => decode_value(value),
        Err(_) => TrackingEvent::Unknown {
            raw: raw.to_string(),
        },
    }
}

/// Decode an already-structured payload.
pub fn decode_value(value: Value) -> TrackingEvent {
    let Some(object) = value.as_object() else {
        return TrackingEvent::Unknown {
            raw: value.to_string(),
        };
    };

    if object.get("type").and_then(Value::as_str) == Some("counter") {
        let count = object.get("current_count").map_or(0, coerce_count);
        return TrackingEvent::Counter { count };
    }

    // Only an explicit `ready: false` marks the tracker as not ready.
    let ready = object.get("ready").and_then(Value::as_bool).unwrap_or(true);
    let posture_direction = object
        .get("postureDirection")
        .and_then(Value::as_str)
        .map(str::to_string);

    TrackingEvent::Readiness {
        ready,
        posture_direction,
    }
}

/// Coerce a counter value: malformed or negative inputs become 0.
fn coerce_count(value: &Value) -> u32 {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).unwrap_or(u32::MAX);
    }
    if let Some(f) = value.as_f64() {
        if f.is_finite() && f > 0.0 {
            return f.min(f64::from(u32::MAX)) as u32;
        }
    }
    0
}
