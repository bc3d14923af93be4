pub mod decoder;
pub mod listener;

pub use decoder::{decode_raw, decode_value, TrackingEvent};
pub use listener::{RawMessageSender, TrackerBridge};
