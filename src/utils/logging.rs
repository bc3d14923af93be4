//! Conditional logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! Chatty modules (the bridge loop in particular) can be silenced wholesale
//! without touching call sites:
//!
//! ```rust
//! const ENABLE_LOGS: bool = true;
//!
//! use formtrack::{log_info, log_warn, log_error};
//!
//! log_info!("logged only when ENABLE_LOGS is true");
//! ```

/// Conditional `log::info!`. The calling module must define
/// `const ENABLE_LOGS: bool`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Conditional `log::warn!`. The calling module must define
/// `const ENABLE_LOGS: bool`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Conditional `log::error!`. The calling module must define
/// `const ENABLE_LOGS: bool`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
