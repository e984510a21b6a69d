//! Process-wide logging setup for the triage binaries.

pub mod tracing;

pub use crate::tracing::{LogFormat, ENV_LOG_FORMAT};

/// Initialize process-wide tracing.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    crate::tracing::init(LogFormat::from_env());
}
