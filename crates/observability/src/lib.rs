//! Tracing/logging (shared setup).

pub mod logging;

pub use logging::{LogFormat, ParseLogFormatError};

/// Initialize process-wide logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    logging::init(format);
}
