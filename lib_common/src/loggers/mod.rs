/// Console and file logging setup with old-log cleanup.
pub mod local_logger;

pub use local_logger::{cleanup_old_logs, setup_logging, LogSettings, LoggerError};
