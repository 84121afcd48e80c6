mod config;
mod error;
mod format;
mod level;
mod log;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use format::LoggerFormat;
pub use level::LoggerLevel;
pub use log::LOG_ENV;

/// Install the global subscriber described by `cfg`.
///
/// A non-empty [`LOG_ENV`] directive overrides `cfg.level`. Fails with
/// [`LoggerError::AlreadyInitialized`] if a global subscriber is already set.
pub fn init_logger(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    log::install(cfg)
}
