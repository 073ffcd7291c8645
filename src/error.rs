//! Error taxonomy.
//!
//! `ConfigError` is the only error surfaced synchronously (from starting the
//! schedule). Source and apply failures are absorbed per target into the run
//! report; cache I/O is best-effort and never aborts a run.

use thiserror::Error;

/// Rejected before the schedule is armed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("rotation interval must be a positive whole number, got '{0}'")]
    InvalidInterval(String),

    #[error("daily rotation time must be HH:MM, got '{0}'")]
    InvalidTime(String),

    #[error("no tags selected and no favorites available")]
    NoCriteria,
}

/// Search or download failure against the remote image source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// OS-level wallpaper application failure.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("no apply command configured for {0}")]
    NoCommand(&'static str),

    #[error("apply command exited with {status}: {command}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
    },

    #[error("apply io: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Os(String),
}

#[cfg(target_os = "windows")]
impl From<windows::core::Error> for ApplyError {
    fn from(e: windows::core::Error) -> Self {
        ApplyError::Os(e.to_string())
    }
}
