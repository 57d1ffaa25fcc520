use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the effects runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The effect file could not be read.
    #[error("failed to read effect {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The effect file is not valid effect JSON.
    #[error("failed to parse effect {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The effect parsed but describes nothing playable.
    #[error("invalid effect: {0}")]
    InvalidEffect(String),

    /// The graphics device refused to create a renderer.
    #[error("graphics device error: {0}")]
    Device(String),
}
