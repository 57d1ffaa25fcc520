use fx_runtime::RuntimeError;
use thiserror::Error;

/// Errors surfaced by the bridge's fallible entry points.
#[derive(Debug, Error)]
pub enum FxError {
    #[error("effects runtime is not initialized")]
    NotInitialized,

    #[error("a host is already installed")]
    HostAlreadyInstalled,

    #[error("host has no graphics device")]
    NoGraphicsDevice,

    #[error(transparent)]
    Load(#[from] RuntimeError),
}
