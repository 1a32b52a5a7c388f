//! Device error types.

use std::io;

/// Failures from the POSIX IPC layer (shared regions, semaphores, queues).
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// A shared region was requested with zero size.
    #[error("region size must be non-zero")]
    InvalidSize,

    /// The object name cannot be represented as a C string.
    #[error("invalid object name")]
    InvalidName,

    /// The underlying syscall failed.
    #[error(transparent)]
    Os(#[from] io::Error),
}

/// Top-level error type for the device crate.
///
/// Only device initialization surfaces errors upward (a failed init means
/// the device is not attached); everything else is recovered locally and
/// logged.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// A named IPC resource could not be created or opened.
    #[error("ipc resource '{name}': {source}")]
    Ipc {
        name: String,
        #[source]
        source: IpcError,
    },

    /// A persisted-state blob failed to decode.
    #[error("saved state: {0}")]
    SavedState(#[from] glbridge_primitives::state::StateError),
}

impl DeviceError {
    /// Attach a resource name to an `IpcError`.
    pub(crate) fn ipc(name: &str, source: IpcError) -> Self {
        Self::Ipc {
            name: name.to_string(),
            source,
        }
    }
}
