//! Operational error taxonomy for dispatcher and HTTP surfaces.
//!
//! Classification results (`Rejected`, `NoMatch`) are control flow, not
//! errors — see `services::classifier::Classification`.

use thiserror::Error;

use crate::services::slack_service::ChatError;

/// Errors surfaced by dispatcher operations.
#[derive(Debug, Error)]
pub enum BotError {
    /// The operation referenced a build id with no tracked prompt.
    #[error("no tracked prompt for build {0}")]
    NotFound(String),

    /// The chat transport refused or failed a send/update/delete.
    #[error(transparent)]
    Transport(#[from] ChatError),

    /// The tracking file could not be written. Always fatal to the process.
    #[error("failed to persist tracking state to {path}")]
    Persistence {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
