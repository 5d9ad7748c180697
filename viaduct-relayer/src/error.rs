use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the durable state store.
#[derive(Debug, Error)]
pub enum StateError {
    /// Reading or writing one of the state files failed.
    #[error("state file i/o failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A state file exists but its contents are not a valid record array.
    #[error("state file {path} is not parseable: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
