use thiserror::Error;

use crate::mx::Error as MxError;

/// Failures detected before any delivery thread starts.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid relay host {value:?}")]
    RelayHost { value: String },
    #[error("failed to start delivery thread: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Resolver(#[from] MxError),
}
