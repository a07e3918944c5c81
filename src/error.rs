use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("{0}")]
    Usage(&'static str),
    #[error("unable to resolve the calling identity: {0}")]
    Identity(String),
    #[error("the provided aws access key id {0:?} does not exist")]
    KeyNotFound(String),
    #[error("failed to check the provided aws access key id {id:?}: {message}")]
    Probe { id: String, message: String },
    #[error("failed to {operation}: {message}")]
    Remote {
        operation: &'static str,
        message: String,
    },
}

impl Error {
    pub(crate) fn remote(operation: &'static str, message: impl ToString) -> Self {
        Self::Remote {
            operation,
            message: message.to_string(),
        }
    }
}
