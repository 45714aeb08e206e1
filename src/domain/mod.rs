use thiserror::Error;
use validator::ValidationErrors;

pub mod identity;
pub mod store;
pub mod sync;
pub mod todo;

#[cfg(test)]
pub(crate) mod test_util;

#[derive(Error, Debug)]
pub enum Error {
    #[error("input was invalid: {0}")]
    Invalid(ValidationErrors),
    #[error("no user is signed in")]
    NotSignedIn,
    #[error("failed to {action} due to a communication failure: {cause}")]
    RetrieveFailure {
        action: String,
        #[source]
        cause: anyhow::Error,
    },
}

impl From<ValidationErrors> for Error {
    fn from(value: ValidationErrors) -> Self {
        Self::Invalid(value)
    }
}

impl Error {
    /// Wraps a driven port failure with some extra info on the [action] being taken when
    /// communicating over the port
    pub(crate) fn trying_to(action: &str, cause: anyhow::Error) -> Error {
        Error::RetrieveFailure {
            action: action.into(),
            cause,
        }
    }
}
