use super::Error;

/// Error when a lookup by key or query returns no record where one was
/// required. Expected and recoverable; upstream layers typically map it to a
/// "not found" response.
#[derive(Debug)]
pub(super) struct ModelNotFound {
    context: Box<str>,
}

impl std::error::Error for ModelNotFound {}

impl core::fmt::Display for ModelNotFound {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "model not found: {}", self.context)
    }
}

impl Error {
    /// Creates a model-not-found error.
    pub fn model_not_found(context: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::ModelNotFound(ModelNotFound {
            context: context.into().into(),
        }))
    }

    /// Returns `true` if this error is a model-not-found error.
    pub fn is_model_not_found(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::ModelNotFound(_))
    }
}
