use super::Error;

/// Error for a malformed filter expression, an unknown field name, or an
/// operation the bound store does not answer.
#[derive(Debug)]
pub(super) struct QueryError {
    message: Box<str>,
}

impl std::error::Error for QueryError {}

impl core::fmt::Display for QueryError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "query error: {}", self.message)
    }
}

impl Error {
    /// Creates a query error.
    pub fn query(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Query(QueryError {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a query error.
    pub fn is_query(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Query(_))
    }
}
