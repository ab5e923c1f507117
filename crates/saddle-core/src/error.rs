mod driver_operation_failed;
mod field;
mod invalid_connection_url;
mod invalid_operation;
mod model_not_found;
mod query;
mod unsupported_feature;

use driver_operation_failed::DriverOperationFailed;
use field::FieldError;
use invalid_connection_url::InvalidConnectionUrl;
use invalid_operation::InvalidOperation;
use model_not_found::ModelNotFound;
use query::QueryError;
use unsupported_feature::UnsupportedFeature;

use std::sync::Arc;

/// An error that can occur in Saddle.
#[derive(Clone)]
pub struct Error {
    kind: Arc<ErrorKind>,
}

#[derive(Debug)]
enum ErrorKind {
    /// Malformed filter, unknown field, or an operation the store cannot
    /// answer. Surfaced to the caller, never retried.
    Query(QueryError),

    /// Invalid relationship or key declaration. Raised while the schema is
    /// being built, before the application serves traffic.
    Field(FieldError),

    /// A lookup by key or query returned nothing where a record was required.
    ModelNotFound(ModelNotFound),

    /// Illegal state transition, such as re-committing an executed
    /// transaction.
    InvalidOperation(InvalidOperation),

    /// The store's capability does not cover the requested plan.
    UnsupportedFeature(UnsupportedFeature),

    /// A connection descriptor that could not be parsed at all.
    InvalidConnectionUrl(InvalidConnectionUrl),

    /// Transport or protocol failure inside a store driver, propagated
    /// unmodified.
    Driver(DriverOperationFailed),

    /// Bridge for foreign errors.
    Anyhow(anyhow::Error),
}

impl Error {
    fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Driver(err) => err.source(),
            ErrorKind::Anyhow(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        core::fmt::Display::fmt(self.kind(), f)
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            f.debug_struct("Error").field("kind", &self.kind).finish()
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::ErrorKind::*;

        match self {
            Query(err) => core::fmt::Display::fmt(err, f),
            Field(err) => core::fmt::Display::fmt(err, f),
            ModelNotFound(err) => core::fmt::Display::fmt(err, f),
            InvalidOperation(err) => core::fmt::Display::fmt(err, f),
            UnsupportedFeature(err) => core::fmt::Display::fmt(err, f),
            InvalidConnectionUrl(err) => core::fmt::Display::fmt(err, f),
            Driver(err) => core::fmt::Display::fmt(err, f),
            Anyhow(err) => core::fmt::Display::fmt(err, f),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            kind: Arc::new(kind),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::from(ErrorKind::Anyhow(err))
    }
}
