use super::Error;

/// Error for an invalid relationship or key declaration.
///
/// This occurs when:
/// - Two relations on one target share a `related_name`
/// - A composite key names fewer than two fields, or an undeclared field
/// - A relation target never registered and the schema was verified
///
/// Field errors are raised while the schema is built and are fatal: the
/// application fails before it serves traffic.
#[derive(Debug)]
pub(super) struct FieldError {
    message: Box<str>,
}

impl std::error::Error for FieldError {}

impl core::fmt::Display for FieldError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "field error: {}", self.message)
    }
}

impl Error {
    /// Creates a field declaration error.
    pub fn field(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::Field(FieldError {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is a field declaration error.
    pub fn is_field(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Field(_))
    }
}
