use super::Error;

/// Transport or protocol failure inside a store driver.
///
/// The core never swallows or retries these; retry policy, if any, belongs
/// to the driver itself.
#[derive(Debug)]
pub(super) struct DriverOperationFailed {
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl DriverOperationFailed {
    pub(super) fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl std::error::Error for DriverOperationFailed {}

impl core::fmt::Display for DriverOperationFailed {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "driver operation failed: {}", self.source)
    }
}

impl Error {
    /// Wraps a driver-level failure.
    pub fn driver_operation_failed(
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Error {
        Error::from(super::ErrorKind::Driver(DriverOperationFailed {
            source: Box::new(source),
        }))
    }

    /// Returns `true` if this error originated inside a store driver.
    pub fn is_driver_operation_failed(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Driver(_))
    }
}
