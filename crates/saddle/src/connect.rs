use crate::{Error, Result};

use saddle_core::driver::Driver;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// What family of backend a connection scheme belongs to.
///
/// Resolution is an explicit lookup, never trial-and-error: a scheme the
/// registry does not know is `Unknown`, and registration against an unknown
/// scheme skips store creation instead of failing the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Sql,
    NoSql,
    Unknown,
}

type DriverFactory = dyn Fn(&Url) -> Result<Arc<dyn Driver>> + Send + Sync;

/// Maps connection schemes to driver factories.
///
/// The mapper is agnostic to which concrete driver a scheme resolves to; it
/// only requires the [`Driver`] contract.
#[derive(Default)]
pub struct SchemeRegistry {
    schemes: HashMap<String, (ConnectionKind, Arc<DriverFactory>)>,
}

impl SchemeRegistry {
    pub fn new() -> SchemeRegistry {
        SchemeRegistry::default()
    }

    pub fn register(
        &mut self,
        scheme: impl Into<String>,
        kind: ConnectionKind,
        factory: impl Fn(&Url) -> Result<Arc<dyn Driver>> + Send + Sync + 'static,
    ) {
        self.schemes
            .insert(scheme.into(), (kind, Arc::new(factory)));
    }

    /// The kind a scheme resolves to; `Unknown` when unregistered.
    pub fn kind(&self, scheme: &str) -> ConnectionKind {
        self.schemes
            .get(scheme)
            .map(|(kind, _)| *kind)
            .unwrap_or(ConnectionKind::Unknown)
    }

    /// Resolve a connection descriptor.
    ///
    /// Returns `None` for a descriptor whose scheme is unregistered; the
    /// caller decides whether to skip or fail. A descriptor that is not a
    /// URL at all is an error.
    pub fn connect(&self, url: &str) -> Result<Option<(ConnectionKind, Arc<dyn Driver>)>> {
        let parsed = Url::parse(url)
            .map_err(|err| Error::invalid_connection_url(format!("{url}: {err}")))?;

        match self.schemes.get(parsed.scheme()) {
            Some((kind, factory)) => Ok(Some((*kind, factory(&parsed)?))),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut schemes: Vec<_> = self.schemes.keys().collect();
        schemes.sort();
        f.debug_struct("SchemeRegistry")
            .field("schemes", &schemes)
            .finish()
    }
}
