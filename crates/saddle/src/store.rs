use crate::ConnectionKind;

use saddle_core::driver::{Capability, Driver, QueryOp};

use std::fmt;
use std::sync::Arc;

/// A connected backend store: one driver instance plus the descriptor it was
/// resolved from. Cloning shares the connection.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    id: StoreId,
    url: String,
    kind: ConnectionKind,
    driver: Arc<dyn Driver>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub usize);

impl Store {
    pub(crate) fn new(
        id: StoreId,
        url: impl Into<String>,
        kind: ConnectionKind,
        driver: Arc<dyn Driver>,
    ) -> Store {
        Store {
            inner: Arc::new(StoreInner {
                id,
                url: url.into(),
                kind,
                driver,
            }),
        }
    }

    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn kind(&self) -> ConnectionKind {
        self.inner.kind
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.inner.driver
    }

    pub fn capability(&self) -> &Capability {
        self.inner.driver.capability()
    }

    pub fn has_query(&self, op: QueryOp) -> bool {
        self.inner.driver.has_query(op)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url)
            .field("kind", &self.inner.kind)
            .finish()
    }
}
