use crate::stmt::Instance;
use crate::{async_trait, Result};

use std::fmt::Debug;

/// A backend-specific realization of exactly one query snapshot.
///
/// Compiled once per `Query` instance and cached there; the terminal
/// operations may each be called, but the plan underneath never changes.
#[async_trait]
pub trait CompiledQuery: Debug + Send + Sync + 'static {
    /// Number of matching records.
    async fn count(&self) -> Result<u64>;

    /// All matching records, materialized.
    async fn all(&self) -> Result<Vec<Instance>>;

    /// Delete matching records, returning how many went away.
    async fn delete(&self) -> Result<u64>;
}
