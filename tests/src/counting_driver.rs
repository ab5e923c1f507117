use saddle_core::driver::{Capability, CommandResult, CompiledQuery, Driver, StoreCommand};
use saddle_core::schema::{ModelId, Schema};
use saddle_core::stmt::{Instance, QueryPlan, Value};
use saddle_core::{async_trait, Result};

use std::sync::{Arc, Mutex};

/// A driver wrapper that records every store boundary call, so tests can
/// assert which operations a scenario actually dispatched.
#[derive(Debug)]
pub struct CountingDriver {
    inner: Arc<dyn Driver>,
    capability: Option<Capability>,
    ops: Arc<Mutex<Vec<String>>>,
}

impl CountingDriver {
    pub fn new(inner: Arc<dyn Driver>) -> CountingDriver {
        CountingDriver {
            inner,
            capability: None,
            ops: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Overrides the advertised capability, for exercising engine-side
    /// capability checks against an otherwise full-featured store.
    pub fn with_capability(inner: Arc<dyn Driver>, capability: Capability) -> CountingDriver {
        CountingDriver {
            inner,
            capability: Some(capability),
            ops: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A handle to the recorded operation names.
    pub fn ops_handle(&self) -> Arc<Mutex<Vec<String>>> {
        self.ops.clone()
    }

    fn record(&self, op: &str) {
        self.ops.lock().unwrap().push(op.to_string());
    }
}

#[async_trait]
impl Driver for CountingDriver {
    fn capability(&self) -> &Capability {
        match &self.capability {
            Some(capability) => capability,
            None => self.inner.capability(),
        }
    }

    async fn compile_query(
        &self,
        schema: &Arc<Schema>,
        plan: QueryPlan,
    ) -> Result<Arc<dyn CompiledQuery>> {
        self.record("compile_query");
        self.inner.compile_query(schema, plan).await
    }

    async fn get_model(
        &self,
        schema: &Arc<Schema>,
        model: ModelId,
        key: &Value,
    ) -> Result<Instance> {
        self.record("get_model");
        self.inner.get_model(schema, model, key).await
    }

    async fn execute_transaction(
        &self,
        schema: &Arc<Schema>,
        commands: Vec<StoreCommand>,
    ) -> Result<Vec<CommandResult>> {
        self.record("execute_transaction");
        self.inner.execute_transaction(schema, commands).await
    }

    async fn create_table(
        &self,
        schema: &Arc<Schema>,
        model: ModelId,
        remove_existing: bool,
    ) -> Result<()> {
        self.record("create_table");
        self.inner
            .create_table(schema, model, remove_existing)
            .await
    }

    async fn drop_table(&self, schema: &Arc<Schema>, model: ModelId) -> Result<()> {
        self.record("drop_table");
        self.inner.drop_table(schema, model).await
    }
}
