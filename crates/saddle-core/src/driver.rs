mod capability;
pub use capability::{Capability, QueryOp};

mod command;
pub use command::{Action, CommandResult, StoreCommand};

mod compiled;
pub use compiled::CompiledQuery;

use crate::{
    async_trait,
    schema::{FieldTy, ModelId, Schema},
    stmt::{Instance, QueryPlan, Value},
    Error, Result,
};

use indexmap::IndexMap;
use std::{fmt::Debug, sync::Arc};

/// The store capability contract.
///
/// A driver binds one backend. The engine is agnostic to what the backend
/// actually is; it only requires these primitives, and consults
/// [`Capability`] before sending anything the backend cannot answer.
#[async_trait]
pub trait Driver: Debug + Send + Sync + 'static {
    /// Describes the driver's capability, which informs plan compilation.
    fn capability(&self) -> &Capability;

    /// Whether the store answers the given query operation.
    fn has_query(&self, op: QueryOp) -> bool {
        self.capability().supports(op)
    }

    /// Realize one query plan into a backend-specific execution plan.
    async fn compile_query(
        &self,
        schema: &Arc<Schema>,
        plan: QueryPlan,
    ) -> Result<Arc<dyn CompiledQuery>>;

    /// Fetch one record by primary key. Absence is a `ModelNotFound` error.
    async fn get_model(
        &self,
        schema: &Arc<Schema>,
        model: ModelId,
        key: &Value,
    ) -> Result<Instance>;

    /// Execute a batch of commands atomically: either every command in the
    /// batch is applied, or none are observable. Results map back to the
    /// commands by index.
    async fn execute_transaction(
        &self,
        schema: &Arc<Schema>,
        commands: Vec<StoreCommand>,
    ) -> Result<Vec<CommandResult>>;

    /// Serialize an instance into its store payload, inferring insert vs
    /// update from the revision marker when no action is given.
    ///
    /// The provided implementation covers schema-driven serialization;
    /// drivers override it only when the backend stores records in some
    /// other shape.
    fn model_data(
        &self,
        schema: &Schema,
        instance: &Instance,
        action: Option<Action>,
    ) -> Result<(IndexMap<String, Value>, Action)> {
        model_data(schema, instance, action)
    }

    /// Materialize backend schema for one model. Stores without schema
    /// treat this as a no-op.
    async fn create_table(
        &self,
        _schema: &Arc<Schema>,
        _model: ModelId,
        _remove_existing: bool,
    ) -> Result<()> {
        Ok(())
    }

    /// Drop backend schema for one model. Stores without schema treat this
    /// as a no-op.
    async fn drop_table(&self, _schema: &Arc<Schema>, _model: ModelId) -> Result<()> {
        Ok(())
    }
}

/// Schema-driven payload serialization, shared by drivers.
///
/// Composite key fields are skipped (their components serialize on their
/// own); deletes carry no payload at all.
pub fn model_data(
    schema: &Schema,
    instance: &Instance,
    action: Option<Action>,
) -> Result<(IndexMap<String, Value>, Action)> {
    let action = action.unwrap_or_else(|| {
        if instance.is_persisted() {
            Action::Update
        } else {
            Action::Insert
        }
    });

    let mut payload = IndexMap::new();
    if action == Action::Delete {
        return Ok((payload, action));
    }

    let model = schema.model(instance.model());
    for field in &model.fields {
        if matches!(field.ty, FieldTy::CompositeId(_)) {
            continue;
        }
        if let Some(value) = instance.get(&field.name.app_name) {
            payload.insert(
                field.name.storage_name().to_string(),
                field.to_store(&value).map_err(|err| {
                    Error::query(format!(
                        "cannot serialize `{}.{}`: {err}",
                        model.name.original(),
                        field.name.app_name
                    ))
                })?,
            );
        }
    }

    Ok((payload, action))
}
