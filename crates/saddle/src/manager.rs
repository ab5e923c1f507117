use crate::{Error, Query, Result, Store};

use saddle_core::driver::QueryOp;
use saddle_core::schema::{Model, ModelId, Schema};
use saddle_core::stmt::{Instance, Value};

use std::sync::Arc;

/// The per-model facade: binds one model to one store.
///
/// A manager's lifecycle starts at `Mapper::register` and ends at
/// `Mapper::unregister`.
#[derive(Debug)]
pub struct Manager {
    model: ModelId,
    schema: Arc<Schema>,
    store: Store,
}

impl Manager {
    pub(crate) fn new(model: ModelId, schema: Arc<Schema>, store: Store) -> Manager {
        Manager {
            model,
            schema,
            store,
        }
    }

    /// Later registration batches rebuild the schema; the mapper refreshes
    /// every live manager so relations resolved late become visible.
    pub(crate) fn set_schema(&mut self, schema: Arc<Schema>) {
        self.schema = schema;
    }

    pub fn model_id(&self) -> ModelId {
        self.model
    }

    pub fn model(&self) -> &Model {
        self.schema.model(self.model)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// A fresh query over everything this manager holds.
    pub fn query(&self) -> Query {
        Query::new(self.schema.clone(), self.model, self.store.clone())
    }

    /// A new, unsaved instance of this manager's model.
    pub fn new_instance(&self) -> Instance {
        Instance::new(self.model)
    }

    /// A new, unsaved instance populated with the given values.
    pub fn instance<K, V>(&self, values: impl IntoIterator<Item = (K, V)>) -> Instance
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Instance::from_values(self.model, values)
    }

    /// Assigns a related instance to a foreign key field, deriving the
    /// stored id from the related record's primary key.
    pub fn assign(&self, instance: &Instance, field: &str, related: &Instance) -> Result<()> {
        let model = self.model();
        let field = model.field_by_name(field).ok_or_else(|| {
            Error::query(format!(
                "unknown field `{}` on model `{}`",
                field,
                model.name.original()
            ))
        })?;
        let Some(fk) = field.ty.as_foreign_key() else {
            return Err(Error::query(format!(
                "`{}.{}` is not a relation",
                model.name.original(),
                field.name.app_name
            )));
        };
        let Some(target_id) = fk.target.resolved() else {
            return Err(Error::field(format!(
                "relation `{}.{}` targets unregistered model",
                model.name.original(),
                field.name.app_name
            )));
        };
        if related.model() != target_id {
            return Err(Error::query(format!(
                "`{}.{}` expects `{}`, got `{}`",
                model.name.original(),
                field.name.app_name,
                self.schema.model(target_id).name.original(),
                self.schema.model(related.model()).name.original()
            )));
        }

        let target = self.schema.model(target_id);
        let Some(key) = target.primary_key_value(related) else {
            return Err(Error::invalid_operation(format!(
                "related `{}` instance has no primary key yet",
                target.name.original()
            )));
        };

        instance.set(field.name.app_name.clone(), key);
        Ok(())
    }

    /// Fetches one record by primary key. Absence is a `ModelNotFound`
    /// error.
    pub async fn get(&self, key: impl Into<Value>) -> Result<Instance> {
        if !self.store.has_query(QueryOp::Get) {
            return Err(Error::query(format!(
                "store `{}` does not support operation `get`",
                self.store.url()
            )));
        }
        self.store
            .driver()
            .get_model(&self.schema, self.model, &key.into())
            .await
    }

    /// Deletes every record this manager holds, returning the count.
    pub async fn truncate(&self) -> Result<u64> {
        self.query().delete().await
    }

    pub async fn create_table(&self, remove_existing: bool) -> Result<()> {
        self.store
            .driver()
            .create_table(&self.schema, self.model, remove_existing)
            .await
    }

    pub async fn drop_table(&self) -> Result<()> {
        self.store.driver().drop_table(&self.schema, self.model).await
    }
}
