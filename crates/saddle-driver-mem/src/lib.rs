mod eval;
mod store;

use store::{Row, Tables};

use saddle_core::driver::{
    Action, Capability, CommandResult, CompiledQuery, Driver, StoreCommand,
};
use saddle_core::schema::{Model, ModelId, Schema};
use saddle_core::stmt::{Instance, QueryPlan, Value};
use saddle_core::{async_trait, Error, Result};

use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use url::Url;

/// An in-memory store driver.
///
/// Ships in two flavors: a full-featured document store, and a key-value
/// store with the capability gaps typical of flat NoSQL backends (single
/// field per plan, no schema, no eager loading). Registered under the
/// `mem` scheme; two managers sharing one connection descriptor share the
/// row state.
pub struct Mem {
    namespace: String,
    capability: &'static Capability,
    tables: Arc<Mutex<Tables>>,
}

impl Mem {
    pub const SCHEME: &'static str = "mem";

    /// A full-featured document store.
    pub fn document() -> Mem {
        Mem {
            namespace: "mem".to_string(),
            capability: &Capability::DOCUMENT,
            tables: Arc::new(Mutex::new(Tables::default())),
        }
    }

    /// A flat key-value store with restricted capability.
    pub fn key_value() -> Mem {
        Mem {
            capability: &Capability::KEY_VALUE,
            ..Mem::document()
        }
    }

    /// Create a driver from a connection descriptor. The host names the
    /// namespace; `?flavor=kv` selects the key-value flavor:
    /// `mem://main`, `mem://cache?flavor=kv`.
    pub fn connect(url: &Url) -> Result<Mem> {
        if url.scheme() != Self::SCHEME {
            return Err(Error::invalid_connection_url(format!(
                "connection URL does not have a `{}` scheme; url={url}",
                Self::SCHEME
            )));
        }

        let flavor = url
            .query_pairs()
            .find(|(key, _)| key == "flavor")
            .map(|(_, value)| value.to_string());

        let mut driver = match flavor.as_deref() {
            None | Some("document") => Mem::document(),
            Some("kv") | Some("key_value") => Mem::key_value(),
            Some(other) => {
                return Err(Error::invalid_connection_url(format!(
                    "unknown mem flavor `{other}`; url={url}"
                )))
            }
        };
        if let Some(host) = url.host_str() {
            driver.namespace = host.to_string();
        }

        Ok(driver)
    }
}

#[async_trait]
impl Driver for Mem {
    fn capability(&self) -> &Capability {
        self.capability
    }

    async fn compile_query(
        &self,
        schema: &Arc<Schema>,
        plan: QueryPlan,
    ) -> Result<Arc<dyn CompiledQuery>> {
        Ok(Arc::new(MemQuery {
            tables: self.tables.clone(),
            schema: schema.clone(),
            plan,
        }))
    }

    async fn get_model(
        &self,
        schema: &Arc<Schema>,
        model: ModelId,
        key: &Value,
    ) -> Result<Instance> {
        let tables = self.lock();
        let model = schema.model(model);
        let row = tables
            .table(model.id)
            .and_then(|table| table.get(&key.storage_key()))
            .ok_or_else(|| {
                Error::model_not_found(format!(
                    "{} key={}",
                    model.name.original(),
                    key.storage_key()
                ))
            })?;
        Ok(materialize(model, row))
    }

    async fn execute_transaction(
        &self,
        schema: &Arc<Schema>,
        commands: Vec<StoreCommand>,
    ) -> Result<Vec<CommandResult>> {
        // Stage the whole batch against a copy of the store and swap it in
        // only when every command applied. A failure anywhere leaves the
        // live state untouched.
        let mut guard = self.lock();
        let mut staged = guard.clone();
        let mut results = Vec::with_capacity(commands.len());

        for command in commands {
            let model = schema.model(command.model);
            let result = apply(&mut staged, model, command)?;
            results.push(result);
        }

        *guard = staged;
        Ok(results)
    }

    async fn create_table(
        &self,
        _schema: &Arc<Schema>,
        model: ModelId,
        remove_existing: bool,
    ) -> Result<()> {
        if !self.capability.schema_ddl {
            return Ok(());
        }
        self.lock().create(model, remove_existing);
        Ok(())
    }

    async fn drop_table(&self, _schema: &Arc<Schema>, model: ModelId) -> Result<()> {
        if !self.capability.schema_ddl {
            return Ok(());
        }
        Tables::drop(&mut self.lock(), model);
        Ok(())
    }
}

impl Mem {
    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("mem store mutex poisoned")
    }
}

impl fmt::Debug for Mem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mem")
            .field("namespace", &self.namespace)
            .field("key_value", &!self.capability.multi_field_filter)
            .finish()
    }
}

/// A compiled plan: one query snapshot bound to the live row state.
struct MemQuery {
    tables: Arc<Mutex<Tables>>,
    schema: Arc<Schema>,
    plan: QueryPlan,
}

#[async_trait]
impl CompiledQuery for MemQuery {
    async fn count(&self) -> Result<u64> {
        let tables = self.lock();
        let keys = eval::matching_keys(&tables, &self.schema, &self.plan)?;
        Ok(keys.len() as u64)
    }

    async fn all(&self) -> Result<Vec<Instance>> {
        let tables = self.lock();
        let keys = eval::matching_keys(&tables, &self.schema, &self.plan)?;
        let model = self.schema.model(self.plan.model);
        let table = tables.table(model.id);

        let mut instances = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(row) = table.and_then(|table| table.get(key)) {
                instances.push(materialize(model, row));
            }
        }

        for path in &self.plan.load_related {
            self.eager_load(&tables, model, path, &instances);
        }

        Ok(instances)
    }

    async fn delete(&self) -> Result<u64> {
        let mut tables = self.lock();
        let keys = eval::matching_keys(&tables, &self.schema, &self.plan)?;
        let table = tables.table_mut(self.plan.model);
        let mut removed = 0;
        for key in &keys {
            if table.shift_remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl MemQuery {
    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("mem store mutex poisoned")
    }

    /// Attach the related record behind a foreign key path to each
    /// materialized instance. Paths were validated during plan compilation.
    fn eager_load(&self, tables: &Tables, model: &Model, path: &str, instances: &[Instance]) {
        let head = path.split("__").next().unwrap_or(path);
        let Some(field) = model.field_by_name(head) else {
            return;
        };
        let Some(target_id) = field
            .ty
            .as_foreign_key()
            .and_then(|fk| fk.target.resolved())
        else {
            return;
        };
        let target = self.schema.model(target_id);

        for instance in instances {
            let Some(fk_value) = instance.get(head) else {
                continue;
            };
            if fk_value.is_null() {
                continue;
            }
            if let Some(row) = tables
                .table(target_id)
                .and_then(|table| table.get(&fk_value.storage_key()))
            {
                instance.attach_related(head, materialize(target, row));
            }
        }
    }
}

impl fmt::Debug for MemQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemQuery")
            .field("plan", &self.plan)
            .finish()
    }
}

/// Applies one command to the staged state.
fn apply(staged: &mut Tables, model: &Model, command: StoreCommand) -> Result<CommandResult> {
    match command.action {
        Action::Insert => insert(staged, model, command),
        Action::Update => update(staged, model, command),
        Action::Delete => delete(staged, model, command),
    }
}

fn insert(staged: &mut Tables, model: &Model, command: StoreCommand) -> Result<CommandResult> {
    let mut payload = command.payload;

    let key = match command.key {
        Some(key) => key,
        None => {
            if model.primary_key.is_composite() {
                return Err(Error::invalid_operation(format!(
                    "composite key on `{}` must be assigned before insert",
                    model.name.original()
                )));
            }
            // Store-generated key.
            let generated = Value::from(uuid::Uuid::new_v4().to_string());
            let pk_storage = model
                .primary_key_fields()
                .next()
                .expect("model without primary key")
                .name
                .storage_name()
                .to_string();
            payload.insert(pk_storage, generated.clone());
            generated
        }
    };

    check_unique(staged, model, &payload, None)?;

    let table = staged.table_mut(model.id);
    let storage_key = key.storage_key();
    if table.contains_key(&storage_key) {
        return Err(Error::driver_operation_failed(ConstraintViolation {
            message: format!(
                "duplicate key `{}` on `{}`",
                storage_key,
                model.name.original()
            ),
        }));
    }

    let revision = next_revision();
    table.insert(
        storage_key,
        Row {
            key: key.clone(),
            revision: revision.clone(),
            columns: payload,
        },
    );
    log::debug!("mem: inserted `{}` key={}", model.name.original(), key.storage_key());

    Ok(CommandResult {
        index: command.index,
        key,
        revision: Some(revision),
    })
}

fn update(staged: &mut Tables, model: &Model, command: StoreCommand) -> Result<CommandResult> {
    let key = command.key.expect("update command without key");
    let storage_key = key.storage_key();

    check_unique(staged, model, &command.payload, Some(&storage_key))?;

    let table = staged.table_mut(model.id);
    let Some(row) = table.get_mut(&storage_key) else {
        return Err(Error::model_not_found(format!(
            "{} key={storage_key}",
            model.name.original()
        )));
    };

    for (column, value) in command.payload {
        row.columns.insert(column, value);
    }
    row.revision = next_revision();
    let revision = row.revision.clone();

    Ok(CommandResult {
        index: command.index,
        key,
        revision: Some(revision),
    })
}

fn delete(staged: &mut Tables, model: &Model, command: StoreCommand) -> Result<CommandResult> {
    let key = command.key.expect("delete command without key");
    let storage_key = key.storage_key();

    let table = staged.table_mut(model.id);
    if table.shift_remove(&storage_key).is_none() {
        return Err(Error::model_not_found(format!(
            "{} key={storage_key}",
            model.name.original()
        )));
    }

    Ok(CommandResult {
        index: command.index,
        key,
        revision: None,
    })
}

/// Enforces `unique` field constraints against the staged table. The row
/// being updated (by storage key) is exempt from matching itself.
fn check_unique(
    staged: &Tables,
    model: &Model,
    payload: &IndexMap<String, Value>,
    updating: Option<&str>,
) -> Result<()> {
    let Some(table) = staged.table(model.id) else {
        return Ok(());
    };

    for field in &model.fields {
        if !field.unique || field.primary_key {
            continue;
        }
        let Some(value) = payload.get(field.name.storage_name()) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        for (key, row) in table {
            if updating == Some(key.as_str()) {
                continue;
            }
            if row.columns.get(field.name.storage_name()) == Some(value) {
                return Err(Error::driver_operation_failed(ConstraintViolation {
                    message: format!(
                        "unique constraint on `{}.{}` violated by {value:?}",
                        model.name.original(),
                        field.name.app_name
                    ),
                }));
            }
        }
    }

    Ok(())
}

/// Maps a stored row back into an app-level instance.
fn materialize(model: &Model, row: &Row) -> Instance {
    let mut values = IndexMap::new();
    for field in &model.fields {
        if field.ty.is_composite_id() {
            continue;
        }
        let value = row
            .columns
            .get(field.name.storage_name())
            .cloned()
            .unwrap_or(Value::Null);
        values.insert(field.name.app_name.clone(), value);
    }
    Instance::restored(model.id, values, row.revision.clone())
}

fn next_revision() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug)]
struct ConstraintViolation {
    message: String,
}

impl std::error::Error for ConstraintViolation {}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
