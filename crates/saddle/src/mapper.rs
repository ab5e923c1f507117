use crate::{
    Error, Manager, Query, Result, SchemeRegistry, Store, StoreId, Transaction, TransactionState,
};

use saddle_core::driver::{Action, StoreCommand};
use saddle_core::schema::{Builder, Model, ModelDecl, ModelId, Name, Schema};
use saddle_core::stmt::Instance;

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// The process-wide registry binding models to stores.
///
/// Registration happens once at application bootstrap; after that the
/// mapper is effectively read-only and shared freely across tasks. Every
/// store boundary call (`commit`, `flush`, schema DDL, query terminals) is
/// a suspension point; the mapper itself performs no I/O and holds no
/// locks.
#[derive(Debug, Default)]
pub struct Mapper {
    schemes: SchemeRegistry,

    /// Connected stores, by connection descriptor. Registering two models
    /// against the same descriptor shares one store.
    stores: IndexMap<String, Store>,

    /// Collected declarations; append-only, so ids stay stable.
    builder: Builder,

    /// The linked schema, rebuilt after each registration batch.
    schema: Arc<Schema>,

    /// Type index: one manager per registered model.
    managers: IndexMap<ModelId, Manager>,

    /// Name index, by normalized model name.
    by_name: HashMap<String, ModelId>,

    next_store: usize,
}

/// An explicit application declaration list: the models one application
/// contributes and the store they default to.
#[derive(Debug)]
pub struct Application {
    pub name: String,
    pub store: String,
    pub models: Vec<ModelDecl>,
}

/// Per-application and per-model store overrides applied during
/// [`Mapper::register_applications`].
#[derive(Debug, Default)]
pub struct StoreOverrides {
    by_app: HashMap<String, String>,
    by_model: HashMap<String, String>,
}

impl StoreOverrides {
    pub fn new() -> StoreOverrides {
        StoreOverrides::default()
    }

    pub fn app(mut self, app: impl Into<String>, store: impl Into<String>) -> StoreOverrides {
        self.by_app.insert(app.into(), store.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>, store: impl Into<String>) -> StoreOverrides {
        self.by_model.insert(model.into(), store.into());
        self
    }
}

impl Mapper {
    pub fn new() -> Mapper {
        Mapper::default()
    }

    pub fn with_schemes(schemes: SchemeRegistry) -> Mapper {
        Mapper {
            schemes,
            ..Mapper::default()
        }
    }

    pub fn schemes_mut(&mut self) -> &mut SchemeRegistry {
        &mut self.schemes
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Strict link check over everything registered so far. Call once
    /// bootstrap is complete; schema DDL runs it implicitly.
    pub fn verify(&self) -> Result<()> {
        self.schema.verify()
    }

    /// Registers model declarations against a store.
    ///
    /// Declarations already registered are silently skipped, which makes
    /// the call idempotent. A descriptor with an unrecognized scheme skips
    /// store creation (and with it this batch) rather than failing, so
    /// mixed deployments can offer one descriptor per driver family.
    /// Returns the ids of the models this call registered, including
    /// synthesized through models.
    pub fn register(&mut self, models: Vec<ModelDecl>, store_url: &str) -> Result<Vec<ModelId>> {
        let Some(store) = self.store_for(store_url)? else {
            log::warn!("unrecognized connection scheme, skipping registration: {store_url}");
            return Ok(vec![]);
        };

        let mut fresh: Vec<String> = vec![];
        for decl in models {
            let name_key = Name::new(decl.name()).snake_case();
            if let Some(id) = self.by_name.get(&name_key) {
                if self.managers.contains_key(id) {
                    log::debug!("model `{}` already registered, skipping", decl.name());
                    continue;
                }
            }
            fresh.push(decl.name().to_string());
            if !self.builder.contains(decl.name()) {
                self.builder.push(decl)?;
            }
        }

        self.relink()?;

        let schema = self.schema.clone();
        let mut registered = vec![];
        for model in schema.models() {
            if self.managers.contains_key(&model.id) {
                continue;
            }

            let model_store = if model.synthesized {
                // Through models follow their owner's store.
                match self.owner_store(&schema, model) {
                    Some(store) => store,
                    None => continue,
                }
            } else if fresh.iter().any(|name| name == model.name.original()) {
                store.clone()
            } else {
                continue;
            };

            log::debug!(
                "registered `{}` against `{}`",
                model.name.original(),
                model_store.url()
            );
            self.managers
                .insert(model.id, Manager::new(model.id, schema.clone(), model_store));
            self.by_name.insert(model.name.snake_case(), model.id);
            registered.push(model.id);
        }

        Ok(registered)
    }

    /// Registers explicit application declaration lists, applying
    /// per-application and per-model store overrides before delegating to
    /// [`Mapper::register`].
    pub fn register_applications(
        &mut self,
        applications: Vec<Application>,
        overrides: Option<&StoreOverrides>,
    ) -> Result<Vec<ModelId>> {
        let mut registered = vec![];
        for app in applications {
            let app_store = overrides
                .and_then(|o| o.by_app.get(&app.name))
                .cloned()
                .unwrap_or_else(|| app.store.clone());

            for decl in app.models {
                let model_store = overrides
                    .and_then(|o| o.by_model.get(decl.name()))
                    .cloned()
                    .unwrap_or_else(|| app_store.clone());
                let decl = decl.app(app.name.clone());
                registered.extend(self.register(vec![decl], &model_store)?);
            }
        }
        Ok(registered)
    }

    /// Removes one manager, or all of them with `None`. The name index
    /// entry goes with it when it is the canonical one. Returns the removed
    /// ids, or `None` when nothing was removed.
    pub fn unregister(&mut self, model: Option<ModelId>) -> Option<Vec<ModelId>> {
        match model {
            Some(id) => {
                self.managers.shift_remove(&id)?;
                let name = self.schema.model(id).name.snake_case();
                if self.by_name.get(&name) == Some(&id) {
                    self.by_name.remove(&name);
                }
                Some(vec![id])
            }
            None => {
                if self.managers.is_empty() {
                    return None;
                }
                let ids = self.managers.keys().copied().collect();
                self.managers.clear();
                self.by_name.clear();
                Some(ids)
            }
        }
    }

    /// Type-index lookup.
    pub fn manager(&self, model: impl Into<ModelId>) -> Option<&Manager> {
        self.managers.get(&model.into())
    }

    /// Name-index lookup, by normalized model name.
    pub fn by_name(&self, name: &str) -> Option<&Manager> {
        self.by_name.get(name).and_then(|id| self.managers.get(id))
    }

    /// Name-index lookup that panics on absence, for bootstrap-checked
    /// call sites.
    #[track_caller]
    pub fn expect(&self, name: &str) -> &Manager {
        match self.by_name(name) {
            Some(manager) => manager,
            None => panic!("no manager registered under `{name}`"),
        }
    }

    pub fn managers(&self) -> impl Iterator<Item = &Manager> {
        self.managers.values()
    }

    /// A new transaction bound to this mapper.
    pub fn begin(&self) -> Transaction {
        Transaction::new()
    }

    /// Commits a transaction: commands are grouped by target store in
    /// insertion order, each store's batch executes atomically with one
    /// call, and committed results are applied back to the instances.
    ///
    /// Cross-store commits are best-effort, not two-phase: when a later
    /// store's batch fails, batches already committed to earlier stores are
    /// not rolled back. The transaction transitions to `Failed` and the
    /// error names the failing store; callers needing stronger guarantees
    /// must keep a transaction on a single store or compensate above this
    /// layer.
    pub async fn commit(&self, transaction: &mut Transaction) -> Result<()> {
        match transaction.state() {
            TransactionState::Created => {}
            state => {
                return Err(Error::invalid_operation(format!(
                    "transaction was already executed (state {state:?})"
                )))
            }
        }

        // Serialize every command up front, grouped by store in first-use
        // order. A store with no commands is never contacted.
        let mut groups: IndexMap<StoreId, (Store, Vec<StoreCommand>)> = IndexMap::new();
        let mut handles: Vec<(Instance, Action)> = Vec::with_capacity(transaction.len());

        for (index, command) in transaction.commands().iter().enumerate() {
            let manager = self.manager(command.instance.model()).ok_or_else(|| {
                Error::invalid_operation(format!(
                    "transaction holds an instance of unregistered model {:?}",
                    command.instance.model()
                ))
            })?;
            let model = manager.model();
            let store = manager.store();

            let (payload, action) =
                store
                    .driver()
                    .model_data(&self.schema, &command.instance, Some(command.action))?;
            let key = model.primary_key_value(&command.instance);
            if key.is_none() && action != Action::Insert {
                return Err(Error::invalid_operation(format!(
                    "cannot {} `{}` instance without a primary key",
                    action.as_str(),
                    model.name.original()
                )));
            }

            groups
                .entry(store.id())
                .or_insert_with(|| (store.clone(), vec![]))
                .1
                .push(StoreCommand {
                    index,
                    model: model.id,
                    action,
                    key,
                    payload,
                });
            handles.push((command.instance.clone(), action));
        }

        for (store, commands) in groups.into_values() {
            log::debug!(
                "committing {} command(s) to `{}`",
                commands.len(),
                store.url()
            );

            let results = match store
                .driver()
                .execute_transaction(&self.schema, commands)
                .await
            {
                Ok(results) => results,
                Err(err) => {
                    log::warn!(
                        "store `{}` rejected its batch; earlier stores in this \
                         transaction stay committed: {err}",
                        store.url()
                    );
                    transaction.set_state(TransactionState::Failed);
                    return Err(err);
                }
            };

            for result in results {
                let (instance, action) = &handles[result.index];
                match action {
                    Action::Delete => instance.apply_deleted(),
                    _ => {
                        let model = self.schema.model(instance.model());
                        instance.apply_committed(
                            model.primary_key_name(),
                            result.key.clone(),
                            result.revision.clone(),
                        );
                    }
                }
                transaction.record_result(result);
            }
        }

        transaction.set_state(TransactionState::Executed);
        Ok(())
    }

    /// Deletes (or, with `dryrun`, counts) every row of every registered
    /// manager, honoring include/exclude lists of normalized model names.
    /// Returns the per-model affected counts.
    pub async fn flush(
        &self,
        exclude: Option<&[&str]>,
        include: Option<&[&str]>,
        dryrun: bool,
    ) -> Result<IndexMap<String, u64>> {
        let mut affected = IndexMap::new();

        for manager in self.managers.values() {
            let name = manager.model().name.snake_case();
            if let Some(include) = include {
                if !include.contains(&name.as_str()) {
                    continue;
                }
            }
            if let Some(exclude) = exclude {
                if exclude.contains(&name.as_str()) {
                    continue;
                }
            }

            let query = manager.query();
            let count = if dryrun {
                query.count().await?
            } else {
                query.delete().await?
            };
            affected.insert(name, count);
        }

        Ok(affected)
    }

    /// Materializes backend schema for every manager. Stores without
    /// schema treat their part as a no-op.
    pub async fn table_create(&self, remove_existing: bool) -> Result<()> {
        self.verify()?;
        for manager in self.managers.values() {
            manager.create_table(remove_existing).await?;
        }
        Ok(())
    }

    /// Drops backend schema for every manager.
    pub async fn table_drop(&self) -> Result<()> {
        for manager in self.managers.values() {
            manager.drop_table().await?;
        }
        Ok(())
    }

    /// Builds a query over a reverse accessor: the records whose foreign
    /// key points at this instance.
    pub fn related(&self, instance: &Instance, accessor: &str) -> Result<Query> {
        let model = self.schema.model(instance.model());
        let reverse = model.reverse_by_name(accessor).ok_or_else(|| {
            Error::query(format!(
                "no reverse accessor `{}` on model `{}`",
                accessor,
                model.name.original()
            ))
        })?;
        let manager = self.manager(reverse.source).ok_or_else(|| {
            Error::invalid_operation(format!(
                "reverse accessor `{}` points at unregistered model {:?}",
                accessor, reverse.source
            ))
        })?;
        let key = model.primary_key_value(instance).ok_or_else(|| {
            Error::invalid_operation(format!(
                "`{}` instance has no primary key yet",
                model.name.original()
            ))
        })?;

        let field = self.schema.field(reverse.source_field);
        Ok(manager.query().filter(&field.name.app_name, key))
    }

    fn store_for(&mut self, url: &str) -> Result<Option<Store>> {
        if let Some(store) = self.stores.get(url) {
            return Ok(Some(store.clone()));
        }

        match self.schemes.connect(url)? {
            Some((kind, driver)) => {
                let store = Store::new(StoreId(self.next_store), url, kind, driver);
                self.next_store += 1;
                log::debug!("connected `{url}` as {kind:?} store {:?}", store.id());
                self.stores.insert(url.to_string(), store.clone());
                Ok(Some(store))
            }
            None => Ok(None),
        }
    }

    /// Rebuilds the linked schema and refreshes every live manager.
    fn relink(&mut self) -> Result<()> {
        let schema = Arc::new(self.builder.build()?);
        for manager in self.managers.values_mut() {
            manager.set_schema(schema.clone());
        }
        self.schema = schema;
        Ok(())
    }

    /// The store a synthesized through model belongs to: its owner's.
    fn owner_store(&self, schema: &Schema, through: &Model) -> Option<Store> {
        for model in schema.models() {
            for m2m in &model.many_to_many {
                if m2m.through == Some(through.id) {
                    return self
                        .managers
                        .get(&model.id)
                        .map(|manager| manager.store().clone());
                }
            }
        }
        None
    }
}
