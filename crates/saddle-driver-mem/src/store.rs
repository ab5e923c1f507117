use saddle_core::schema::ModelId;
use saddle_core::stmt::Value;

use indexmap::IndexMap;
use std::collections::HashMap;

/// The whole store state. Cloned wholesale to stage a transaction batch;
/// the clone replaces the live state only when every command applied.
#[derive(Debug, Default, Clone)]
pub(crate) struct Tables {
    tables: HashMap<ModelId, IndexMap<String, Row>>,
}

/// One stored record. The map key is the primary key's stable string form;
/// `key` keeps the typed value.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub(crate) key: Value,
    pub(crate) revision: String,

    /// Column values, by storage name.
    pub(crate) columns: IndexMap<String, Value>,
}

impl Tables {
    pub(crate) fn table(&self, model: ModelId) -> Option<&IndexMap<String, Row>> {
        self.tables.get(&model)
    }

    pub(crate) fn table_mut(&mut self, model: ModelId) -> &mut IndexMap<String, Row> {
        self.tables.entry(model).or_default()
    }

    pub(crate) fn create(&mut self, model: ModelId, remove_existing: bool) {
        if remove_existing {
            self.tables.insert(model, IndexMap::new());
        } else {
            self.tables.entry(model).or_default();
        }
    }

    pub(crate) fn drop(&mut self, model: ModelId) {
        self.tables.remove(&model);
    }
}
