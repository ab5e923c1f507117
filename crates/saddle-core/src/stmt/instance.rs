use super::Value;
use crate::schema::ModelId;

use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A runtime entity record.
///
/// Instances are cheap-to-clone shared handles: the engine hands the same
/// record to a transaction and back to the caller, so a committed insert is
/// observable through every clone (generated key populated, dirty set
/// cleared). The inner mutex guards only field access; it is never held
/// across an await point.
#[derive(Clone)]
pub struct Instance {
    shared: Arc<Mutex<InstanceData>>,
}

#[derive(Debug)]
struct InstanceData {
    model: ModelId,

    /// Field values, keyed by app-level field name.
    values: IndexMap<String, Value>,

    /// App-level names of fields changed since the last successful write.
    dirty: HashSet<String>,

    /// Store-assigned revision marker. Present on records that exist in the
    /// store; its absence is what makes a mutation an insert.
    revision: Option<String>,

    /// Eagerly loaded related instances, by relation field name.
    related: IndexMap<String, Instance>,
}

impl Instance {
    /// A new, unsaved instance of the given model.
    pub fn new(model: ModelId) -> Instance {
        Instance {
            shared: Arc::new(Mutex::new(InstanceData {
                model,
                values: IndexMap::new(),
                dirty: HashSet::new(),
                revision: None,
                related: IndexMap::new(),
            })),
        }
    }

    /// A new, unsaved instance populated with the given values. Every value
    /// starts dirty.
    pub fn from_values<K, V>(model: ModelId, values: impl IntoIterator<Item = (K, V)>) -> Instance
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let instance = Instance::new(model);
        for (name, value) in values {
            instance.set(name, value);
        }
        instance
    }

    /// An instance restored from the store: clean, carrying the store's
    /// revision marker. Drivers build these when materializing rows.
    pub fn restored(
        model: ModelId,
        values: IndexMap<String, Value>,
        revision: impl Into<String>,
    ) -> Instance {
        Instance {
            shared: Arc::new(Mutex::new(InstanceData {
                model,
                values,
                dirty: HashSet::new(),
                revision: Some(revision.into()),
                related: IndexMap::new(),
            })),
        }
    }

    pub fn model(&self) -> ModelId {
        self.lock().model
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.lock().values.get(field).cloned()
    }

    /// Sets a field value and marks the field dirty.
    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let mut data = self.lock();
        data.values.insert(field.clone(), value.into());
        data.dirty.insert(field);
    }

    /// The store-assigned revision marker, if the record has been written.
    pub fn revision(&self) -> Option<String> {
        self.lock().revision.clone()
    }

    pub fn is_persisted(&self) -> bool {
        self.lock().revision.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        !self.lock().dirty.is_empty()
    }

    pub fn dirty_fields(&self) -> Vec<String> {
        let mut fields: Vec<_> = self.lock().dirty.iter().cloned().collect();
        fields.sort();
        fields
    }

    /// A copy of all field values, by app-level name.
    pub fn values(&self) -> IndexMap<String, Value> {
        self.lock().values.clone()
    }

    /// An eagerly loaded related instance, if the query requested one.
    pub fn related(&self, field: &str) -> Option<Instance> {
        self.lock().related.get(field).cloned()
    }

    /// Attaches an eagerly loaded related instance. Called by drivers.
    pub fn attach_related(&self, field: impl Into<String>, related: Instance) {
        self.lock().related.insert(field.into(), related);
    }

    /// Applies the outcome of a committed write: generated key values, the
    /// new revision marker, and a clean dirty set.
    pub fn apply_committed(
        &self,
        key_field: &str,
        key: Value,
        revision: Option<String>,
    ) {
        let mut data = self.lock();
        if !data.values.contains_key(key_field) || data.values[key_field].is_null() {
            data.values.insert(key_field.to_string(), key);
        }
        data.revision = revision;
        data.dirty.clear();
    }

    /// Marks the record as removed from the store.
    pub fn apply_deleted(&self) {
        let mut data = self.lock();
        data.revision = None;
        data.dirty.clear();
    }

    /// Two handles referring to the same underlying record.
    pub fn same_record(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InstanceData> {
        self.shared.lock().expect("instance mutex poisoned")
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.lock();
        f.debug_struct("Instance")
            .field("model", &data.model)
            .field("values", &data.values)
            .field("dirty", &data.dirty)
            .field("revision", &data.revision)
            .finish()
    }
}
