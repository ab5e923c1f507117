use super::{Field, FieldId, ManyToMany, Name, ReverseRelation};
use crate::stmt::{Instance, Value};

use std::fmt;

#[derive(Debug, Clone)]
pub struct Model {
    /// Uniquely identifies the model within the schema
    pub id: ModelId,

    /// Name of the model
    pub name: Name,

    /// Application label the model belongs to, when registered through an
    /// application list.
    pub app: Option<String>,

    /// Fields contained by the model. Many-to-many declarations are not
    /// fields; they live in `many_to_many`.
    pub fields: Vec<Field>,

    /// The primary key. Every model has one, synthesized as a generated
    /// `id` field when the declaration names none.
    pub primary_key: PrimaryKey,

    /// Backend table/collection name.
    pub storage_name: String,

    /// Many-to-many relations declared on this model.
    pub many_to_many: Vec<ManyToMany>,

    /// Reverse accessors installed by relations targeting this model.
    pub reverse: Vec<ReverseRelation>,

    /// True for through models synthesized by the linking pass.
    pub synthesized: bool,
}

#[derive(Debug, Clone)]
pub struct PrimaryKey {
    pub fields: Vec<FieldId>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub usize);

impl Model {
    pub fn field(&self, field: impl Into<FieldId>) -> &Field {
        let field_id = field.into();
        assert_eq!(self.id, field_id.model);
        &self.fields[field_id.index]
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name.app_name == name)
    }

    pub fn many_to_many_by_name(&self, name: &str) -> Option<&ManyToMany> {
        self.many_to_many.iter().find(|m2m| m2m.name == name)
    }

    pub fn reverse_by_name(&self, name: &str) -> Option<&ReverseRelation> {
        self.reverse.iter().find(|reverse| reverse.name == name)
    }

    /// Iterate over the fields that make up the primary key.
    pub fn primary_key_fields(&self) -> impl ExactSizeIterator<Item = &'_ Field> {
        self.primary_key
            .fields
            .iter()
            .map(|pk_field| &self.fields[pk_field.index])
    }

    /// The app-level name of the primary key field. Composite keys report
    /// the declaring composite field.
    pub fn primary_key_name(&self) -> &str {
        if let Some(field) = self
            .fields
            .iter()
            .find(|field| field.ty.is_composite_id())
        {
            return &field.name.app_name;
        }
        &self.fields[self.primary_key.fields[0].index].name.app_name
    }

    /// Reads the primary key value off an instance. Composite keys assemble
    /// a list of component values; `None` when any component is unset.
    pub fn primary_key_value(&self, instance: &Instance) -> Option<Value> {
        if self.primary_key.is_composite() {
            let mut parts = Vec::with_capacity(self.primary_key.fields.len());
            for field in self.primary_key_fields() {
                match instance.get(&field.name.app_name) {
                    Some(value) if !value.is_null() => parts.push(value),
                    _ => return None,
                }
            }
            return Some(Value::list_from_vec(parts));
        }

        let field = &self.fields[self.primary_key.fields[0].index];
        instance.get(&field.name.app_name).filter(|v| !v.is_null())
    }
}

impl PrimaryKey {
    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }
}

impl ModelId {
    /// Create a `FieldId` representing the current model's field at index
    /// `index`.
    pub const fn field(self, index: usize) -> FieldId {
        FieldId { model: self, index }
    }
}

impl From<&Self> for ModelId {
    fn from(src: &Self) -> Self {
        *src
    }
}

impl From<&Model> for ModelId {
    fn from(value: &Model) -> Self {
        value.id
    }
}

impl fmt::Debug for ModelId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "ModelId({})", self.0)
    }
}
