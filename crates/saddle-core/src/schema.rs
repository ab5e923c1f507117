mod builder;
pub use builder::{Builder, FieldDecl, ModelDecl};

mod field;
pub use field::{Field, FieldId, FieldName, FieldTy, ScalarType};

mod model;
pub use model::{Model, ModelId, PrimaryKey};

mod name;
pub use name::Name;

mod relation;
pub use relation::{CompositeId, ForeignKey, ManyToMany, RelationTarget, ReverseRelation};

use crate::Result;

/// The linked schema arena: every registered model, indexed by [`ModelId`].
///
/// Built by [`Builder`] in two phases: declarations are collected first,
/// then a linking pass resolves relation targets, synthesizes through
/// models, and installs reverse accessors. Identifiers are stable across
/// rebuilds because declarations are append-only.
#[derive(Debug, Default)]
pub struct Schema {
    pub models: Vec<Model>,
}

impl Schema {
    pub fn model(&self, id: impl Into<ModelId>) -> &Model {
        &self.models[id.into().0]
    }

    pub fn model_by_name(&self, name: &str) -> Option<&Model> {
        self.models
            .iter()
            .find(|model| model.name.snake_case() == name || model.name.original() == name)
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn field(&self, id: FieldId) -> &Field {
        self.model(id.model).field(id)
    }

    /// Strict link check: fails loudly on any relation whose target never
    /// registered. Call once bootstrap registration is complete.
    pub fn verify(&self) -> Result<()> {
        for model in self.models() {
            for field in &model.fields {
                if let FieldTy::ForeignKey(fk) = &field.ty {
                    if let RelationTarget::Named(target) = &fk.target {
                        return Err(crate::Error::field(format!(
                            "relation `{}.{}` targets unregistered model `{}`",
                            model.name.original(),
                            field.name.app_name,
                            target
                        )));
                    }
                }
            }
            for m2m in &model.many_to_many {
                if m2m.through.is_none() {
                    return Err(crate::Error::field(format!(
                        "many-to-many `{}.{}` targets unregistered model `{}`",
                        model.name.original(),
                        m2m.name,
                        m2m.target_name
                    )));
                }
            }
        }
        Ok(())
    }
}
