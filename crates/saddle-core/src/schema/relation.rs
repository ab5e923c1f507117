use super::{FieldId, ModelId};

/// The target of a relation field.
///
/// Targets start out `Named` when the declaration is collected and are
/// resolved to a `ModelId` during the linking pass. A target still `Named`
/// after linking means the model never registered; [`crate::Schema::verify`]
/// reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationTarget {
    Named(String),
    Resolved(ModelId),
}

impl RelationTarget {
    pub fn resolved(&self) -> Option<ModelId> {
        match self {
            Self::Resolved(id) => Some(*id),
            Self::Named(_) => None,
        }
    }

    #[track_caller]
    pub fn expect_resolved(&self) -> ModelId {
        match self {
            Self::Resolved(id) => *id,
            Self::Named(name) => panic!("relation target `{name}` is unresolved"),
        }
    }
}

/// A one-to-many relation. The field stores the related model's primary key
/// under `<name>_id`; the target model gains a reverse accessor under
/// `related_name`.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub target: RelationTarget,
    pub related_name: String,
}

/// A many-to-many relation. Not a physical column: linking synthesizes a
/// through model holding two foreign keys and removes the declaring field
/// from the direct field list.
#[derive(Debug, Clone)]
pub struct ManyToMany {
    /// The declared field name on the owning model.
    pub name: String,

    /// Target model name as declared; resolved when the target registers.
    pub target_name: String,

    pub target: Option<ModelId>,

    /// The synthesized through model, once the target has resolved.
    pub through: Option<ModelId>,
}

/// A composite primary key assembled from already-declared fields.
#[derive(Debug, Clone)]
pub struct CompositeId {
    pub fields: Vec<FieldId>,
}

/// A reverse accessor installed on a relation's target model.
#[derive(Debug, Clone)]
pub struct ReverseRelation {
    /// Accessor name, from the relation's `related_name`.
    pub name: String,

    /// The model declaring the foreign key.
    pub source: ModelId,

    /// The foreign key field on the source model.
    pub source_field: FieldId,
}
