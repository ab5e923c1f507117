use super::{
    CompositeId, Field, FieldId, FieldName, FieldTy, ForeignKey, ManyToMany, Model, ModelId, Name,
    PrimaryKey, RelationTarget, ReverseRelation, ScalarType, Schema,
};
use crate::{Error, Result};

use std::collections::{HashMap, HashSet};

/// Collects model declarations and builds the linked [`Schema`].
///
/// Declarations are append-only, which keeps `ModelId`s stable across
/// rebuilds: registering more models later never renumbers the ones already
/// registered. Through models synthesized for many-to-many relations are
/// appended to the declaration list the first time they are built, so they
/// obey the same stability rule.
#[derive(Debug, Default)]
pub struct Builder {
    decls: Vec<ModelDecl>,
}

/// A model declaration, collected in phase one of the build.
#[derive(Debug, Clone)]
pub struct ModelDecl {
    name: String,
    app: Option<String>,
    storage_name: Option<String>,
    fields: Vec<FieldDecl>,
    synthesized: bool,
}

/// A field declaration.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    name: String,
    ty: FieldDeclTy,
    nullable: bool,
    unique: bool,
    index: bool,
    primary_key: bool,
    storage_name: Option<String>,
    related_name: Option<String>,
}

#[derive(Debug, Clone)]
enum FieldDeclTy {
    Scalar(ScalarType),
    ForeignKey { target: String },
    ManyToMany { target: String },
    CompositeId { fields: Vec<String> },
}

impl ModelDecl {
    pub fn new(name: impl Into<String>) -> ModelDecl {
        ModelDecl {
            name: name.into(),
            app: None,
            storage_name: None,
            fields: vec![],
            synthesized: false,
        }
    }

    pub fn app(mut self, app: impl Into<String>) -> ModelDecl {
        self.app = Some(app.into());
        self
    }

    pub fn storage_name(mut self, name: impl Into<String>) -> ModelDecl {
        self.storage_name = Some(name.into());
        self
    }

    pub fn field(mut self, field: FieldDecl) -> ModelDecl {
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FieldDecl {
    fn new(name: impl Into<String>, ty: FieldDeclTy) -> FieldDecl {
        FieldDecl {
            name: name.into(),
            ty,
            nullable: false,
            unique: false,
            index: false,
            primary_key: false,
            storage_name: None,
            related_name: None,
        }
    }

    pub fn bool(name: impl Into<String>) -> FieldDecl {
        Self::new(name, FieldDeclTy::Scalar(ScalarType::Bool))
    }

    pub fn i64(name: impl Into<String>) -> FieldDecl {
        Self::new(name, FieldDeclTy::Scalar(ScalarType::I64))
    }

    pub fn f64(name: impl Into<String>) -> FieldDecl {
        Self::new(name, FieldDeclTy::Scalar(ScalarType::F64))
    }

    pub fn text(name: impl Into<String>) -> FieldDecl {
        Self::new(name, FieldDeclTy::Scalar(ScalarType::Text))
    }

    pub fn foreign_key(name: impl Into<String>, target: impl Into<String>) -> FieldDecl {
        Self::new(
            name,
            FieldDeclTy::ForeignKey {
                target: target.into(),
            },
        )
    }

    pub fn many_to_many(name: impl Into<String>, target: impl Into<String>) -> FieldDecl {
        Self::new(
            name,
            FieldDeclTy::ManyToMany {
                target: target.into(),
            },
        )
    }

    pub fn composite_id(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> FieldDecl {
        Self::new(
            name,
            FieldDeclTy::CompositeId {
                fields: fields.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn nullable(mut self) -> FieldDecl {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> FieldDecl {
        self.unique = true;
        self
    }

    pub fn index(mut self) -> FieldDecl {
        self.index = true;
        self
    }

    pub fn primary_key(mut self) -> FieldDecl {
        self.primary_key = true;
        self
    }

    pub fn storage_name(mut self, name: impl Into<String>) -> FieldDecl {
        self.storage_name = Some(name.into());
        self
    }

    pub fn related_name(mut self, name: impl Into<String>) -> FieldDecl {
        self.related_name = Some(name.into());
        self
    }
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// True when a declaration with this name was already collected.
    pub fn contains(&self, name: &str) -> bool {
        self.decls.iter().any(|decl| decl.name == name)
    }

    pub fn push(&mut self, decl: ModelDecl) -> Result<()> {
        if self.contains(&decl.name) {
            return Err(Error::field(format!(
                "model `{}` is already declared",
                decl.name
            )));
        }
        self.decls.push(decl);
        Ok(())
    }

    /// Builds the schema: materialize every declaration, then run the
    /// linking pass (resolve relation targets, synthesize through models,
    /// install reverse accessors).
    ///
    /// A foreign key whose target has not been declared *yet* is left
    /// unresolved: the target may arrive with a later registration batch.
    /// [`Schema::verify`] turns anything still unresolved into a loud
    /// `FieldError` once bootstrap is complete.
    pub fn build(&mut self) -> Result<Schema> {
        let mut models = Vec::with_capacity(self.decls.len());
        for (index, decl) in self.decls.iter().enumerate() {
            models.push(materialize(decl, ModelId(index))?);
        }

        self.link(&mut models)?;

        Ok(Schema { models })
    }

    fn link(&mut self, models: &mut Vec<Model>) -> Result<()> {
        let mut by_name: HashMap<String, ModelId> = models
            .iter()
            .map(|model| (model.name.original().to_string(), model.id))
            .collect();

        // Synthesize through models for many-to-many relations whose target
        // has registered. The synthesized declaration joins the append-only
        // list so its id stays stable on later rebuilds.
        for owner_index in 0..models.len() {
            for m2m_index in 0..models[owner_index].many_to_many.len() {
                let (owner_name, field_name, target_name) = {
                    let owner = &models[owner_index];
                    let m2m = &owner.many_to_many[m2m_index];
                    (
                        owner.name.clone(),
                        m2m.name.clone(),
                        m2m.target_name.clone(),
                    )
                };

                let Some(&target_id) = by_name.get(&target_name) else {
                    log::debug!(
                        "many-to-many `{}.{}` waiting for target `{}`",
                        owner_name.original(),
                        field_name,
                        target_name
                    );
                    continue;
                };

                let through_name = format!("{}{}", owner_name.original(), camel(&field_name));
                let through_id = match by_name.get(&through_name) {
                    Some(&id) => id,
                    None => {
                        let decl = through_decl(
                            &through_name,
                            owner_name.original(),
                            &target_name,
                            &field_name,
                        );
                        let id = ModelId(self.decls.len());
                        models.push(materialize(&decl, id)?);
                        self.decls.push(decl);
                        by_name.insert(through_name, id);
                        id
                    }
                };

                let m2m = &mut models[owner_index].many_to_many[m2m_index];
                m2m.target = Some(target_id);
                m2m.through = Some(through_id);
            }
        }

        // Resolve foreign key targets.
        for model in models.iter_mut() {
            for field in &mut model.fields {
                if let FieldTy::ForeignKey(fk) = &mut field.ty {
                    if let RelationTarget::Named(target) = &fk.target {
                        match by_name.get(target) {
                            Some(&id) => fk.target = RelationTarget::Resolved(id),
                            None => log::debug!(
                                "relation `{}.{}` waiting for target `{}`",
                                model.name.original(),
                                field.name.app_name,
                                target
                            ),
                        }
                    }
                }
            }
        }

        // Install reverse accessors, rejecting duplicate related names.
        let mut installs: Vec<(ModelId, ReverseRelation)> = vec![];
        for model in models.iter() {
            for field in &model.fields {
                if let FieldTy::ForeignKey(fk) = &field.ty {
                    if let Some(target) = fk.target.resolved() {
                        installs.push((
                            target,
                            ReverseRelation {
                                name: fk.related_name.clone(),
                                source: model.id,
                                source_field: field.id,
                            },
                        ));
                    }
                }
            }
        }

        let mut seen: HashSet<(ModelId, String)> = HashSet::new();
        for (target, reverse) in installs {
            if !seen.insert((target, reverse.name.clone())) {
                return Err(Error::field(format!(
                    "duplicate related_name `{}` on model `{}`",
                    reverse.name,
                    models[target.0].name.original()
                )));
            }
            models[target.0].reverse.push(reverse);
        }

        Ok(())
    }
}

/// Phase one: turn a declaration into an unlinked model.
fn materialize(decl: &ModelDecl, id: ModelId) -> Result<Model> {
    let name = Name::new(&decl.name);

    let mut seen = HashSet::new();
    for field in &decl.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(Error::field(format!(
                "duplicate field `{}` on model `{}`",
                field.name, decl.name
            )));
        }
    }

    let composites: Vec<_> = decl
        .fields
        .iter()
        .filter(|field| matches!(field.ty, FieldDeclTy::CompositeId { .. }))
        .collect();
    if composites.len() > 1 {
        return Err(Error::field(format!(
            "model `{}` declares more than one composite key",
            decl.name
        )));
    }

    // Validate the composite key against fields declared before it.
    if let Some(composite) = composites.first() {
        let FieldDeclTy::CompositeId { fields } = &composite.ty else {
            unreachable!()
        };
        if fields.len() < 2 {
            return Err(Error::field(format!(
                "composite key `{}` on model `{}` requires at least two fields",
                composite.name, decl.name
            )));
        }

        let mut declared = HashSet::new();
        for field in &decl.fields {
            if std::ptr::eq(*composite, field) {
                break;
            }
            declared.insert(field.name.as_str());
        }
        for component in fields {
            if !declared.contains(component.as_str()) {
                return Err(Error::field(format!(
                    "composite key `{}` on model `{}` references undeclared field `{}`",
                    composite.name, decl.name, component
                )));
            }
        }
    }

    let has_explicit_pk = composites.is_empty()
        && decl
            .fields
            .iter()
            .any(|field| field.primary_key || field.name == "id");

    // Synthesize the implicit generated `id` key when the declaration names
    // no key of its own.
    let implicit_id = composites.is_empty() && !has_explicit_pk;

    let mut fields = Vec::new();
    let mut many_to_many = Vec::new();

    if implicit_id {
        fields.push(Field {
            id: id.field(0),
            name: FieldName {
                app_name: "id".to_string(),
                storage_name: None,
            },
            ty: FieldTy::Scalar(ScalarType::Text),
            nullable: false,
            unique: true,
            index: true,
            primary_key: true,
        });
    }

    let mut name_to_index: HashMap<&str, usize> = HashMap::new();
    for field_decl in &decl.fields {
        match &field_decl.ty {
            FieldDeclTy::ManyToMany { target } => {
                many_to_many.push(ManyToMany {
                    name: field_decl.name.clone(),
                    target_name: target.clone(),
                    target: None,
                    through: None,
                });
            }
            ty => {
                let index = fields.len();
                name_to_index.insert(field_decl.name.as_str(), index);
                fields.push(materialize_field(decl, field_decl, ty, id.field(index), &name_to_index)?);
            }
        }
    }

    // Determine the primary key.
    let pk_fields: Vec<FieldId> = if let Some(composite_field) =
        fields.iter().find(|field| field.ty.is_composite_id())
    {
        let FieldTy::CompositeId(composite) = &composite_field.ty else {
            unreachable!()
        };
        composite.fields.clone()
    } else {
        let explicit: Vec<FieldId> = fields
            .iter()
            .filter(|field| field.primary_key)
            .map(|field| field.id)
            .collect();
        if explicit.is_empty() {
            return Err(Error::field(format!(
                "model `{}` has no primary key",
                decl.name
            )));
        }
        explicit
    };

    Ok(Model {
        id,
        name: name.clone(),
        app: decl.app.clone(),
        fields,
        primary_key: PrimaryKey { fields: pk_fields },
        storage_name: decl
            .storage_name
            .clone()
            .unwrap_or_else(|| name.snake_case()),
        many_to_many,
        reverse: vec![],
        synthesized: decl.synthesized,
    })
}

fn materialize_field(
    decl: &ModelDecl,
    field_decl: &FieldDecl,
    ty: &FieldDeclTy,
    id: FieldId,
    name_to_index: &HashMap<&str, usize>,
) -> Result<Field> {
    let (ty, storage_name, primary_key) = match ty {
        FieldDeclTy::Scalar(scalar) => (
            FieldTy::Scalar(*scalar),
            field_decl.storage_name.clone(),
            field_decl.primary_key || field_decl.name == "id",
        ),
        FieldDeclTy::ForeignKey { target } => (
            FieldTy::ForeignKey(ForeignKey {
                target: RelationTarget::Named(target.clone()),
                related_name: field_decl.related_name.clone().unwrap_or_else(|| {
                    format!("{}_set", Name::new(&decl.name).snake_case())
                }),
            }),
            Some(
                field_decl
                    .storage_name
                    .clone()
                    .unwrap_or_else(|| format!("{}_id", field_decl.name)),
            ),
            field_decl.primary_key,
        ),
        FieldDeclTy::CompositeId { fields } => {
            let components = fields
                .iter()
                .map(|component| {
                    name_to_index
                        .get(component.as_str())
                        .map(|&index| FieldId {
                            model: id.model,
                            index,
                        })
                        .ok_or_else(|| {
                            Error::field(format!(
                                "composite key `{}` on model `{}` references non-column field `{}`",
                                field_decl.name, decl.name, component
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            (
                FieldTy::CompositeId(CompositeId { fields: components }),
                field_decl.storage_name.clone(),
                true,
            )
        }
        FieldDeclTy::ManyToMany { .. } => unreachable!("filtered by caller"),
    };

    Ok(Field {
        id,
        name: FieldName {
            app_name: field_decl.name.clone(),
            storage_name,
        },
        ty,
        nullable: field_decl.nullable,
        unique: field_decl.unique,
        index: field_decl.index,
        primary_key,
    })
}

/// The synthesized through model for a many-to-many relation: an implicit
/// key plus one foreign key to each side.
fn through_decl(through_name: &str, owner: &str, target: &str, field_name: &str) -> ModelDecl {
    let owner_snake = Name::new(owner).snake_case();
    let target_snake = Name::new(target).snake_case();
    let through_snake = Name::new(through_name).snake_case();

    let mut decl = ModelDecl::new(through_name)
        .storage_name(format!("{owner_snake}_{field_name}"))
        .field(
            FieldDecl::foreign_key(owner_snake, owner)
                .related_name(format!("{through_snake}_sources"))
                .index(),
        )
        .field(
            FieldDecl::foreign_key(target_snake, target)
                .related_name(format!("{through_snake}_targets"))
                .index(),
        );
    decl.synthesized = true;
    decl
}

fn camel(src: &str) -> String {
    src.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
