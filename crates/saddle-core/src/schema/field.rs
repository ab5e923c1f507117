use super::{CompositeId, ForeignKey, ModelId};
use crate::{stmt::Value, Error, Result};

use std::fmt;

#[derive(Debug, Clone)]
pub struct Field {
    /// Uniquely identifies the field within the containing model.
    pub id: FieldId,

    /// The field name
    pub name: FieldName,

    /// Scalar, foreign key, or composite key.
    pub ty: FieldTy,

    /// True if the field may hold `Null`.
    pub nullable: bool,

    /// True if the store should enforce uniqueness.
    pub unique: bool,

    /// True if the store should index the field.
    pub index: bool,

    /// True if the field is (part of) the primary key.
    pub primary_key: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct FieldId {
    pub model: ModelId,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct FieldName {
    pub app_name: String,

    /// Set when the backend storage name differs from the app name; a
    /// foreign key stores under `<app_name>_id`.
    pub storage_name: Option<String>,
}

impl FieldName {
    pub fn storage_name(&self) -> &str {
        self.storage_name.as_ref().unwrap_or(&self.app_name)
    }
}

#[derive(Clone)]
pub enum FieldTy {
    Scalar(ScalarType),
    ForeignKey(ForeignKey),
    CompositeId(CompositeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Bool,
    I64,
    F64,
    Text,
}

impl Field {
    pub fn is_relation(&self) -> bool {
        matches!(self.ty, FieldTy::ForeignKey(_))
    }

    /// Serializes an app-level value into its store form.
    ///
    /// Scalars are checked against the declared type; foreign keys pass the
    /// related primary key through untouched; composite keys serialize as a
    /// list of their component values.
    pub fn to_store(&self, value: &Value) -> Result<Value> {
        match &self.ty {
            FieldTy::Scalar(scalar) => scalar.to_store(&self.name.app_name, self.nullable, value),
            FieldTy::ForeignKey(_) => Ok(value.clone()),
            FieldTy::CompositeId(_) => match value {
                Value::List(_) => Ok(value.clone()),
                other => Err(Error::query(format!(
                    "composite key `{}` expects a list of component values, got {other:?}",
                    self.name.app_name
                ))),
            },
        }
    }
}

impl ScalarType {
    fn to_store(&self, field: &str, nullable: bool, value: &Value) -> Result<Value> {
        let ok = match (self, value) {
            (_, Value::Null) => nullable,
            (Self::Bool, Value::Bool(_)) => true,
            (Self::I64, Value::I64(_)) => true,
            (Self::F64, Value::F64(_)) => true,
            (Self::F64, Value::I64(_)) => true,
            (Self::Text, Value::String(_)) => true,
            _ => false,
        };

        if !ok {
            return Err(Error::query(format!(
                "cannot serialize {value:?} for {self:?} field `{field}`"
            )));
        }

        // Integers widen into float fields; everything else passes through.
        match (self, value) {
            (Self::F64, Value::I64(n)) => Ok(Value::F64(*n as f64)),
            _ => Ok(value.clone()),
        }
    }
}

impl FieldTy {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    pub fn as_scalar(&self) -> Option<&ScalarType> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn is_foreign_key(&self) -> bool {
        matches!(self, Self::ForeignKey(_))
    }

    pub fn as_foreign_key(&self) -> Option<&ForeignKey> {
        match self {
            Self::ForeignKey(fk) => Some(fk),
            _ => None,
        }
    }

    #[track_caller]
    pub fn expect_foreign_key(&self) -> &ForeignKey {
        match self {
            Self::ForeignKey(fk) => fk,
            _ => panic!("expected foreign key field, but was {self:?}"),
        }
    }

    pub fn is_composite_id(&self) -> bool {
        matches!(self, Self::CompositeId(_))
    }

    pub fn as_composite_id(&self) -> Option<&CompositeId> {
        match self {
            Self::CompositeId(composite) => Some(composite),
            _ => None,
        }
    }
}

impl fmt::Debug for FieldTy {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(ty) => ty.fmt(fmt),
            Self::ForeignKey(ty) => ty.fmt(fmt),
            Self::CompositeId(ty) => ty.fmt(fmt),
        }
    }
}

impl From<&Field> for FieldId {
    fn from(val: &Field) -> Self {
        val.id
    }
}

impl fmt::Debug for FieldId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "FieldId({}/{})", self.model.0, self.index)
    }
}
