use super::{QueryPlan, Value};

/// Operator vocabulary of the filter DSL.
///
/// The textual forms are a contract consumed by the REST/CRUD layers and task
/// jobs sitting above the engine; the set and spelling must not drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    StartsWith,
    EndsWith,
    IContains,
    IStartsWith,
    IEndsWith,
}

impl LookupOp {
    /// Parses a trailing lookup segment. `in` is not an operator: membership
    /// is value-driven, so the segment is dropped by the caller instead.
    pub fn from_segment(segment: &str) -> Option<LookupOp> {
        Some(match segment {
            "gt" => Self::Gt,
            "ge" => Self::Ge,
            "lt" => Self::Lt,
            "le" => Self::Le,
            "contains" => Self::Contains,
            "startswith" => Self::StartsWith,
            "endswith" => Self::EndsWith,
            "icontains" => Self::IContains,
            "istartswith" => Self::IStartsWith,
            "iendswith" => Self::IEndsWith,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::IContains => "icontains",
            Self::IStartsWith => "istartswith",
            Self::IEndsWith => "iendswith",
        }
    }

    /// Case-insensitive operators fold their string operand to lower case at
    /// compile time; stores fold the stored side at evaluation time.
    pub fn is_case_insensitive(&self) -> bool {
        matches!(self, Self::IContains | Self::IStartsWith | Self::IEndsWith)
    }
}

/// One compiled lookup operand: a plain serialized value, or a nested query
/// plan whose result set the operand matches against.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Query(Box<QueryPlan>),
}

/// A single compiled filter term.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub op: LookupOp,
    pub operand: Operand,
}

impl Lookup {
    pub fn value(op: LookupOp, value: impl Into<Value>) -> Lookup {
        Lookup {
            op,
            operand: Operand::Value(value.into()),
        }
    }

    pub fn query(op: LookupOp, plan: QueryPlan) -> Lookup {
        Lookup {
            op,
            operand: Operand::Query(Box::new(plan)),
        }
    }
}
