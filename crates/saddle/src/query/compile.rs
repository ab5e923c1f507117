//! Turns one query snapshot into a backend-independent [`QueryPlan`].
//!
//! Each raw lookup key is split on the `__` separator: the head must name a
//! model field, a trailing recognized operator is popped off, a literal
//! trailing `in` is dropped (membership is value-driven), and anything left
//! in between is a relation path that compiles into a subquery against the
//! foreign key's target model.

use super::{FilterValue, Query};
use crate::{Error, Result};

use saddle_core::schema::{Field, Model, Schema};
use saddle_core::stmt::{Lookup, LookupOp, Operand, QueryPlan, Value};

pub(super) fn build_plan(query: &Query) -> Result<QueryPlan> {
    let schema = query.schema();
    let model = schema.model(query.model());
    let mut plan = QueryPlan::new(query.model());

    for (key, values) in &query.filters {
        let (storage_name, lookups) = aggregate(schema, model, key, values)?;
        plan.push_filter(storage_name, lookups);
    }
    for (key, values) in &query.excludes {
        let (storage_name, lookups) = aggregate(schema, model, key, values)?;
        plan.push_exclude(storage_name, lookups);
    }

    for union in &query.unions {
        plan.unions.push(build_plan(union)?);
    }
    for intersection in &query.intersections {
        plan.intersections.push(build_plan(intersection)?);
    }

    let capability = query.store().capability();

    if !query.where_raw.is_empty() {
        if !capability.sql {
            return Err(Error::unsupported_feature(format!(
                "store `{}` does not accept raw where clauses",
                query.store().url()
            )));
        }
        plan.where_raw = query.where_raw.clone();
    }

    for path in &query.load_related {
        let head = path.split("__").next().unwrap_or(path);
        let field = field_of(model, head)?;
        if !field.ty.is_foreign_key() {
            return Err(Error::query(format!(
                "`{}.{}` is not a relation and cannot be eagerly loaded",
                model.name.original(),
                head
            )));
        }
        // Stores without eager loading ignore the marks entirely.
        if capability.eager_load {
            plan.load_related.push(path.clone());
        }
    }

    let filtered = plan.filtered_fields();
    if filtered.len() > 1 && !capability.multi_field_filter {
        let fields = filtered.into_iter().collect::<Vec<_>>().join("`, `");
        return Err(Error::unsupported_feature(format!(
            "store `{}` cannot combine filters over multiple fields: `{fields}`",
            query.store().url()
        )));
    }

    Ok(plan)
}

/// Compiles one raw `name=values` pair into lookups grouped under the
/// field's storage name.
fn aggregate(
    schema: &Schema,
    model: &Model,
    key: &str,
    values: &[FilterValue],
) -> Result<(String, Vec<Lookup>)> {
    let mut segments: Vec<&str> = key.split("__").collect();
    let field_name = segments.remove(0);
    let field = field_of(model, field_name)?;

    let mut op = LookupOp::Eq;
    if let Some(&last) = segments.last() {
        if let Some(parsed) = LookupOp::from_segment(last) {
            op = parsed;
            segments.pop();
        } else if last == "in" {
            segments.pop();
        }
    }

    if !segments.is_empty() {
        return nested(schema, model, field, &segments, op, values);
    }

    let mut lookups = Vec::new();
    for value in values {
        for element in normalize(value) {
            match element {
                Element::Query(sub) => lookups.push(Lookup {
                    op,
                    operand: Operand::Query(Box::new(sub.plan()?)),
                }),
                Element::Value(raw) => {
                    let serialized = serialize(field, op, raw)?;
                    lookups.push(Lookup {
                        op,
                        operand: Operand::Value(serialized),
                    });
                }
            }
        }
    }

    Ok((field.name.storage_name().to_string(), lookups))
}

/// A lookup that keeps going past a relation: compile the rest of the path
/// against the target model and match the foreign key against the
/// subquery's result keys.
fn nested(
    schema: &Schema,
    model: &Model,
    field: &Field,
    segments: &[&str],
    op: LookupOp,
    values: &[FilterValue],
) -> Result<(String, Vec<Lookup>)> {
    let Some(fk) = field.ty.as_foreign_key() else {
        return Err(Error::query(format!(
            "`{}.{}` is not a relation; cannot filter through `{}`",
            model.name.original(),
            field.name.app_name,
            segments.join("__")
        )));
    };
    let Some(target_id) = fk.target.resolved() else {
        return Err(Error::field(format!(
            "relation `{}.{}` targets unregistered model",
            model.name.original(),
            field.name.app_name
        )));
    };

    let target = schema.model(target_id);
    let mut sub_key = segments.join("__");
    if op != LookupOp::Eq {
        sub_key.push_str("__");
        sub_key.push_str(op.as_str());
    }

    let (sub_storage, sub_lookups) = aggregate(schema, target, &sub_key, values)?;
    let mut sub_plan = QueryPlan::new(target_id);
    sub_plan.push_filter(sub_storage, sub_lookups);

    Ok((
        field.name.storage_name().to_string(),
        vec![Lookup::query(LookupOp::Eq, sub_plan)],
    ))
}

enum Element<'a> {
    Value(&'a Value),
    Query(&'a Query),
}

/// Normalizes one filter value to a flat element list: scalars become a
/// single element, lists contribute one element per item, and nested
/// queries stay whole.
fn normalize(value: &FilterValue) -> Vec<Element<'_>> {
    match value {
        FilterValue::Value(Value::List(items)) => items.iter().map(Element::Value).collect(),
        FilterValue::Value(value) => vec![Element::Value(value)],
        FilterValue::Query(query) => vec![Element::Query(query)],
    }
}

fn serialize(field: &Field, op: LookupOp, raw: &Value) -> Result<Value> {
    let serialized = field.to_store(raw)?;
    if op.is_case_insensitive() {
        if let Value::String(s) = &serialized {
            return Ok(Value::String(s.to_lowercase()));
        }
    }
    Ok(serialized)
}

fn field_of<'a>(model: &'a Model, name: &str) -> Result<&'a Field> {
    model.field_by_name(name).ok_or_else(|| {
        Error::query(format!(
            "unknown field `{}` on model `{}`",
            name,
            model.name.original()
        ))
    })
}
