//! Plan evaluation over the in-memory row store.
//!
//! Within one field group, equality lookups are disjunctive: the stored
//! value needs to hit any one of the accumulated values, which is what
//! makes `__in` membership fall out of plain value normalization. Range
//! and substring lookups are conjunctive, and distinct field groups are
//! always conjunctive.

use crate::store::{Row, Tables};

use saddle_core::schema::Schema;
use saddle_core::stmt::{Lookup, LookupOp, Operand, QueryPlan, Value};
use saddle_core::{Error, Result};

use std::cmp::Ordering;

/// The primary keys (stable string form) of every row the plan matches, in
/// table order.
pub(crate) fn matching_keys(
    tables: &Tables,
    schema: &Schema,
    plan: &QueryPlan,
) -> Result<Vec<String>> {
    let mut keys = vec![];

    if let Some(table) = tables.table(plan.model) {
        'rows: for (key, row) in table {
            for (column, lookups) in &plan.filters {
                if !group_matches(tables, schema, row, column, lookups)? {
                    continue 'rows;
                }
            }

            // A row matching every exclude group is dropped.
            if !plan.excludes.is_empty() {
                let mut matched_all = true;
                for (column, lookups) in &plan.excludes {
                    if !group_matches(tables, schema, row, column, lookups)? {
                        matched_all = false;
                        break;
                    }
                }
                if matched_all {
                    continue 'rows;
                }
            }

            keys.push(key.clone());
        }
    }

    for sub in &plan.unions {
        for key in matching_keys(tables, schema, sub)? {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    for sub in &plan.intersections {
        let other = matching_keys(tables, schema, sub)?;
        keys.retain(|key| other.contains(key));
    }

    Ok(keys)
}

fn group_matches(
    tables: &Tables,
    schema: &Schema,
    row: &Row,
    column: &str,
    lookups: &[Lookup],
) -> Result<bool> {
    let stored = row.columns.get(column).cloned().unwrap_or(Value::Null);

    let mut eq_any: Option<bool> = None;
    for lookup in lookups {
        match lookup.op {
            LookupOp::Eq => {
                let hit = eq_matches(tables, schema, &stored, &lookup.operand)?;
                eq_any = Some(eq_any.unwrap_or(false) || hit);
            }
            op => {
                let Operand::Value(operand) = &lookup.operand else {
                    return Err(Error::unsupported_feature(format!(
                        "subquery operand with `{}` lookup",
                        op.as_str()
                    )));
                };
                if !op_matches(op, &stored, operand) {
                    return Ok(false);
                }
            }
        }
    }

    Ok(eq_any.unwrap_or(true))
}

fn eq_matches(
    tables: &Tables,
    schema: &Schema,
    stored: &Value,
    operand: &Operand,
) -> Result<bool> {
    match operand {
        Operand::Value(value) => Ok(stored == value),
        Operand::Query(sub) => {
            let sub_keys = matching_keys(tables, schema, sub)?;
            Ok(sub_keys.iter().any(|key| *key == stored.storage_key()))
        }
    }
}

fn op_matches(op: LookupOp, stored: &Value, operand: &Value) -> bool {
    match op {
        LookupOp::Eq => unreachable!("handled by eq_matches"),
        LookupOp::Gt => matches!(compare(stored, operand), Some(Ordering::Greater)),
        LookupOp::Ge => matches!(
            compare(stored, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        LookupOp::Lt => matches!(compare(stored, operand), Some(Ordering::Less)),
        LookupOp::Le => matches!(
            compare(stored, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        LookupOp::Contains => str_op(stored, operand, false, |s, o| s.contains(o)),
        LookupOp::StartsWith => str_op(stored, operand, false, |s, o| s.starts_with(o)),
        LookupOp::EndsWith => str_op(stored, operand, false, |s, o| s.ends_with(o)),
        LookupOp::IContains => str_op(stored, operand, true, |s, o| s.contains(o)),
        LookupOp::IStartsWith => str_op(stored, operand, true, |s, o| s.starts_with(o)),
        LookupOp::IEndsWith => str_op(stored, operand, true, |s, o| s.ends_with(o)),
    }
}

fn compare(stored: &Value, operand: &Value) -> Option<Ordering> {
    match (stored, operand) {
        (Value::I64(a), Value::I64(b)) => Some(a.cmp(b)),
        (Value::F64(a), Value::F64(b)) => a.partial_cmp(b),
        (Value::I64(a), Value::F64(b)) => (*a as f64).partial_cmp(b),
        (Value::F64(a), Value::I64(b)) => a.partial_cmp(&(*b as f64)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn str_op(
    stored: &Value,
    operand: &Value,
    fold: bool,
    test: impl Fn(&str, &str) -> bool,
) -> bool {
    let (Value::String(stored), Value::String(operand)) = (stored, operand) else {
        return false;
    };
    if fold {
        // The operand side was folded at compile time.
        test(&stored.to_lowercase(), operand)
    } else {
        test(stored, operand)
    }
}
