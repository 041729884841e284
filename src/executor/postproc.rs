//! Post-file operations on the accumulated row set, applied in order:
//! GROUP BY + aggregates, HAVING, DISTINCT, ORDER BY, OFFSET, LIMIT.

use super::{ColumnKind, ProjectionPlan};
use crate::navigator::{like_matches, loose_compare, loose_eq};
use crate::parser::{
    AggregateFunc, Condition, ConditionLhs, ConditionOp, ConditionRhs, FieldPath, Query,
    SortDirection, WhereExpr,
};
use crate::resultset::ResultRow;
use ahash::{AHashMap, AHashSet};
use std::cmp::Ordering;

/// Non-printable separator for DISTINCT keys.
const DISTINCT_SEP: char = '\u{1}';

pub fn apply(query: &Query, plan: &ProjectionPlan, mut rows: Vec<ResultRow>) -> Vec<ResultRow> {
    if query.has_aggregates || !query.group_by.is_empty() {
        rows = group_and_aggregate(plan, rows);
        if let Some(ref having) = query.having {
            rows.retain(|row| having_passes(having, plan, row));
        }
    }

    if query.distinct {
        let mut seen: AHashSet<String> = AHashSet::with_capacity(rows.len());
        rows.retain(|row| seen.insert(distinct_key(row, plan.visible)));
    }

    if !plan.order_cols.is_empty() {
        // sort_by is stable: equal keys keep their pre-sort order
        rows.sort_by(|a, b| order_compare(a, b, &plan.order_cols));
    }

    if let Some(offset) = query.offset {
        let offset = (offset as usize).min(rows.len());
        rows.drain(..offset);
    }
    if let Some(limit) = query.limit {
        rows.truncate(limit as usize);
    }

    rows
}

fn distinct_key(row: &ResultRow, visible: usize) -> String {
    let mut key = String::new();
    for i in 0..visible {
        if i > 0 {
            key.push(DISTINCT_SEP);
        }
        key.push_str(row.value(i));
    }
    key
}

fn order_compare(a: &ResultRow, b: &ResultRow, keys: &[(usize, SortDirection)]) -> Ordering {
    for &(col, direction) in keys {
        let ord = loose_compare(a.value(col), b.value(col));
        let ord = match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Bucket rows by the GROUP BY key tuple (missing values and empty
/// strings compare equal) and emit one row per bucket in first-seen
/// order, aggregate columns computed over the bucket members.
fn group_and_aggregate(plan: &ProjectionPlan, rows: Vec<ResultRow>) -> Vec<ResultRow> {
    let mut index: AHashMap<Vec<String>, usize> = AHashMap::new();
    let mut buckets: Vec<Vec<ResultRow>> = Vec::new();

    for row in rows {
        let key: Vec<String> = plan
            .group_cols
            .iter()
            .map(|&col| row.value(col).to_string())
            .collect();
        match index.get(&key) {
            Some(&idx) => buckets[idx].push(row),
            None => {
                index.insert(key, buckets.len());
                buckets.push(vec![row]);
            }
        }
    }

    buckets
        .into_iter()
        .map(|members| {
            let mut out = members[0].clone();
            for (col, column) in plan.columns.iter().enumerate() {
                if let ColumnKind::Aggregate { func, arg } = &column.kind {
                    out.values[col] = compute_aggregate(*func, arg, col, &members);
                }
            }
            out
        })
        .collect()
}

fn compute_aggregate(
    func: AggregateFunc,
    arg: &FieldPath,
    col: usize,
    members: &[ResultRow],
) -> Option<String> {
    match func {
        AggregateFunc::Count => {
            // COUNT of a FOR variable counts bound occurrences even when
            // the bound element has no text; plain fields count non-empty
            let count = if arg.is_bare_variable() {
                members
                    .iter()
                    .filter(|r| r.values.get(col).map_or(false, |v| v.is_some()))
                    .count()
            } else {
                members.iter().filter(|r| !r.value(col).is_empty()).count()
            };
            Some(count.to_string())
        }
        AggregateFunc::Sum | AggregateFunc::Avg => {
            let nums: Vec<f64> = members
                .iter()
                .map(|r| r.value(col))
                .filter(|v| !v.is_empty())
                .filter_map(|v| v.trim().parse::<f64>().ok())
                .collect();
            match func {
                AggregateFunc::Sum => Some(format_number(nums.iter().sum())),
                AggregateFunc::Avg => {
                    if nums.is_empty() {
                        Some(String::new())
                    } else {
                        Some(format_number(nums.iter().sum::<f64>() / nums.len() as f64))
                    }
                }
                _ => unreachable!(),
            }
        }
        AggregateFunc::Min | AggregateFunc::Max => {
            let values: Vec<&str> = members
                .iter()
                .map(|r| r.value(col))
                .filter(|v| !v.is_empty())
                .collect();
            if values.is_empty() {
                return None;
            }
            let numeric: Option<Vec<f64>> = values
                .iter()
                .map(|v| v.trim().parse::<f64>().ok())
                .collect();
            let chosen = match numeric {
                // numeric when every value parses, lexicographic otherwise
                Some(nums) => {
                    let mut best = 0usize;
                    for (i, n) in nums.iter().enumerate() {
                        let better = match func {
                            AggregateFunc::Min => n < &nums[best],
                            _ => n > &nums[best],
                        };
                        if better {
                            best = i;
                        }
                    }
                    values[best]
                }
                None => match func {
                    AggregateFunc::Min => values.iter().copied().min().unwrap(),
                    _ => values.iter().copied().max().unwrap(),
                },
            };
            Some(chosen.to_string())
        }
    }
}

/// Integral results print without a trailing `.0`.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// HAVING over one aggregated output row. Aggregate references read the
/// computed aggregate columns (visible or hidden); field references read
/// the grouped columns.
fn having_passes(expr: &WhereExpr, plan: &ProjectionPlan, row: &ResultRow) -> bool {
    match expr {
        WhereExpr::And(a, b) => having_passes(a, plan, row) && having_passes(b, plan, row),
        WhereExpr::Or(a, b) => having_passes(a, plan, row) || having_passes(b, plan, row),
        WhereExpr::Not(inner) => !having_passes(inner, plan, row),
        WhereExpr::Condition(cond) => having_condition(cond, plan, row),
    }
}

fn having_condition(cond: &Condition, plan: &ProjectionPlan, row: &ResultRow) -> bool {
    let col = match &cond.lhs {
        ConditionLhs::Aggregate { func, arg } => plan.find_aggregate(*func, arg),
        ConditionLhs::Field(path) => plan.find_column(path),
    };
    let Some(col) = col else {
        return false;
    };
    let value = row.value(col);

    match cond.op {
        ConditionOp::IsNull => value.is_empty(),
        ConditionOp::IsNotNull => !value.is_empty(),
        ConditionOp::Like => match cond.rhs {
            ConditionRhs::Literal(ref lit) => {
                like_matches(value, lit.value()).unwrap_or(false)
            }
            _ => false,
        },
        ConditionOp::In => match cond.rhs {
            ConditionRhs::List(ref list) => list.iter().any(|lit| loose_eq(value, lit.value())),
            _ => false,
        },
        op => match cond.rhs {
            ConditionRhs::Literal(ref lit) => {
                let ord = loose_compare(value, lit.value());
                match op {
                    ConditionOp::Eq => ord == Ordering::Equal,
                    ConditionOp::Ne => ord != Ordering::Equal,
                    ConditionOp::Lt => ord == Ordering::Less,
                    ConditionOp::Gt => ord == Ordering::Greater,
                    ConditionOp::Le => ord != Ordering::Greater,
                    ConditionOp::Ge => ord != Ordering::Less,
                    _ => false,
                }
            }
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> ResultRow {
        ResultRow::new(values.iter().map(|v| Some(v.to_string())).collect())
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-7.0), "-7");
    }

    #[test]
    fn test_distinct_key_separator() {
        let a = row(&["ab", "c"]);
        let b = row(&["a", "bc"]);
        assert_ne!(distinct_key(&a, 2), distinct_key(&b, 2));
    }

    #[test]
    fn test_order_compare_numeric_then_direction() {
        let keys = vec![(0usize, SortDirection::Desc)];
        let a = row(&["100"]);
        let b = row(&["20"]);
        assert_eq!(order_compare(&a, &b, &keys), Ordering::Less);
    }
}
