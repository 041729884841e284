//! Query execution: file discovery, parallel per-file processing,
//! FOR-clause expansion and post-processing.
//!
//! Scheduling model: a fixed pool of OS threads with strided work
//! distribution (worker `k` of `N` takes file indices `k`, `k+N`, ...).
//! File processing times are roughly similar, so striding avoids lock
//! contention on a shared queue. The only lock is the append of one
//! file's rows to the shared result vector; everything heavy (DOM load,
//! navigation, projection, WHERE) happens outside it. Cancellation is
//! cooperative at file boundaries.

pub mod discover;
pub mod postproc;

use crate::errors::{codes, ArxError, ArxResult, Location, Severity};
use crate::navigator::{find_relative, Bindings, Bound, Navigator};
use crate::parser::{
    AggregateFunc, ConditionLhs, FieldPath, Query, SelectItem, SortDirection, WhereExpr,
};
use crate::progress::{ProgressCounter, ProgressFn};
use crate::resultset::{ExecStats, ResultRow, ResultSet};
use roxmltree::{Document, Node};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Below this many files the query runs on the calling thread.
pub const PARALLEL_THRESHOLD: usize = 5;

/// Upper bound on worker threads.
pub const MAX_WORKERS: usize = 16;

/// Row count past which the large-dataset warning is attached.
const LARGE_DATASET_ROWS: usize = 100_000;

/// What one column of the projection computes.
#[derive(Debug, Clone)]
pub enum ColumnKind {
    Field(FieldPath),
    Aggregate { func: AggregateFunc, arg: FieldPath },
    FileName,
}

#[derive(Debug, Clone)]
pub struct ColumnPlan {
    pub label: String,
    pub kind: ColumnKind,
    pub hidden: bool,
}

/// Column layout for one query: the visible SELECT columns first, then
/// hidden columns added for GROUP BY / ORDER BY / HAVING keys that are
/// not part of the projection. Hidden columns are stripped after
/// post-processing.
#[derive(Debug, Clone)]
pub struct ProjectionPlan {
    pub columns: Vec<ColumnPlan>,
    pub visible: usize,
    pub group_cols: Vec<usize>,
    pub order_cols: Vec<(usize, SortDirection)>,
}

impl ProjectionPlan {
    pub fn build(query: &Query) -> (ProjectionPlan, Vec<ArxError>) {
        let mut warnings = Vec::new();
        let mut columns: Vec<ColumnPlan> = Vec::with_capacity(query.select_items.len());

        for item in &query.select_items {
            let column = match item {
                SelectItem::Field(path) => ColumnPlan {
                    label: path.display_name().to_string(),
                    kind: ColumnKind::Field(path.clone()),
                    hidden: false,
                },
                SelectItem::Aggregate(agg) => ColumnPlan {
                    label: agg.display_name().to_string(),
                    kind: ColumnKind::Aggregate {
                        func: agg.func,
                        arg: agg.arg.clone(),
                    },
                    hidden: false,
                },
                SelectItem::FileName { alias } => ColumnPlan {
                    label: alias.clone().unwrap_or_else(|| "FILE_NAME".to_string()),
                    kind: ColumnKind::FileName,
                    hidden: false,
                },
            };
            columns.push(column);
        }
        let visible = columns.len();

        let mut plan = ProjectionPlan {
            columns,
            visible,
            group_cols: Vec::new(),
            order_cols: Vec::new(),
        };

        for field in &query.group_by {
            let idx = plan.find_or_add(field);
            plan.group_cols.push(idx);
        }
        for key in &query.order_by {
            let before = plan.columns.len();
            let idx = plan.find_or_add(&key.field);
            if plan.columns.len() > before {
                warnings.push(
                    ArxError::code(codes::ORDER_KEY_NOT_PROJECTED).with_detail(&key.field.raw),
                );
            }
            plan.order_cols.push((idx, key.direction));
        }
        if let Some(ref having) = query.having {
            plan.add_having_aggregates(having);
        }

        (plan, warnings)
    }

    /// Locate the column a GROUP BY / ORDER BY / HAVING field refers to:
    /// by alias, by written spelling, or by canonical path equality.
    pub fn find_column(&self, field: &FieldPath) -> Option<usize> {
        let canonical = field.canonical();
        self.columns.iter().position(|col| {
            if col.label == field.raw {
                return true;
            }
            match &col.kind {
                ColumnKind::Field(p) => p.canonical() == canonical,
                ColumnKind::FileName => canonical == "FILE_NAME",
                ColumnKind::Aggregate { .. } => false,
            }
        })
    }

    pub fn find_aggregate(&self, func: AggregateFunc, arg: &FieldPath) -> Option<usize> {
        let canonical = arg.canonical();
        self.columns.iter().position(|col| match &col.kind {
            ColumnKind::Aggregate { func: f, arg: a } => {
                *f == func && a.canonical() == canonical
            }
            _ => false,
        })
    }

    fn find_or_add(&mut self, field: &FieldPath) -> usize {
        if let Some(idx) = self.find_column(field) {
            return idx;
        }
        let kind = if field.canonical() == "FILE_NAME" {
            ColumnKind::FileName
        } else {
            ColumnKind::Field(field.clone())
        };
        self.columns.push(ColumnPlan {
            label: field.canonical(),
            kind,
            hidden: true,
        });
        self.columns.len() - 1
    }

    /// HAVING may aggregate fields that the SELECT list does not; those
    /// need hidden per-row argument columns to aggregate over.
    fn add_having_aggregates(&mut self, expr: &WhereExpr) {
        match expr {
            WhereExpr::Condition(cond) => {
                if let ConditionLhs::Aggregate { func, arg } = &cond.lhs {
                    if self.find_aggregate(*func, arg).is_none() {
                        self.columns.push(ColumnPlan {
                            label: format!("{}({})", func, arg.canonical()),
                            kind: ColumnKind::Aggregate {
                                func: *func,
                                arg: arg.clone(),
                            },
                            hidden: true,
                        });
                    }
                }
            }
            WhereExpr::And(a, b) | WhereExpr::Or(a, b) => {
                self.add_having_aggregates(a);
                self.add_having_aggregates(b);
            }
            WhereExpr::Not(inner) => self.add_having_aggregates(inner),
        }
    }

    pub fn visible_labels(&self) -> Vec<String> {
        self.columns[..self.visible]
            .iter()
            .map(|c| c.label.clone())
            .collect()
    }
}

/// Per-file processing outcome, appended to the shared buffer under the
/// result mutex.
struct FileOutcome {
    rows: Vec<ResultRow>,
    warnings: Vec<ArxError>,
    error: Option<ArxError>,
}

/// Query executor. Configure with the builder methods, then call
/// [`Executor::execute`].
pub struct Executor<'q> {
    query: &'q Query,
    verbose: bool,
    cancel: Option<Arc<AtomicBool>>,
    progress: Option<Box<ProgressFn>>,
}

impl<'q> Executor<'q> {
    pub fn new(query: &'q Query) -> Self {
        Self {
            query,
            verbose: false,
            cancel: None,
            progress: None,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Externally owned cancellation flag, polled before each file.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_progress<F: Fn(u64, u64) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn execute(self) -> ArxResult<ResultSet> {
        let start = Instant::now();
        let files = discover::discover_files(&self.query.from_path)?;
        let (plan, mut warnings) = ProjectionPlan::build(self.query);

        let total = files.len();
        let cancel = self
            .cancel
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
        let progress = ProgressCounter::new(total as u64, self.progress);

        let outcomes = if total < PARALLEL_THRESHOLD {
            let mut acc = Vec::with_capacity(total);
            for path in &files {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                acc.push(process_file(path, self.query, &plan, self.verbose));
                progress.file_done();
            }
            acc
        } else {
            let workers = worker_count(total);
            let shared: Mutex<Vec<FileOutcome>> = Mutex::new(Vec::with_capacity(total));
            std::thread::scope(|scope| {
                for k in 0..workers {
                    let files = &files;
                    let plan = &plan;
                    let query = self.query;
                    let shared = &shared;
                    let cancel = &cancel;
                    let progress = &progress;
                    let verbose = self.verbose;
                    scope.spawn(move || {
                        let mut idx = k;
                        while idx < files.len() {
                            if cancel.load(Ordering::Relaxed) {
                                break;
                            }
                            let outcome = process_file(&files[idx], query, plan, verbose);
                            progress.file_done();
                            shared.lock().unwrap().push(outcome);
                            idx += workers;
                        }
                    });
                }
            });
            shared.into_inner().unwrap()
        };

        let attempted = outcomes.len();
        let cancelled = cancel.load(Ordering::Relaxed) && attempted < total;

        let mut rows: Vec<ResultRow> = Vec::new();
        let mut file_errors: Vec<ArxError> = Vec::new();
        for outcome in outcomes {
            warnings.extend(outcome.warnings);
            match outcome.error {
                Some(err) => file_errors.push(err),
                None => rows.extend(outcome.rows),
            }
        }

        let failed = file_errors.len();
        if failed == attempted && attempted > 0 {
            if failed == 1 {
                return Err(file_errors.pop().unwrap());
            }
            return Err(ArxError::code(codes::ALL_FILES_FAILED)
                .with_detail(format!("{} of {} files", failed, attempted)));
        }
        // with at least one good file, per-file failures demote to warnings
        for mut err in file_errors {
            err.severity = Severity::Warning;
            warnings.push(err);
        }

        if cancelled {
            warnings.push(
                ArxError::code(codes::QUERY_CANCELLED)
                    .with_detail(format!("{} of {} files processed", attempted, total)),
            );
        }
        if rows.len() > LARGE_DATASET_ROWS {
            warnings.push(
                ArxError::code(codes::LARGE_DATASET)
                    .with_detail(format!("{} rows before post-processing", rows.len())),
            );
        }

        let raw_rows = rows.len();
        let mut rows = postproc::apply(self.query, &plan, rows);
        for row in &mut rows {
            row.values.truncate(plan.visible);
        }

        let stats = ExecStats {
            files_total: total,
            files_processed: attempted - failed,
            files_failed: failed,
            raw_rows,
            elapsed_secs: start.elapsed().as_secs_f64(),
            cancelled,
        };
        if self.verbose {
            warnings.push(ArxError::code(codes::EXECUTION_STATISTICS).with_detail(format!(
                "{} file(s), {} failed, {} raw row(s), {} result row(s), {:.3}s",
                stats.files_total,
                stats.files_failed,
                stats.raw_rows,
                rows.len(),
                stats.elapsed_secs
            )));
        }

        Ok(ResultSet {
            columns: plan.visible_labels(),
            rows,
            warnings,
            stats,
        })
    }
}

/// `min(hardware_parallelism, 16)`, falling back to 4 when the hardware
/// parallelism cannot be determined; never more workers than files.
fn worker_count(files: usize) -> usize {
    let hw = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    hw.min(MAX_WORKERS).min(files).max(1)
}

fn process_file(path: &Path, query: &Query, plan: &ProjectionPlan, verbose: bool) -> FileOutcome {
    let mut outcome = FileOutcome {
        rows: Vec::new(),
        warnings: Vec::new(),
        error: None,
    };

    let text = match discover::read_document_text(path) {
        Ok(text) => text,
        Err(err) => {
            outcome.error = Some(err);
            return outcome;
        }
    };
    let doc = match Document::parse(&text) {
        Ok(doc) => doc,
        Err(err) => {
            outcome.error = Some(
                ArxError::code(codes::XML_PARSE_FAILED)
                    .with_detail(err.to_string())
                    .with_location(Location::in_file(path)),
            );
            return outcome;
        }
    };

    let filename = display_name(path);
    let mut nav = Navigator::new(&doc, filename, verbose);

    if query.for_clauses.is_empty() {
        project_no_for(&mut nav, query, plan, &mut outcome.rows);
    } else {
        let mut bindings = Bindings::new();
        expand_for(&mut nav, query, plan, 0, &mut bindings, &mut outcome.rows);
    }

    outcome.warnings = nav.take_warnings();
    outcome
}

/// FILE_NAME values and error locations use the file name, not the
/// full path, so directory queries read naturally.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// No-FOR projection: the cartesian product of the per-column value
/// sequences, filtered by WHERE. A column that matches nothing
/// contributes a single empty cell so the remaining columns still
/// produce rows. Each candidate row is anchored at its first node for
/// condition correlation.
fn project_no_for<'a, 'input>(
    nav: &mut Navigator<'a, 'input>,
    query: &Query,
    plan: &ProjectionPlan,
    out: &mut Vec<ResultRow>,
) {
    type Cell<'a, 'input> = (Option<Node<'a, 'input>>, Option<String>);
    let mut columns: Vec<Vec<Cell<'a, 'input>>> = Vec::with_capacity(plan.columns.len());

    for col in &plan.columns {
        let cells: Vec<Cell> = match &col.kind {
            ColumnKind::FileName => vec![(None, Some(nav.filename().to_string()))],
            ColumnKind::Field(field) | ColumnKind::Aggregate { arg: field, .. } => {
                let nodes = nav.resolve_nodes(field, None);
                if nodes.is_empty() {
                    vec![(None, None)]
                } else {
                    nodes
                        .into_iter()
                        .map(|n| (Some(n), nav.node_value(n, field)))
                        .collect()
                }
            }
        };
        columns.push(cells);
    }

    let bindings = Bindings::new();
    let mut idx = vec![0usize; columns.len()];
    'rows: loop {
        let anchor = columns
            .iter()
            .zip(&idx)
            .find_map(|(cells, &i)| cells[i].0);
        let passes = match query.where_clause {
            Some(ref w) => nav.evaluate(w, &bindings, anchor),
            None => true,
        };
        if passes {
            out.push(ResultRow::new(
                columns
                    .iter()
                    .zip(&idx)
                    .map(|(cells, &i)| cells[i].1.clone())
                    .collect(),
            ));
        }

        // odometer increment, last column fastest
        let mut k = columns.len() - 1;
        loop {
            idx[k] += 1;
            if idx[k] < columns[k].len() {
                break;
            }
            idx[k] = 0;
            if k == 0 {
                break 'rows;
            }
            k -= 1;
        }
    }
}

/// Recursive cartesian expansion of the FOR clauses. Rows come out in
/// document order of the outermost clause, then inner ones.
fn expand_for<'a, 'input>(
    nav: &mut Navigator<'a, 'input>,
    query: &Query,
    plan: &ProjectionPlan,
    level: usize,
    bindings: &mut Bindings<'a, 'input>,
    out: &mut Vec<ResultRow>,
) {
    if level == query.for_clauses.len() {
        let passes = match query.where_clause {
            Some(ref w) => nav.evaluate(w, bindings, None),
            None => true,
        };
        if passes {
            out.push(project_row(nav, plan, bindings));
        }
        return;
    }

    let fc = &query.for_clauses[level];
    let anchors: Vec<Node<'a, 'input>> = match fc.iter_path.variable {
        Some(ref var) => match bindings.get(var) {
            Some(Bound::Node(node)) => find_relative(node, &fc.iter_path.components),
            _ => Vec::new(),
        },
        None => nav.resolve_nodes(&fc.iter_path, None),
    };

    for (i, anchor) in anchors.into_iter().enumerate() {
        bindings.push(&fc.variable, Bound::Node(anchor));
        if let Some(ref pv) = fc.position_var {
            bindings.push(pv, Bound::Position(i + 1));
        }
        expand_for(nav, query, plan, level + 1, bindings, out);
        if fc.position_var.is_some() {
            bindings.pop();
        }
        bindings.pop();
    }
}

fn project_row<'a, 'input>(
    nav: &mut Navigator<'a, 'input>,
    plan: &ProjectionPlan,
    bindings: &Bindings<'a, 'input>,
) -> ResultRow {
    let values = plan
        .columns
        .iter()
        .map(|col| match &col.kind {
            ColumnKind::FileName => Some(nav.filename().to_string()),
            ColumnKind::Field(field) | ColumnKind::Aggregate { arg: field, .. } => {
                field_cell(nav, field, bindings)
            }
        })
        .collect();
    ResultRow::new(values)
}

/// One cell of a FOR-expanded row. Variable-bound paths resolve against
/// the bound node; the first match in document order wins. Unbound
/// paths resolve at file level.
fn field_cell<'a, 'input>(
    nav: &mut Navigator<'a, 'input>,
    field: &FieldPath,
    bindings: &Bindings<'a, 'input>,
) -> Option<String> {
    if let Some(ref var) = field.variable {
        return match bindings.get(var) {
            Some(Bound::Position(pos)) => Some(pos.to_string()),
            Some(Bound::Node(node)) => {
                if field.components.is_empty() {
                    nav.node_value(node, field)
                } else {
                    find_relative(node, &field.components)
                        .into_iter()
                        .next()
                        .and_then(|n| nav.node_value(n, field))
                }
            }
            None => None,
        };
    }
    nav.resolve_nodes(field, None)
        .into_iter()
        .next()
        .and_then(|n| nav.node_value(n, field))
}
