//! XML navigation: path search, value extraction and predicate
//! evaluation over one in-memory document.
//!
//! Path resolution threads the current element-name chain through the
//! traversal as an explicit stack, so partial-path matching over a tree
//! of N nodes costs O(N) per invocation instead of rebuilding ancestor
//! chains per node.

use crate::errors::{codes, ArxError};
use crate::parser::{Condition, ConditionLhs, ConditionOp, ConditionRhs, FieldPath, WhereExpr};
use ahash::{AHashMap, AHashSet};
use regex::Regex;
use roxmltree::{Document, Node};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::cmp::Ordering;

thread_local! {
    /// Compiled LIKE patterns, keyed by pattern text. Per-thread, so no
    /// lock is ever taken on the hot path.
    static PATTERN_CACHE: RefCell<AHashMap<String, Regex>> = RefCell::new(AHashMap::new());
}

/// A value bound to a FOR variable during row expansion.
#[derive(Debug, Clone, Copy)]
pub enum Bound<'a, 'input> {
    Node(Node<'a, 'input>),
    /// 1-based iteration index from an `AT` binding.
    Position(usize),
}

/// FOR-variable scope: a stack of frames, one per FOR level. Frames are
/// pushed and popped as the cartesian expansion recurses, so bindings
/// never outlive one row.
#[derive(Debug, Default)]
pub struct Bindings<'a, 'input> {
    frames: Vec<(String, Bound<'a, 'input>)>,
}

impl<'a, 'input> Bindings<'a, 'input> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, bound: Bound<'a, 'input>) {
        self.frames.push((name.to_string(), bound));
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn get(&self, name: &str) -> Option<Bound<'a, 'input>> {
        self.frames
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, b)| *b)
    }
}

/// Per-file navigator. Collects warnings (ambiguous partial paths,
/// empty matches) which the executor attaches to the result set.
pub struct Navigator<'a, 'input> {
    doc: &'a Document<'input>,
    filename: String,
    verbose: bool,
    warnings: Vec<ArxError>,
    warned_fields: AHashSet<String>,
}

impl<'a, 'input> Navigator<'a, 'input> {
    pub fn new(doc: &'a Document<'input>, filename: impl Into<String>, verbose: bool) -> Self {
        Self {
            doc,
            filename: filename.into(),
            verbose,
            warnings: Vec::new(),
            warned_fields: AHashSet::new(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn take_warnings(&mut self) -> Vec<ArxError> {
        std::mem::take(&mut self.warnings)
    }

    /// Extract `(filename, value)` pairs for a field at file level.
    pub fn extract_values(&mut self, field: &FieldPath) -> Vec<(String, String)> {
        let nodes = self.resolve_nodes(field, None);
        nodes
            .into_iter()
            .filter_map(|node| self.node_value(node, field))
            .map(|value| (self.filename.clone(), value))
            .collect()
    }

    /// Locate the nodes a field refers to. `scope` anchors the search at
    /// a FOR-bound node; without it the search is file-relative.
    pub fn resolve_nodes(
        &mut self,
        field: &FieldPath,
        scope: Option<Node<'a, 'input>>,
    ) -> Vec<Node<'a, 'input>> {
        if let Some(anchor) = scope {
            return find_relative(anchor, &field.components);
        }

        let root = self.doc.root_element();

        if field.components.is_empty() {
            // attribute-only field: every node bearing the attribute
            if let Some(ref attr) = field.attribute {
                return self
                    .doc
                    .descendants()
                    .filter(|n| n.is_element() && n.has_attribute(attr.as_str()))
                    .collect();
            }
            return Vec::new();
        }

        if field.components.len() == 1 && !field.is_partial {
            // bare name reads the document root only
            if root.tag_name().name() == field.components[0] {
                return vec![root];
            }
            return Vec::new();
        }

        let matches = find_by_partial_path(root, &field.components);
        if field.is_partial {
            return self.disambiguate(field, matches);
        }
        matches
    }

    /// Partial paths may end several distinct full paths. The first
    /// full-path string (in document order) wins; in verbose mode the
    /// alternatives are reported once per field and file.
    fn disambiguate(
        &mut self,
        field: &FieldPath,
        matches: Vec<Node<'a, 'input>>,
    ) -> Vec<Node<'a, 'input>> {
        if matches.len() < 2 {
            return matches;
        }

        let mut distinct: Vec<String> = Vec::new();
        let mut keyed: Vec<(usize, Node<'a, 'input>)> = Vec::with_capacity(matches.len());
        for node in matches {
            let path = full_path_of(node);
            let idx = match distinct.iter().position(|p| p == &path) {
                Some(idx) => idx,
                None => {
                    distinct.push(path);
                    distinct.len() - 1
                }
            };
            keyed.push((idx, node));
        }

        if distinct.len() > 1 {
            if self.verbose && self.warned_fields.insert(field.raw.clone()) {
                self.warnings.push(
                    ArxError::code(codes::AMBIGUOUS_PARTIAL_PATH).with_detail(format!(
                        "'{}' in {} matches {}",
                        field.raw,
                        self.filename,
                        distinct.join(", ")
                    )),
                );
            }
            return keyed
                .into_iter()
                .filter(|(idx, _)| *idx == 0)
                .map(|(_, node)| node)
                .collect();
        }
        keyed.into_iter().map(|(_, node)| node).collect()
    }

    /// Read the value a field selects from a located node: an attribute
    /// value, or the element's own text content.
    pub fn node_value(&self, node: Node<'a, 'input>, field: &FieldPath) -> Option<String> {
        match field.attribute {
            Some(ref attr) => node.attribute(attr.as_str()).map(|v| v.to_string()),
            None => Some(element_text(node)),
        }
    }

    /// Evaluate a WHERE tree. `bindings` carries the FOR variables in
    /// scope; `anchor` is the row's anchor node in the no-FOR path and
    /// drives nearest-ancestor correlation for unbound condition fields.
    pub fn evaluate(
        &mut self,
        expr: &WhereExpr,
        bindings: &Bindings<'a, 'input>,
        anchor: Option<Node<'a, 'input>>,
    ) -> bool {
        match expr {
            WhereExpr::And(a, b) => {
                self.evaluate(a, bindings, anchor) && self.evaluate(b, bindings, anchor)
            }
            WhereExpr::Or(a, b) => {
                self.evaluate(a, bindings, anchor) || self.evaluate(b, bindings, anchor)
            }
            WhereExpr::Not(inner) => !self.evaluate(inner, bindings, anchor),
            WhereExpr::Condition(cond) => self.eval_condition(cond, bindings, anchor),
        }
    }

    fn eval_condition(
        &mut self,
        cond: &Condition,
        bindings: &Bindings<'a, 'input>,
        anchor: Option<Node<'a, 'input>>,
    ) -> bool {
        let field = match cond.lhs {
            ConditionLhs::Field(ref field) => field,
            // aggregate conditions belong to HAVING, which is evaluated
            // after grouping, never here
            ConditionLhs::Aggregate { .. } => return false,
        };

        let values = self.condition_values(field, bindings, anchor);

        match cond.op {
            ConditionOp::IsNull => values.is_empty(),
            ConditionOp::IsNotNull => !values.is_empty(),
            ConditionOp::Like => match cond.rhs {
                ConditionRhs::Literal(ref lit) => values
                    .iter()
                    .any(|v| like_matches(v, lit.value()).unwrap_or(false)),
                _ => false,
            },
            ConditionOp::In => match cond.rhs {
                ConditionRhs::List(ref list) => values
                    .iter()
                    .any(|v| list.iter().any(|lit| loose_eq(v, lit.value()))),
                _ => false,
            },
            op => match cond.rhs {
                ConditionRhs::Literal(ref lit) => values
                    .iter()
                    .any(|v| ordering_satisfies(op, loose_compare(v, lit.value()))),
                _ => false,
            },
        }
    }

    /// Values a condition field takes for the current row.
    fn condition_values(
        &mut self,
        field: &FieldPath,
        bindings: &Bindings<'a, 'input>,
        anchor: Option<Node<'a, 'input>>,
    ) -> Vec<String> {
        if let Some(ref var) = field.variable {
            return match bindings.get(var) {
                Some(Bound::Position(pos)) => vec![pos.to_string()],
                Some(Bound::Node(node)) => {
                    if field.components.is_empty() {
                        self.node_value(node, field).into_iter().collect()
                    } else {
                        find_relative(node, &field.components)
                            .into_iter()
                            .filter_map(|n| self.node_value(n, field))
                            .collect()
                    }
                }
                None => Vec::new(),
            };
        }

        let nodes = self.resolve_nodes(field, None);
        let scoped: Vec<Node<'a, 'input>> = match anchor {
            Some(anchor) => nearest_enclosing(anchor, &nodes),
            None => nodes,
        };
        scoped
            .into_iter()
            .filter_map(|n| self.node_value(n, field))
            .collect()
    }
}

/// Depth-first search collecting every node whose element-name chain
/// from `root` (inclusive) ends with `components`.
pub fn find_by_partial_path<'a, 'input>(
    root: Node<'a, 'input>,
    components: &[String],
) -> Vec<Node<'a, 'input>> {
    let mut stack: SmallVec<[&str; 16]> = SmallVec::new();
    let mut found = Vec::new();
    walk_suffix(root, components, &mut stack, &mut found);
    found
}

fn walk_suffix<'a, 'input>(
    node: Node<'a, 'input>,
    components: &[String],
    stack: &mut SmallVec<[&'a str; 16]>,
    found: &mut Vec<Node<'a, 'input>>,
) {
    if !node.is_element() {
        return;
    }
    stack.push(node.tag_name().name());

    let k = components.len();
    if stack.len() >= k {
        let offset = stack.len() - k;
        if stack[offset..]
            .iter()
            .zip(components)
            .all(|(have, want)| *have == want.as_str())
        {
            found.push(node);
        }
    }

    for child in node.children() {
        walk_suffix(child, components, stack, found);
    }
    stack.pop();
}

/// Exact-relative resolution below a scope node: the chain from `scope`
/// (exclusive) must equal `components`. Non-matching branches are
/// pruned immediately.
pub fn find_relative<'a, 'input>(
    scope: Node<'a, 'input>,
    components: &[String],
) -> Vec<Node<'a, 'input>> {
    let mut found = Vec::new();
    if components.is_empty() {
        return found;
    }
    walk_exact(scope, components, 0, &mut found);
    found
}

fn walk_exact<'a, 'input>(
    node: Node<'a, 'input>,
    components: &[String],
    depth: usize,
    found: &mut Vec<Node<'a, 'input>>,
) {
    for child in node.children().filter(|c| c.is_element()) {
        if child.tag_name().name() != components[depth] {
            continue;
        }
        if depth + 1 == components.len() {
            found.push(child);
        } else {
            walk_exact(child, components, depth + 1, found);
        }
    }
}

/// Full element-name path of a node from the document root, as a
/// `/`-joined string. Used for ambiguity reporting only.
pub fn full_path_of(node: Node) -> String {
    let mut names: SmallVec<[&str; 16]> = SmallVec::new();
    let mut current = Some(node);
    while let Some(n) = current {
        if n.is_element() {
            names.push(n.tag_name().name());
        }
        current = n.parent();
    }
    names.reverse();
    names.join("/")
}

/// Restrict condition nodes to the subtree of the nearest ancestor of
/// `anchor` that contains at least one of them. Falls back to the whole
/// set (document scope) when only the root qualifies.
fn nearest_enclosing<'a, 'input>(
    anchor: Node<'a, 'input>,
    nodes: &[Node<'a, 'input>],
) -> Vec<Node<'a, 'input>> {
    for ancestor in anchor.ancestors().filter(|a| a.is_element()) {
        let inside: Vec<Node<'a, 'input>> = nodes
            .iter()
            .copied()
            .filter(|n| n.ancestors().any(|a| a == ancestor))
            .collect();
        if !inside.is_empty() {
            return inside;
        }
    }
    nodes.to_vec()
}

/// Direct text content of an element, trimmed.
pub fn element_text(node: Node) -> String {
    let mut out = String::new();
    for child in node.children() {
        if child.is_text() {
            if let Some(t) = child.text() {
                out.push_str(t);
            }
        }
    }
    out.trim().to_string()
}

/// Compile a LIKE pattern. `/re/` delimiters select verbatim regex
/// (unanchored); anything else is a SQL wildcard pattern, anchored,
/// with `%` as `.*` and `_` as `.`.
pub fn compile_like(pattern: &str) -> Result<Regex, regex::Error> {
    if pattern.len() >= 2 && pattern.starts_with('/') && pattern.ends_with('/') {
        return Regex::new(&pattern[1..pattern.len() - 1]);
    }
    let mut re = String::with_capacity(pattern.len() + 2);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
}

/// Cached LIKE match; patterns compile once per thread.
pub fn like_matches(value: &str, pattern: &str) -> Result<bool, regex::Error> {
    PATTERN_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(re) = cache.get(pattern) {
            return Ok(re.is_match(value));
        }
        let re = compile_like(pattern)?;
        let matched = re.is_match(value);
        cache.insert(pattern.to_string(), re);
        Ok(matched)
    })
}

/// Per-comparison numeric-or-string ordering: numeric when both sides
/// parse as decimal numbers, lexicographic otherwise.
pub fn loose_compare(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or_else(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

pub fn loose_eq(a: &str, b: &str) -> bool {
    loose_compare(a, b) == Ordering::Equal
}

fn ordering_satisfies(op: ConditionOp, ord: Ordering) -> bool {
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
