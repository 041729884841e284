//! Recursive-descent parser producing a [`Query`] from a token stream.
//!
//! Grammar outline:
//!
//! ```text
//! query      := SELECT [DISTINCT] select_list FROM from_path for_clause*
//!               [WHERE expr] [GROUP BY path,..] [HAVING expr]
//!               [ORDER BY path [ASC|DESC],..] [LIMIT n] [OFFSET n]
//! for_clause := FOR ident IN path [AT ident]
//! expr       := and (OR and)*
//! and        := not (AND not)*
//! not        := NOT not | '(' expr ')' | condition
//! ```
//!
//! FOR-variable references in SELECT/WHERE/GROUP/ORDER paths are resolved
//! in a post-parse pass because the FOR clauses appear after the SELECT
//! list in the surface syntax. Iteration paths themselves may only
//! reference variables declared by a lexically earlier FOR clause.

mod ast;

pub use ast::*;

use crate::errors::{codes, ArxError, ArxResult};
use crate::lexer::{Keyword, Lexer, Token, TokenKind};
use ahash::AHashSet;

/// Parse output: the query plus non-fatal diagnostics (duplicate SELECT
/// fields and the like).
#[derive(Debug)]
pub struct Parsed {
    pub query: Query,
    pub warnings: Vec<ArxError>,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    warnings: Vec<ArxError>,
    dsn_mode: bool,
}

impl Parser {
    /// Parse a query in standard mode.
    pub fn parse(input: &str) -> ArxResult<Parsed> {
        Self::parse_with_mode(input, false)
    }

    /// Parse a query. In DSN mode leading-dot partial paths are rejected.
    pub fn parse_with_mode(input: &str, dsn_mode: bool) -> ArxResult<Parsed> {
        let tokens = Lexer::tokenize(input)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            warnings: Vec::new(),
            dsn_mode,
        };
        let query = parser.parse_query()?;
        Ok(Parsed {
            query,
            warnings: parser.warnings,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.peek().is_keyword(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn err_at(&self, code: &'static str, detail: impl AsRef<str>) -> ArxError {
        ArxError::code(code)
            .with_detail(detail)
            .with_location(self.peek().location())
    }

    /// True when the current token starts a clause that terminates the
    /// one being parsed.
    fn at_clause_boundary(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::EndOfInput
                | TokenKind::Keyword(
                    Keyword::From
                        | Keyword::For
                        | Keyword::Where
                        | Keyword::Group
                        | Keyword::Having
                        | Keyword::Order
                        | Keyword::Limit
                        | Keyword::Offset
                )
        )
    }

    fn parse_query(&mut self) -> ArxResult<Query> {
        if self.peek_kind() == TokenKind::EndOfInput {
            return Err(ArxError::code(codes::EMPTY_INPUT));
        }
        if !self.eat_keyword(Keyword::Select) {
            return Err(self.err_at(
                codes::MALFORMED_SELECT_ITEM,
                format!("expected SELECT, found {}", self.peek().kind),
            ));
        }

        let mut query = Query {
            distinct: self.eat_keyword(Keyword::Distinct),
            ..Query::default()
        };

        self.parse_select_list(&mut query)?;
        self.parse_from(&mut query)?;
        self.parse_for_clauses(&mut query)?;

        if self.eat_keyword(Keyword::Where) {
            query.where_clause = Some(self.parse_expr(false)?);
        }
        if self.peek().is_keyword(Keyword::Group) {
            self.bump();
            if !self.eat_keyword(Keyword::By) {
                return Err(self.err_at(codes::UNEXPECTED_TOKEN, "expected BY after GROUP"));
            }
            loop {
                query.group_by.push(self.parse_group_field()?);
                if !matches!(self.peek_kind(), TokenKind::Comma) {
                    break;
                }
                self.bump();
            }
        }
        if self.eat_keyword(Keyword::Having) {
            query.having = Some(self.parse_expr(true)?);
        }
        if self.peek().is_keyword(Keyword::Order) {
            self.bump();
            if !self.eat_keyword(Keyword::By) {
                return Err(self.err_at(codes::UNEXPECTED_TOKEN, "expected BY after ORDER"));
            }
            loop {
                let field = self.parse_group_field()?;
                let direction = if self.eat_keyword(Keyword::Asc) {
                    SortDirection::Asc
                } else if self.eat_keyword(Keyword::Desc) {
                    SortDirection::Desc
                } else {
                    SortDirection::default()
                };
                query.order_by.push(OrderKey { field, direction });
                if !matches!(self.peek_kind(), TokenKind::Comma) {
                    break;
                }
                self.bump();
            }
        }
        self.parse_limit_offset(&mut query)?;

        if self.peek_kind() != TokenKind::EndOfInput {
            return Err(self.err_at(
                codes::UNEXPECTED_TOKEN,
                format!("{} after end of query", self.peek().kind),
            ));
        }

        self.resolve_variables(&mut query);
        self.check_aggregate_invariants(&query)?;
        Ok(query)
    }

    fn parse_select_list(&mut self, query: &mut Query) -> ArxResult<()> {
        if self.peek().is_keyword(Keyword::From) {
            return Err(self.err_at(codes::EMPTY_SELECT, "no fields before FROM"));
        }

        let mut seen: AHashSet<String> = AHashSet::new();
        loop {
            let item = self.parse_select_item(query)?;
            if let SelectItem::Field(ref path) = item {
                if !seen.insert(path.canonical()) {
                    self.warnings
                        .push(ArxError::code(codes::DUPLICATE_SELECT_FIELD).with_detail(&path.raw));
                }
            }
            query.select_items.push(item);

            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        Ok(())
    }

    fn parse_select_item(&mut self, query: &mut Query) -> ArxResult<SelectItem> {
        match self.peek_kind() {
            TokenKind::Star => Err(self.err_at(
                codes::MALFORMED_SELECT_ITEM,
                "SELECT * is not supported; list fields explicitly",
            )),
            TokenKind::Keyword(Keyword::FileName) => {
                self.bump();
                let alias = self.parse_alias()?;
                Ok(SelectItem::FileName { alias })
            }
            TokenKind::Keyword(kw) if AggregateFunc::from_keyword(kw).is_some() => {
                let func = AggregateFunc::from_keyword(kw).unwrap();
                self.bump();
                if !matches!(self.peek_kind(), TokenKind::LParen) {
                    return Err(self.err_at(
                        codes::MALFORMED_SELECT_ITEM,
                        format!("expected '(' after {func}"),
                    ));
                }
                self.bump();
                if matches!(self.peek_kind(), TokenKind::Star) {
                    return Err(self.err_at(
                        codes::AGGREGATE_NEEDS_ELEMENT,
                        format!("{func}(*) is not supported"),
                    ));
                }
                let arg = self.parse_field_path()?;
                if !matches!(self.peek_kind(), TokenKind::RParen) {
                    return Err(self.err_at(codes::UNBALANCED_PARENS, format!("in {func}(...)")));
                }
                self.bump();
                let alias = self.parse_alias()?;
                let raw = format!("{}({})", func, arg.raw);
                query.has_aggregates = true;
                Ok(SelectItem::Aggregate(Aggregate {
                    func,
                    arg,
                    alias,
                    raw,
                }))
            }
            _ => {
                let mut path = self.parse_field_path()?;
                path.alias = self.parse_alias()?;
                Ok(SelectItem::Field(path))
            }
        }
    }

    fn parse_alias(&mut self) -> ArxResult<Option<String>> {
        if !self.eat_keyword(Keyword::As) {
            return Ok(None);
        }
        match self.peek_kind() {
            TokenKind::Ident => Ok(Some(self.bump().text)),
            _ => Err(self.err_at(codes::MALFORMED_SELECT_ITEM, "expected alias after AS")),
        }
    }

    /// FROM collects tokens up to the next clause keyword. `.` and `/`
    /// concatenate without whitespace; a quoted path is taken verbatim.
    fn parse_from(&mut self, query: &mut Query) -> ArxResult<()> {
        if !self.eat_keyword(Keyword::From) {
            return Err(self.err_at(
                codes::MISSING_FROM,
                format!("expected FROM, found {}", self.peek().kind),
            ));
        }

        let mut path = String::new();
        while !self.at_clause_boundary() {
            let token = self.bump();
            match token.kind {
                TokenKind::Str | TokenKind::Ident | TokenKind::Number => {
                    path.push_str(&token.text)
                }
                TokenKind::Dot => path.push('.'),
                TokenKind::Slash => path.push('/'),
                TokenKind::Star => path.push('*'),
                other => {
                    return Err(ArxError::code(codes::MISSING_FROM)
                        .with_detail(format!("unexpected {} in FROM path", other))
                        .with_location(token.location()));
                }
            }
        }

        if path.is_empty() {
            return Err(ArxError::code(codes::MISSING_FROM));
        }
        query.from_path = path;
        Ok(())
    }

    fn parse_for_clauses(&mut self, query: &mut Query) -> ArxResult<()> {
        let mut declared: Vec<String> = Vec::new();

        while self.eat_keyword(Keyword::For) {
            let variable = match self.peek_kind() {
                TokenKind::Ident => self.bump().text,
                _ => {
                    return Err(self.err_at(codes::MALFORMED_FOR, "expected variable after FOR"))
                }
            };
            if declared.iter().any(|v| v == &variable) {
                return Err(self.err_at(codes::DUPLICATE_VARIABLE, &variable));
            }
            if !self.eat_keyword(Keyword::In) {
                return Err(self.err_at(codes::MALFORMED_FOR, "expected IN after FOR variable"));
            }

            let mut iter_path = self.parse_field_path()?;
            // Iteration paths may anchor on a variable from an earlier
            // clause only; later declarations are out of scope here.
            if let Some(first) = iter_path.components.first() {
                if declared.iter().any(|v| v == first) {
                    iter_path.variable = Some(iter_path.components.remove(0));
                }
            }

            let position_var = if self.eat_keyword(Keyword::At) {
                match self.peek_kind() {
                    TokenKind::Ident => {
                        let name = self.bump().text;
                        if declared.iter().any(|v| v == &name) || name == variable {
                            return Err(self.err_at(codes::DUPLICATE_VARIABLE, &name));
                        }
                        Some(name)
                    }
                    _ => {
                        return Err(self.err_at(codes::MALFORMED_FOR, "expected variable after AT"))
                    }
                }
            } else {
                None
            };

            declared.push(variable.clone());
            if let Some(ref pv) = position_var {
                declared.push(pv.clone());
            }
            query.for_clauses.push(ForClause {
                variable,
                iter_path,
                position_var,
            });
        }
        Ok(())
    }

    fn parse_expr(&mut self, in_having: bool) -> ArxResult<WhereExpr> {
        let mut left = self.parse_and(in_having)?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.parse_and(in_having)?;
            left = WhereExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self, in_having: bool) -> ArxResult<WhereExpr> {
        let mut left = self.parse_not(in_having)?;
        while self.eat_keyword(Keyword::And) {
            let right = self.parse_not(in_having)?;
            left = WhereExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self, in_having: bool) -> ArxResult<WhereExpr> {
        if self.eat_keyword(Keyword::Not) {
            let inner = self.parse_not(in_having)?;
            return Ok(WhereExpr::Not(Box::new(inner)));
        }
        if matches!(self.peek_kind(), TokenKind::LParen) {
            self.bump();
            let inner = self.parse_expr(in_having)?;
            if !matches!(self.peek_kind(), TokenKind::RParen) {
                return Err(self.err_at(codes::UNBALANCED_PARENS, "expected ')'"));
            }
            self.bump();
            return Ok(inner);
        }
        Ok(WhereExpr::Condition(self.parse_condition(in_having)?))
    }

    fn parse_condition(&mut self, in_having: bool) -> ArxResult<Condition> {
        let lhs = match self.peek_kind() {
            TokenKind::Keyword(kw) if AggregateFunc::from_keyword(kw).is_some() => {
                if !in_having {
                    return Err(self.err_at(
                        codes::MALFORMED_WHERE,
                        "aggregates are only allowed in HAVING",
                    ));
                }
                let func = AggregateFunc::from_keyword(kw).unwrap();
                self.bump();
                if !matches!(self.peek_kind(), TokenKind::LParen) {
                    return Err(self.err_at(
                        codes::MALFORMED_WHERE,
                        format!("expected '(' after {func}"),
                    ));
                }
                self.bump();
                if matches!(self.peek_kind(), TokenKind::Star) {
                    return Err(self.err_at(
                        codes::AGGREGATE_NEEDS_ELEMENT,
                        format!("{func}(*) is not supported"),
                    ));
                }
                let arg = self.parse_field_path()?;
                if !matches!(self.peek_kind(), TokenKind::RParen) {
                    return Err(self.err_at(codes::UNBALANCED_PARENS, format!("in {func}(...)")));
                }
                self.bump();
                ConditionLhs::Aggregate { func, arg }
            }
            _ => ConditionLhs::Field(self.parse_field_path()?),
        };

        let (op, rhs) = match self.peek_kind() {
            TokenKind::Eq => (ConditionOp::Eq, self.bump_then_literal()?),
            TokenKind::Neq => (ConditionOp::Ne, self.bump_then_literal()?),
            TokenKind::Lt => (ConditionOp::Lt, self.bump_then_literal()?),
            TokenKind::Gt => (ConditionOp::Gt, self.bump_then_literal()?),
            TokenKind::Le => (ConditionOp::Le, self.bump_then_literal()?),
            TokenKind::Ge => (ConditionOp::Ge, self.bump_then_literal()?),
            TokenKind::Keyword(Keyword::Like) => {
                self.bump();
                match self.peek_kind() {
                    TokenKind::Str => {
                        let token = self.bump();
                        let location = token.location();
                        let pattern = token.text;
                        if let Err(e) = crate::navigator::compile_like(&pattern) {
                            return Err(ArxError::code(codes::INVALID_LIKE_PATTERN)
                                .with_detail(e.to_string())
                                .with_location(location));
                        }
                        (
                            ConditionOp::Like,
                            ConditionRhs::Literal(Literal::Str(pattern)),
                        )
                    }
                    _ => {
                        return Err(self.err_at(
                            codes::INVALID_LIKE_PATTERN,
                            "LIKE takes a quoted pattern",
                        ))
                    }
                }
            }
            TokenKind::Keyword(Keyword::In) => {
                self.bump();
                if !matches!(self.peek_kind(), TokenKind::LParen) {
                    return Err(self.err_at(codes::INVALID_LITERAL, "expected '(' after IN"));
                }
                self.bump();
                let mut items = Vec::new();
                loop {
                    items.push(self.parse_literal()?);
                    match self.peek_kind() {
                        TokenKind::Comma => {
                            self.bump();
                        }
                        TokenKind::RParen => {
                            self.bump();
                            break;
                        }
                        _ => {
                            return Err(self.err_at(codes::INVALID_LITERAL, "expected ',' or ')'"))
                        }
                    }
                }
                (ConditionOp::In, ConditionRhs::List(items))
            }
            TokenKind::Keyword(Keyword::Is) => {
                self.bump();
                let negated = self.eat_keyword(Keyword::Not);
                if !self.eat_keyword(Keyword::Null) {
                    return Err(self.err_at(codes::MALFORMED_WHERE, "expected NULL after IS"));
                }
                let op = if negated {
                    ConditionOp::IsNotNull
                } else {
                    ConditionOp::IsNull
                };
                (op, ConditionRhs::None)
            }
            other => {
                return Err(self.err_at(
                    codes::MALFORMED_WHERE,
                    format!("expected comparison operator, found {other}"),
                ))
            }
        };

        Ok(Condition { lhs, op, rhs })
    }

    fn bump_then_literal(&mut self) -> ArxResult<ConditionRhs> {
        self.bump();
        Ok(ConditionRhs::Literal(self.parse_literal()?))
    }

    fn parse_literal(&mut self) -> ArxResult<Literal> {
        match self.peek_kind() {
            TokenKind::Str => Ok(Literal::Str(self.bump().text)),
            TokenKind::Number => Ok(Literal::Number(self.bump().text)),
            other => Err(self.err_at(
                codes::INVALID_LITERAL,
                format!("expected a quoted string or number, found {other}"),
            )),
        }
    }

    /// GROUP BY and ORDER BY accept field paths plus the special
    /// FILE_NAME selector.
    fn parse_group_field(&mut self) -> ArxResult<FieldPath> {
        if self.peek().is_keyword(Keyword::FileName) {
            self.bump();
            return Ok(FieldPath {
                components: vec!["FILE_NAME".to_string()],
                raw: "FILE_NAME".to_string(),
                ..FieldPath::default()
            });
        }
        self.parse_field_path()
    }

    /// LIMIT and OFFSET accept either order and at most one of each.
    fn parse_limit_offset(&mut self, query: &mut Query) -> ArxResult<()> {
        loop {
            if self.peek().is_keyword(Keyword::Limit) && query.limit.is_none() {
                self.bump();
                query.limit = Some(self.parse_count()?);
            } else if self.peek().is_keyword(Keyword::Offset) && query.offset.is_none() {
                self.bump();
                query.offset = Some(self.parse_count()?);
            } else {
                return Ok(());
            }
        }
    }

    fn parse_count(&mut self) -> ArxResult<u64> {
        match self.peek_kind() {
            TokenKind::Number => {
                let token = self.bump();
                token.text.parse::<u64>().map_err(|_| {
                    ArxError::code(codes::INVALID_LITERAL)
                        .with_detail(format!("'{}' is not a non-negative integer", token.text))
                        .with_location(token.location())
                })
            }
            _ => Err(self.err_at(codes::INVALID_LITERAL, "expected a row count")),
        }
    }

    fn parse_field_path(&mut self) -> ArxResult<FieldPath> {
        let mut path = FieldPath::default();

        if matches!(self.peek_kind(), TokenKind::Dot) {
            let token = self.bump();
            if self.dsn_mode {
                return Err(
                    ArxError::code(codes::PARTIAL_PATH_IN_DSN_MODE).with_location(token.location())
                );
            }
            path.is_partial = true;
            path.raw.push('.');
        }

        loop {
            match self.peek_kind() {
                TokenKind::Ident | TokenKind::Number => {
                    let token = self.bump();
                    path.raw.push_str(&token.text);
                    path.components.push(token.text);
                }
                TokenKind::At => break,
                _ => {
                    if path.components.is_empty() {
                        return Err(self.err_at(
                            codes::MALFORMED_SELECT_ITEM,
                            format!("expected a field path, found {}", self.peek().kind),
                        ));
                    }
                    break;
                }
            }

            match self.peek_kind() {
                TokenKind::Dot | TokenKind::Slash => {
                    // separator only when another component follows
                    let next = self.tokens.get(self.pos + 1).map(|t| t.kind);
                    if matches!(next, Some(TokenKind::Ident) | Some(TokenKind::Number)) {
                        let sep = self.bump();
                        path.raw
                            .push(if sep.kind == TokenKind::Dot { '.' } else { '/' });
                        continue;
                    }
                    break;
                }
                _ => break,
            }
        }

        if matches!(self.peek_kind(), TokenKind::At) {
            self.bump();
            match self.peek_kind() {
                TokenKind::Ident => {
                    let token = self.bump();
                    path.raw.push('@');
                    path.raw.push_str(&token.text);
                    path.attribute = Some(token.text);
                }
                _ => {
                    return Err(self.err_at(
                        codes::MALFORMED_SELECT_ITEM,
                        "expected attribute name after '@'",
                    ))
                }
            }
        }

        if path.components.is_empty() && path.attribute.is_none() {
            return Err(self.err_at(codes::MALFORMED_SELECT_ITEM, "empty field path"));
        }
        Ok(path)
    }

    /// Bind FOR variables in SELECT/WHERE/GROUP/HAVING/ORDER paths. The
    /// iteration paths were bound while parsing the FOR clauses.
    fn resolve_variables(&mut self, query: &mut Query) {
        let mut vars: AHashSet<String> = AHashSet::new();
        for fc in &query.for_clauses {
            vars.insert(fc.variable.clone());
            if let Some(ref pv) = fc.position_var {
                vars.insert(pv.clone());
            }
        }
        if vars.is_empty() {
            return;
        }

        let bind = |path: &mut FieldPath| {
            if path.variable.is_some() || path.is_partial {
                return;
            }
            if let Some(first) = path.components.first() {
                if vars.contains(first) {
                    path.variable = Some(path.components.remove(0));
                }
            }
        };

        for item in &mut query.select_items {
            match item {
                SelectItem::Field(path) => bind(path),
                SelectItem::Aggregate(agg) => bind(&mut agg.arg),
                SelectItem::FileName { .. } => {}
            }
        }
        if let Some(ref mut w) = query.where_clause {
            w.visit_paths_mut(&mut |p: &mut FieldPath| bind(p));
        }
        for path in &mut query.group_by {
            bind(path);
        }
        if let Some(ref mut h) = query.having {
            h.visit_paths_mut(&mut |p: &mut FieldPath| bind(p));
        }
        for key in &mut query.order_by {
            bind(&mut key.field);
        }
    }

    /// Aggregate invariants: with aggregates in SELECT, every plain
    /// field must be grouped, and HAVING may only reference grouped
    /// fields or aggregates.
    fn check_aggregate_invariants(&self, query: &Query) -> ArxResult<()> {
        if !query.has_aggregates && query.having.is_none() {
            return Ok(());
        }

        let grouped: AHashSet<String> = query.group_by.iter().map(|g| g.canonical()).collect();

        if query.has_aggregates {
            for item in &query.select_items {
                match item {
                    SelectItem::Field(path) => {
                        if !grouped.contains(&path.canonical()) {
                            return Err(
                                ArxError::code(codes::FIELD_NOT_GROUPED).with_detail(&path.raw)
                            );
                        }
                    }
                    SelectItem::FileName { .. } => {
                        if !grouped.contains("FILE_NAME") {
                            return Err(ArxError::code(codes::FIELD_NOT_GROUPED)
                                .with_detail("FILE_NAME"));
                        }
                    }
                    SelectItem::Aggregate(_) => {}
                }
            }
        }

        if query.has_aggregates {
            // ORDER BY keys must resolve to a grouped field or to an
            // aggregate of the projection (by alias or spelled out)
            for key in &query.order_by {
                let in_group = grouped.contains(&key.field.canonical());
                let names_projection = query.select_items.iter().any(|item| match item {
                    SelectItem::Aggregate(agg) => {
                        agg.raw == key.field.raw
                            || agg.alias.as_deref() == Some(key.field.raw.as_str())
                    }
                    SelectItem::Field(path) => {
                        path.alias.as_deref() == Some(key.field.raw.as_str())
                    }
                    SelectItem::FileName { .. } => false,
                });
                if !in_group && !names_projection {
                    return Err(
                        ArxError::code(codes::FIELD_NOT_GROUPED).with_detail(&key.field.raw)
                    );
                }
            }
        }

        if let Some(ref having) = query.having {
            let mut violation: Option<String> = None;
            check_having_fields(having, &grouped, &mut violation);
            if let Some(raw) = violation {
                return Err(ArxError::code(codes::FIELD_NOT_GROUPED).with_detail(raw));
            }
        }
        Ok(())
    }
}

fn check_having_fields(
    expr: &WhereExpr,
    grouped: &AHashSet<String>,
    violation: &mut Option<String>,
) {
    match expr {
        WhereExpr::Condition(cond) => {
            if let ConditionLhs::Field(ref path) = cond.lhs {
                if !grouped.contains(&path.canonical()) && violation.is_none() {
                    *violation = Some(path.raw.clone());
                }
            }
        }
        WhereExpr::And(a, b) | WhereExpr::Or(a, b) => {
            check_having_fields(a, grouped, violation);
            check_having_fields(b, grouped, violation);
        }
        WhereExpr::Not(inner) => check_having_fields(inner, grouped, violation),
    }
}
