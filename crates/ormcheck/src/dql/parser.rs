//! Recursive-descent DQL parser with semantic validation against metadata.
//!
//! Clause structure, range and join declarations are parsed fully; inside
//! expressions only parentheses, path expressions, variables and subselects
//! are tracked, every other token is carried through to lowering untouched.

use super::CompileError;
use super::lexer::{Token, TokenKind, is_keyword, tokenize};
use crate::metadata::{AssociationKind, MetadataGateway, MetadataRecord};
use std::collections::HashMap;
use std::sync::Arc;

/// Functions the relational backend has no direct equivalent for.
const UNLOWERABLE_FUNCTIONS: &[&str] = &[
    "SIZE", "IDENTITY", "DATE_ADD", "DATE_SUB", "DATE_DIFF", "LOCATE", "BIT_AND", "BIT_OR",
];

/// Keywords that end an expression at nesting level zero.
const CLAUSE_KEYWORDS: &[&str] = &[
    "FROM", "WHERE", "GROUP", "HAVING", "ORDER", "JOIN", "LEFT", "INNER", "SET", "INDEX", "ON",
    "WITH", "UPDATE", "DELETE",
];

#[derive(Debug, Clone)]
pub(crate) enum Piece {
    Token(Token),
    Path { alias: String, field: String },
    Variable(String),
    Subselect(Box<SelectQuery>),
}

#[derive(Debug, Clone)]
pub(crate) struct Expression {
    pub pieces: Vec<Piece>,
}

impl Expression {
    /// The variable name when the expression is a bare variable.
    pub fn as_variable(&self) -> Option<&str> {
        match self.pieces.as_slice() {
            [Piece::Variable(name)] => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SelectItem {
    pub expr: Expression,
    pub alias: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) enum JoinTarget {
    Association { parent: String, field: String },
    Entity,
}

#[derive(Debug, Clone)]
pub(crate) struct JoinDecl {
    pub left: bool,
    pub target: JoinTarget,
    pub record: Arc<MetadataRecord>,
    pub alias: String,
    pub condition: Option<Expression>,
}

#[derive(Debug, Clone)]
pub(crate) struct RangeDecl {
    pub record: Arc<MetadataRecord>,
    pub alias: String,
    pub joins: Vec<JoinDecl>,
}

#[derive(Debug, Clone)]
pub(crate) struct OrderItem {
    pub expr: Expression,
    pub direction: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct SelectQuery {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    pub from: Vec<RangeDecl>,
    pub where_: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
    pub order_by: Vec<OrderItem>,
}

#[derive(Debug, Clone)]
pub(crate) enum Statement {
    Select(SelectQuery),
    Update {
        range: RangeDecl,
        set: Vec<(String, String, Expression)>,
        where_: Option<Expression>,
    },
    Delete {
        range: RangeDecl,
        where_: Option<Expression>,
    },
}

/// What an alias stands for.
#[derive(Debug, Clone)]
pub(crate) enum Component {
    Entity(Arc<MetadataRecord>),
    ResultVariable,
}

#[derive(Debug)]
struct DeferredPath {
    alias: String,
    field: String,
    token: Token,
    allow_collection: bool,
}

/// Result of a successful parse.
#[derive(Debug)]
pub(crate) struct ParsedQuery {
    pub statement: Statement,
    pub components: HashMap<String, Component>,
    /// False when the query uses constructs without a relational lowering.
    pub lowerable: bool,
}

pub(crate) struct Parser<'a> {
    dql: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    gateway: &'a MetadataGateway,
    components: HashMap<String, Component>,
    deferred_variables: Vec<Token>,
    deferred_paths: Vec<DeferredPath>,
    lowerable: bool,
}

impl<'a> Parser<'a> {
    pub fn new(dql: &'a str, gateway: &'a MetadataGateway) -> Self {
        Self {
            dql,
            tokens: tokenize(dql),
            pos: 0,
            gateway,
            components: HashMap::new(),
            deferred_variables: Vec::new(),
            deferred_paths: Vec::new(),
            lowerable: true,
        }
    }

    pub fn parse(mut self) -> Result<ParsedQuery, CompileError> {
        let statement = match self.peek() {
            Some(t) if t.is_keyword("SELECT") => Statement::Select(self.select_statement()?),
            Some(t) if t.is_keyword("UPDATE") => self.update_statement()?,
            Some(t) if t.is_keyword("DELETE") => self.delete_statement()?,
            _ => return Err(self.syntax_error(Some("SELECT, UPDATE or DELETE"), None)),
        };
        if self.peek().is_some() {
            return Err(self.syntax_error(Some("end of string"), None));
        }
        self.process_deferred()?;
        Ok(ParsedQuery {
            statement,
            components: self.components,
            lowerable: self.lowerable,
        })
    }

    // ---- token helpers ----

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Token, CompileError> {
        match self.peek().cloned() {
            Some(t) if t.is_keyword(keyword) => {
                self.pos += 1;
                Ok(t)
            }
            _ => Err(self.syntax_error(Some(&lexer_literal(keyword)), None)),
        }
    }

    fn eat_kind(&mut self, kind: TokenKind) -> bool {
        if self.peek().is_some_and(|t| t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, literal: &str) -> Result<Token, CompileError> {
        match self.peek().cloned() {
            Some(t) if t.kind == kind => {
                self.pos += 1;
                Ok(t)
            }
            _ => Err(self.syntax_error(Some(&lexer_literal(literal)), None)),
        }
    }

    // ---- errors ----

    fn syntax_error(&self, expected: Option<&str>, token: Option<&Token>) -> CompileError {
        let token = token.or(self.peek());
        let position = token.map_or(-1, |t| t.position as i64);
        let mut message = format!("line 0, col {position}: Error: ");
        match expected {
            Some(expected) => message.push_str(&format!("Expected {expected}, got ")),
            None => message.push_str("Unexpected "),
        }
        match token {
            Some(token) => message.push_str(&format!("'{}'", token.value)),
            None => message.push_str("end of string."),
        }
        CompileError::syntax(message)
    }

    fn semantical_error(&self, message: &str, token: Option<&Token>) -> CompileError {
        const DISTANCE: usize = 12;
        let token = token.or(self.peek());
        let position = token.map_or(0, |t| t.position);

        // Show the rest of the word the error points at.
        let bytes = self.dql.as_bytes();
        let search_from = (position + DISTANCE).min(bytes.len());
        let length = bytes[search_from..]
            .iter()
            .position(|b| *b == b' ')
            .map_or(DISTANCE, |offset| search_from + offset - position);
        let end = (position + length).min(bytes.len());
        let near = String::from_utf8_lossy(&bytes[position.min(end)..end]);

        let column = token.map_or_else(|| "-1".to_string(), |t| t.position.to_string());
        CompileError::semantical(format!(
            "line 0, col {column} near '{near}': Error: {message}"
        ))
    }

    // ---- statements ----

    fn select_statement(&mut self) -> Result<SelectQuery, CompileError> {
        self.expect_keyword("SELECT")?;
        let distinct = self.eat_keyword("DISTINCT");

        let mut items = vec![self.select_item()?];
        while self.eat_kind(TokenKind::Comma) {
            items.push(self.select_item()?);
        }

        self.expect_keyword("FROM")?;
        let mut from = vec![self.range_declaration(true)?];
        while self.eat_kind(TokenKind::Comma) {
            from.push(self.range_declaration(true)?);
        }

        let where_ = if self.eat_keyword("WHERE") {
            Some(self.expression()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.eat_keyword("GROUP") {
            self.expect_keyword("BY")?;
            group_by.push(self.expression()?);
            while self.eat_kind(TokenKind::Comma) {
                group_by.push(self.expression()?);
            }
        }

        let having = if self.eat_keyword("HAVING") {
            Some(self.expression()?)
        } else {
            None
        };

        let mut order_by = Vec::new();
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let expr = self.expression()?;
                let direction = match self.peek() {
                    Some(t) if t.is_keyword("ASC") || t.is_keyword("DESC") => {
                        let direction = t.value.to_ascii_uppercase();
                        self.pos += 1;
                        Some(direction)
                    }
                    _ => None,
                };
                order_by.push(OrderItem { expr, direction });
                if !self.eat_kind(TokenKind::Comma) {
                    break;
                }
            }
        }

        Ok(SelectQuery {
            distinct,
            items,
            from,
            where_,
            group_by,
            having,
            order_by,
        })
    }

    fn select_item(&mut self) -> Result<SelectItem, CompileError> {
        let expr = self.expression()?;
        let explicit = self.eat_keyword("AS");
        if explicit {
            self.eat_keyword("HIDDEN");
        }
        let alias = match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier && !is_keyword(&t.value) => {
                Some(self.declare_alias(Component::ResultVariable)?)
            }
            _ if explicit => {
                return Err(self.syntax_error(Some(&lexer_literal("IDENTIFIER")), None));
            }
            _ => None,
        };
        Ok(SelectItem { expr, alias })
    }

    fn update_statement(&mut self) -> Result<Statement, CompileError> {
        self.expect_keyword("UPDATE")?;
        let range = self.range_declaration(false)?;
        self.expect_keyword("SET")?;

        let mut set = Vec::new();
        loop {
            let alias_token = self.expect_kind(TokenKind::Identifier, "IDENTIFIER")?;
            self.expect_kind(TokenKind::Dot, "DOT")?;
            let field_token = self.expect_kind(TokenKind::Identifier, "IDENTIFIER")?;
            self.defer_path(&alias_token, &field_token, false);
            match self.peek() {
                Some(t) if t.kind == TokenKind::Operator && t.value == "=" => self.pos += 1,
                _ => return Err(self.syntax_error(Some(&lexer_literal("EQUALS")), None)),
            }
            let value = self.expression()?;
            set.push((alias_token.value, field_token.value, value));
            if !self.eat_kind(TokenKind::Comma) {
                break;
            }
        }

        let where_ = if self.eat_keyword("WHERE") {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(Statement::Update { range, set, where_ })
    }

    fn delete_statement(&mut self) -> Result<Statement, CompileError> {
        self.expect_keyword("DELETE")?;
        self.eat_keyword("FROM");
        let range = self.range_declaration(false)?;
        let where_ = if self.eat_keyword("WHERE") {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(Statement::Delete { range, where_ })
    }

    // ---- declarations ----

    fn abstract_schema_name(&mut self) -> Result<Arc<MetadataRecord>, CompileError> {
        let token = match self.peek() {
            Some(t) if t.is_name() => t.clone(),
            _ => return Err(self.syntax_error(Some(&lexer_literal("IDENTIFIER")), None)),
        };
        self.pos += 1;
        let record = self
            .gateway
            .record(&token.value)
            .map_err(|e| CompileError::internal(e.to_string()))?;
        record.ok_or_else(|| {
            self.semantical_error(
                &format!("Class '{}' is not defined.", token.value),
                Some(&token),
            )
        })
    }

    fn declare_alias(&mut self, component: Component) -> Result<String, CompileError> {
        let token = match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier && !is_keyword(&t.value) => t.clone(),
            _ => return Err(self.syntax_error(Some(&lexer_literal("IDENTIFIER")), None)),
        };
        self.pos += 1;
        if self.components.contains_key(&token.value) {
            return Err(self.semantical_error(
                &format!("'{}' is already defined.", token.value),
                Some(&token),
            ));
        }
        self.components.insert(token.value.clone(), component);
        Ok(token.value)
    }

    fn range_declaration(&mut self, allow_joins: bool) -> Result<RangeDecl, CompileError> {
        let record = self.abstract_schema_name()?;
        self.eat_keyword("AS");
        let alias = self.declare_alias(Component::Entity(Arc::clone(&record)))?;
        self.index_by()?;

        let mut joins = Vec::new();
        while allow_joins
            && (self.peek_keyword("JOIN") || self.peek_keyword("LEFT") || self.peek_keyword("INNER"))
        {
            joins.push(self.join_declaration()?);
        }
        Ok(RangeDecl {
            record,
            alias,
            joins,
        })
    }

    fn index_by(&mut self) -> Result<(), CompileError> {
        if !self.eat_keyword("INDEX") {
            return Ok(());
        }
        self.expect_keyword("BY")?;
        let alias = self.expect_kind(TokenKind::Identifier, "IDENTIFIER")?;
        self.expect_kind(TokenKind::Dot, "DOT")?;
        let field = self.expect_kind(TokenKind::Identifier, "IDENTIFIER")?;
        self.defer_path(&alias, &field, false);
        Ok(())
    }

    fn join_declaration(&mut self) -> Result<JoinDecl, CompileError> {
        let left = if self.eat_keyword("LEFT") {
            self.eat_keyword("OUTER");
            true
        } else {
            self.eat_keyword("INNER");
            false
        };
        self.expect_keyword("JOIN")?;

        let is_path = self.peek().is_some_and(|t| t.kind == TokenKind::Identifier)
            && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Dot);
        let (target, record) = if is_path {
            let parent = self.expect_kind(TokenKind::Identifier, "IDENTIFIER")?;
            let parent_record = match self.components.get(&parent.value) {
                Some(Component::Entity(record)) => Arc::clone(record),
                _ => {
                    return Err(self.semantical_error(
                        &format!(
                            "Identification Variable {} used in join path expression but was not defined before.",
                            parent.value
                        ),
                        None,
                    ));
                }
            };
            self.expect_kind(TokenKind::Dot, "DOT")?;
            let field = self.expect_kind(TokenKind::Identifier, "IDENTIFIER")?;
            let Some(association) = parent_record.association(&field.value) else {
                return Err(self.semantical_error(
                    &format!(
                        "Class {} has no association named {}",
                        parent_record.class_name, field.value
                    ),
                    None,
                ));
            };
            let target = self
                .gateway
                .record(&association.target)
                .map_err(|e| CompileError::internal(e.to_string()))?
                .ok_or_else(|| {
                    CompileError::internal(format!(
                        "Class '{}' is not a valid entity or mapped super class",
                        association.target
                    ))
                })?;
            (
                JoinTarget::Association {
                    parent: parent.value,
                    field: field.value,
                },
                target,
            )
        } else {
            (JoinTarget::Entity, self.abstract_schema_name()?)
        };

        self.eat_keyword("AS");
        let alias = self.declare_alias(Component::Entity(Arc::clone(&record)))?;
        self.index_by()?;

        let condition = if self.eat_keyword("ON") || self.eat_keyword("WITH") {
            Some(self.expression()?)
        } else {
            None
        };

        Ok(JoinDecl {
            left,
            target,
            record,
            alias,
            condition,
        })
    }

    // ---- expressions ----

    /// Scan one expression up to the next clause boundary.
    fn expression(&mut self) -> Result<Expression, CompileError> {
        let mut pieces: Vec<Piece> = Vec::new();
        let mut depth = 0usize;
        let mut after_operand = false;
        let mut class_name_next = false;

        loop {
            let Some(token) = self.peek().cloned() else {
                if depth > 0 {
                    return Err(self.syntax_error(Some(&lexer_literal("CLOSE_PARENTHESIS")), None));
                }
                break;
            };

            match token.kind {
                TokenKind::CloseParen => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    after_operand = true;
                    pieces.push(Piece::Token(token));
                    self.pos += 1;
                }
                TokenKind::OpenParen => {
                    if after_operand {
                        if depth == 0 {
                            break;
                        }
                        return Err(self.syntax_error(Some(&lexer_literal("CLOSE_PARENTHESIS")), None));
                    }
                    if self.peek_at(1).is_some_and(|t| t.is_keyword("SELECT")) {
                        self.pos += 1;
                        let subselect = self.select_statement()?;
                        self.expect_kind(TokenKind::CloseParen, "CLOSE_PARENTHESIS")?;
                        pieces.push(Piece::Subselect(Box::new(subselect)));
                        after_operand = true;
                    } else {
                        depth += 1;
                        after_operand = false;
                        pieces.push(Piece::Token(token));
                        self.pos += 1;
                    }
                }
                TokenKind::Comma => {
                    if depth == 0 {
                        break;
                    }
                    after_operand = false;
                    pieces.push(Piece::Token(token));
                    self.pos += 1;
                }
                TokenKind::Identifier | TokenKind::QualifiedName => {
                    let upper = token.value.to_ascii_uppercase();
                    let keyword = token.kind == TokenKind::Identifier && is_keyword(&upper);

                    if keyword && CLAUSE_KEYWORDS.contains(&upper.as_str()) {
                        if depth == 0 {
                            break;
                        }
                        // TRIM(LEADING 'x' FROM e.name)
                        if upper == "FROM" {
                            after_operand = false;
                            pieces.push(Piece::Token(token));
                            self.pos += 1;
                            continue;
                        }
                        return Err(self.syntax_error(Some(&lexer_literal("CLOSE_PARENTHESIS")), None));
                    }
                    if keyword && matches!(upper.as_str(), "AS" | "ASC" | "DESC" | "HIDDEN") {
                        if depth == 0 {
                            break;
                        }
                        return Err(self.syntax_error(Some(&lexer_literal("CLOSE_PARENTHESIS")), None));
                    }
                    if keyword && upper == "PARTIAL" {
                        self.pos += 1;
                        self.partial_object(&mut pieces)?;
                        after_operand = true;
                        continue;
                    }
                    if keyword {
                        match upper.as_str() {
                            "MEMBER" | "EMPTY" => self.lowerable = false,
                            "NEW" => {
                                self.lowerable = false;
                                class_name_next = true;
                            }
                            "OF" if pieces.last().is_some_and(|p| matches!(p, Piece::Token(t) if t.is_keyword("INSTANCE"))) => {
                                self.lowerable = false;
                                class_name_next = true;
                            }
                            _ => {}
                        }
                        after_operand = matches!(upper.as_str(), "NULL" | "TRUE" | "FALSE" | "END" | "EMPTY");
                        pieces.push(Piece::Token(token));
                        self.pos += 1;
                        continue;
                    }

                    if after_operand {
                        if depth == 0 {
                            break;
                        }
                        return Err(self.syntax_error(Some(&lexer_literal("CLOSE_PARENTHESIS")), None));
                    }

                    if class_name_next {
                        class_name_next = false;
                        after_operand = true;
                        pieces.push(Piece::Token(token));
                        self.pos += 1;
                        continue;
                    }

                    let next = self.peek_at(1).map(|t| t.kind);
                    if next == Some(TokenKind::Dot) {
                        let piece = self.path_expression(&pieces)?;
                        pieces.push(piece);
                        after_operand = true;
                    } else if next == Some(TokenKind::OpenParen) {
                        if UNLOWERABLE_FUNCTIONS.contains(&upper.as_str()) {
                            self.lowerable = false;
                        }
                        after_operand = false;
                        pieces.push(Piece::Token(token));
                        self.pos += 1;
                    } else {
                        self.deferred_variables.push(token.clone());
                        pieces.push(Piece::Variable(token.value));
                        after_operand = true;
                        self.pos += 1;
                    }
                }
                TokenKind::Integer | TokenKind::Float | TokenKind::String | TokenKind::Parameter => {
                    if after_operand {
                        if depth == 0 {
                            break;
                        }
                        return Err(self.syntax_error(Some(&lexer_literal("CLOSE_PARENTHESIS")), None));
                    }
                    after_operand = true;
                    pieces.push(Piece::Token(token));
                    self.pos += 1;
                }
                TokenKind::Operator => {
                    after_operand = false;
                    pieces.push(Piece::Token(token));
                    self.pos += 1;
                }
                TokenKind::Dot | TokenKind::OpenCurly | TokenKind::CloseCurly | TokenKind::Unknown => {
                    return Err(self.syntax_error(None, None));
                }
            }
        }

        if pieces.is_empty() {
            return Err(self.syntax_error(None, None));
        }
        Ok(Expression { pieces })
    }

    /// `alias.field[.embedded]`; the cursor is on the alias.
    fn path_expression(&mut self, before: &[Piece]) -> Result<Piece, CompileError> {
        let alias = self.expect_kind(TokenKind::Identifier, "IDENTIFIER")?;
        let mut field_token = None;
        let mut field = String::new();
        while self.eat_kind(TokenKind::Dot) {
            let part = self.expect_kind(TokenKind::Identifier, "IDENTIFIER")?;
            if !field.is_empty() {
                field.push('.');
            }
            field.push_str(&part.value);
            field_token = Some(part);
        }
        let Some(field_token) = field_token else {
            return Err(self.syntax_error(Some(&lexer_literal("IDENTIFIER")), None));
        };

        // Collection-valued paths are only valid in a few positions.
        let after_member_of = matches!(before.last(), Some(Piece::Token(t)) if t.is_keyword("OF"));
        let in_size = matches!(
            before,
            [.., Piece::Token(f), Piece::Token(p)] if f.value.eq_ignore_ascii_case("SIZE") && p.kind == TokenKind::OpenParen
        );
        let before_is_empty = self.peek_keyword("IS")
            && (self.peek_at(1).is_some_and(|t| t.is_keyword("EMPTY"))
                || (self.peek_at(1).is_some_and(|t| t.is_keyword("NOT"))
                    && self.peek_at(2).is_some_and(|t| t.is_keyword("EMPTY"))));

        let mut path_field = field_token.clone();
        path_field.value = field.clone();
        self.defer_path(&alias, &path_field, after_member_of || in_size || before_is_empty);

        Ok(Piece::Path {
            alias: alias.value,
            field,
        })
    }

    /// `PARTIAL alias.{field, ...}`; the cursor is after `PARTIAL`.
    fn partial_object(&mut self, pieces: &mut Vec<Piece>) -> Result<(), CompileError> {
        self.lowerable = false;
        let alias = self.expect_kind(TokenKind::Identifier, "IDENTIFIER")?;
        self.deferred_variables.push(alias.clone());
        self.expect_kind(TokenKind::Dot, "DOT")?;
        self.expect_kind(TokenKind::OpenCurly, "OPEN_CURLY_BRACE")?;
        loop {
            let field = self.expect_kind(TokenKind::Identifier, "IDENTIFIER")?;
            self.defer_path(&alias, &field, false);
            if !self.eat_kind(TokenKind::Comma) {
                break;
            }
        }
        self.expect_kind(TokenKind::CloseCurly, "CLOSE_CURLY_BRACE")?;
        pieces.push(Piece::Variable(alias.value));
        Ok(())
    }

    fn defer_path(&mut self, alias: &Token, field: &Token, allow_collection: bool) {
        self.deferred_variables.push(alias.clone());
        self.deferred_paths.push(DeferredPath {
            alias: alias.value.clone(),
            field: field.value.clone(),
            token: field.clone(),
            allow_collection,
        });
    }

    fn process_deferred(&self) -> Result<(), CompileError> {
        for token in &self.deferred_variables {
            if !self.components.contains_key(&token.value) {
                return Err(self.semantical_error(
                    &format!("'{}' is not defined.", token.value),
                    Some(token),
                ));
            }
        }

        for path in &self.deferred_paths {
            let record = match self.components.get(&path.alias) {
                Some(Component::Entity(record)) => record,
                _ => {
                    return Err(self.semantical_error(
                        &format!("'{}' does not point to a Class.", path.alias),
                        Some(&path.token),
                    ));
                }
            };
            if let Some(association) = record.association(&path.field) {
                if association.kind == AssociationKind::ToMany && !path.allow_collection {
                    return Err(self.semantical_error(
                        "Invalid PathExpression. StateFieldPathExpression or SingleValuedAssociationField expected.",
                        Some(&path.token),
                    ));
                }
                continue;
            }
            if !record.has_field(&path.field) {
                return Err(self.semantical_error(
                    &format!(
                        "Class {} has no field or association named {}",
                        record.class_name, path.field
                    ),
                    Some(&path.token),
                ));
            }
        }
        Ok(())
    }
}

/// Token name as the query language reports it in syntax errors.
fn lexer_literal(name: &str) -> String {
    format!("Doctrine\\ORM\\Query\\Lexer::T_{}", name.to_ascii_uppercase())
}
