//! Lowering of a validated DQL statement to PostgreSQL.

use super::lexer::TokenKind;
use super::parser::{
    Component, Expression, JoinDecl, JoinTarget, ParsedQuery, Piece, RangeDecl, SelectQuery,
    Statement,
};
use crate::metadata::{AssociationKind, AssociationMapping, JoinColumn, MetadataRecord};
use std::collections::HashMap;

/// SQL text and the parameter names in `$n` order.
pub(crate) struct Lowered {
    pub sql: String,
    pub parameters: Vec<String>,
}

/// Returns `None` when some construct has no relational rendering.
pub(crate) fn lower(parsed: &ParsedQuery) -> Option<Lowered> {
    if !parsed.lowerable {
        return None;
    }
    let mut lowering = Lowering {
        components: &parsed.components,
        table_aliases: HashMap::new(),
        scalar_aliases: HashMap::new(),
        parameters: Vec::new(),
        table_counter: 0,
        scalar_counter: 0,
        column_counter: 0,
    };
    let sql = match &parsed.statement {
        Statement::Select(query) => lowering.select(query, true)?,
        Statement::Update { range, set, where_ } => lowering.update(range, set, where_.as_ref())?,
        Statement::Delete { range, where_ } => lowering.delete(range, where_.as_ref())?,
    };
    Some(Lowered {
        sql,
        parameters: lowering.parameters,
    })
}

struct Lowering<'a> {
    components: &'a HashMap<String, Component>,
    table_aliases: HashMap<String, String>,
    scalar_aliases: HashMap<String, String>,
    parameters: Vec<String>,
    table_counter: usize,
    scalar_counter: usize,
    column_counter: usize,
}

impl<'a> Lowering<'a> {
    fn table_alias(&mut self, table: &str) -> String {
        let initial = table
            .chars()
            .next()
            .map_or('t', |c| c.to_ascii_lowercase());
        let alias = format!("{initial}{}_", self.table_counter);
        self.table_counter += 1;
        alias
    }

    fn assign_aliases(&mut self, ranges: &[RangeDecl]) {
        for range in ranges {
            let alias = self.table_alias(&range.record.table);
            self.table_aliases.insert(range.alias.clone(), alias);
            for join in &range.joins {
                let alias = self.table_alias(&join.record.table);
                self.table_aliases.insert(join.alias.clone(), alias);
            }
        }
    }

    fn sql_alias(&self, dql_alias: &str) -> Option<&str> {
        self.table_aliases.get(dql_alias).map(String::as_str)
    }

    fn entity(&self, dql_alias: &str) -> Option<&'a MetadataRecord> {
        let components: &'a HashMap<String, Component> = self.components;
        match components.get(dql_alias)? {
            Component::Entity(record) => Some(record.as_ref()),
            Component::ResultVariable => None,
        }
    }

    fn select(&mut self, query: &SelectQuery, top_level: bool) -> Option<String> {
        self.assign_aliases(&query.from);

        let mut items = Vec::with_capacity(query.items.len());
        for item in &query.items {
            let entity = item
                .expr
                .as_variable()
                .filter(|_| item.alias.is_none())
                .and_then(|alias| Some((alias, self.entity(alias)?)));
            match entity {
                Some((alias, record)) if top_level => {
                    let table_alias = self.sql_alias(alias)?.to_string();
                    for field in &record.fields {
                        items.push(format!(
                            "{table_alias}.{} AS {}_{}",
                            quote(&field.column),
                            field.column,
                            self.column_counter
                        ));
                        self.column_counter += 1;
                    }
                }
                _ => {
                    let rendered = self.expression(&item.expr)?;
                    if top_level {
                        let scalar = format!("sclr_{}", self.scalar_counter);
                        self.scalar_counter += 1;
                        if let Some(alias) = &item.alias {
                            self.scalar_aliases.insert(alias.clone(), scalar.clone());
                        }
                        items.push(format!("{rendered} AS {scalar}"));
                    } else {
                        items.push(rendered);
                    }
                }
            }
        }
        if items.is_empty() {
            return None;
        }

        let mut sql = String::from("SELECT ");
        if query.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&items.join(", "));

        let mut ranges = Vec::with_capacity(query.from.len());
        for range in &query.from {
            ranges.push(self.range(range)?);
        }
        sql.push_str(" FROM ");
        sql.push_str(&ranges.join(", "));

        if let Some(condition) = &query.where_ {
            sql.push_str(" WHERE ");
            sql.push_str(&self.expression(condition)?);
        }
        if !query.group_by.is_empty() {
            let mut parts = Vec::with_capacity(query.group_by.len());
            for expr in &query.group_by {
                parts.push(self.expression(expr)?);
            }
            sql.push_str(" GROUP BY ");
            sql.push_str(&parts.join(", "));
        }
        if let Some(having) = &query.having {
            sql.push_str(" HAVING ");
            sql.push_str(&self.expression(having)?);
        }
        if !query.order_by.is_empty() {
            let mut parts = Vec::with_capacity(query.order_by.len());
            for item in &query.order_by {
                let mut part = self.expression(&item.expr)?;
                if let Some(direction) = &item.direction {
                    part.push(' ');
                    part.push_str(direction);
                }
                parts.push(part);
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }
        Some(sql)
    }

    fn update(
        &mut self,
        range: &RangeDecl,
        set: &[(String, String, Expression)],
        where_: Option<&Expression>,
    ) -> Option<String> {
        self.assign_aliases(std::slice::from_ref(range));
        let alias = self.sql_alias(&range.alias)?.to_string();

        let mut assignments = Vec::with_capacity(set.len());
        for (_, field, value) in set {
            let column = column_of(&range.record, field)?;
            assignments.push(format!("{} = {}", quote(column), self.expression(value)?));
        }
        let mut sql = format!(
            "UPDATE {} {alias} SET {}",
            quote(&range.record.table),
            assignments.join(", ")
        );
        if let Some(condition) = where_ {
            sql.push_str(" WHERE ");
            sql.push_str(&self.expression(condition)?);
        }
        Some(sql)
    }

    fn delete(&mut self, range: &RangeDecl, where_: Option<&Expression>) -> Option<String> {
        self.assign_aliases(std::slice::from_ref(range));
        let alias = self.sql_alias(&range.alias)?.to_string();
        let mut sql = format!("DELETE FROM {} {alias}", quote(&range.record.table));
        if let Some(condition) = where_ {
            sql.push_str(" WHERE ");
            sql.push_str(&self.expression(condition)?);
        }
        Some(sql)
    }

    fn range(&mut self, range: &RangeDecl) -> Option<String> {
        let alias = self.sql_alias(&range.alias)?.to_string();
        let mut sql = format!("{} {alias}", quote(&range.record.table));
        for join in &range.joins {
            sql.push(' ');
            sql.push_str(&self.join(join)?);
        }
        Some(sql)
    }

    fn join(&mut self, join: &JoinDecl) -> Option<String> {
        let keyword = if join.left { "LEFT JOIN" } else { "INNER JOIN" };
        let target_alias = self.sql_alias(&join.alias)?.to_string();
        let target_table = quote(&join.record.table);

        let mut sql = match &join.target {
            JoinTarget::Entity => {
                let condition = match &join.condition {
                    Some(condition) => self.expression(condition)?,
                    None => "TRUE".to_string(),
                };
                return Some(format!("{keyword} {target_table} {target_alias} ON {condition}"));
            }
            JoinTarget::Association { parent, field } => {
                let parent_alias = self.sql_alias(parent)?.to_string();
                let parent_record = self.entity(parent)?;
                let association = parent_record.association(field)?;
                self.association_join(keyword, association, &parent_alias, &join.record, &target_alias)?
            }
        };
        if let Some(condition) = &join.condition {
            sql.push_str(" AND (");
            sql.push_str(&self.expression(condition)?);
            sql.push(')');
        }
        Some(sql)
    }

    fn association_join(
        &mut self,
        keyword: &str,
        association: &AssociationMapping,
        parent_alias: &str,
        target: &MetadataRecord,
        target_alias: &str,
    ) -> Option<String> {
        let target_table = quote(&target.table);

        // Owning side holding the foreign key.
        if !association.join_columns.is_empty() {
            let on = equalities(&association.join_columns, parent_alias, target_alias);
            return Some(format!("{keyword} {target_table} {target_alias} ON {on}"));
        }

        // Owning side of a many-to-many: go through the link table.
        if let Some(link) = &association.join_table {
            let link_alias = self.table_alias(&link.name);
            let first = equalities(&link.join_columns, &link_alias, parent_alias);
            let second = equalities(&link.inverse_join_columns, &link_alias, target_alias);
            return Some(format!(
                "{keyword} {} {link_alias} ON {first} {keyword} {target_table} {target_alias} ON {second}",
                quote(&link.name)
            ));
        }

        // Inverse side: the mapping lives on the target.
        let owner = target.association(association.mapped_by.as_deref()?)?;
        if !owner.join_columns.is_empty() {
            let on = equalities(&owner.join_columns, target_alias, parent_alias);
            return Some(format!("{keyword} {target_table} {target_alias} ON {on}"));
        }
        if owner.kind == AssociationKind::ToMany {
            let link = owner.join_table.as_ref()?;
            let link_alias = self.table_alias(&link.name);
            let first = equalities(&link.inverse_join_columns, &link_alias, parent_alias);
            let second = equalities(&link.join_columns, &link_alias, target_alias);
            return Some(format!(
                "{keyword} {} {link_alias} ON {first} {keyword} {target_table} {target_alias} ON {second}",
                quote(&link.name)
            ));
        }
        None
    }

    fn parameter(&mut self, name: &str) -> String {
        let index = match self.parameters.iter().position(|p| p == name) {
            Some(index) => index,
            None => {
                self.parameters.push(name.to_string());
                self.parameters.len() - 1
            }
        };
        format!("${}", index + 1)
    }

    fn expression(&mut self, expr: &Expression) -> Option<String> {
        let mut out: Vec<String> = Vec::with_capacity(expr.pieces.len());
        let mut pieces = expr.pieces.iter().peekable();

        while let Some(piece) = pieces.next() {
            let rendered = match piece {
                Piece::Token(token) => match token.kind {
                    TokenKind::String => format!("'{}'", token.value.replace('\'', "''")),
                    TokenKind::Parameter => self.parameter(&token.value),
                    TokenKind::Identifier if is_niladic(&token.value) => {
                        // CURRENT_DATE() has no parentheses in SQL.
                        if matches!(pieces.peek(), Some(Piece::Token(t)) if t.kind == TokenKind::OpenParen) {
                            pieces.next();
                            pieces.next();
                        }
                        token.value.to_ascii_uppercase()
                    }
                    TokenKind::Identifier if super::lexer::is_keyword(&token.value) => {
                        token.value.to_ascii_uppercase()
                    }
                    TokenKind::QualifiedName => return None,
                    _ => token.value.clone(),
                },
                Piece::Path { alias, field } => {
                    let record = self.entity(alias)?;
                    let column = column_of(record, field)?;
                    format!("{}.{}", self.sql_alias(alias)?, quote(column))
                }
                Piece::Variable(name) => match self.components.get(name)? {
                    Component::Entity(record) => {
                        let identifier = record.identifier();
                        let [id] = identifier.as_slice() else {
                            return None;
                        };
                        format!("{}.{}", self.sql_alias(name)?, quote(&id.column))
                    }
                    Component::ResultVariable => self.scalar_aliases.get(name)?.clone(),
                },
                Piece::Subselect(query) => format!("({})", self.select(query, false)?),
            };
            out.push(rendered);
        }
        Some(out.join(" "))
    }
}

/// Column backing `field`: a scalar column or the single foreign key of an
/// owning to-one association.
fn column_of<'r>(record: &'r MetadataRecord, field: &str) -> Option<&'r str> {
    if let Some(mapping) = record.field(field) {
        return Some(mapping.column.as_str());
    }
    match record.association(field)? {
        AssociationMapping {
            kind: AssociationKind::ToOne,
            join_columns,
            ..
        } if join_columns.len() == 1 => Some(join_columns[0].name.as_str()),
        _ => None,
    }
}

fn is_niladic(name: &str) -> bool {
    ["CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP"]
        .iter()
        .any(|f| f.eq_ignore_ascii_case(name))
}

/// `local.fk = remote.referenced AND ...`
fn equalities(columns: &[JoinColumn], local: &str, remote: &str) -> String {
    columns
        .iter()
        .map(|c| {
            format!(
                "{local}.{} = {remote}.{}",
                quote(&c.name),
                quote(&c.referenced_column)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
