//! DQL compilation against the mapping metadata.
//!
//! [`MetadataQueryCompiler`] is the reference [`QueryCompiler`]: it parses a
//! DQL statement, resolves every entity, alias and path against the
//! [`MetadataGateway`], and lowers the result to PostgreSQL. Error messages
//! follow the persistence library's wording so diagnostics read the same as
//! the exceptions its users already know.

pub mod lexer;
mod lower;
mod parser;

use crate::metadata::MetadataGateway;
use std::sync::Arc;
use thiserror::Error;

/// A successfully compiled statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub dql: String,
    /// `None` when the statement uses constructs without a relational form.
    pub sql: Option<String>,
    /// Parameter names in positional order (`$1`, `$2`, ...).
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    Syntax,
    Semantical,
    Internal,
}

/// Compilation failure; the message is what users see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub message: String,
}

impl CompileError {
    pub fn syntax(detail: impl AsRef<str>) -> Self {
        Self {
            kind: CompileErrorKind::Syntax,
            message: format!("[Syntax Error] {}", detail.as_ref()),
        }
    }

    pub fn semantical(detail: impl AsRef<str>) -> Self {
        Self {
            kind: CompileErrorKind::Semantical,
            message: format!("[Semantical Error] {}", detail.as_ref()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: CompileErrorKind::Internal,
            message: message.into(),
        }
    }

    pub fn is_syntax_error(&self) -> bool {
        self.kind == CompileErrorKind::Syntax
    }
}

pub trait QueryCompiler: Send + Sync {
    fn compile(&self, dql: &str) -> Result<CompiledQuery, CompileError>;
}

/// Compiles DQL against the classes known to a [`MetadataGateway`].
#[derive(Debug, Clone)]
pub struct MetadataQueryCompiler {
    gateway: Arc<MetadataGateway>,
}

impl MetadataQueryCompiler {
    pub fn new(gateway: Arc<MetadataGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &MetadataGateway {
        &self.gateway
    }
}

impl QueryCompiler for MetadataQueryCompiler {
    fn compile(&self, dql: &str) -> Result<CompiledQuery, CompileError> {
        let parsed = parser::Parser::new(dql, &self.gateway).parse()?;
        let (sql, parameters) = match lower::lower(&parsed) {
            Some(lowered) => (Some(lowered.sql), lowered.parameters),
            None => {
                tracing::debug!(target: "ormcheck.dql", dql, "statement has no relational form");
                (None, Vec::new())
            }
        };

        #[cfg(feature = "sql")]
        {
            if let Some(sql) = &sql {
                pg_query::parse(sql).map_err(|e| {
                    tracing::debug!(target: "ormcheck.dql", sql = %sql, error = %e, "lowered SQL rejected");
                    CompileError::syntax(format!("line 0, col -1: Error: {e}"))
                })?;
            }
        }

        tracing::trace!(target: "ormcheck.dql", dql, sql = ?sql, "compiled");
        Ok(CompiledQuery {
            dql: dql.to_string(),
            sql,
            parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        AssociationMapping, FieldMapping, JoinColumn, JoinTable, MetadataRecord,
        StaticMetadataStore,
    };

    const POST: &str = "App\\Entity\\Post";
    const USER: &str = "App\\Entity\\User";
    const TAG: &str = "App\\Entity\\Tag";

    fn compiler() -> MetadataQueryCompiler {
        let store = StaticMetadataStore::new()
            .with_record(
                MetadataRecord::new(POST, "post")
                    .with_field(FieldMapping::new("id", "integer").id())
                    .with_field(FieldMapping::new("title", "string"))
                    .with_field(FieldMapping::new("publishedAt", "datetime").column("published_at"))
                    .with_association(AssociationMapping::to_one("author", USER))
                    .with_association(AssociationMapping::to_many("tags", TAG).join_table(
                        JoinTable {
                            name: "post_tag".to_string(),
                            join_columns: vec![JoinColumn::new("post_id", "id")],
                            inverse_join_columns: vec![JoinColumn::new("tag_id", "id")],
                        },
                    )),
            )
            .unwrap()
            .with_record(
                MetadataRecord::new(USER, "users")
                    .with_field(FieldMapping::new("id", "integer").id())
                    .with_field(FieldMapping::new("name", "string"))
                    .with_association(AssociationMapping::to_many("posts", POST).mapped_by("author")),
            )
            .unwrap()
            .with_record(
                MetadataRecord::new(TAG, "tag")
                    .with_field(FieldMapping::new("id", "integer").id())
                    .with_field(FieldMapping::new("label", "string")),
            )
            .unwrap();
        MetadataQueryCompiler::new(Arc::new(MetadataGateway::from_store(Arc::new(store))))
    }

    fn error(dql: &str) -> CompileError {
        compiler().compile(dql).unwrap_err()
    }

    #[test]
    fn test_compile_simple_select() {
        let compiled = compiler()
            .compile("SELECT p FROM App\\Entity\\Post p WHERE p.title = :title")
            .unwrap();
        assert_eq!(
            compiled.sql.as_deref(),
            Some(
                "SELECT p0_.\"id\" AS id_0, p0_.\"title\" AS title_1, p0_.\"published_at\" AS published_at_2 \
                 FROM \"post\" p0_ WHERE p0_.\"title\" = $1"
            )
        );
        assert_eq!(compiled.parameters, vec![":title".to_string()]);
    }

    #[test]
    fn test_compile_joins() {
        let compiled = compiler()
            .compile(
                "SELECT u.name, COUNT(p) AS total FROM App\\Entity\\User u \
                 LEFT JOIN u.posts p WITH p.title <> '' GROUP BY u.name ORDER BY total DESC",
            )
            .unwrap();
        assert_eq!(
            compiled.sql.as_deref(),
            Some(
                "SELECT u0_.\"name\" AS sclr_0, COUNT ( p1_.\"id\" ) AS sclr_1 FROM \"users\" u0_ \
                 LEFT JOIN \"post\" p1_ ON p1_.\"author_id\" = u0_.\"id\" AND (p1_.\"title\" <> '') \
                 GROUP BY u0_.\"name\" ORDER BY sclr_1 DESC"
            )
        );

        let compiled = compiler()
            .compile("SELECT t.label FROM App\\Entity\\Post p JOIN p.tags t")
            .unwrap();
        assert_eq!(
            compiled.sql.as_deref(),
            Some(
                "SELECT t1_.\"label\" AS sclr_0 FROM \"post\" p0_ \
                 INNER JOIN \"post_tag\" p2_ ON p2_.\"post_id\" = p0_.\"id\" \
                 INNER JOIN \"tag\" t1_ ON p2_.\"tag_id\" = t1_.\"id\""
            )
        );
    }

    #[test]
    fn test_compile_update_and_delete() {
        let compiled = compiler()
            .compile("UPDATE App\\Entity\\Post p SET p.title = ?1 WHERE p.id = ?2")
            .unwrap();
        assert_eq!(
            compiled.sql.as_deref(),
            Some("UPDATE \"post\" p0_ SET \"title\" = $1 WHERE p0_.\"id\" = $2")
        );

        let compiled = compiler()
            .compile("DELETE App\\Entity\\Post p WHERE p.author = :author")
            .unwrap();
        assert_eq!(
            compiled.sql.as_deref(),
            Some("DELETE FROM \"post\" p0_ WHERE p0_.\"author_id\" = $1")
        );
    }

    #[test]
    fn test_syntax_errors() {
        let err = error("SELECT p FROM App\\Entity\\Post p WHERE p.id = 1)");
        assert!(err.is_syntax_error());
        assert_eq!(
            err.message,
            "[Syntax Error] line 0, col 46: Error: Expected end of string, got ')'"
        );

        let err = error("SELECT p FROM App\\Entity\\Post p WHERE (p.id = 1");
        assert_eq!(
            err.message,
            "[Syntax Error] line 0, col -1: Error: Expected Doctrine\\ORM\\Query\\Lexer::T_CLOSE_PARENTHESIS, got end of string."
        );

        let err = error("p FROM App\\Entity\\Post p");
        assert_eq!(
            err.message,
            "[Syntax Error] line 0, col 0: Error: Expected SELECT, UPDATE or DELETE, got 'p'"
        );

        let err = error("SELECT p App\\Entity\\Post p");
        assert_eq!(
            err.message,
            "[Syntax Error] line 0, col 9: Error: Expected Doctrine\\ORM\\Query\\Lexer::T_FROM, got 'App\\Entity\\Post'"
        );
    }

    #[test]
    fn test_unknown_class() {
        let err = error("SELECT e FROM Foo e");
        assert_eq!(err.kind, CompileErrorKind::Semantical);
        assert_eq!(
            err.message,
            "[Semantical Error] line 0, col 14 near 'Foo e': Error: Class 'Foo' is not defined."
        );
    }

    #[test]
    fn test_unknown_field() {
        let err = error("SELECT p FROM App\\Entity\\Post p WHERE p.body = :body");
        assert_eq!(
            err.message,
            "[Semantical Error] line 0, col 40 near 'body = :body': Error: Class App\\Entity\\Post has no field or association named body"
        );
    }

    #[test]
    fn test_undefined_and_duplicate_aliases() {
        let err = error("SELECT x FROM App\\Entity\\Post p");
        assert_eq!(
            err.message,
            "[Semantical Error] line 0, col 7 near 'x FROM App\\Entity\\Post': Error: 'x' is not defined."
        );

        let err = error("SELECT p FROM App\\Entity\\Post p JOIN p.author p");
        assert!(err.message.ends_with("Error: 'p' is already defined."));
    }

    #[test]
    fn test_join_errors() {
        let err = error("SELECT p FROM App\\Entity\\Post p JOIN p.title t");
        assert!(
            err.message
                .ends_with("Error: Class App\\Entity\\Post has no association named title")
        );

        let err = error("SELECT p FROM App\\Entity\\Post p JOIN q.author a");
        assert!(err.message.ends_with(
            "Error: Identification Variable q used in join path expression but was not defined before."
        ));
    }

    #[test]
    fn test_collection_path_rules() {
        let err = error("SELECT p FROM App\\Entity\\Post p WHERE p.tags = 1");
        assert!(err.message.ends_with(
            "Error: Invalid PathExpression. StateFieldPathExpression or SingleValuedAssociationField expected."
        ));

        let compiled = compiler()
            .compile("SELECT p FROM App\\Entity\\Post p WHERE p.tags IS EMPTY")
            .unwrap();
        assert_eq!(compiled.sql, None);

        let compiled = compiler()
            .compile("SELECT u FROM App\\Entity\\User u WHERE :post MEMBER OF u.posts")
            .unwrap();
        assert_eq!(compiled.sql, None);
    }

    #[test]
    fn test_subselect() {
        let compiled = compiler()
            .compile(
                "SELECT u FROM App\\Entity\\User u WHERE EXISTS \
                 (SELECT p FROM App\\Entity\\Post p WHERE p.author = u)",
            )
            .unwrap();
        assert_eq!(
            compiled.sql.as_deref(),
            Some(
                "SELECT u0_.\"id\" AS id_0, u0_.\"name\" AS name_1 FROM \"users\" u0_ WHERE EXISTS \
                 (SELECT p1_.\"id\" FROM \"post\" p1_ WHERE p1_.\"author_id\" = u0_.\"id\")"
            )
        );
    }

    #[test]
    fn test_unconfigured_gateway_is_internal() {
        let compiler = MetadataQueryCompiler::new(Arc::new(MetadataGateway::new(Some(Box::new(
            crate::mapping_file::MappingFileLoader::new("/nonexistent/mapping.json"),
        )))));
        let err = compiler.compile("SELECT e FROM Foo e").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::Internal);
    }
}
