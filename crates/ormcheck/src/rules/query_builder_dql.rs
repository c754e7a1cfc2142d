use super::{Node, NodeKind, Rule};
use crate::ast::Expr;
use crate::dql::{CompileErrorKind, QueryCompiler};
use crate::error::{CheckError, CheckResult};
use crate::metadata::{ManagerKind, MetadataGateway};
use crate::query_builder::BuilderState;
use crate::reflection::QUERY_BUILDER_CLASS;
use crate::scope::Scope;
use crate::types::Type;
use std::sync::Arc;

/// Queries assembled with the query builder must compile.
pub struct QueryBuilderDqlRule {
    gateway: Arc<MetadataGateway>,
    compiler: Arc<dyn QueryCompiler>,
    report_dynamic_query_builders: bool,
}

impl QueryBuilderDqlRule {
    pub fn new(
        gateway: Arc<MetadataGateway>,
        compiler: Arc<dyn QueryCompiler>,
        report_dynamic_query_builders: bool,
    ) -> Self {
        Self {
            gateway,
            compiler,
            report_dynamic_query_builders,
        }
    }
}

/// Known builder shapes of `ty`; empty unless every member of a union is one.
fn query_builder_states(ty: &Type) -> Vec<&BuilderState> {
    let mut states = Vec::new();
    for member in ty.members() {
        match member {
            Type::QueryBuilder(state) => states.push(state),
            _ => return Vec::new(),
        }
    }
    states
}

impl Rule for QueryBuilderDqlRule {
    fn name(&self) -> &'static str {
        "doctrine.queryBuilderDql"
    }

    fn node_kind(&self) -> NodeKind {
        NodeKind::MethodCall
    }

    fn process_node(&self, node: Node<'_>, scope: &dyn Scope) -> CheckResult<Vec<String>> {
        let Node::MethodCall(call) = node else {
            return Ok(Vec::new());
        };
        if !call
            .name
            .as_identifier()
            .is_some_and(|name| name.eq_ignore_ascii_case("getQuery"))
        {
            return Ok(Vec::new());
        }

        let called_on = match scope.get_type(&call.receiver) {
            Ok(ty) => ty,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return Ok(vec![format!("Internal error: {e}")]),
        };
        if query_builder_states(&called_on).is_empty() {
            let is_builder = Type::object(QUERY_BUILDER_CLASS)
                .is_super_type_of(&called_on, scope.reflection())
                .yes();
            if self.report_dynamic_query_builders && is_builder {
                return Ok(vec![
                    "Could not analyse QueryBuilder with unknown beginning.".to_string(),
                ]);
            }
            return Ok(Vec::new());
        }

        // Text of every shape, through the accessor the builder itself offers.
        let get_dql = Expr::MethodCall(call.with_name("getDQL"));
        let dql_type = match scope.get_type(&get_dql) {
            Ok(ty) => ty,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return Ok(vec![format!("Internal error: {e}")]),
        };
        let dqls = dql_type.constant_strings();
        if dqls.is_empty() {
            if self.report_dynamic_query_builders {
                return Ok(vec![
                    "Could not analyse QueryBuilder with dynamic arguments.".to_string(),
                ]);
            }
            return Ok(Vec::new());
        }

        if !self.gateway.is_configured() {
            return Err(CheckError::configuration(
                "Please provide the `metadata.mapping` setting for the DQL validation.",
            ));
        }
        if self.gateway.manager_kind()? != Some(ManagerKind::Orm) {
            return Ok(Vec::new());
        }

        let mut messages = Vec::new();
        for dql in dqls {
            let Err(e) = self.compiler.compile(dql) else {
                continue;
            };
            tracing::debug!(target: "ormcheck.rules", dql, error = %e, "query rejected");
            let message = match e.kind {
                CompileErrorKind::Syntax => format!("QueryBuilder: {}\nDQL: {dql}", e.message),
                CompileErrorKind::Semantical => format!("QueryBuilder: {}", e.message),
                CompileErrorKind::Internal => format!("Internal error: {}", e.message),
            };
            messages.push(message);
        }
        Ok(messages)
    }
}
