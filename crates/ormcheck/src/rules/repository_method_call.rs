use super::{Node, NodeKind, Rule, skip_non_fatal};
use crate::error::CheckResult;
use crate::metadata::MetadataGateway;
use crate::scope::Scope;
use crate::types::{Type, VerbosityLevel};
use std::sync::Arc;

/// Finder methods whose first argument is a criteria array.
const CRITERIA_METHODS: [&str; 3] = ["findBy", "findOneBy", "count"];

/// Criteria keys passed to repository finders must be mapped fields.
pub struct RepositoryMethodCallRule {
    gateway: Arc<MetadataGateway>,
}

impl RepositoryMethodCallRule {
    pub fn new(gateway: Arc<MetadataGateway>) -> Self {
        Self { gateway }
    }
}

impl Rule for RepositoryMethodCallRule {
    fn name(&self) -> &'static str {
        "doctrine.repositoryMethodCall"
    }

    fn node_kind(&self) -> NodeKind {
        NodeKind::MethodCall
    }

    fn process_node(&self, node: Node<'_>, scope: &dyn Scope) -> CheckResult<Vec<String>> {
        let Node::MethodCall(call) = node else {
            return Ok(Vec::new());
        };
        let Some(method) = call.name.as_identifier() else {
            return Ok(Vec::new());
        };
        if !CRITERIA_METHODS.contains(&method) {
            return Ok(Vec::new());
        }
        let Some(criteria) = call.args.first() else {
            return Ok(Vec::new());
        };

        let Some(Type::ConstantArray(criteria)) =
            skip_non_fatal(self.name(), scope.get_type(criteria).map(Some))?
        else {
            return Ok(Vec::new());
        };
        if criteria.is_empty() {
            return Ok(Vec::new());
        }

        let Some(called_on) = skip_non_fatal(self.name(), scope.get_type(&call.receiver).map(Some))?
        else {
            return Ok(Vec::new());
        };
        let Type::Object(repository) = &called_on else {
            return Ok(Vec::new());
        };
        let Some(entity) = scope.reflection().repository_entity(repository) else {
            return Ok(Vec::new());
        };
        let Some(entity_class) = entity.class_name().and_then(|c| scope.reflection().class(c))
        else {
            return Ok(Vec::new());
        };
        let Some(record) = skip_non_fatal(self.name(), self.gateway.record(entity_class.name()))?
        else {
            tracing::trace!(
                target: "ormcheck.rules",
                entity = entity_class.name(),
                "repository entity has no metadata"
            );
            return Ok(Vec::new());
        };

        let mut messages = Vec::new();
        for key in criteria.key_types() {
            let Type::ConstantString(field) = key else {
                continue;
            };
            if record.has_field(field) || record.has_association(field) {
                continue;
            }
            messages.push(format!(
                "Call to method {}::{method}() - entity {} does not have a field named ${field}.",
                called_on.describe(VerbosityLevel::TypeOnly),
                entity_class.display_name(),
            ));
        }
        Ok(messages)
    }
}
