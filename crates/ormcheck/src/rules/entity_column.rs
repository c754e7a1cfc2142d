use super::{Node, NodeKind, Rule, class_record, property_under_check, type_mismatches};
use crate::error::CheckResult;
use crate::metadata::{FieldMapping, MetadataGateway};
use crate::scope::Scope;
use crate::stubs::{DATE_TIME_CLASS, DATE_TIME_IMMUTABLE_CLASS};
use crate::types::Type;
use std::sync::Arc;

/// Property type a scalar column converts to, `None` for unknown column types.
pub fn column_storage_type(field: &FieldMapping) -> Option<Type> {
    let column_type = field.column_type.to_ascii_lowercase();
    let base = match column_type.as_str() {
        "string" | "text" | "guid" | "decimal" | "bigint" => Type::String,
        "integer" | "smallint" => Type::Int,
        "boolean" => Type::Bool,
        "float" => Type::Float,
        "date" | "time" | "datetime" | "datetimetz" => Type::object(DATE_TIME_CLASS),
        "date_immutable" | "time_immutable" | "datetime_immutable" | "datetimetz_immutable" => {
            Type::object(DATE_TIME_IMMUTABLE_CLASS)
        }
        "json" | "array" | "simple_array" => Type::array(Type::Mixed, Type::Mixed),
        _ => return None,
    };
    Some(if field.nullable { base.add_null() } else { base })
}

/// Property types of mapped columns must agree with the column type.
pub struct EntityColumnRule {
    gateway: Arc<MetadataGateway>,
}

impl EntityColumnRule {
    pub fn new(gateway: Arc<MetadataGateway>) -> Self {
        Self { gateway }
    }
}

impl Rule for EntityColumnRule {
    fn name(&self) -> &'static str {
        "doctrine.entityColumn"
    }

    fn node_kind(&self) -> NodeKind {
        NodeKind::Property
    }

    fn process_node(&self, node: Node<'_>, scope: &dyn Scope) -> CheckResult<Vec<String>> {
        let Some((class, property)) = property_under_check(node, scope) else {
            return Ok(Vec::new());
        };
        let Some(record) = class_record(self.name(), &self.gateway, class)? else {
            return Ok(Vec::new());
        };
        let Some(field) = record.field(property.name()) else {
            return Ok(Vec::new());
        };
        let Some(storage) = column_storage_type(field) else {
            tracing::trace!(
                target: "ormcheck.rules",
                column_type = %field.column_type,
                "unknown column type"
            );
            return Ok(Vec::new());
        };

        Ok(type_mismatches(
            class.name(),
            property,
            &storage,
            scope.reflection(),
        ))
    }
}
