use super::{Node, NodeKind, Rule, class_record, property_under_check, type_mismatches};
use crate::error::CheckResult;
use crate::metadata::{AssociationKind, AssociationMapping, MetadataGateway};
use crate::reflection::COLLECTION_CLASS;
use crate::scope::Scope;
use crate::types::Type;
use std::sync::Arc;

/// What the storage layer hands back for an association.
///
/// A to-one association yields the target entity, or null when a join column
/// may be null. A to-many association always yields a collection of targets.
pub fn association_storage_type(association: &AssociationMapping) -> Type {
    match association.kind {
        AssociationKind::ToOne => {
            let target = Type::object(&association.target);
            if association.is_nullable() {
                target.add_null()
            } else {
                target
            }
        }
        AssociationKind::ToMany => Type::intersect([
            Type::object(COLLECTION_CLASS),
            Type::iterable(Type::Mixed, Type::object(&association.target)),
        ]),
    }
}

/// Property types of mapped associations must agree with the mapping.
pub struct EntityRelationRule {
    gateway: Arc<MetadataGateway>,
}

impl EntityRelationRule {
    pub fn new(gateway: Arc<MetadataGateway>) -> Self {
        Self { gateway }
    }
}

impl Rule for EntityRelationRule {
    fn name(&self) -> &'static str {
        "doctrine.entityRelation"
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
        let Some(association) = record.association(property.name()) else {
            return Ok(Vec::new());
        };

        let storage = association_storage_type(association);
        Ok(type_mismatches(
            class.name(),
            property,
            &storage,
            scope.reflection(),
        ))
    }
}
