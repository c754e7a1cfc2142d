//! Checks run by the analyser, one node at a time.
//!
//! Every rule observes a single kind of node and answers with zero or more
//! messages for that node. Only [`crate::CheckError::Configuration`] may escape a
//! rule; anything else is reported as a message or skipped.

mod entity_column;
mod entity_relation;
mod query_builder_dql;
mod repository_method_call;


pub use entity_column::{EntityColumnRule, column_storage_type};
pub use entity_relation::{EntityRelationRule, association_storage_type};
pub use query_builder_dql::QueryBuilderDqlRule;
pub use repository_method_call::RepositoryMethodCallRule;

use crate::ast::{MethodCall, PropertyDecl};
use crate::config::AnalysisConfig;
use crate::dql::MetadataQueryCompiler;
use crate::error::CheckResult;
use crate::metadata::{MetadataGateway, MetadataRecord};
use crate::reflection::{ClassReflection, PropertyReflection, ReflectionProvider};
use crate::scope::Scope;
use crate::types::{Type, VerbosityLevel};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A declared property of a class.
    Property,
    MethodCall,
}

#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Property(&'a PropertyDecl),
    MethodCall(&'a MethodCall),
}

impl Node<'_> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Property(_) => NodeKind::Property,
            Node::MethodCall(_) => NodeKind::MethodCall,
        }
    }
}

pub trait Rule: Send + Sync {
    /// Stable identifier used in diagnostics.
    fn name(&self) -> &'static str;

    fn node_kind(&self) -> NodeKind;

    fn process_node(&self, node: Node<'_>, scope: &dyn Scope) -> CheckResult<Vec<String>>;
}

/// The rules of one analysis run.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in rule, wired to `gateway`.
    pub fn with_defaults(gateway: Arc<MetadataGateway>, report_dynamic_query_builders: bool) -> Self {
        let compiler = Arc::new(MetadataQueryCompiler::new(Arc::clone(&gateway)));
        let mut registry = Self::new();
        registry.register(EntityRelationRule::new(Arc::clone(&gateway)));
        registry.register(EntityColumnRule::new(Arc::clone(&gateway)));
        registry.register(RepositoryMethodCallRule::new(Arc::clone(&gateway)));
        registry.register(QueryBuilderDqlRule::new(
            gateway,
            compiler,
            report_dynamic_query_builders,
        ));
        registry
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::with_defaults(
            Arc::new(config.metadata_gateway()),
            config.report_dynamic_query_builders(),
        )
    }

    pub fn register(&mut self, rule: impl Rule + 'static) {
        self.rules.push(Box::new(rule));
    }

    pub fn rules_for(&self, kind: NodeKind) -> impl Iterator<Item = &dyn Rule> {
        self.rules
            .iter()
            .map(|r| &**r)
            .filter(move |r| r.node_kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| r.name()))
            .finish()
    }
}

/// Turn a non-fatal lookup failure into "nothing to check".
pub(crate) fn skip_non_fatal<T>(rule: &str, result: CheckResult<Option<T>>) -> CheckResult<Option<T>> {
    match result {
        Err(e) if !e.is_fatal() => {
            tracing::debug!(target: "ormcheck.rules", rule, error = %e, "skipping node");
            Ok(None)
        }
        other => other,
    }
}

/// Mapping record of the class being analysed, when it is mapped by the
/// relational mapper. `None` for transient classes and an unconfigured store.
pub(crate) fn class_record(
    rule: &str,
    gateway: &MetadataGateway,
    class: &ClassReflection,
) -> CheckResult<Option<Arc<MetadataRecord>>> {
    let Some(descriptor) = skip_non_fatal(rule, gateway.descriptor(class.name()))? else {
        return Ok(None);
    };
    if descriptor.is_transient() {
        tracing::trace!(target: "ormcheck.rules", rule, class = class.name(), "transient class");
        return Ok(None);
    }
    Ok(descriptor.record().cloned())
}

/// Compare a property against what storage holds, writes first.
pub(crate) fn type_mismatches(
    class: &str,
    property: &PropertyReflection,
    storage: &Type,
    reflection: &ReflectionProvider,
) -> Vec<String> {
    let mut errors = Vec::new();
    let writable = property.writable_type();
    let readable = property.readable_type();

    if !writable.is_super_type_of(storage, reflection).yes() {
        errors.push(format!(
            "Property {class}::${} type mapping mismatch: database can contain {} but property expects {}.",
            property.name(),
            storage.describe(VerbosityLevel::TypeOnly),
            writable.describe(VerbosityLevel::TypeOnly),
        ));
    }
    if !storage.is_super_type_of(readable, reflection).yes() {
        errors.push(format!(
            "Property {class}::${} type mapping mismatch: property can contain {} but database expects {}.",
            property.name(),
            readable.describe(VerbosityLevel::TypeOnly),
            storage.describe(VerbosityLevel::TypeOnly),
        ));
    }
    errors
}

/// The property node and its reflection, when the node is a property of a
/// known class.
pub(crate) fn property_under_check<'s>(
    node: Node<'_>,
    scope: &'s dyn Scope,
) -> Option<(&'s ClassReflection, &'s PropertyReflection)> {
    let Node::Property(decl) = node else {
        return None;
    };
    let class = scope.class_reflection()?;
    let property = class.native_property(&decl.name)?;
    Some((class, property))
}
