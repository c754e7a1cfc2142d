//! Class reflection: hierarchy, generic parameters, property and method types.

use crate::ast::ClassDecl;
use crate::types::{ObjectType, Type};
use std::collections::{BTreeMap, HashMap, HashSet};

pub use crate::stubs::{
    COLLECTION_CLASS, ENTITY_CLASS_TEMPLATE, ENTITY_MANAGER_CLASS, ENTITY_MANAGER_INTERFACE,
    ENTITY_REPOSITORY_CLASS, LEGACY_OBJECT_REPOSITORY_CLASS, OBJECT_REPOSITORY_CLASS,
    QUERY_BUILDER_CLASS, QUERY_CLASS, TRAVERSABLE_CLASS,
};

/// Declared type of a property.
///
/// Read and write types differ when a property accepts a broader type on
/// write than it reports on read.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyReflection {
    name: String,
    readable_type: Type,
    writable_type: Type,
}

impl PropertyReflection {
    pub fn new(name: impl Into<String>, readable_type: Type, writable_type: Type) -> Self {
        Self {
            name: name.into(),
            readable_type,
            writable_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn readable_type(&self) -> &Type {
        &self.readable_type
    }

    pub fn writable_type(&self) -> &Type {
        &self.writable_type
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodReflection {
    name: String,
    return_type: Type,
}

impl MethodReflection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }
}

/// Reflection of one class or interface.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassReflection {
    name: String,
    is_interface: bool,
    is_final: bool,
    template_types: Vec<String>,
    /// Parent class and implemented interfaces, possibly referring to our templates.
    parents: Vec<ObjectType>,
    properties: BTreeMap<String, PropertyReflection>,
    /// Keyed by lowercase name; method names are case-insensitive.
    methods: BTreeMap<String, MethodReflection>,
}

impl ClassReflection {
    /// Create a reflection for a concrete class.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_interface: false,
            is_final: false,
            template_types: Vec::new(),
            parents: Vec::new(),
            properties: BTreeMap::new(),
            methods: BTreeMap::new(),
        }
    }

    /// Create a reflection for an interface.
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            is_interface: true,
            ..Self::new(name)
        }
    }

    /// Reflection of a class declared in analysed source.
    pub fn from_decl(decl: &ClassDecl) -> Self {
        let mut class = Self::new(decl.name.clone());
        class.is_interface = decl.is_interface;
        class.is_final = decl.is_final;
        class.template_types = decl.template_types.clone();
        class.parents = decl.parents.clone();
        for property in &decl.properties {
            class = class.with_property_types(
                &property.name,
                property.readable_type.clone(),
                property.writable_type.clone(),
            );
        }
        for method in &decl.methods {
            class = class.with_method(&method.name, method.return_type.clone());
        }
        class
    }

    pub fn final_class(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn with_templates(mut self, templates: &[&str]) -> Self {
        self.template_types = templates.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Add a parent class or implemented interface.
    pub fn extends(mut self, parent: ObjectType) -> Self {
        self.parents.push(parent);
        self
    }

    /// Add a property whose read and write types are the same.
    pub fn with_property(self, name: &str, ty: Type) -> Self {
        self.with_property_types(name, ty.clone(), ty)
    }

    pub fn with_property_types(mut self, name: &str, readable: Type, writable: Type) -> Self {
        self.properties.insert(
            name.to_string(),
            PropertyReflection::new(name, readable, writable),
        );
        self
    }

    pub fn with_method(mut self, name: &str, return_type: Type) -> Self {
        self.methods.insert(
            name.to_ascii_lowercase(),
            MethodReflection {
                name: name.to_string(),
                return_type,
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn template_types(&self) -> &[String] {
        &self.template_types
    }

    pub fn parents(&self) -> &[ObjectType] {
        &self.parents
    }

    /// Property declared on this class itself (not inherited).
    pub fn native_property(&self, name: &str) -> Option<&PropertyReflection> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyReflection> {
        self.properties.values()
    }

    pub fn method(&self, name: &str) -> Option<&MethodReflection> {
        self.methods.get(&name.to_ascii_lowercase())
    }

    /// Bind our template parameters to `args`; unbound parameters become `mixed`.
    pub fn template_map(&self, args: &[Type]) -> HashMap<String, Type> {
        self.template_types
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), args.get(i).cloned().unwrap_or(Type::Mixed)))
            .collect()
    }
}

/// Index of every class the analysis knows about.
#[derive(Debug, Clone, Default)]
pub struct ReflectionProvider {
    /// Keyed by lowercase class name.
    classes: HashMap<String, ClassReflection>,
}

impl ReflectionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider pre-populated with the persistence library's own classes.
    pub fn with_doctrine_stubs() -> Self {
        let mut provider = Self::new();
        crate::stubs::register_doctrine_classes(&mut provider);
        provider
    }

    pub fn register(&mut self, class: ClassReflection) {
        self.classes.insert(class.name.to_ascii_lowercase(), class);
    }

    pub fn class(&self, name: &str) -> Option<&ClassReflection> {
        self.classes.get(&name.to_ascii_lowercase())
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.class(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// `ty` viewed as its ancestor `ancestor`, with generic arguments carried through.
    ///
    /// Returns `ty` itself when it already is `ancestor`.
    pub fn ancestor_type(&self, ty: &ObjectType, ancestor: &str) -> Option<ObjectType> {
        let mut visited = HashSet::new();
        self.find_ancestor(ty, ancestor, &mut visited)
    }

    fn find_ancestor(
        &self,
        ty: &ObjectType,
        ancestor: &str,
        visited: &mut HashSet<String>,
    ) -> Option<ObjectType> {
        if ty.is_class(ancestor) {
            return Some(ty.clone());
        }
        if !visited.insert(ty.class_name.to_ascii_lowercase()) {
            return None;
        }

        let class = self.class(&ty.class_name)?;
        let map = class.template_map(&ty.type_args);
        for parent in &class.parents {
            let resolved = match Type::Object(parent.clone()).substitute(&map) {
                Type::Object(o) => o,
                _ => continue,
            };
            if let Some(found) = self.find_ancestor(&resolved, ancestor, visited) {
                return Some(found);
            }
        }
        None
    }

    /// Return type of `method` called on `ty`, searching ancestors and
    /// substituting generic arguments along the way.
    pub fn method_return_type(&self, ty: &ObjectType, method: &str) -> Option<Type> {
        let mut visited = HashSet::new();
        self.find_method(ty, method, &mut visited)
    }

    fn find_method(
        &self,
        ty: &ObjectType,
        method: &str,
        visited: &mut HashSet<String>,
    ) -> Option<Type> {
        if !visited.insert(ty.class_name.to_ascii_lowercase()) {
            return None;
        }
        let class = self.class(&ty.class_name)?;
        let map = class.template_map(&ty.type_args);
        if let Some(found) = class.method(method) {
            return Some(found.return_type().substitute(&map));
        }
        for parent in &class.parents {
            if let Type::Object(resolved) = Type::Object(parent.clone()).substitute(&map) {
                if let Some(found) = self.find_method(&resolved, method, visited) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Readable type of `property` on `class` or the nearest ancestor declaring it.
    pub fn property_type(&self, class: &str, property: &str) -> Option<Type> {
        let mut queue = vec![class.to_string()];
        let mut visited = HashSet::new();
        while let Some(name) = queue.pop() {
            if !visited.insert(name.to_ascii_lowercase()) {
                continue;
            }
            let Some(reflection) = self.class(&name) else {
                continue;
            };
            if let Some(found) = reflection.native_property(property) {
                return Some(found.readable_type().clone());
            }
            queue.extend(reflection.parents.iter().map(|p| p.class_name.clone()));
        }
        None
    }

    pub fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        !class.eq_ignore_ascii_case(ancestor)
            && self.ancestor_type(&ObjectType::new(class), ancestor).is_some()
    }

    /// Resolve the argument bound to `template` of `ancestor` when `ty` is viewed
    /// as that ancestor.
    ///
    /// `None` when `ty` does not descend from `ancestor` or the parameter is left
    /// unbound somewhere along the way.
    pub fn template_type(&self, ty: &ObjectType, ancestor: &str, template: &str) -> Option<Type> {
        let resolved = self.ancestor_type(ty, ancestor)?;
        let class = self.class(ancestor)?;
        let index = class.template_types.iter().position(|t| t == template)?;
        match resolved.type_args.get(index)? {
            Type::Mixed | Type::Template(_) => None,
            bound => Some(bound.clone()),
        }
    }

    /// Entity class bound to a repository type, tried against the current
    /// repository interface first and its legacy namespace second.
    pub fn repository_entity(&self, repository: &ObjectType) -> Option<Type> {
        self.template_type(repository, OBJECT_REPOSITORY_CLASS, ENTITY_CLASS_TEMPLATE)
            .or_else(|| {
                self.template_type(
                    repository,
                    LEGACY_OBJECT_REPOSITORY_CLASS,
                    ENTITY_CLASS_TEMPLATE,
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_type_through_hierarchy() {
        let mut provider = ReflectionProvider::with_doctrine_stubs();
        provider.register(ClassReflection::new("App\\Entity\\Post"));
        provider.register(ClassReflection::new("App\\Repository\\PostRepository").extends(
            ObjectType::generic(
                ENTITY_REPOSITORY_CLASS,
                vec![Type::object("App\\Entity\\Post")],
            ),
        ));

        let repo = ObjectType::new("App\\Repository\\PostRepository");
        assert_eq!(
            provider.template_type(&repo, OBJECT_REPOSITORY_CLASS, ENTITY_CLASS_TEMPLATE),
            Some(Type::object("App\\Entity\\Post"))
        );
        assert_eq!(
            provider.template_type(&repo, LEGACY_OBJECT_REPOSITORY_CLASS, ENTITY_CLASS_TEMPLATE),
            None
        );

        // Raw repository without a bound entity.
        let raw = ObjectType::new(ENTITY_REPOSITORY_CLASS);
        assert_eq!(
            provider.template_type(&raw, OBJECT_REPOSITORY_CLASS, ENTITY_CLASS_TEMPLATE),
            None
        );
    }

    #[test]
    fn test_repository_entity_falls_back_to_legacy_interface() {
        let mut provider = ReflectionProvider::with_doctrine_stubs();
        provider.register(ClassReflection::new("App\\Entity\\Post"));
        provider.register(
            ClassReflection::new("App\\Repository\\LegacyPostRepository")
                .extends(ObjectType::new(ENTITY_REPOSITORY_CLASS))
                .extends(ObjectType::generic(
                    LEGACY_OBJECT_REPOSITORY_CLASS,
                    vec![Type::object("App\\Entity\\Post")],
                )),
        );

        let repo = ObjectType::new("App\\Repository\\LegacyPostRepository");
        assert_eq!(
            provider.template_type(&repo, OBJECT_REPOSITORY_CLASS, ENTITY_CLASS_TEMPLATE),
            None
        );
        assert_eq!(
            provider.repository_entity(&repo),
            Some(Type::object("App\\Entity\\Post"))
        );
        assert_eq!(
            provider.repository_entity(&ObjectType::new(ENTITY_REPOSITORY_CLASS)),
            None
        );
    }

    #[test]
    fn test_class_lookup_is_case_insensitive() {
        let provider = ReflectionProvider::with_doctrine_stubs();
        assert!(provider.has_class("doctrine\\orm\\querybuilder"));
        assert!(provider.is_subclass_of(ENTITY_MANAGER_CLASS, ENTITY_MANAGER_INTERFACE));
        assert!(!provider.is_subclass_of(QUERY_BUILDER_CLASS, QUERY_BUILDER_CLASS));
    }

    #[test]
    fn test_inherited_method_type_is_substituted() {
        let mut provider = ReflectionProvider::with_doctrine_stubs();
        provider.register(ClassReflection::new("App\\Repository\\PostRepository").extends(
            ObjectType::generic(ENTITY_REPOSITORY_CLASS, vec![Type::object("App\\Entity\\Post")]),
        ));

        let repo = ObjectType::new("App\\Repository\\PostRepository");
        assert_eq!(
            provider.method_return_type(&repo, "FINDONEBY"),
            Some(Type::object("App\\Entity\\Post").add_null())
        );
        assert_eq!(provider.method_return_type(&repo, "missing"), None);
    }

    #[test]
    fn test_collection_is_traversable() {
        let provider = ReflectionProvider::with_doctrine_stubs();
        let collection = ObjectType::generic(COLLECTION_CLASS, vec![Type::Int, Type::String]);
        let traversable = provider
            .ancestor_type(&collection, TRAVERSABLE_CLASS)
            .expect("collection is traversable");
        assert_eq!(traversable.type_args, vec![Type::Int, Type::String]);
    }
}
