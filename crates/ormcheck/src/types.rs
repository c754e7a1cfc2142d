//! Static types as the host analysis engine sees them.
//!
//! The rules only need a small slice of a real type system: super-type tests
//! under unions, intersections and generic objects, nullability, a stable
//! textual rendering and access to literal string values.

use crate::query_builder::BuilderState;
use crate::reflection::{QUERY_BUILDER_CLASS, ReflectionProvider, TRAVERSABLE_CLASS};
use std::collections::HashMap;

/// Three-valued answer to "is A a super type of B".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrinaryLogic {
    No,
    Maybe,
    Yes,
}

impl TrinaryLogic {
    pub fn from_bool(value: bool) -> Self {
        if value { Self::Yes } else { Self::No }
    }

    pub fn yes(self) -> bool {
        self == Self::Yes
    }

    pub fn maybe(self) -> bool {
        self == Self::Maybe
    }

    pub fn no(self) -> bool {
        self == Self::No
    }

    pub fn and(self, other: Self) -> Self {
        self.min(other)
    }

    pub fn or(self, other: Self) -> Self {
        self.max(other)
    }

    /// Conjunction over all values (`Yes` for an empty iterator).
    pub fn and_all(values: impl IntoIterator<Item = Self>) -> Self {
        values.into_iter().fold(Self::Yes, Self::and)
    }

    /// Disjunction over all values (`No` for an empty iterator).
    pub fn or_any(values: impl IntoIterator<Item = Self>) -> Self {
        values.into_iter().fold(Self::No, Self::or)
    }

    /// The common value when all values agree, `Maybe` otherwise.
    pub fn extreme_identity(values: impl IntoIterator<Item = Self>) -> Self {
        let mut values = values.into_iter();
        let Some(first) = values.next() else {
            return Self::Yes;
        };
        if values.all(|v| v == first) { first } else { Self::Maybe }
    }
}

/// How much detail [`Type::describe`] renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Types only, no literal values. Used for diagnostics.
    TypeOnly,
    /// Include literal values.
    Value,
}

/// A class type with optional generic arguments, e.g. `EntityRepository<User>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub class_name: String,
    pub type_args: Vec<Type>,
}

impl ObjectType {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            type_args: Vec::new(),
        }
    }

    pub fn generic(class_name: impl Into<String>, type_args: Vec<Type>) -> Self {
        Self {
            class_name: class_name.into(),
            type_args,
        }
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.class_name.eq_ignore_ascii_case(name)
    }

    pub fn describe(&self, level: VerbosityLevel) -> String {
        if self.type_args.is_empty() {
            return self.class_name.clone();
        }
        let args = self
            .type_args
            .iter()
            .map(|t| t.describe(level))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}<{args}>", self.class_name)
    }

    pub fn is_super_type_of(&self, other: &ObjectType, reflection: &ReflectionProvider) -> TrinaryLogic {
        if let Some(ancestor) = reflection.ancestor_type(other, &self.class_name) {
            // Raw generic objects are compatible with any parameterisation.
            if self.type_args.is_empty() || ancestor.type_args.is_empty() {
                return TrinaryLogic::Yes;
            }
            return TrinaryLogic::and_all(self.type_args.iter().enumerate().map(|(i, arg)| {
                match ancestor.type_args.get(i) {
                    Some(actual) => arg.is_super_type_of(actual, reflection),
                    None => arg.is_super_type_of(&Type::Mixed, reflection),
                }
            }));
        }

        // `other` may still be an instance of a subclass of `self`.
        if reflection
            .ancestor_type(&ObjectType::new(&self.class_name), &other.class_name)
            .is_some()
        {
            return TrinaryLogic::Maybe;
        }

        match (
            reflection.class(&self.class_name),
            reflection.class(&other.class_name),
        ) {
            (Some(a), Some(b)) => {
                let open = !a.is_final() && !b.is_final();
                if open && (a.is_interface() || b.is_interface()) {
                    TrinaryLogic::Maybe
                } else {
                    TrinaryLogic::No
                }
            }
            _ => TrinaryLogic::Maybe,
        }
    }

    fn substitute(&self, map: &HashMap<String, Type>) -> ObjectType {
        ObjectType {
            class_name: self.class_name.clone(),
            type_args: self.type_args.iter().map(|t| t.substitute(map)).collect(),
        }
    }
}

/// A literal array whose keys are all known at analysis time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstantArrayType {
    pub keys: Vec<Type>,
    pub values: Vec<Type>,
}

impl ConstantArrayType {
    pub fn key_types(&self) -> &[Type] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Mixed,
    Null,
    Bool,
    Int,
    Float,
    String,
    ConstantBool(bool),
    ConstantInt(i64),
    ConstantString(String),
    Object(ObjectType),
    Iterable { key: Box<Type>, value: Box<Type> },
    Array { key: Box<Type>, value: Box<Type> },
    ConstantArray(ConstantArrayType),
    Union(Vec<Type>),
    Intersection(Vec<Type>),
    /// Unbound generic parameter of a class declaration.
    Template(String),
    /// A query builder whose construction chain is known.
    QueryBuilder(BuilderState),
}

impl Type {
    pub fn object(class_name: impl Into<String>) -> Self {
        Type::Object(ObjectType::new(class_name))
    }

    pub fn generic(class_name: impl Into<String>, type_args: Vec<Type>) -> Self {
        Type::Object(ObjectType::generic(class_name, type_args))
    }

    pub fn constant_string(value: impl Into<String>) -> Self {
        Type::ConstantString(value.into())
    }

    pub fn iterable(key: Type, value: Type) -> Self {
        Type::Iterable {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn array(key: Type, value: Type) -> Self {
        Type::Array {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// Union of the given types; nested unions are flattened and duplicates dropped.
    pub fn union(types: impl IntoIterator<Item = Type>) -> Type {
        let mut members: Vec<Type> = Vec::new();
        let mut has_null = false;
        for ty in types {
            let flat = match ty {
                Type::Union(inner) => inner,
                other => vec![other],
            };
            for t in flat {
                match t {
                    Type::Mixed => return Type::Mixed,
                    Type::Null => has_null = true,
                    t if !members.contains(&t) => members.push(t),
                    _ => {}
                }
            }
        }
        if has_null {
            members.push(Type::Null);
        }
        match members.len() {
            0 => Type::Mixed,
            1 => members.remove(0),
            _ => Type::Union(members),
        }
    }

    pub fn intersect(types: impl IntoIterator<Item = Type>) -> Type {
        let mut members: Vec<Type> = Vec::new();
        for ty in types {
            let flat = match ty {
                Type::Intersection(inner) => inner,
                Type::Mixed => continue,
                other => vec![other],
            };
            for t in flat {
                if !members.contains(&t) {
                    members.push(t);
                }
            }
        }
        match members.len() {
            0 => Type::Mixed,
            1 => members.remove(0),
            _ => Type::Intersection(members),
        }
    }

    pub fn add_null(self) -> Type {
        Type::union([self, Type::Null])
    }

    pub fn remove_null(&self) -> Type {
        match self {
            Type::Union(types) => Type::union(types.iter().filter(|t| **t != Type::Null).cloned()),
            other => other.clone(),
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Type::Null | Type::Mixed => true,
            Type::Union(types) => types.iter().any(Type::is_nullable),
            _ => false,
        }
    }

    /// Literal string values this type represents.
    ///
    /// Empty unless every member of the type is a literal string.
    pub fn constant_strings(&self) -> Vec<&str> {
        match self {
            Type::ConstantString(s) => vec![s.as_str()],
            Type::Union(types) => {
                let mut out = Vec::with_capacity(types.len());
                for t in types {
                    match t {
                        Type::ConstantString(s) => out.push(s.as_str()),
                        _ => return Vec::new(),
                    }
                }
                out
            }
            _ => Vec::new(),
        }
    }

    /// Class name for object-like types (`TypeWithClassName`).
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Object(o) => Some(&o.class_name),
            Type::QueryBuilder(_) => Some(QUERY_BUILDER_CLASS),
            _ => None,
        }
    }

    /// Members of a union, or the type itself.
    pub fn members(&self) -> Vec<&Type> {
        match self {
            Type::Union(types) => types.iter().collect(),
            other => vec![other],
        }
    }

    pub fn substitute(&self, map: &HashMap<String, Type>) -> Type {
        match self {
            Type::Template(name) => map.get(name).cloned().unwrap_or(Type::Mixed),
            Type::Object(o) => Type::Object(o.substitute(map)),
            Type::Iterable { key, value } => Type::iterable(key.substitute(map), value.substitute(map)),
            Type::Array { key, value } => Type::array(key.substitute(map), value.substitute(map)),
            Type::Union(types) => Type::union(types.iter().map(|t| t.substitute(map))),
            Type::Intersection(types) => Type::intersect(types.iter().map(|t| t.substitute(map))),
            other => other.clone(),
        }
    }

    pub fn describe(&self, level: VerbosityLevel) -> String {
        match self {
            Type::Mixed => "mixed".to_string(),
            Type::Null => "null".to_string(),
            Type::Bool => "bool".to_string(),
            Type::Int => "int".to_string(),
            Type::Float => "float".to_string(),
            Type::String => "string".to_string(),
            Type::ConstantBool(b) => match level {
                VerbosityLevel::TypeOnly => "bool".to_string(),
                VerbosityLevel::Value => b.to_string(),
            },
            Type::ConstantInt(i) => match level {
                VerbosityLevel::TypeOnly => "int".to_string(),
                VerbosityLevel::Value => i.to_string(),
            },
            Type::ConstantString(s) => match level {
                VerbosityLevel::TypeOnly => "string".to_string(),
                VerbosityLevel::Value => format!("'{s}'"),
            },
            Type::Object(o) => o.describe(level),
            Type::QueryBuilder(_) => QUERY_BUILDER_CLASS.to_string(),
            Type::Iterable { key, value } => describe_generic("iterable", key, value, level),
            Type::Array { key, value } => describe_generic("array", key, value, level),
            Type::ConstantArray(array) => match level {
                VerbosityLevel::TypeOnly => "array".to_string(),
                VerbosityLevel::Value => {
                    let items = array
                        .keys
                        .iter()
                        .zip(&array.values)
                        .map(|(k, v)| format!("{}: {}", k.describe(level), v.describe(level)))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("array{{{items}}}")
                }
            },
            Type::Union(types) => {
                let mut parts: Vec<String> = Vec::new();
                for t in types.iter().filter(|t| **t != Type::Null) {
                    let d = t.describe(level);
                    if !parts.contains(&d) {
                        parts.push(d);
                    }
                }
                if types.contains(&Type::Null) {
                    parts.push("null".to_string());
                }
                parts.join("|")
            }
            Type::Intersection(types) => types
                .iter()
                .map(|t| match t {
                    Type::Union(_) => format!("({})", t.describe(level)),
                    _ => t.describe(level),
                })
                .collect::<Vec<_>>()
                .join("&"),
            Type::Template(name) => name.clone(),
        }
    }

    pub fn is_super_type_of(&self, other: &Type, reflection: &ReflectionProvider) -> TrinaryLogic {
        use TrinaryLogic::{Maybe, No, Yes};

        if matches!(self, Type::Mixed | Type::Template(_)) {
            return Yes;
        }

        if let Type::Intersection(types) = self {
            return TrinaryLogic::and_all(types.iter().map(|t| t.is_super_type_of(other, reflection)));
        }

        if let Type::Union(types) = self {
            return match other {
                Type::Union(others) => TrinaryLogic::extreme_identity(
                    others.iter().map(|o| self.is_super_type_of(o, reflection)),
                ),
                Type::Intersection(others) => {
                    TrinaryLogic::or_any(others.iter().map(|o| self.is_super_type_of(o, reflection)))
                }
                _ => TrinaryLogic::or_any(types.iter().map(|t| t.is_super_type_of(other, reflection))),
            };
        }

        match other {
            Type::Union(others) => {
                return TrinaryLogic::extreme_identity(
                    others.iter().map(|o| self.is_super_type_of(o, reflection)),
                );
            }
            Type::Intersection(others) => {
                return TrinaryLogic::or_any(others.iter().map(|o| self.is_super_type_of(o, reflection)));
            }
            Type::Mixed | Type::Template(_) => return Maybe,
            _ => {}
        }

        match (self, other) {
            (Type::Null, Type::Null) => Yes,
            (Type::Bool, Type::Bool | Type::ConstantBool(_)) => Yes,
            (Type::ConstantBool(a), Type::ConstantBool(b)) => TrinaryLogic::from_bool(a == b),
            (Type::ConstantBool(_), Type::Bool) => Maybe,
            (Type::Int, Type::Int | Type::ConstantInt(_)) => Yes,
            (Type::ConstantInt(a), Type::ConstantInt(b)) => TrinaryLogic::from_bool(a == b),
            (Type::ConstantInt(_), Type::Int) => Maybe,
            (Type::Float, Type::Float) => Yes,
            (Type::String, Type::String | Type::ConstantString(_)) => Yes,
            (Type::ConstantString(a), Type::ConstantString(b)) => TrinaryLogic::from_bool(a == b),
            (Type::ConstantString(_), Type::String) => Maybe,
            (
                Type::Iterable { key, value } | Type::Array { key, value },
                Type::Array { key: other_key, value: other_value },
            )
            | (
                Type::Iterable { key, value },
                Type::Iterable { key: other_key, value: other_value },
            ) => key
                .is_super_type_of(other_key, reflection)
                .and(value.is_super_type_of(other_value, reflection)),
            (Type::Iterable { key, value } | Type::Array { key, value }, Type::ConstantArray(array)) => {
                let keys = array.keys.iter().map(|k| key.is_super_type_of(k, reflection));
                let values = array.values.iter().map(|v| value.is_super_type_of(v, reflection));
                TrinaryLogic::and_all(keys.chain(values))
            }
            (Type::Array { .. }, Type::Iterable { .. }) => Maybe,
            (Type::Iterable { key, value }, Type::Object(object)) => {
                iterable_is_super_type_of_object(key, value, object, reflection)
            }
            (Type::Object(a), Type::Object(b)) => a.is_super_type_of(b, reflection),
            (Type::Object(a), Type::QueryBuilder(_)) => {
                a.is_super_type_of(&ObjectType::new(QUERY_BUILDER_CLASS), reflection)
            }
            (Type::QueryBuilder(_), Type::Object(b)) => {
                ObjectType::new(QUERY_BUILDER_CLASS).is_super_type_of(b, reflection)
            }
            (Type::QueryBuilder(_), Type::QueryBuilder(_)) => Yes,
            (Type::Object(a), Type::Iterable { .. }) => {
                if reflection.ancestor_type(a, TRAVERSABLE_CLASS).is_some() {
                    Maybe
                } else {
                    No
                }
            }
            _ => No,
        }
    }
}

fn describe_generic(name: &str, key: &Type, value: &Type, level: VerbosityLevel) -> String {
    if *key == Type::Mixed && *value == Type::Mixed {
        name.to_string()
    } else if *key == Type::Mixed {
        format!("{name}<{}>", value.describe(level))
    } else {
        format!("{name}<{}, {}>", key.describe(level), value.describe(level))
    }
}

fn iterable_is_super_type_of_object(
    key: &Type,
    value: &Type,
    object: &ObjectType,
    reflection: &ReflectionProvider,
) -> TrinaryLogic {
    match reflection.ancestor_type(object, TRAVERSABLE_CLASS) {
        Some(traversable) => {
            let actual_key = traversable.type_args.first().unwrap_or(&Type::Mixed);
            let actual_value = traversable.type_args.get(1).unwrap_or(&Type::Mixed);
            key.is_super_type_of(actual_key, reflection)
                .and(value.is_super_type_of(actual_value, reflection))
        }
        None if reflection.class(&object.class_name).is_none() => TrinaryLogic::Maybe,
        None => TrinaryLogic::No,
    }
}
