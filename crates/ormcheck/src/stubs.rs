//! Built-in declarations of the persistence library and the few core classes
//! the checks rely on.

use crate::reflection::{ClassReflection, ReflectionProvider};
use crate::types::{ObjectType, Type};

pub const TRAVERSABLE_CLASS: &str = "Traversable";
pub const ITERATOR_AGGREGATE_CLASS: &str = "IteratorAggregate";
pub const DATE_TIME_INTERFACE: &str = "DateTimeInterface";
pub const DATE_TIME_CLASS: &str = "DateTime";
pub const DATE_TIME_IMMUTABLE_CLASS: &str = "DateTimeImmutable";

pub const COLLECTION_CLASS: &str = "Doctrine\\Common\\Collections\\Collection";
pub const ARRAY_COLLECTION_CLASS: &str = "Doctrine\\Common\\Collections\\ArrayCollection";
pub const OBJECT_REPOSITORY_CLASS: &str = "Doctrine\\Persistence\\ObjectRepository";
pub const LEGACY_OBJECT_REPOSITORY_CLASS: &str = "Doctrine\\Common\\Persistence\\ObjectRepository";
pub const OBJECT_MANAGER_INTERFACE: &str = "Doctrine\\Persistence\\ObjectManager";
pub const ENTITY_REPOSITORY_CLASS: &str = "Doctrine\\ORM\\EntityRepository";
pub const ENTITY_MANAGER_INTERFACE: &str = "Doctrine\\ORM\\EntityManagerInterface";
pub const ENTITY_MANAGER_CLASS: &str = "Doctrine\\ORM\\EntityManager";
pub const QUERY_BUILDER_CLASS: &str = "Doctrine\\ORM\\QueryBuilder";
pub const QUERY_CLASS: &str = "Doctrine\\ORM\\Query";
pub const EXPR_CLASS: &str = "Doctrine\\ORM\\Query\\Expr";

/// Name of the entity-class generic parameter of repositories.
pub const ENTITY_CLASS_TEMPLATE: &str = "TEntityClass";

pub(crate) fn register_doctrine_classes(provider: &mut ReflectionProvider) {
    let key_value = |class: &str| {
        ObjectType::generic(
            class,
            vec![Type::Template("TKey".into()), Type::Template("T".into())],
        )
    };

    provider.register(ClassReflection::interface(TRAVERSABLE_CLASS).with_templates(&["TKey", "T"]));
    provider.register(
        ClassReflection::interface(ITERATOR_AGGREGATE_CLASS)
            .with_templates(&["TKey", "T"])
            .extends(key_value(TRAVERSABLE_CLASS)),
    );
    provider.register(
        ClassReflection::interface(COLLECTION_CLASS)
            .with_templates(&["TKey", "T"])
            .extends(key_value(ITERATOR_AGGREGATE_CLASS)),
    );
    provider.register(
        ClassReflection::new(ARRAY_COLLECTION_CLASS)
            .with_templates(&["TKey", "T"])
            .extends(key_value(COLLECTION_CLASS)),
    );

    provider.register(ClassReflection::interface(DATE_TIME_INTERFACE));
    provider.register(
        ClassReflection::new(DATE_TIME_CLASS).extends(ObjectType::new(DATE_TIME_INTERFACE)),
    );
    provider.register(
        ClassReflection::new(DATE_TIME_IMMUTABLE_CLASS)
            .extends(ObjectType::new(DATE_TIME_INTERFACE)),
    );

    let entity = || Type::Template(ENTITY_CLASS_TEMPLATE.into());
    for repository in [OBJECT_REPOSITORY_CLASS, LEGACY_OBJECT_REPOSITORY_CLASS] {
        provider.register(
            ClassReflection::interface(repository)
                .with_templates(&[ENTITY_CLASS_TEMPLATE])
                .with_method("find", entity().add_null())
                .with_method("findAll", Type::array(Type::Int, entity()))
                .with_method("findBy", Type::array(Type::Int, entity()))
                .with_method("findOneBy", entity().add_null()),
        );
    }
    provider.register(
        ClassReflection::new(ENTITY_REPOSITORY_CLASS)
            .with_templates(&[ENTITY_CLASS_TEMPLATE])
            .extends(ObjectType::generic(OBJECT_REPOSITORY_CLASS, vec![entity()]))
            .with_method("find", entity().add_null())
            .with_method("findAll", Type::array(Type::Int, entity()))
            .with_method("findBy", Type::array(Type::Int, entity()))
            .with_method("findOneBy", entity().add_null())
            .with_method("count", Type::Int),
    );

    provider.register(ClassReflection::interface(OBJECT_MANAGER_INTERFACE));
    provider.register(
        ClassReflection::interface(ENTITY_MANAGER_INTERFACE)
            .extends(ObjectType::new(OBJECT_MANAGER_INTERFACE)),
    );
    provider.register(
        ClassReflection::new(ENTITY_MANAGER_CLASS)
            .extends(ObjectType::new(ENTITY_MANAGER_INTERFACE)),
    );

    provider.register(ClassReflection::new(QUERY_BUILDER_CLASS));
    provider.register(
        ClassReflection::new(QUERY_CLASS)
            .final_class()
            .with_method("getDQL", Type::String)
            .with_method("getSQL", Type::String),
    );
    provider.register(ClassReflection::new(EXPR_CLASS));
}

/// Return type of an entity-manager method whose result depends on its arguments.
///
/// Mirrors the generic signatures of `EntityManager`: `find`, `getReference` and
/// `getPartialReference` take a class-string and return `T|null`, `merge` and
/// `copy` return their argument, `getRepository` returns `EntityRepository<T>`.
/// `None` means the method is not one of those.
pub(crate) fn entity_manager_method_type(method: &str, args: &[Type]) -> Option<Type> {
    let class_string = || {
        args.first()
            .and_then(|t| match t {
                Type::ConstantString(class) => Some(Type::object(class.clone())),
                _ => None,
            })
            .unwrap_or(Type::Mixed)
    };

    match method.to_ascii_lowercase().as_str() {
        "find" | "getreference" | "getpartialreference" => Some(match class_string() {
            Type::Mixed => Type::Mixed,
            entity => entity.add_null(),
        }),
        "merge" | "copy" => Some(args.first().cloned().unwrap_or(Type::Mixed)),
        "getrepository" => Some(match class_string() {
            Type::Mixed => Type::object(ENTITY_REPOSITORY_CLASS),
            entity => Type::generic(ENTITY_REPOSITORY_CLASS, vec![entity]),
        }),
        "getclassmetadata" | "flush" | "persist" | "remove" | "clear" => Some(Type::Mixed),
        _ => None,
    }
}
