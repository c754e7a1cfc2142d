//! Property and repository checks against a JSON mapping file.

use ormcheck::ast::{ClassDecl, Expr, MethodDecl, PropertyDecl, SourceFile, Stmt};
use ormcheck::reflection::{COLLECTION_CLASS, ENTITY_MANAGER_INTERFACE, ENTITY_REPOSITORY_CLASS};
use ormcheck::{Analyser, MappingFileLoader, MetadataGateway, ObjectType, RuleRegistry, Type};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const ORDER: &str = "App\\Entity\\Order";
const CUSTOMER: &str = "App\\Entity\\Customer";
const LINE: &str = "App\\Entity\\OrderLine";
const ORDER_REPOSITORY: &str = "App\\Repository\\OrderRepository";

const MAPPING: &str = r#"{
    "entities": [
        {
            "class": "App\\Entity\\Order",
            "table": "orders",
            "repository_class": "App\\Repository\\OrderRepository",
            "fields": [
                { "name": "id", "type": "integer", "id": true },
                { "name": "reference" },
                { "name": "placedAt", "column": "placed_at", "type": "datetime", "nullable": true }
            ],
            "associations": [
                { "name": "customer", "type": "many_to_one", "target": "App\\Entity\\Customer",
                  "join_columns": [{ "name": "customer_id", "nullable": false }] },
                { "name": "coupon", "type": "many_to_one", "target": "App\\Entity\\Customer" },
                { "name": "lines", "type": "one_to_many", "target": "App\\Entity\\OrderLine", "mapped_by": "order" }
            ]
        },
        {
            "class": "App\\Entity\\Customer",
            "fields": [{ "name": "id", "type": "integer", "id": true }]
        },
        {
            "class": "App\\Entity\\OrderLine",
            "fields": [{ "name": "id", "type": "integer", "id": true }],
            "associations": [
                { "name": "order", "type": "many_to_one", "target": "App\\Entity\\Order" }
            ]
        }
    ]
}"#;

fn analyser() -> Analyser {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    let dir: PathBuf = std::env::temp_dir().join(format!("ormcheck-mapping-test-{nonce}"));
    std::fs::create_dir_all(&dir).expect("mkdir");
    let path = dir.join("mapping.json");
    std::fs::write(&path, MAPPING).expect("write mapping");

    let gateway = MetadataGateway::new(Some(Box::new(MappingFileLoader::new(path))));
    Analyser::new(RuleRegistry::with_defaults(Arc::new(gateway), false))
}

fn lines() -> Type {
    Type::generic(COLLECTION_CLASS, vec![Type::Int, Type::object(LINE)])
}

fn entities(order: ClassDecl) -> SourceFile {
    SourceFile::new(
        "src/Entity.php",
        vec![
            order,
            ClassDecl::new(CUSTOMER).property(PropertyDecl::new("id", Type::Int, 40)),
            ClassDecl::new(LINE)
                .property(PropertyDecl::new("id", Type::Int, 50))
                .property(PropertyDecl::new("order", Type::object(ORDER).add_null(), 51)),
        ],
    )
}

#[test]
fn test_consistent_entities_pass() {
    let order = ClassDecl::new(ORDER)
        .property(PropertyDecl::new("id", Type::Int, 10))
        .property(PropertyDecl::new("reference", Type::String, 11))
        .property(PropertyDecl::new("placedAt", Type::object("DateTime").add_null(), 12))
        .property(PropertyDecl::new("customer", Type::object(CUSTOMER), 13))
        .property(PropertyDecl::new("coupon", Type::object(CUSTOMER).add_null(), 14))
        .property(PropertyDecl::new("lines", lines(), 15))
        .property(PropertyDecl::new("cachedTotal", Type::Float, 16));

    let diagnostics = analyser().analyse_all(&[entities(order)]).unwrap();
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
}

#[test]
fn test_inconsistent_entities_are_reported() {
    let order = ClassDecl::new(ORDER)
        .property(PropertyDecl::new("reference", Type::Int, 11))
        .property(PropertyDecl::new("customer", Type::object(CUSTOMER).add_null(), 13))
        .property(PropertyDecl::new("coupon", Type::object(CUSTOMER), 14))
        .property(PropertyDecl::new("lines", Type::array(Type::Int, Type::object(LINE)), 15));

    let diagnostics = analyser().analyse_all(&[entities(order)]).unwrap();
    let found: Vec<_> = diagnostics
        .iter()
        .map(|d| (d.line, d.rule.as_str(), d.message.as_str()))
        .collect();
    assert_eq!(
        found,
        vec![
            (
                11,
                "doctrine.entityColumn",
                "Property App\\Entity\\Order::$reference type mapping mismatch: database can contain string but property expects int."
            ),
            (
                11,
                "doctrine.entityColumn",
                "Property App\\Entity\\Order::$reference type mapping mismatch: property can contain int but database expects string."
            ),
            (
                13,
                "doctrine.entityRelation",
                "Property App\\Entity\\Order::$customer type mapping mismatch: property can contain App\\Entity\\Customer|null but database expects App\\Entity\\Customer."
            ),
            (
                14,
                "doctrine.entityRelation",
                "Property App\\Entity\\Order::$coupon type mapping mismatch: database can contain App\\Entity\\Customer|null but property expects App\\Entity\\Customer."
            ),
            (
                15,
                "doctrine.entityRelation",
                "Property App\\Entity\\Order::$lines type mapping mismatch: database can contain Doctrine\\Common\\Collections\\Collection&iterable<App\\Entity\\OrderLine> but property expects array<int, App\\Entity\\OrderLine>."
            ),
            (
                15,
                "doctrine.entityRelation",
                "Property App\\Entity\\Order::$lines type mapping mismatch: property can contain array<int, App\\Entity\\OrderLine> but database expects Doctrine\\Common\\Collections\\Collection&iterable<App\\Entity\\OrderLine>."
            ),
        ]
    );
}

#[test]
fn test_repository_criteria() {
    let repository = ClassDecl::new(ORDER_REPOSITORY).extends(ObjectType::generic(
        ENTITY_REPOSITORY_CLASS,
        vec![Type::object(ORDER)],
    ));
    let service = ClassDecl::new("App\\Service\\Orders")
        .property(PropertyDecl::new("em", Type::object(ENTITY_MANAGER_INTERFACE), 5))
        .method(
            MethodDecl::new("open", 8)
                .param("orders", Type::object(ORDER_REPOSITORY))
                .body(vec![
                    Stmt::expr(
                        Expr::var("orders").call(
                            "findBy",
                            vec![Expr::assoc([
                                ("customer", Expr::Int(1)),
                                ("status", Expr::string("open")),
                            ])],
                        ),
                        9,
                    ),
                    Stmt::assign(
                        "count",
                        Expr::This
                            .prop("em")
                            .call("getRepository", vec![Expr::class_const(ORDER)])
                            .call("count", vec![Expr::assoc([("placedAt", Expr::Null)])]),
                        10,
                    ),
                    Stmt::ret(
                        Some(Expr::This
                            .prop("em")
                            .call("getRepository", vec![Expr::class_const(LINE)])
                            .call("findOneBy", vec![Expr::assoc([("orderId", Expr::Int(1))])])),
                        11,
                    ),
                ]),
        );
    let order = ClassDecl::new(ORDER).property(PropertyDecl::new("id", Type::Int, 10));
    let files = [
        entities(order),
        SourceFile::new("src/Repository/OrderRepository.php", vec![repository]),
        SourceFile::new("src/Service/Orders.php", vec![service]),
    ];

    let diagnostics = analyser().analyse_all(&files).unwrap();
    let found: Vec<_> = diagnostics
        .iter()
        .map(|d| (d.file.as_str(), d.line, d.message.as_str()))
        .collect();
    assert_eq!(
        found,
        vec![
            (
                "src/Service/Orders.php",
                9,
                "Call to method App\\Repository\\OrderRepository::findBy() - entity App\\Entity\\Order does not have a field named $status."
            ),
            (
                "src/Service/Orders.php",
                11,
                "Call to method Doctrine\\ORM\\EntityRepository<App\\Entity\\OrderLine>::findOneBy() - entity App\\Entity\\OrderLine does not have a field named $orderId."
            ),
        ]
    );
}
