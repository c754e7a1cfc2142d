//! ormcheck
//!
//! Static checks that code using an object-relational mapper agrees with the
//! mapper's metadata.
//!
//! # Checks
//!
//! - **Association types**: a property mapped as an association must accept
//!   and hold what the storage layer hands back (nullable target, collection).
//! - **Column types**: a property mapped as a scalar column must agree with the
//!   column type.
//! - **Repository criteria**: keys passed to `findBy`/`findOneBy`/`count` must
//!   be mapped fields or associations of the repository's entity.
//! - **Query builders**: every query text a builder can produce is compiled
//!   against the metadata.
//!
//! Metadata is read from a JSON mapping file named in `ormcheck.toml`.
//!
//! # Example
//!
//! ```ignore
//! use ormcheck::{AnalysisConfig, Analyser};
//!
//! let config = AnalysisConfig::load("ormcheck.toml".as_ref())?;
//! let mut analyser = Analyser::from_config(&config);
//! for diagnostic in analyser.analyse_all(&files)? {
//!     println!("{diagnostic}");
//! }
//! ```

pub mod analyser;
pub mod ast;
pub mod config;
pub mod dql;
pub mod error;
pub mod mapping_file;
pub mod metadata;
pub mod query_builder;
pub mod reflection;
pub mod rules;
pub mod scope;
pub mod types;

mod stubs;

pub use analyser::{Analyser, Diagnostic};
pub use config::AnalysisConfig;
pub use dql::{CompileError, CompileErrorKind, CompiledQuery, MetadataQueryCompiler, QueryCompiler};
pub use error::{CheckError, CheckResult};
pub use mapping_file::MappingFileLoader;
pub use metadata::{
    AssociationKind, AssociationMapping, ClassDescriptor, ClassMapping, FieldMapping, JoinColumn,
    JoinTable, ManagerKind, MetadataGateway, MetadataLoader, MetadataRecord, MetadataStore,
    StaticMetadataStore,
};
pub use reflection::{ClassReflection, PropertyReflection, ReflectionProvider};
pub use rules::{
    EntityColumnRule, EntityRelationRule, Node, NodeKind, QueryBuilderDqlRule,
    RepositoryMethodCallRule, Rule, RuleRegistry,
};
pub use scope::{FlowScope, Scope};
pub use types::{ObjectType, TrinaryLogic, Type, VerbosityLevel};
