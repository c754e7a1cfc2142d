//! Persistence metadata: per-class mappings and the run-scoped gateway that
//! resolves and caches them.

use crate::error::{CheckError, CheckResult};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// A scalar column mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    pub name: String,
    pub column: String,
    /// Column type name (`integer`, `string`, `datetime_immutable`, ...).
    pub column_type: String,
    pub nullable: bool,
    pub id: bool,
}

impl FieldMapping {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            column_type: column_type.into(),
            nullable: false,
            id: false,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn id(mut self) -> Self {
        self.id = true;
        self
    }
}

/// Shape of an association as seen from its owning class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    ToOne,
    ToMany,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinColumn {
    pub name: String,
    pub referenced_column: String,
    /// `None` when the mapping does not say.
    pub nullable: Option<bool>,
}

impl JoinColumn {
    pub fn new(name: impl Into<String>, referenced_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            referenced_column: referenced_column.into(),
            nullable: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinTable {
    pub name: String,
    pub join_columns: Vec<JoinColumn>,
    pub inverse_join_columns: Vec<JoinColumn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationMapping {
    pub name: String,
    pub kind: AssociationKind,
    pub target: String,
    pub join_columns: Vec<JoinColumn>,
    pub mapped_by: Option<String>,
    pub inversed_by: Option<String>,
    pub join_table: Option<JoinTable>,
}

impl AssociationMapping {
    /// Owning to-one association with a `<name>_id` join column.
    pub fn to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            join_columns: vec![JoinColumn::new(format!("{name}_id"), "id")],
            name,
            kind: AssociationKind::ToOne,
            target: target.into(),
            mapped_by: None,
            inversed_by: None,
            join_table: None,
        }
    }

    pub fn to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::ToMany,
            target: target.into(),
            join_columns: Vec::new(),
            mapped_by: None,
            inversed_by: None,
            join_table: None,
        }
    }

    /// Set the nullability of every join column.
    pub fn join_columns_nullable(mut self, nullable: bool) -> Self {
        for column in &mut self.join_columns {
            column.nullable = Some(nullable);
        }
        self
    }

    pub fn join_columns(mut self, columns: Vec<JoinColumn>) -> Self {
        self.join_columns = columns;
        self
    }

    pub fn mapped_by(mut self, field: impl Into<String>) -> Self {
        self.mapped_by = Some(field.into());
        self.join_columns.clear();
        self
    }

    pub fn join_table(mut self, table: JoinTable) -> Self {
        self.join_table = Some(table);
        self
    }

    /// Whether the storage layer may hand back null for this association.
    ///
    /// Collections never are. A to-one association is nullable unless every
    /// join column is explicitly declared non-nullable.
    pub fn is_nullable(&self) -> bool {
        match self.kind {
            AssociationKind::ToMany => false,
            AssociationKind::ToOne => {
                self.join_columns.is_empty()
                    || self.join_columns.iter().any(|c| c.nullable.unwrap_or(true))
            }
        }
    }
}

/// Mapping of one persistent class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataRecord {
    pub class_name: String,
    pub table: String,
    pub repository_class: Option<String>,
    pub fields: Vec<FieldMapping>,
    pub associations: Vec<AssociationMapping>,
}

impl MetadataRecord {
    pub fn new(class_name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            table: table.into(),
            repository_class: None,
            fields: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldMapping) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_association(mut self, association: AssociationMapping) -> Self {
        self.associations.push(association);
        self
    }

    pub fn with_repository(mut self, class: impl Into<String>) -> Self {
        self.repository_class = Some(class.into());
        self
    }

    /// Check that field and association names are unique and disjoint.
    pub fn validate(self) -> CheckResult<Self> {
        let mut seen = HashSet::new();
        let names = self
            .fields
            .iter()
            .map(|f| &f.name)
            .chain(self.associations.iter().map(|a| &a.name));
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(CheckError::metadata(format!(
                    "Property \"{name}\" in \"{}\" was already declared, but it must be declared only once",
                    self.class_name
                )));
            }
        }
        Ok(self)
    }

    pub fn field(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn association(&self, name: &str) -> Option<&AssociationMapping> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn has_association(&self, name: &str) -> bool {
        self.association(name).is_some()
    }

    pub fn identifier(&self) -> Vec<&FieldMapping> {
        self.fields.iter().filter(|f| f.id).collect()
    }
}

/// How a class is mapped, decided once when the class is first looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassMapping {
    /// Not persistent.
    Transient,
    /// Mapped by the relational mapper.
    Orm(Arc<MetadataRecord>),
    /// Mapped by another driver (document mapper and the like).
    Foreign(String),
}

/// Cached lookup result for one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    pub class_name: String,
    pub mapping: ClassMapping,
}

impl ClassDescriptor {
    pub fn is_transient(&self) -> bool {
        matches!(self.mapping, ClassMapping::Transient)
    }

    pub fn record(&self) -> Option<&Arc<MetadataRecord>> {
        match &self.mapping {
            ClassMapping::Orm(record) => Some(record),
            _ => None,
        }
    }
}

/// Which kind of object manager backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerKind {
    #[default]
    Orm,
    Document,
}

/// Source of class metadata for one schema.
pub trait MetadataStore: Send + Sync {
    fn manager_kind(&self) -> ManagerKind {
        ManagerKind::Orm
    }

    fn is_transient(&self, class_name: &str) -> bool;

    /// Mapping of a class the store does not report as transient.
    fn class_mapping(&self, class_name: &str) -> CheckResult<ClassMapping>;
}

/// Connects to a metadata store. Called at most once per run.
pub trait MetadataLoader: Send + Sync {
    fn load(&self) -> CheckResult<Arc<dyn MetadataStore>>;
}

/// Gateway cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

/// Run-scoped access to class metadata.
///
/// The store is connected on first use; a failed connection is remembered and
/// reported as a configuration error on every later use. Descriptors are
/// cached for the rest of the run. Concurrent lookups of the same class may
/// both compute it; the second write replaces the first with an equal value.
pub struct MetadataGateway {
    loader: Option<Box<dyn MetadataLoader>>,
    store: OnceLock<Result<Arc<dyn MetadataStore>, CheckError>>,
    cache: RwLock<HashMap<String, Arc<ClassDescriptor>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl fmt::Debug for MetadataGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataGateway")
            .field("configured", &self.is_configured())
            .field("stats", &self.stats())
            .finish()
    }
}

impl MetadataGateway {
    pub fn new(loader: Option<Box<dyn MetadataLoader>>) -> Self {
        Self {
            loader,
            store: OnceLock::new(),
            cache: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A gateway without any store; every lookup reports "not configured".
    pub fn unconfigured() -> Self {
        Self::new(None)
    }

    /// A gateway over an already connected store.
    pub fn from_store(store: Arc<dyn MetadataStore>) -> Self {
        let gateway = Self::new(None);
        let _ = gateway.store.set(Ok(store));
        gateway
    }

    pub fn is_configured(&self) -> bool {
        self.loader.is_some() || self.store.get().is_some()
    }

    /// The connected store, `None` when the gateway is not configured.
    pub fn store(&self) -> CheckResult<Option<Arc<dyn MetadataStore>>> {
        if !self.is_configured() {
            return Ok(None);
        }
        let loaded = self.store.get_or_init(|| match &self.loader {
            Some(loader) => {
                tracing::debug!(target: "ormcheck.metadata", "connecting metadata store");
                loader.load().map_err(|e| match e {
                    CheckError::Configuration(_) => e,
                    other => CheckError::configuration(other.to_string()),
                })
            }
            None => Err(CheckError::configuration("metadata store is not configured")),
        });
        match loaded {
            Ok(store) => Ok(Some(Arc::clone(store))),
            Err(e) => Err(e.clone()),
        }
    }

    pub fn manager_kind(&self) -> CheckResult<Option<ManagerKind>> {
        Ok(self.store()?.map(|s| s.manager_kind()))
    }

    /// Descriptor of `class_name`, `None` when the gateway is not configured.
    pub fn descriptor(&self, class_name: &str) -> CheckResult<Option<Arc<ClassDescriptor>>> {
        let Some(store) = self.store()? else {
            return Ok(None);
        };
        let key = class_name.to_ascii_lowercase();

        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(found) = cache.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(Arc::clone(found)));
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // Resolve outside the lock.
        let mapping = if store.is_transient(class_name) {
            ClassMapping::Transient
        } else {
            store.class_mapping(class_name)?
        };
        tracing::trace!(target: "ormcheck.metadata", class = class_name, ?mapping, "resolved class");

        let descriptor = Arc::new(ClassDescriptor {
            class_name: class_name.to_string(),
            mapping,
        });
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.insert(key, Arc::clone(&descriptor));
        Ok(Some(descriptor))
    }

    /// Whether `class_name` is mapped by the relational mapper.
    pub fn is_mapped(&self, class_name: &str) -> CheckResult<bool> {
        Ok(self.record(class_name)?.is_some())
    }

    /// Record of a mapped class; `None` for transient, foreign or unknown classes.
    pub fn record(&self, class_name: &str) -> CheckResult<Option<Arc<MetadataRecord>>> {
        Ok(self
            .descriptor(class_name)?
            .and_then(|d| d.record().cloned()))
    }

    /// Record of a class that must be mapped.
    pub fn require_record(&self, class_name: &str) -> CheckResult<Arc<MetadataRecord>> {
        if !self.is_configured() {
            return Err(CheckError::configuration("metadata store is not configured"));
        }
        self.record(class_name)?
            .ok_or_else(|| CheckError::NotMapped(class_name.to_string()))
    }

    pub fn stats(&self) -> GatewayStats {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        GatewayStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: cache.len(),
        }
    }
}

/// In-memory store, mostly useful for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadataStore {
    kind: ManagerKind,
    records: HashMap<String, Arc<MetadataRecord>>,
    foreign: HashMap<String, String>,
}

impl StaticMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: ManagerKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add a record; duplicate classes are rejected.
    pub fn add(&mut self, record: MetadataRecord) -> CheckResult<()> {
        let record = record.validate()?;
        let key = record.class_name.to_ascii_lowercase();
        if self.records.contains_key(&key) || self.foreign.contains_key(&key) {
            return Err(CheckError::metadata(format!(
                "Class \"{}\" is mapped more than once",
                record.class_name
            )));
        }
        self.records.insert(key, Arc::new(record));
        Ok(())
    }

    pub fn with_record(mut self, record: MetadataRecord) -> CheckResult<Self> {
        self.add(record)?;
        Ok(self)
    }

    /// Register a class mapped by another driver.
    pub fn add_foreign(&mut self, class_name: &str, driver: &str) {
        self.foreign
            .insert(class_name.to_ascii_lowercase(), driver.to_string());
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<MetadataRecord>> {
        self.records.values()
    }
}

impl MetadataStore for StaticMetadataStore {
    fn manager_kind(&self) -> ManagerKind {
        self.kind
    }

    fn is_transient(&self, class_name: &str) -> bool {
        let key = class_name.to_ascii_lowercase();
        !self.records.contains_key(&key) && !self.foreign.contains_key(&key)
    }

    fn class_mapping(&self, class_name: &str) -> CheckResult<ClassMapping> {
        let key = class_name.to_ascii_lowercase();
        if let Some(record) = self.records.get(&key) {
            return Ok(ClassMapping::Orm(Arc::clone(record)));
        }
        if let Some(driver) = self.foreign.get(&key) {
            return Ok(ClassMapping::Foreign(driver.clone()));
        }
        tracing::warn!(target: "ormcheck.metadata", class = class_name, "class is neither transient nor mapped");
        Ok(ClassMapping::Transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn entity() -> MetadataRecord {
        MetadataRecord::new("App\\Post", "post")
            .with_field(FieldMapping::new("id", "integer").id())
            .with_association(AssociationMapping::to_one("author", "App\\User"))
    }

    #[test]
    fn test_field_and_association_names_are_disjoint() {
        let clash = entity().with_field(FieldMapping::new("author", "string"));
        assert!(matches!(clash.validate(), Err(CheckError::Metadata(_))));
        assert!(entity().validate().is_ok());
    }

    #[test]
    fn test_join_column_nullability() {
        let unspecified = AssociationMapping::to_one("author", "App\\User");
        assert!(unspecified.is_nullable());

        let required = unspecified.clone().join_columns_nullable(false);
        assert!(!required.is_nullable());

        let mixed = unspecified.join_columns(vec![
            JoinColumn {
                nullable: Some(false),
                ..JoinColumn::new("a_id", "id")
            },
            JoinColumn::new("b_id", "id"),
        ]);
        assert!(mixed.is_nullable());

        let many = AssociationMapping::to_many("comments", "App\\Comment").mapped_by("post");
        assert!(!many.is_nullable());
        assert!(many.join_columns.is_empty());
    }

    #[test]
    fn test_gateway_caches_descriptors() {
        let store = StaticMetadataStore::new().with_record(entity()).unwrap();
        let gateway = MetadataGateway::from_store(Arc::new(store));

        assert!(gateway.is_mapped("App\\Post").unwrap());
        assert!(gateway.is_mapped("app\\post").unwrap());
        assert!(!gateway.is_mapped("App\\Unknown").unwrap());
        assert!(gateway.descriptor("App\\Unknown").unwrap().unwrap().is_transient());

        let stats = gateway.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.size, 2);

        assert!(matches!(
            gateway.require_record("App\\Unknown"),
            Err(CheckError::NotMapped(_))
        ));
    }

    #[test]
    fn test_unconfigured_gateway() {
        let gateway = MetadataGateway::unconfigured();
        assert!(!gateway.is_configured());
        assert_eq!(gateway.record("App\\Post").unwrap(), None);
        assert!(gateway.require_record("App\\Post").unwrap_err().is_fatal());
    }

    struct FailingLoader(Arc<AtomicUsize>);

    impl MetadataLoader for FailingLoader {
        fn load(&self) -> CheckResult<Arc<dyn MetadataStore>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(CheckError::Other("connection refused".into()))
        }
    }

    #[test]
    fn test_failed_connection_is_remembered() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = MetadataGateway::new(Some(Box::new(FailingLoader(Arc::clone(&calls)))));

        let first = gateway.record("App\\Post").unwrap_err();
        let second = gateway.record("App\\Post").unwrap_err();
        assert_eq!(first, CheckError::configuration("connection refused"));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_class_is_rejected() {
        let mut store = StaticMetadataStore::new();
        store.add(entity()).unwrap();
        assert!(matches!(store.add(entity()), Err(CheckError::Metadata(_))));
    }
}
