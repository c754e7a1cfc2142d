//! JSON mapping file: the reference metadata store.
//!
//! ```json
//! {
//!   "manager": "orm",
//!   "entities": [{
//!     "class": "App\\Entity\\Post",
//!     "table": "post",
//!     "fields": [{ "name": "id", "type": "integer", "id": true }],
//!     "associations": [{
//!       "name": "author", "type": "many_to_one", "target": "App\\Entity\\User",
//!       "join_columns": [{ "name": "author_id", "referenced_column": "id", "nullable": false }]
//!     }]
//!   }],
//!   "documents": ["App\\Document\\Log"]
//! }
//! ```

use crate::error::{CheckError, CheckResult};
use crate::metadata::{
    AssociationKind, AssociationMapping, FieldMapping, JoinColumn, JoinTable, ManagerKind,
    MetadataLoader, MetadataRecord, MetadataStore, StaticMetadataStore,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingFile {
    #[serde(default)]
    pub manager: ManagerKind,
    #[serde(default)]
    pub entities: Vec<EntityEntry>,
    /// Classes mapped by a non-relational driver.
    #[serde(default)]
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityEntry {
    pub class: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub repository_class: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldEntry>,
    #[serde(default)]
    pub associations: Vec<AssociationEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldEntry {
    pub name: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(rename = "type", default = "default_column_type")]
    pub column_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub id: bool,
}

fn default_column_type() -> String {
    "string".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationType {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl AssociationType {
    pub fn kind(self) -> AssociationKind {
        match self {
            AssociationType::OneToOne | AssociationType::ManyToOne => AssociationKind::ToOne,
            AssociationType::OneToMany | AssociationType::ManyToMany => AssociationKind::ToMany,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinColumnEntry {
    pub name: String,
    #[serde(default = "default_referenced_column")]
    pub referenced_column: String,
    #[serde(default)]
    pub nullable: Option<bool>,
}

fn default_referenced_column() -> String {
    "id".to_string()
}

impl From<JoinColumnEntry> for JoinColumn {
    fn from(entry: JoinColumnEntry) -> Self {
        JoinColumn {
            name: entry.name,
            referenced_column: entry.referenced_column,
            nullable: entry.nullable,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinTableEntry {
    pub name: String,
    #[serde(default)]
    pub join_columns: Vec<JoinColumnEntry>,
    #[serde(default)]
    pub inverse_join_columns: Vec<JoinColumnEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub association_type: AssociationType,
    pub target: String,
    #[serde(default)]
    pub join_columns: Option<Vec<JoinColumnEntry>>,
    #[serde(default)]
    pub mapped_by: Option<String>,
    #[serde(default)]
    pub inversed_by: Option<String>,
    #[serde(default)]
    pub join_table: Option<JoinTableEntry>,
}

impl AssociationEntry {
    fn into_mapping(self) -> AssociationMapping {
        let kind = self.association_type.kind();
        let join_columns = match self.join_columns {
            Some(columns) => columns.into_iter().map(JoinColumn::from).collect(),
            // Owning to-one sides get the conventional `<name>_id` column.
            None if kind == AssociationKind::ToOne && self.mapped_by.is_none() => {
                vec![JoinColumn::new(format!("{}_id", self.name), "id")]
            }
            None => Vec::new(),
        };
        AssociationMapping {
            name: self.name,
            kind,
            target: self.target,
            join_columns,
            mapped_by: self.mapped_by,
            inversed_by: self.inversed_by,
            join_table: self.join_table.map(|t| JoinTable {
                name: t.name,
                join_columns: t.join_columns.into_iter().map(JoinColumn::from).collect(),
                inverse_join_columns: t
                    .inverse_join_columns
                    .into_iter()
                    .map(JoinColumn::from)
                    .collect(),
            }),
        }
    }
}

impl MappingFile {
    pub fn from_json(data: &str) -> CheckResult<Self> {
        serde_json::from_str(data)
            .map_err(|e| CheckError::Serialization(format!("Failed to parse mapping file: {e}")))
    }

    pub fn from_path(path: &Path) -> CheckResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            CheckError::configuration(format!(
                "Failed to read mapping file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&data)
    }

    /// Build the store, validating every entity.
    pub fn into_store(self) -> CheckResult<StaticMetadataStore> {
        let mut store = StaticMetadataStore::new().with_kind(self.manager);
        for entry in self.entities {
            let table = entry
                .table
                .unwrap_or_else(|| default_table_name(&entry.class));
            let mut record = MetadataRecord::new(entry.class, table);
            record.repository_class = entry.repository_class;
            record.fields = entry
                .fields
                .into_iter()
                .map(|f| FieldMapping {
                    column: f.column.unwrap_or_else(|| f.name.clone()),
                    name: f.name,
                    column_type: f.column_type,
                    nullable: f.nullable,
                    id: f.id,
                })
                .collect();
            record.associations = entry
                .associations
                .into_iter()
                .map(AssociationEntry::into_mapping)
                .collect();
            store.add(record)?;
        }
        for class in &self.documents {
            store.add_foreign(class, "document");
        }
        tracing::debug!(
            target: "ormcheck.metadata",
            entities = store.records().count(),
            documents = self.documents.len(),
            "loaded mapping file"
        );
        Ok(store)
    }
}

/// `App\Entity\BlogPost` -> `blog_post`
fn default_table_name(class: &str) -> String {
    let short = class.rsplit('\\').next().unwrap_or(class);
    let mut out = String::with_capacity(short.len() + 4);
    for (i, c) in short.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Loads a [`MappingFile`] from disk when the gateway first needs it.
#[derive(Debug, Clone)]
pub struct MappingFileLoader {
    path: PathBuf,
}

impl MappingFileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetadataLoader for MappingFileLoader {
    fn load(&self) -> CheckResult<Arc<dyn MetadataStore>> {
        let store = MappingFile::from_path(&self.path)?.into_store()?;
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPING: &str = r#"{
        "entities": [
            {
                "class": "App\\Entity\\BlogPost",
                "fields": [
                    { "name": "id", "type": "integer", "id": true },
                    { "name": "title" },
                    { "name": "publishedAt", "column": "published_at", "type": "datetime_immutable", "nullable": true }
                ],
                "associations": [
                    { "name": "author", "type": "many_to_one", "target": "App\\Entity\\User" },
                    { "name": "editor", "type": "many_to_one", "target": "App\\Entity\\User",
                      "join_columns": [{ "name": "editor_id", "nullable": false }] },
                    { "name": "comments", "type": "one_to_many", "target": "App\\Entity\\Comment", "mapped_by": "post" }
                ]
            }
        ],
        "documents": ["App\\Document\\Log"]
    }"#;

    #[test]
    fn test_parse_mapping_file() {
        let store = MappingFile::from_json(MAPPING).unwrap().into_store().unwrap();
        assert!(store.is_transient("App\\Entity\\Unknown"));
        assert!(!store.is_transient("App\\Document\\Log"));

        let record = match store.class_mapping("App\\Entity\\BlogPost").unwrap() {
            crate::metadata::ClassMapping::Orm(record) => record,
            other => panic!("unexpected mapping: {other:?}"),
        };
        assert_eq!(record.table, "blog_post");
        assert_eq!(record.field("title").unwrap().column_type, "string");
        assert_eq!(record.field("publishedAt").unwrap().column, "published_at");

        let author = record.association("author").unwrap();
        assert_eq!(author.kind, AssociationKind::ToOne);
        assert_eq!(author.join_columns[0].name, "author_id");
        assert!(author.is_nullable());
        assert!(!record.association("editor").unwrap().is_nullable());
        assert_eq!(
            record.association("comments").unwrap().kind,
            AssociationKind::ToMany
        );
    }

    #[test]
    fn test_unknown_association_type_is_rejected() {
        let err = MappingFile::from_json(
            r#"{"entities":[{"class":"A","associations":[{"name":"b","type":"sideways","target":"B"}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CheckError::Serialization(_)));
    }

    #[test]
    fn test_missing_file_is_a_configuration_error() {
        let loader = MappingFileLoader::new("/nonexistent/ormcheck/mapping.json");
        assert!(loader.load().err().is_some_and(|e| e.is_fatal()));
    }

    #[test]
    fn test_default_table_name() {
        assert_eq!(default_table_name("App\\Entity\\BlogPost"), "blog_post");
        assert_eq!(default_table_name("Foo"), "foo");
    }
}
