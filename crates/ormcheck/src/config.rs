//! `ormcheck.toml` loading.
//!
//! ```toml
//! version = "1"
//!
//! [analysis]
//! report_dynamic_query_builders = false
//!
//! [metadata]
//! mapping = "${APP_DIR}/mapping.json"
//! ```

use crate::error::{CheckError, CheckResult};
use crate::mapping_file::MappingFileLoader;
use crate::metadata::{MetadataGateway, MetadataLoader};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub config_dir: PathBuf,
    pub file: ConfigFile,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("."),
            file: ConfigFile::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn load(config_path: &Path) -> CheckResult<Self> {
        let config_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let raw = std::fs::read_to_string(config_path).map_err(|e| {
            CheckError::configuration(format!(
                "failed to read config file {}: {e}",
                config_path.display()
            ))
        })?;

        let mut config = Self::from_toml(&raw).map_err(|e| {
            CheckError::configuration(format!(
                "invalid config file {}: {e}",
                config_path.display()
            ))
        })?;
        config.config_dir = config_dir;
        tracing::debug!(
            target: "ormcheck.config",
            path = %config_path.display(),
            mapping = ?config.mapping_path(),
            "config loaded"
        );
        Ok(config)
    }

    /// Parse, expand and validate; relative paths resolve against `.`.
    pub fn from_toml(raw: &str) -> CheckResult<Self> {
        let mut file: ConfigFile = toml::from_str(raw)
            .map_err(|e| CheckError::configuration(format!("failed to parse config: {e}")))?;
        file.expand_env()?;
        file.validate()?;
        Ok(Self {
            config_dir: PathBuf::from("."),
            file,
        })
    }

    pub fn resolve_path(&self, p: impl AsRef<Path>) -> PathBuf {
        let p = p.as_ref();
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.config_dir.join(p)
        }
    }

    pub fn report_dynamic_query_builders(&self) -> bool {
        self.file.analysis.report_dynamic_query_builders
    }

    /// Resolved path of the mapping file, if one is configured.
    pub fn mapping_path(&self) -> Option<PathBuf> {
        self.file
            .metadata
            .mapping
            .as_deref()
            .map(|p| self.resolve_path(p))
    }

    /// Replace the configured mapping file (command-line override).
    pub fn with_mapping(mut self, mapping: impl Into<String>) -> Self {
        self.file.metadata.mapping = Some(mapping.into());
        self
    }

    /// The run's metadata gateway; unconfigured when no mapping is set.
    pub fn metadata_gateway(&self) -> MetadataGateway {
        let loader = self
            .mapping_path()
            .map(|path| Box::new(MappingFileLoader::new(path)) as Box<dyn MetadataLoader>);
        MetadataGateway::new(loader)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub version: String,

    #[serde(default)]
    pub analysis: AnalysisSection,

    #[serde(default)]
    pub metadata: MetadataSection,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            analysis: AnalysisSection::default(),
            metadata: MetadataSection::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisSection {
    /// Report builders whose text cannot be determined statically.
    #[serde(default)]
    pub report_dynamic_query_builders: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataSection {
    /// JSON mapping file describing the persistent classes.
    pub mapping: Option<String>,
}

impl ConfigFile {
    fn expand_env(&mut self) -> CheckResult<()> {
        if let Some(mapping) = self.metadata.mapping.as_mut() {
            *mapping = expand_env_vars(mapping)?;
        }
        Ok(())
    }

    fn validate(&self) -> CheckResult<()> {
        if self.version.trim() != "1" {
            return Err(CheckError::configuration(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        if self
            .metadata
            .mapping
            .as_deref()
            .is_some_and(|m| m.trim().is_empty())
        {
            return Err(CheckError::configuration("metadata.mapping must not be empty"));
        }
        Ok(())
    }
}

fn expand_env_vars(input: &str) -> CheckResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                return Err(CheckError::configuration(format!(
                    "unterminated env var reference: ${{{key}"
                )));
            }
            if key.is_empty() {
                return Err(CheckError::configuration("invalid env var reference: ${}"));
            }

            let value = std::env::var(&key).map_err(|_| {
                CheckError::configuration(format!("missing env var for config expansion: {key}"))
            })?;
            out.push_str(&value);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config = AnalysisConfig::from_toml("version = \"1\"").unwrap();
        assert!(!config.report_dynamic_query_builders());
        assert_eq!(config.mapping_path(), None);
        assert!(!config.metadata_gateway().is_configured());
    }

    #[test]
    fn test_full_config() {
        let config = AnalysisConfig::from_toml(
            r#"
version = "1"

[analysis]
report_dynamic_query_builders = true

[metadata]
mapping = "/srv/app/mapping.json"
"#,
        )
        .unwrap();
        assert!(config.report_dynamic_query_builders());
        assert_eq!(
            config.mapping_path(),
            Some(PathBuf::from("/srv/app/mapping.json"))
        );
        assert!(config.metadata_gateway().is_configured());
    }

    #[test]
    fn test_relative_mapping_resolves_against_config_dir() {
        let mut config = AnalysisConfig::from_toml(
            "version = \"1\"\n[metadata]\nmapping = \"mapping.json\"",
        )
        .unwrap();
        config.config_dir = PathBuf::from("/srv/app");
        assert_eq!(
            config.mapping_path(),
            Some(PathBuf::from("/srv/app/mapping.json"))
        );
    }

    #[test]
    fn test_rejects_bad_config() {
        let err = AnalysisConfig::from_toml("version = \"2\"").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("unsupported config version: 2"));

        assert!(AnalysisConfig::from_toml("version = \"1\"\n[analysis]\nunknown = 1").is_err());
        assert!(AnalysisConfig::from_toml("version = \"1\"\n[metadata]\nmapping = \" \"").is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        assert_eq!(expand_env_vars("plain").unwrap(), "plain");
        assert!(expand_env_vars("${ORMCHECK_SURELY_UNSET_VARIABLE}").is_err());
        assert!(expand_env_vars("${UNTERMINATED").is_err());
        assert!(expand_env_vars("${}").is_err());

        let path = std::env::var("PATH").unwrap();
        assert_eq!(expand_env_vars("x${PATH}y").unwrap(), format!("x{path}y"));
    }
}
