use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::backup::BackupPolicy;
use crate::domain::{Key, ProvenanceLabel, Schema};
use crate::error::CurateError;
use crate::normalize::ColumnNormalizer;
use crate::provenance::DEFAULT_PROVENANCE_COLUMN;
use crate::reconcile::UnmappedPolicy;
use crate::unify::UnifyConfig;

pub const DEFAULT_CONFIG_FILE: &str = "kira-tc.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub schema: Vec<String>,
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub key: Option<KeyEntry>,
    #[serde(default)]
    pub provenance: Option<ProvenanceEntry>,
    #[serde(default)]
    pub backup: Option<BackupPolicy>,
    #[serde(default)]
    pub unmapped: Option<UnmappedPolicy>,
    #[serde(default)]
    pub unify: Option<UnifyEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum KeyEntry {
    Shorthand(String),
    Columns(Vec<String>),
}

impl KeyEntry {
    fn into_key(self) -> Result<Key, CurateError> {
        match self {
            KeyEntry::Shorthand(column) => Key::new([column]),
            KeyEntry::Columns(columns) => Key::new(columns),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProvenanceEntry {
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UnifyEntry {
    pub manifest: Vec<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub key: Option<KeyEntry>,
    #[serde(default)]
    pub priority_columns: Vec<String>,
    #[serde(default)]
    pub link_column: Option<String>,
    #[serde(default)]
    pub category_column: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UnifySettings {
    pub unifier: UnifyConfig,
    pub output: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub data_dir: Utf8PathBuf,
    pub schema: Option<Schema>,
    pub normalizer: ColumnNormalizer,
    pub key: Option<Key>,
    pub provenance_column: String,
    pub default_label: Option<ProvenanceLabel>,
    pub backup: BackupPolicy,
    pub unmapped: UnmappedPolicy,
    pub unify: Option<UnifySettings>,
}

impl ResolvedConfig {
    pub fn require_schema(&self) -> Result<&Schema, CurateError> {
        self.schema.as_ref().ok_or_else(|| {
            CurateError::InvalidConfig("config does not define a target schema".to_string())
        })
    }

    pub fn require_unify(&self) -> Result<&UnifySettings, CurateError> {
        self.unify.as_ref().ok_or_else(|| {
            CurateError::InvalidConfig("config does not define a unify section".to_string())
        })
    }

    /// Label given on the command line, else the configured default.
    pub fn label(&self, explicit: Option<&str>) -> Result<ProvenanceLabel, CurateError> {
        match explicit {
            Some(value) => value.parse(),
            None => self.default_label.clone().ok_or_else(|| {
                CurateError::InvalidConfig(
                    "no provenance label given and none configured".to_string(),
                )
            }),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CurateError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Err(CurateError::MissingConfig);
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| CurateError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CurateError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CurateError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(CurateError::InvalidConfig(format!(
                "unsupported schema_version {schema_version}"
            )));
        }
        let data_dir = Utf8PathBuf::from(config.data_dir.unwrap_or_else(|| ".".to_string()));

        let schema = if config.schema.is_empty() {
            None
        } else {
            Some(Schema::with_context(config.schema, "config schema")?)
        };

        if let Some(target) = config
            .aliases
            .keys()
            .find(|target| !schema.as_ref().is_some_and(|schema| schema.contains(target)))
        {
            return Err(CurateError::UnknownColumn {
                column: target.clone(),
                context: "config schema (aliases)".to_string(),
            });
        }

        let key = config.key.map(KeyEntry::into_key).transpose()?;
        if let (Some(key), Some(schema)) = (&key, &schema) {
            key.indices(schema)?;
        }

        let unmapped = config.unmapped.unwrap_or_default();
        if let (UnmappedPolicy::FoldInto(column), Some(schema)) = (&unmapped, &schema) {
            if !schema.contains(column) {
                return Err(CurateError::UnknownColumn {
                    column: column.clone(),
                    context: "config schema (unmapped.fold_into)".to_string(),
                });
            }
        }

        let provenance = config.provenance.unwrap_or_default();
        let provenance_column = provenance
            .column
            .unwrap_or_else(|| DEFAULT_PROVENANCE_COLUMN.to_string());
        // The provenance column is always part of the target schema.
        let schema = schema.map(|schema| {
            if schema.contains(&provenance_column) {
                schema
            } else {
                schema.appended(&provenance_column)
            }
        });
        let default_label = provenance
            .label
            .map(|label| label.parse::<ProvenanceLabel>())
            .transpose()?;

        let unify = config
            .unify
            .map(|entry| resolve_unify(entry, &data_dir))
            .transpose()?;

        Ok(ResolvedConfig {
            schema_version,
            data_dir,
            schema,
            normalizer: ColumnNormalizer::with_aliases(config.aliases),
            key,
            provenance_column,
            default_label,
            backup: config.backup.unwrap_or_default(),
            unmapped,
            unify,
        })
    }
}

fn resolve_unify(entry: UnifyEntry, data_dir: &Utf8Path) -> Result<UnifySettings, CurateError> {
    if entry.manifest.is_empty() {
        return Err(CurateError::EmptyManifest);
    }
    let unify_dir = entry
        .data_dir
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| data_dir.to_path_buf());
    let output = entry
        .output
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| unify_dir.join("unified.tsv"));
    Ok(UnifySettings {
        unifier: UnifyConfig {
            data_dir: unify_dir,
            manifest: entry.manifest,
            key: entry.key.map(KeyEntry::into_key).transpose()?,
            priority_columns: entry.priority_columns,
            link_column: entry.link_column,
            category_column: entry.category_column,
        },
        output,
    })
}
