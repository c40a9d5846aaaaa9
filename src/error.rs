use camino::Utf8PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CurateError {
    #[error("missing config file kira-tc.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("duplicate column {column:?} in {context}")]
    DuplicateColumn { column: String, context: String },

    #[error("empty column name at position {position} in {context}")]
    EmptyColumn { position: usize, context: String },

    #[error(
        "ambiguous column mapping: source column {source_column:?} matches both {first:?} and {second:?}"
    )]
    AmbiguousMapping {
        source_column: String,
        first: String,
        second: String,
    },

    #[error(
        "ambiguous source columns for {target:?}: {first:?} and {second:?} normalize to the same key {key:?}"
    )]
    AmbiguousSource {
        target: String,
        key: String,
        first: String,
        second: String,
    },

    #[error("unknown column {column:?} (not in {context})")]
    UnknownColumn { column: String, context: String },

    #[error("table #{index} does not share the column set of table #0: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        index: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("row has {found} values but the schema has {expected} columns")]
    RowWidth { expected: usize, found: usize },

    #[error("nothing to merge: no input tables")]
    NoTables,

    #[error("required input file not found: {0}")]
    MissingInput(Utf8PathBuf),

    #[error("failed to read table {path}: {message}")]
    TsvRead { path: Utf8PathBuf, message: String },

    #[error("failed to serialize table: {0}")]
    TsvWrite(String),

    #[error("backup of {path} failed, destination left untouched: {message}")]
    Backup { path: Utf8PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("invalid provenance label: {0:?}")]
    InvalidProvenanceLabel(String),

    #[error("category manifest is empty")]
    EmptyManifest,

    #[error("record source {source_name} failed: {message}")]
    Collaborator { source_name: String, message: String },
}
