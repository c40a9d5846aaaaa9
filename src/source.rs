use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{Record, Table};
use crate::error::CurateError;
use crate::tsv;

/// An enrichment collaborator (database search, spreadsheet import, ...)
/// that proposes new records given the current table.
pub trait RecordSource {
    fn name(&self) -> &str;
    fn search(&self, existing: &Table) -> Result<Vec<Record>, CurateError>;
}

/// Candidate records already materialized as a tab-separated file.
#[derive(Debug, Clone)]
pub struct TsvRecordSource {
    name: String,
    path: Utf8PathBuf,
}

impl TsvRecordSource {
    pub fn new(path: &Utf8Path) -> Self {
        let name = path.file_name().unwrap_or(path.as_str()).to_string();
        Self {
            name,
            path: path.to_path_buf(),
        }
    }
}

impl RecordSource for TsvRecordSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn search(&self, _existing: &Table) -> Result<Vec<Record>, CurateError> {
        let table = tsv::read_table(&self.path)?;
        Ok(table
            .rows()
            .iter()
            .map(|row| {
                table
                    .columns()
                    .iter()
                    .cloned()
                    .zip(row.values().iter().cloned())
                    .collect::<Record>()
            })
            .collect())
    }
}
