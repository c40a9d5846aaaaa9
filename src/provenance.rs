use serde::Serialize;
use tracing::info;

use crate::domain::{ProvenanceLabel, Table};
use crate::error::CurateError;

pub const DEFAULT_PROVENANCE_COLUMN: &str = "source";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagReport {
    pub tagged: usize,
    pub preserved: usize,
    pub column_added: bool,
}

/// Fills blank `column` values with `label`; non-blank values are never
/// touched, so tagging is idempotent across runs and labels.
pub fn tag_provenance(
    mut table: Table,
    label: &ProvenanceLabel,
    column: &str,
) -> Result<(Table, TagReport), CurateError> {
    let mut report = TagReport::default();
    if !table.schema().contains(column) {
        table.append_column(column)?;
        report.column_added = true;
    }
    let index = table
        .schema()
        .index_of(column)
        .ok_or_else(|| CurateError::UnknownColumn {
            column: column.to_string(),
            context: "provenance tagging".to_string(),
        })?;

    for row in table.rows_mut() {
        let blank = row.get(index).is_none_or(|value| value.trim().is_empty());
        if blank {
            row.set(index, label.as_str());
            report.tagged += 1;
        } else {
            report.preserved += 1;
        }
    }

    info!(
        column,
        label = %label,
        tagged = report.tagged,
        preserved = report.preserved,
        "tagged provenance"
    );
    Ok((table, report))
}
