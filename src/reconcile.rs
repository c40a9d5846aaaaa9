use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Row, Schema, Table};
use crate::error::CurateError;
use crate::normalize::{ColumnMatch, ColumnNormalizer};

/// What happens to source columns that have no place in the target schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedPolicy {
    /// Drop the column and report it.
    #[default]
    Drop,
    /// Append `header: value` pairs to the named catch-all column.
    FoldInto(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub renamed: Vec<ColumnMatch>,
    pub added: Vec<String>,
    pub dropped: Vec<String>,
    pub folded: Vec<String>,
}

impl ReconcileReport {
    pub fn is_lossless(&self) -> bool {
        self.dropped.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub table: Table,
    pub report: ReconcileReport,
}

/// Reshapes `table` so its columns are exactly `schema`, in schema order.
pub fn reconcile(
    table: &Table,
    schema: &Schema,
    normalizer: &ColumnNormalizer,
    policy: &UnmappedPolicy,
) -> Result<Reconciled, CurateError> {
    let fold_index = match policy {
        UnmappedPolicy::Drop => None,
        UnmappedPolicy::FoldInto(column) => Some(schema.index_of(column).ok_or_else(|| {
            CurateError::InvalidConfig(format!(
                "fold column {column:?} is not part of the target schema"
            ))
        })?),
    };

    let map = normalizer.resolve(table.columns(), schema.columns())?;

    let sources = schema
        .iter()
        .map(|target| {
            map.source_for(target)
                .and_then(|source| table.schema().index_of(source))
        })
        .collect::<Vec<Option<usize>>>();

    let unmapped = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, column)| map.target_for(column).is_none())
        .map(|(index, column)| (index, column.clone()))
        .collect::<Vec<_>>();

    let mut report = ReconcileReport {
        renamed: map.renames().cloned().collect(),
        added: schema
            .iter()
            .zip(&sources)
            .filter(|(_, source)| source.is_none())
            .map(|(target, _)| target.to_string())
            .collect(),
        ..ReconcileReport::default()
    };

    let mut out = Table::new(schema.clone());
    for row in table.rows() {
        let mut values = sources
            .iter()
            .map(|source| {
                source
                    .and_then(|index| row.get(index))
                    .unwrap_or_default()
                    .to_string()
            })
            .collect::<Vec<String>>();

        if let Some(fold_index) = fold_index {
            let extras = unmapped
                .iter()
                .filter_map(|(index, column)| {
                    row.get(*index)
                        .map(str::trim)
                        .filter(|value| !value.is_empty())
                        .map(|value| format!("{column}: {value}"))
                })
                .collect::<Vec<_>>();
            if !extras.is_empty() {
                let slot = &mut values[fold_index];
                let mut parts = Vec::with_capacity(extras.len() + 1);
                if !slot.trim().is_empty() {
                    parts.push(slot.trim().to_string());
                }
                parts.extend(extras);
                *slot = parts.join("; ");
            }
        }

        out.push_row(Row::new(values))?;
    }

    for (index, column) in unmapped {
        let non_blank = table
            .rows()
            .iter()
            .filter(|row| row.get(index).is_some_and(|value| !value.trim().is_empty()))
            .count();
        match fold_index {
            Some(_) => {
                debug!(column = %column, non_blank, "folded unmapped column");
                report.folded.push(column);
            }
            None => {
                warn!(column = %column, non_blank, "dropping column outside target schema");
                report.dropped.push(column);
            }
        }
    }

    for rename in &report.renamed {
        debug!(from = %rename.source, to = %rename.target, "renamed column");
    }

    Ok(Reconciled { table: out, report })
}
