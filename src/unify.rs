use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{Key, ProvenanceLabel, Schema, Table};
use crate::error::CurateError;
use crate::merge::merge;
use crate::normalize::{ColumnNormalizer, normalize_key};
use crate::provenance::tag_provenance;
use crate::reconcile::{UnmappedPolicy, reconcile};
use crate::tsv;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifyConfig {
    pub data_dir: Utf8PathBuf,
    /// Category files, relative to `data_dir`, in priority order.
    pub manifest: Vec<String>,
    pub key: Option<Key>,
    /// Columns placed first, in this order, when present.
    pub priority_columns: Vec<String>,
    /// Secondary linkage column counted for reporting.
    pub link_column: Option<String>,
    /// Column recording each row's category (the file stem).
    pub category_column: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub file: String,
    pub rows_before: usize,
    pub rows_after: usize,
    pub linked_before: usize,
    pub linked_after: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnifyReport {
    pub categories: Vec<CategoryReport>,
    pub skipped: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub total_before: usize,
    pub total_after: usize,
    pub duplicates_removed: usize,
    pub linked_total: usize,
}

#[derive(Debug, Clone)]
pub struct Unified {
    pub table: Table,
    pub report: UnifyReport,
}

pub struct CategoryUnifier {
    config: UnifyConfig,
}

impl CategoryUnifier {
    pub fn new(config: UnifyConfig) -> Self {
        Self { config }
    }

    pub fn unify(&self) -> Result<Unified, CurateError> {
        if self.config.manifest.is_empty() {
            return Err(CurateError::EmptyManifest);
        }

        let mut report = UnifyReport::default();
        let mut loaded = Vec::new();
        for file in &self.config.manifest {
            let path = self.config.data_dir.join(file);
            match tsv::read_table_if_exists(&path)? {
                Some(table) => {
                    info!(file = %file, rows = table.len(), "loaded category");
                    loaded.push((file.clone(), self.tag_category(file, table)?));
                }
                None => {
                    warn!(path = %path, "category file missing, skipping");
                    report.skipped.push(file.clone());
                }
            }
        }

        if loaded.is_empty() {
            warn!(skipped = report.skipped.len(), "no category files available");
            let schema = Schema::with_context(Vec::<String>::new(), "unified table")?;
            return Ok(Unified {
                table: Table::new(schema),
                report,
            });
        }

        let schema = self.unified_schema(loaded.iter().map(|(_, table)| table))?;
        let link_column = self
            .config
            .link_column
            .as_deref()
            .and_then(|column| find_by_key(&schema, column));
        let key = self
            .config
            .key
            .as_ref()
            .map(|key| resolve_key(&schema, key))
            .transpose()?;

        let normalizer = ColumnNormalizer::new();
        let mut reconciled = Vec::with_capacity(loaded.len());
        for (file, table) in &loaded {
            let out = reconcile(table, &schema, &normalizer, &UnmappedPolicy::Drop)?;
            for column in out.report.dropped {
                report.dropped_columns.push(format!("{file}: {column}"));
            }
            report.categories.push(CategoryReport {
                file: file.clone(),
                rows_before: out.table.len(),
                linked_before: link_column
                    .map(|column| out.table.count_non_blank(column))
                    .unwrap_or(0),
                ..CategoryReport::default()
            });
            reconciled.push(out.table);
        }

        let merged = merge(reconciled, key.as_ref())?;
        let link_index = link_column.and_then(|column| schema.index_of(column));
        for (row, origin) in merged.table.rows().iter().zip(&merged.origins) {
            let category = &mut report.categories[*origin];
            category.rows_after += 1;
            let linked = link_index
                .and_then(|index| row.get(index))
                .is_some_and(|value| !value.trim().is_empty());
            if linked {
                category.linked_after += 1;
            }
        }

        report.total_before = merged.report.input_rows.iter().sum();
        report.total_after = merged.report.output_rows;
        report.duplicates_removed = merged.report.duplicates_removed;
        report.linked_total = link_column
            .map(|column| merged.table.count_non_blank(column))
            .unwrap_or(0);

        for category in &report.categories {
            info!(
                file = %category.file,
                before = category.rows_before,
                after = category.rows_after,
                linked_before = category.linked_before,
                linked_after = category.linked_after,
                "category summary"
            );
        }
        info!(
            total_before = report.total_before,
            total_after = report.total_after,
            linked = report.linked_total,
            skipped = report.skipped.len(),
            "unified categories"
        );

        Ok(Unified {
            table: merged.table,
            report,
        })
    }

    fn tag_category(&self, file: &str, table: Table) -> Result<Table, CurateError> {
        let Some(column) = &self.config.category_column else {
            return Ok(table);
        };
        let stem = Utf8Path::new(file).file_stem().unwrap_or(file);
        let label: ProvenanceLabel = stem.parse()?;
        let column = table
            .columns()
            .iter()
            .find(|existing| normalize_key(existing) == normalize_key(column))
            .cloned()
            .unwrap_or_else(|| column.clone());
        let (table, _) = tag_provenance(table, &label, &column)?;
        Ok(table)
    }

    /// Union of all columns by normalized key, first-seen spelling, with the
    /// priority columns moved to the front.
    fn unified_schema<'a>(
        &self,
        tables: impl Iterator<Item = &'a Table>,
    ) -> Result<Schema, CurateError> {
        let mut union: Vec<(String, String)> = Vec::new();
        for table in tables {
            for column in table.columns() {
                let key = normalize_key(column);
                if !union.iter().any(|(existing, _)| *existing == key) {
                    union.push((key, column.clone()));
                }
            }
        }

        let mut ordered = Vec::with_capacity(union.len());
        for priority in &self.config.priority_columns {
            let key = normalize_key(priority);
            if let Some(position) = union.iter().position(|(existing, _)| *existing == key) {
                ordered.push(union.remove(position).1);
            }
        }
        ordered.extend(union.into_iter().map(|(_, column)| column));

        Schema::with_context(ordered, "unified table")
    }
}

fn find_by_key<'a>(schema: &'a Schema, column: &str) -> Option<&'a str> {
    let key = normalize_key(column);
    schema.iter().find(|existing| normalize_key(existing) == key)
}

fn resolve_key(schema: &Schema, key: &Key) -> Result<Key, CurateError> {
    let columns = key
        .columns()
        .iter()
        .map(|column| {
            find_by_key(schema, column)
                .map(str::to_string)
                .ok_or_else(|| CurateError::UnknownColumn {
                    column: column.clone(),
                    context: "any loaded category file".to_string(),
                })
        })
        .collect::<Result<Vec<_>, CurateError>>()?;
    Key::new(columns)
}
