use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::warn;

use crate::backup::{WriteOutcome, protected_write};
use crate::config::ResolvedConfig;
use crate::domain::{ProvenanceLabel, Table};
use crate::error::CurateError;
use crate::merge::{MergeReport, merge};
use crate::provenance::{TagReport, tag_provenance};
use crate::reconcile::{ReconcileReport, reconcile};
use crate::source::RecordSource;
use crate::tsv;
use crate::unify::{CategoryUnifier, UnifyReport};

#[derive(Debug, Clone, Serialize)]
pub struct InputSummary {
    pub path: String,
    pub rows: usize,
    pub reconcile: ReconcileReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResult {
    pub input: InputSummary,
    pub write: WriteOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeResult {
    pub inputs: Vec<InputSummary>,
    pub merge: MergeReport,
    pub provenance: TagReport,
    pub write: WriteOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub records: usize,
    pub reconcile: Option<ReconcileReport>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichResult {
    pub existing_rows: usize,
    /// Reconciliation of the destination itself; `None` when it did not exist.
    pub existing: Option<ReconcileReport>,
    pub sources: Vec<SourceSummary>,
    pub failed_sources: usize,
    pub merge: MergeReport,
    pub provenance: TagReport,
    pub write: WriteOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagResult {
    pub path: String,
    pub provenance: TagReport,
    pub write: WriteOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnifyResult {
    pub report: UnifyReport,
    pub write: Option<WriteOutcome>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone)]
pub struct App {
    config: ResolvedConfig,
}

impl App {
    pub fn new(config: ResolvedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Reshapes one file to the configured schema. Writes back to `input`
    /// unless `output` is given.
    pub fn reconcile_file(
        &self,
        input: &Utf8Path,
        output: Option<&Utf8Path>,
        sink: &dyn ProgressSink,
    ) -> Result<ReconcileResult, CurateError> {
        let (table, summary) = self.load_reconciled(input, sink)?;
        let destination = output.unwrap_or(input);
        let write = self.write(destination, &table, sink)?;
        Ok(ReconcileResult {
            input: summary,
            write,
        })
    }

    /// Reconciles every input, merges them in the given priority order on
    /// the configured key, tags provenance and writes `output`.
    pub fn merge_files(
        &self,
        inputs: &[Utf8PathBuf],
        output: &Utf8Path,
        label: &ProvenanceLabel,
        sink: &dyn ProgressSink,
    ) -> Result<MergeResult, CurateError> {
        if inputs.is_empty() {
            return Err(CurateError::NoTables);
        }
        let mut tables = Vec::with_capacity(inputs.len());
        let mut summaries = Vec::with_capacity(inputs.len());
        for input in inputs {
            let (table, summary) = self.load_reconciled(input, sink)?;
            tables.push(table);
            summaries.push(summary);
        }

        let start = Instant::now();
        emit(sink, format!("phase=Merge; {} tables", tables.len()));
        let merged = merge(tables, self.config.key.as_ref())?;
        emit_timed(
            sink,
            format!(
                "phase=Merge; {} rows, {} duplicates removed",
                merged.report.output_rows, merged.report.duplicates_removed
            ),
            start,
        );

        let (table, provenance) =
            tag_provenance(merged.table, label, &self.config.provenance_column)?;
        let write = self.write(output, &table, sink)?;
        Ok(MergeResult {
            inputs: summaries,
            merge: merged.report,
            provenance,
            write,
        })
    }

    /// Unions collaborator records into `destination`. Existing rows come
    /// first, so they win every key collision.
    pub fn enrich(
        &self,
        destination: &Utf8Path,
        sources: &[&dyn RecordSource],
        label: &ProvenanceLabel,
        skip_failed: bool,
        sink: &dyn ProgressSink,
    ) -> Result<EnrichResult, CurateError> {
        let schema = self.config.require_schema()?;
        let (existing, existing_report) = match tsv::read_table_if_exists(destination)? {
            Some(table) => {
                let (table, report) = self.reconcile_table(&table)?;
                if !report.is_lossless() {
                    warn!(path = %destination, dropped = ?report.dropped, "columns dropped during reconciliation");
                }
                (table, Some(report))
            }
            None => {
                emit(sink, format!("phase=Resolve; {destination} not found, starting empty"));
                (Table::new(schema.clone()), None)
            }
        };
        let existing_rows = existing.len();

        let mut summaries = Vec::with_capacity(sources.len());
        let mut candidates = Vec::with_capacity(sources.len());
        let mut failed_sources = 0;
        for source in sources {
            emit(sink, format!("phase=Search; {}", source.name()));
            let start = Instant::now();
            let records = match source.search(&existing) {
                Ok(records) => records,
                Err(err) if skip_failed => {
                    warn!(source = source.name(), error = %err, "record source failed, skipping");
                    failed_sources += 1;
                    summaries.push(SourceSummary {
                        name: source.name().to_string(),
                        records: 0,
                        reconcile: None,
                        error: Some(err.to_string()),
                    });
                    continue;
                }
                Err(err) => {
                    return Err(CurateError::Collaborator {
                        source_name: source.name().to_string(),
                        message: err.to_string(),
                    });
                }
            };
            emit_timed(
                sink,
                format!("phase=Search; {} returned {} records", source.name(), records.len()),
                start,
            );
            let raw = Table::from_records(&records)?;
            let (table, report) = self.reconcile_table(&raw)?;
            summaries.push(SourceSummary {
                name: source.name().to_string(),
                records: records.len(),
                reconcile: Some(report),
                error: None,
            });
            candidates.push(table);
        }

        let mut tables = Vec::with_capacity(candidates.len() + 1);
        tables.push(existing);
        tables.extend(candidates);
        let merged = merge(tables, self.config.key.as_ref())?;
        let (table, provenance) =
            tag_provenance(merged.table, label, &self.config.provenance_column)?;
        let write = self.write(destination, &table, sink)?;

        Ok(EnrichResult {
            existing_rows,
            existing: existing_report,
            sources: summaries,
            failed_sources,
            merge: merged.report,
            provenance,
            write,
        })
    }

    /// Fills blank provenance values of `path` in place.
    pub fn tag_file(
        &self,
        path: &Utf8Path,
        label: &ProvenanceLabel,
        sink: &dyn ProgressSink,
    ) -> Result<TagResult, CurateError> {
        emit(sink, format!("phase=Resolve; reading {path}"));
        let table = tsv::read_table(path)?;
        let (table, provenance) = tag_provenance(table, label, &self.config.provenance_column)?;
        let write = self.write(path, &table, sink)?;
        Ok(TagResult {
            path: path.to_string(),
            provenance,
            write,
        })
    }

    pub fn unify(&self, sink: &dyn ProgressSink) -> Result<UnifyResult, CurateError> {
        let settings = self.config.require_unify()?;
        emit(
            sink,
            format!(
                "phase=Resolve; {} category files in {}",
                settings.unifier.manifest.len(),
                settings.unifier.data_dir
            ),
        );
        let start = Instant::now();
        let unified = CategoryUnifier::new(settings.unifier.clone()).unify()?;
        emit_timed(
            sink,
            format!(
                "phase=Merge; {} rows from {} categories",
                unified.report.total_after,
                unified.report.categories.len()
            ),
            start,
        );

        let write = if unified.report.categories.is_empty() {
            warn!(output = %settings.output, "no categories loaded, output not written");
            None
        } else {
            Some(self.write(&settings.output, &unified.table, sink)?)
        };
        Ok(UnifyResult {
            report: unified.report,
            write,
        })
    }

    fn load_reconciled(
        &self,
        path: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<(Table, InputSummary), CurateError> {
        emit(sink, format!("phase=Resolve; reading {path}"));
        let raw = tsv::read_table(path)?;
        let rows = raw.len();
        let (table, report) = self.reconcile_table(&raw)?;
        if !report.is_lossless() {
            warn!(path = %path, dropped = ?report.dropped, "columns dropped during reconciliation");
        }
        Ok((
            table,
            InputSummary {
                path: path.to_string(),
                rows,
                reconcile: report,
            },
        ))
    }

    fn reconcile_table(&self, table: &Table) -> Result<(Table, ReconcileReport), CurateError> {
        let schema = self.config.require_schema()?;
        let out = reconcile(table, schema, &self.config.normalizer, &self.config.unmapped)?;
        Ok((out.table, out.report))
    }

    fn write(
        &self,
        path: &Utf8Path,
        table: &Table,
        sink: &dyn ProgressSink,
    ) -> Result<WriteOutcome, CurateError> {
        let contents = tsv::to_tsv_bytes(table)?;
        emit(sink, format!("phase=Store; writing {} rows to {path}", table.len()));
        protected_write(path, &contents, &self.config.backup)
    }
}

fn emit(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: None,
    });
}

fn emit_timed(sink: &dyn ProgressSink, message: String, start: Instant) {
    sink.event(ProgressEvent {
        message,
        elapsed: Some(start.elapsed()),
    });
}
