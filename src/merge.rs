use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{Key, Row, Table};
use crate::error::CurateError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub input_rows: Vec<usize>,
    pub retained_per_input: Vec<usize>,
    pub output_rows: usize,
    pub duplicates_removed: usize,
    pub blank_keys: usize,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table: Table,
    pub report: MergeReport,
    /// Input index of each output row.
    pub origins: Vec<usize>,
}

/// Concatenates `tables` in order and, when `key` is given, keeps only the
/// first row seen for each key value.
///
/// All tables must share one column set. Rows whose key columns are all
/// blank are never treated as duplicates of each other.
///
/// Key values are compared with surrounding whitespace trimmed, so `" g1 "`
/// and `"g1"` are one record. The retained row keeps its text as written.
pub fn merge(tables: Vec<Table>, key: Option<&Key>) -> Result<MergeOutcome, CurateError> {
    let schema = tables.first().ok_or(CurateError::NoTables)?.schema().clone();
    for (index, table) in tables.iter().enumerate().skip(1) {
        if table.schema() != &schema {
            return Err(CurateError::SchemaMismatch {
                index,
                expected: schema.columns().to_vec(),
                found: table.columns().to_vec(),
            });
        }
    }
    let key_indices = key.map(|key| key.indices(&schema)).transpose()?;

    let mut report = MergeReport {
        input_rows: tables.iter().map(Table::len).collect(),
        retained_per_input: vec![0; tables.len()],
        ..MergeReport::default()
    };

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut origins = Vec::new();
    let mut out = Table::new(schema);
    for (input, table) in tables.into_iter().enumerate() {
        for row in table.into_rows() {
            if let Some(indices) = &key_indices {
                match key_tuple(&row, indices) {
                    None => report.blank_keys += 1,
                    Some(tuple) => {
                        if !seen.insert(tuple) {
                            report.duplicates_removed += 1;
                            continue;
                        }
                    }
                }
            }
            report.retained_per_input[input] += 1;
            origins.push(input);
            out.push_row(row)?;
        }
    }
    report.output_rows = out.len();

    match key {
        Some(key) => info!(
            tables = report.input_rows.len(),
            rows_in = report.input_rows.iter().sum::<usize>(),
            rows_out = report.output_rows,
            duplicates = report.duplicates_removed,
            blank_keys = report.blank_keys,
            key = %key,
            "merged tables"
        ),
        None => info!(
            tables = report.input_rows.len(),
            rows_out = report.output_rows,
            "concatenated tables"
        ),
    }
    for (input, (before, after)) in report
        .input_rows
        .iter()
        .zip(&report.retained_per_input)
        .enumerate()
    {
        debug!(input, before, after, "rows retained from input");
    }

    Ok(MergeOutcome {
        table: out,
        report,
        origins,
    })
}

/// Deduplicates a single table by `key`, keeping first occurrences.
pub fn dedup(table: Table, key: &Key) -> Result<MergeOutcome, CurateError> {
    merge(vec![table], Some(key))
}

/// Trimmed key values, or `None` when every key column is blank.
fn key_tuple(row: &Row, indices: &[usize]) -> Option<Vec<String>> {
    let tuple = indices
        .iter()
        .map(|index| row.get(*index).unwrap_or_default().trim().to_string())
        .collect::<Vec<_>>();
    if tuple.iter().all(String::is_empty) {
        None
    } else {
        Some(tuple)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::Schema;

    fn genes(rows: &[(&str, &str)]) -> Table {
        let schema = Schema::new(["gene", "origin"]).unwrap();
        let rows = rows.iter().map(|(gene, origin)| Row::new([*gene, *origin])).collect();
        Table::with_rows(schema, rows).unwrap()
    }

    #[test]
    fn no_key_is_plain_concatenation() {
        let out = merge(vec![genes(&[("g1", "a")]), genes(&[("g1", "b")])], None).unwrap();
        assert_eq!(out.table.len(), 2);
        assert_eq!(out.report.duplicates_removed, 0);
    }

    #[test]
    fn key_whitespace_is_ignored() {
        let key = Key::single("gene");
        let out = merge(vec![genes(&[(" g1 ", "a")]), genes(&[("g1", "b")])], Some(&key)).unwrap();
        assert_eq!(out.table.len(), 1);
        assert_eq!(out.table.rows()[0].values(), [" g1 ", "a"]);
        assert_eq!(out.report.retained_per_input, vec![1, 0]);
        assert_eq!(out.origins, vec![0]);
    }

    #[test]
    fn blank_keys_are_never_collapsed() {
        let key = Key::single("gene");
        let out = merge(vec![genes(&[("", "a"), ("  ", "b"), ("", "c")])], Some(&key)).unwrap();
        assert_eq!(out.table.len(), 3);
        assert_eq!(out.report.blank_keys, 3);
        assert_eq!(out.report.duplicates_removed, 0);
    }

    #[test]
    fn composite_key_uses_every_column() {
        let key = Key::new(["gene", "origin"]).unwrap();
        let out = merge(
            vec![genes(&[("g1", "a"), ("g1", "b"), ("g1", "a")])],
            Some(&key),
        )
        .unwrap();
        assert_eq!(out.table.len(), 2);
    }

    #[test]
    fn mismatched_schemas_are_rejected() {
        let other = Table::new(Schema::new(["origin", "gene"]).unwrap());
        let err = merge(vec![genes(&[]), other], None).unwrap_err();
        assert_matches!(err, CurateError::SchemaMismatch { index: 1, .. });
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_matches!(merge(Vec::new(), None), Err(CurateError::NoTables));
    }

    #[test]
    fn unknown_key_column_is_rejected() {
        let err = merge(vec![genes(&[])], Some(&Key::single("locus"))).unwrap_err();
        assert_matches!(err, CurateError::UnknownColumn { column, .. } if column == "locus");
    }
}
