use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CurateError;

/// Ordered column-name contract a table must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(columns: I) -> Result<Self, CurateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_context(columns, "schema")
    }

    /// Same as [`Schema::new`], naming `context` (usually a file) in errors.
    pub fn with_context<I, S>(columns: I, context: &str) -> Result<Self, CurateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = columns.into_iter().map(Into::into).collect::<Vec<String>>();
        let mut seen = HashSet::new();
        for (position, column) in columns.iter().enumerate() {
            if column.trim().is_empty() {
                return Err(CurateError::EmptyColumn {
                    position,
                    context: context.to_string(),
                });
            }
            if !seen.insert(column.as_str()) {
                return Err(CurateError::DuplicateColumn {
                    column: column.clone(),
                    context: context.to_string(),
                });
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.index_of(column).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub(crate) fn appended(&self, column: &str) -> Self {
        let mut columns = self.columns.clone();
        columns.push(column.to_string());
        Self { columns }
    }
}

impl TryFrom<Vec<String>> for Schema {
    type Error = CurateError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Schema::new(value)
    }
}

impl From<Schema> for Vec<String> {
    fn from(value: Schema) -> Self {
        value.columns
    }
}

/// One record, one value per schema column, in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(Vec<String>);

impl Row {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn set(&mut self, index: usize, value: impl Into<String>) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = value.into();
        }
    }

    pub(crate) fn push(&mut self, value: impl Into<String>) {
        self.0.push(value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Candidate record handed over by a collaborator: ordered field/value pairs.
pub type Record = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    schema: Schema,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(schema: Schema, rows: Vec<Row>) -> Result<Self, CurateError> {
        let mut table = Self::new(schema);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Builds a table from loosely-shaped records. Columns are the union of
    /// all field names in first-seen order; absent fields become `""`.
    pub fn from_records(records: &[Record]) -> Result<Self, CurateError> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for (field, _) in record {
                if !columns.iter().any(|column| column == field) {
                    columns.push(field.clone());
                }
            }
        }
        let schema = Schema::with_context(columns, "collaborator records")?;
        let mut table = Self::new(schema);
        for record in records {
            let mut values = vec![String::new(); table.schema.len()];
            for (field, value) in record {
                if let Some(index) = table.schema.index_of(field) {
                    values[index] = value.clone();
                }
            }
            table.rows.push(Row(values));
        }
        Ok(table)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &[String] {
        self.schema.columns()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Row) -> Result<(), CurateError> {
        if row.len() != self.schema.len() {
            return Err(CurateError::RowWidth {
                expected: self.schema.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_values<'a>(&'a self, column: &str) -> Option<impl Iterator<Item = &'a str>> {
        let index = self.schema.index_of(column)?;
        Some(self.rows.iter().map(move |row| row.get(index).unwrap_or("")))
    }

    /// Number of rows whose `column` holds a non-blank value.
    pub fn count_non_blank(&self, column: &str) -> usize {
        self.column_values(column)
            .map(|values| values.filter(|value| !value.trim().is_empty()).count())
            .unwrap_or(0)
    }

    /// Appends `column` with an empty value in every row.
    pub(crate) fn append_column(&mut self, column: &str) -> Result<(), CurateError> {
        if self.schema.contains(column) {
            return Err(CurateError::DuplicateColumn {
                column: column.to_string(),
                context: "table".to_string(),
            });
        }
        self.schema = self.schema.appended(column);
        for row in &mut self.rows {
            row.push(String::new());
        }
        Ok(())
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }
}

/// Column(s) whose combined value identifies a logical record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key(Vec<String>);

impl Key {
    pub fn single(column: impl Into<String>) -> Self {
        Self(vec![column.into()])
    }

    pub fn new<I, S>(columns: I) -> Result<Self, CurateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = columns.into_iter().map(Into::into).collect::<Vec<String>>();
        if columns.is_empty() {
            return Err(CurateError::InvalidConfig(
                "key must name at least one column".to_string(),
            ));
        }
        if let Some(blank) = columns.iter().find(|column| column.trim().is_empty()) {
            return Err(CurateError::InvalidConfig(format!(
                "key contains an empty column name: {blank:?}"
            )));
        }
        Ok(Self(columns))
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    /// Resolves the key columns to positions in `schema`.
    pub fn indices(&self, schema: &Schema) -> Result<Vec<usize>, CurateError> {
        self.0
            .iter()
            .map(|column| {
                schema
                    .index_of(column)
                    .ok_or_else(|| CurateError::UnknownColumn {
                        column: column.clone(),
                        context: format!("merge key {self}"),
                    })
            })
            .collect()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("+"))
    }
}

/// Short token naming the ingestion run that produced a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvenanceLabel(String);

impl ProvenanceLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProvenanceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProvenanceLabel {
    type Err = CurateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && !normalized
                .chars()
                .any(|ch| matches!(ch, '\t' | '\n' | '\r'));
        if !is_valid {
            return Err(CurateError::InvalidProvenanceLabel(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn schema_rejects_duplicates() {
        let err = Schema::new(["a", "b", "a"]).unwrap_err();
        assert_matches!(err, CurateError::DuplicateColumn { column, .. } if column == "a");
    }

    #[test]
    fn schema_rejects_blank_names() {
        let err = Schema::with_context(["a", "  "], "genes.tsv").unwrap_err();
        assert_matches!(err, CurateError::EmptyColumn { position: 1, context } if context == "genes.tsv");
    }

    #[test]
    fn push_row_checks_width() {
        let mut table = Table::new(Schema::new(["a", "b"]).unwrap());
        table.push_row(Row::new(["1", "2"])).unwrap();
        let err = table.push_row(Row::new(["1"])).unwrap_err();
        assert_matches!(err, CurateError::RowWidth { expected: 2, found: 1 });
    }

    #[test]
    fn records_union_columns_in_first_seen_order() {
        let records = vec![
            vec![("gene".to_string(), "g1".to_string())],
            vec![
                ("organism".to_string(), "E. coli".to_string()),
                ("gene".to_string(), "g2".to_string()),
            ],
        ];
        let table = Table::from_records(&records).unwrap();
        assert_eq!(table.columns(), ["gene", "organism"]);
        assert_eq!(table.rows()[0].values(), ["g1", ""]);
        assert_eq!(table.rows()[1].values(), ["g2", "E. coli"]);
    }

    #[test]
    fn key_resolves_against_schema() {
        let schema = Schema::new(["id", "name"]).unwrap();
        assert_eq!(Key::single("name").indices(&schema).unwrap(), vec![1]);
        let err = Key::single("missing").indices(&schema).unwrap_err();
        assert_matches!(err, CurateError::UnknownColumn { column, .. } if column == "missing");
    }

    #[test]
    fn provenance_label_validation() {
        let label: ProvenanceLabel = "  run-7 ".parse().unwrap();
        assert_eq!(label.as_str(), "run-7");
        assert_matches!(
            "".parse::<ProvenanceLabel>(),
            Err(CurateError::InvalidProvenanceLabel(_))
        );
        assert_matches!(
            "a\tb".parse::<ProvenanceLabel>(),
            Err(CurateError::InvalidProvenanceLabel(_))
        );
    }
}
