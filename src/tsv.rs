use std::io::Read;

use camino::Utf8Path;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::domain::{Row, Schema, Table};
use crate::error::CurateError;

pub fn read_table(path: &Utf8Path) -> Result<Table, CurateError> {
    if !path.as_std_path().exists() {
        return Err(CurateError::MissingInput(path.to_path_buf()));
    }
    let file = std::fs::File::open(path.as_std_path()).map_err(|err| CurateError::TsvRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    parse_table(file, path)
}

/// Like [`read_table`], but a missing file is `Ok(None)`.
pub fn read_table_if_exists(path: &Utf8Path) -> Result<Option<Table>, CurateError> {
    if !path.as_std_path().exists() {
        return Ok(None);
    }
    read_table(path).map(Some)
}

/// Parses tab-separated text. `origin` is only used in error messages.
pub fn parse_table<R: Read>(input: R, origin: &Utf8Path) -> Result<Table, CurateError> {
    let read_err = |message: String| CurateError::TsvRead {
        path: origin.to_path_buf(),
        message,
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|err| read_err(err.to_string()))?
        .clone();
    if headers.is_empty() {
        return Err(read_err("missing header line".to_string()));
    }
    let schema = Schema::with_context(headers.iter(), origin.as_str())?;
    let width = schema.len();

    let mut table = Table::new(schema);
    let mut record = StringRecord::new();
    loop {
        let more = reader
            .read_record(&mut record)
            .map_err(|err| read_err(err.to_string()))?;
        if !more {
            break;
        }
        if record.len() > width {
            let line = record.position().map(|pos| pos.line()).unwrap_or(0);
            return Err(read_err(format!(
                "line {line} has {} fields but the header has {width}",
                record.len()
            )));
        }
        let mut values = record.iter().map(str::to_string).collect::<Vec<_>>();
        values.resize(width, String::new());
        table.push_row(Row::new(values))?;
    }
    Ok(table)
}

pub fn to_tsv_bytes(table: &Table) -> Result<Vec<u8>, CurateError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());
    writer
        .write_record(table.columns())
        .map_err(|err| CurateError::TsvWrite(err.to_string()))?;
    for row in table.rows() {
        writer
            .write_record(row.values())
            .map_err(|err| CurateError::TsvWrite(err.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|err| CurateError::TsvWrite(err.to_string()))
}
