//! Two-pass import of one CSV file into one table.
//!
//! Pass one reads the header, cleans the column names and folds every data row
//! into a [`ColumnInferencer`]. Only when every row has the header's width is
//! the table touched: pass two rewinds to the data start, skips the header and
//! streams the rows into [`Session::replace_table`], binding each cell with its
//! column's affinity.

use std::path::Path;

use anyhow::{Context, Result};
use csv::StringRecord;
use encoding_rs::{Encoding, UTF_8};
use log::{error, info};
use rusqlite::types::Value;

use crate::{
    cli::Dialect,
    error::ImportError,
    identifier::IdentifierRules,
    infer::{Affinity, Column, ColumnInferencer, TableSchema},
    io_utils::CsvSource,
    session::Session,
};

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub dialect: Dialect,
    pub encoding: &'static Encoding,
    pub rules: IdentifierRules,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            encoding: UTF_8,
            rules: IdentifierRules::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub schema: TableSchema,
    pub rows: usize,
}

/// Replaces `table` in `session` with the contents of `csv_path`.
pub fn load_table(
    session: &mut Session,
    csv_path: &Path,
    table: &str,
    options: &LoadOptions,
) -> Result<LoadSummary> {
    let table_name = options.rules.clean(table, "table name")?;
    let source = CsvSource::open(csv_path, options.encoding)?;
    let schema = infer_table_schema(&source, &table_name, options)?;
    info!("schema: {}", schema.describe());

    let mut reader = source.reader(options.dialect)?;
    reader
        .headers()
        .with_context(|| format!("Re-reading header of {csv_path:?}"))?;
    let rows = reader
        .into_records()
        .enumerate()
        .map(|(idx, record)| {
            let row = idx + 1;
            let record =
                record.with_context(|| format!("Reading data row {row} of {csv_path:?}"))?;
            bind_row(&schema, row, &record)
        });
    let inserted = session.replace_table(&schema, rows)?;
    info!(
        "Loaded {} row(s) from {:?} into '{}'",
        inserted, csv_path, schema.name
    );
    Ok(LoadSummary {
        schema,
        rows: inserted,
    })
}

/// First pass: header cleaning plus affinity inference. Malformed rows are
/// logged together and abort the load before anything is written.
pub fn infer_table_schema(
    source: &CsvSource,
    table_name: &str,
    options: &LoadOptions,
) -> Result<TableSchema> {
    let path = source.path();
    let mut reader = source.reader(options.dialect)?;
    let header = reader
        .headers()
        .with_context(|| format!("Reading header of {path:?}"))?
        .clone();
    if header.is_empty() {
        return Err(ImportError::EmptyInput {
            path: path.to_path_buf(),
        }
        .into());
    }
    let raw_names = header.iter().collect::<Vec<_>>();
    let names = options.rules.clean_header(&raw_names)?;
    let columns = raw_names
        .iter()
        .zip(names)
        .map(|(raw, name)| Column::new(*raw, name))
        .collect();

    let mut inferencer = ColumnInferencer::new(columns);
    let mut record = StringRecord::new();
    while reader
        .read_record(&mut record)
        .with_context(|| format!("Reading data row {} of {path:?}", inferencer.rows_seen() + 1))?
    {
        let cells = record.iter().collect::<Vec<_>>();
        inferencer.observe_row(&cells);
    }

    match inferencer.finish() {
        Ok(columns) => Ok(TableSchema {
            name: table_name.to_string(),
            columns,
        }),
        Err(shape_errors) => {
            for shape_error in &shape_errors {
                error!("{shape_error}");
            }
            Err(ImportError::MalformedRows {
                path: path.to_path_buf(),
                table: table_name.to_string(),
                count: shape_errors.len(),
            }
            .into())
        }
    }
}

fn bind_row(schema: &TableSchema, row: usize, record: &StringRecord) -> Result<Vec<Value>> {
    schema
        .columns
        .iter()
        .zip(record.iter())
        .map(|(column, cell)| {
            bind_cell(cell, column.affinity()).ok_or_else(|| {
                anyhow::Error::from(ImportError::CellConversion {
                    row,
                    column: column.name.clone(),
                    value: cell.to_string(),
                    affinity: column.affinity(),
                })
            })
        })
        .collect()
}

/// SQL value for `cell` under `affinity`; empty cells become `NULL`. `None`
/// when the cell does not convert. NaN is kept as text since SQLite would
/// store a NaN parameter as `NULL`.
pub fn bind_cell(cell: &str, affinity: Affinity) -> Option<Value> {
    if cell.is_empty() {
        return Some(Value::Null);
    }
    match affinity {
        Affinity::Integer => cell.parse::<i64>().ok().map(Value::Integer),
        Affinity::Real => cell.parse::<f64>().ok().map(|value| {
            if value.is_nan() {
                Value::Text(cell.to_string())
            } else {
                Value::Real(value)
            }
        }),
        Affinity::Text => Some(Value::Text(cell.to_string())),
    }
}
