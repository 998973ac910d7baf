//! Typed failures raised while importing CSV files.
//!
//! Most plumbing returns `anyhow::Result`; the variants here are the failures a
//! caller may want to tell apart. They all surface through [`crate::run`] and
//! end the process with a non-zero status.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("csv path and table name arguments must be given in pairs (got {count} argument(s))")]
    UnpairedArguments { count: usize },

    #[error("empty csv input: {path:?}")]
    EmptyInput { path: PathBuf },

    #[error("cannot open csv file {path:?}: {source}")]
    CsvOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open database {location}: {source}")]
    DatabaseOpen {
        location: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{kind} is not a valid SQLite identifier: {name:?}")]
    InvalidIdentifier { kind: &'static str, name: String },

    #[error("{kind} is a reserved SQLite keyword: {name:?}")]
    ReservedIdentifier { kind: &'static str, name: String },

    #[error("{count} malformed row(s) in {path:?}; table '{table}' was not created")]
    MalformedRows {
        path: PathBuf,
        table: String,
        count: usize,
    },

    #[error("data row {row} column '{column}': {value:?} is not a valid {affinity} value")]
    CellConversion {
        row: usize,
        column: String,
        value: String,
        affinity: crate::infer::Affinity,
    },

    #[error("insert into '{table}' failed at data row {row}: {source}\n  statement: {statement}")]
    Insert {
        table: String,
        row: usize,
        statement: String,
        #[source]
        source: rusqlite::Error,
    },
}
