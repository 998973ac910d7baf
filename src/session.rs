//! One open SQLite connection shared by every table load in a run.
//!
//! The connection stays in autocommit mode; the only explicit transaction is
//! the one [`Session::replace_table`] wraps around DROP, CREATE and the bulk
//! INSERT of a single table, so a failed load leaves the previous table intact.

use std::{
    ffi::CString,
    fmt,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, error};
use rusqlite::{Batch, Connection, Params, Statement, params_from_iter, types::Value};

use crate::{error::ImportError, identifier::quote_identifier, infer::TableSchema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Memory,
    File(PathBuf),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Memory => f.write_str(":memory:"),
            Location::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Switch on-disk databases to `journal_mode=WAL`.
    pub wal: bool,
}

pub struct Session {
    conn: Connection,
    location: Location,
}

impl Session {
    /// Opens `path`, or a private in-memory database when `path` is `None`.
    pub fn open(path: Option<&Path>, options: SessionOptions) -> Result<Self> {
        let location = match path {
            Some(p) => Location::File(p.to_path_buf()),
            None => Location::Memory,
        };
        let open_error = |source| ImportError::DatabaseOpen {
            location: location.to_string(),
            source,
        };
        let conn = match &location {
            Location::Memory => Connection::open_in_memory(),
            Location::File(p) => Connection::open(p),
        }
        .map_err(open_error)?;
        // SQLite defers reading the file header until first use.
        conn.pragma_query_value(None, "schema_version", |row| row.get::<_, i64>(0))
            .map_err(open_error)?;
        if options.wal && location != Location::Memory {
            let mode: String = conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                .with_context(|| format!("Enabling WAL on {location}"))?;
            debug!("journal_mode={mode} for {location}");
        }
        debug!("Opened database {location}");
        Ok(Self { conn, location })
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_autocommit(&self) -> bool {
        self.conn.is_autocommit()
    }

    /// Runs one statement and collects every result row.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> rusqlite::Result<Vec<Vec<Value>>> {
        let mut stmt = self.conn.prepare(sql)?;
        collect_rows(&mut stmt, params)
    }

    /// Runs every statement in `sql` in order, concatenating their rows. Stops
    /// at the first failing statement.
    pub fn execute_all(&self, sql: &str) -> rusqlite::Result<Vec<Vec<Value>>> {
        let mut batch = Batch::new(&self.conn, sql);
        let mut out = Vec::new();
        while let Some(mut stmt) = batch.next()? {
            out.extend(collect_rows(&mut stmt, [])?);
        }
        Ok(out)
    }

    pub fn pragma(&self, name: &str) -> Result<Value> {
        self.conn
            .pragma_query_value(None, name, |row| row.get::<_, Value>(0))
            .with_context(|| format!("Reading pragma {name}"))
    }

    /// Drops `schema.name` if present, recreates it and inserts `rows`, all in
    /// one transaction. Returns the number of rows inserted.
    pub fn replace_table<I>(&mut self, schema: &TableSchema, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<Vec<Value>>>,
    {
        let table = quote_identifier(&schema.name);
        let tx = self
            .conn
            .transaction()
            .context("Starting load transaction")?;
        let drop_sql = format!("DROP TABLE IF EXISTS {table}");
        tx.execute(&drop_sql, [])
            .with_context(|| format!("Running {drop_sql}"))?;
        let create_sql = create_table_sql(schema);
        tx.execute(&create_sql, [])
            .with_context(|| format!("Running {create_sql}"))?;

        let insert_sql = insert_sql(schema);
        let mut inserted = 0usize;
        {
            let mut stmt = tx
                .prepare(&insert_sql)
                .with_context(|| format!("Preparing {insert_sql}"))?;
            for (idx, row) in rows.into_iter().enumerate() {
                let values = row?;
                if let Err(source) = stmt.execute(params_from_iter(values.iter())) {
                    error!("{insert_sql}");
                    error!("sqlite error: {source}");
                    return Err(ImportError::Insert {
                        table: schema.name.clone(),
                        row: idx + 1,
                        statement: insert_sql,
                        source,
                    }
                    .into());
                }
                inserted += 1;
            }
        }
        tx.commit()
            .with_context(|| format!("Committing load of {table}"))?;
        Ok(inserted)
    }
}

fn collect_rows<P: Params>(
    stmt: &mut Statement<'_>,
    params: P,
) -> rusqlite::Result<Vec<Vec<Value>>> {
    let width = stmt.column_count();
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..width)
            .map(|idx| row.get::<_, Value>(idx))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        out.push(values);
    }
    Ok(out)
}

/// True when `sql` ends in a complete statement by SQLite's own lexer rules.
pub fn is_complete_statement(sql: &str) -> bool {
    let Ok(c_sql) = CString::new(sql) else {
        // Interior NUL: hand it to SQLite so the error is reported.
        return true;
    };
    // SAFETY: `c_sql` is NUL-terminated and outlives the call.
    unsafe { rusqlite::ffi::sqlite3_complete(c_sql.as_ptr()) != 0 }
}

pub fn create_table_sql(schema: &TableSchema) -> String {
    let columns = schema
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_identifier(&c.name), c.affinity()))
        .join(", ");
    format!("CREATE TABLE {} ({columns})", quote_identifier(&schema.name))
}

pub fn insert_sql(schema: &TableSchema) -> String {
    let names = schema
        .columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .join(", ");
    let placeholders = schema.columns.iter().map(|_| "?").join(", ");
    format!(
        "INSERT INTO {} ({names}) VALUES ({placeholders})",
        quote_identifier(&schema.name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::{Column, ColumnState};
    use tempfile::tempdir;

    fn schema(name: &str, columns: &[(&str, ColumnState)]) -> TableSchema {
        TableSchema {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(n, state)| Column {
                    raw_name: n.to_string(),
                    name: n.to_string(),
                    state: *state,
                })
                .collect(),
        }
    }

    fn rows(values: Vec<Vec<Value>>) -> impl Iterator<Item = Result<Vec<Value>>> {
        values.into_iter().map(Ok)
    }

    #[test]
    fn generated_sql_quotes_identifiers() {
        let s = schema("order", &[("id", ColumnState::Integer), ("score", ColumnState::Float)]);
        assert_eq!(
            create_table_sql(&s),
            "CREATE TABLE \"order\" (\"id\" INTEGER, \"score\" REAL)"
        );
        assert_eq!(
            insert_sql(&s),
            "INSERT INTO \"order\" (\"id\", \"score\") VALUES (?, ?)"
        );
    }

    #[test]
    fn in_memory_session_is_autocommit() {
        let session = Session::open(None, SessionOptions::default()).expect("open");
        assert_eq!(session.location(), &Location::Memory);
        assert!(session.is_autocommit());
    }

    #[test]
    fn replace_table_drops_previous_contents() {
        let mut session = Session::open(None, SessionOptions::default()).expect("open");
        let s = schema("t", &[("n", ColumnState::Integer)]);
        session
            .replace_table(&s, rows(vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]))
            .expect("first load");
        let inserted = session
            .replace_table(&s, rows(vec![vec![Value::Integer(3)]]))
            .expect("second load");
        assert_eq!(inserted, 1);
        let result = session.execute("SELECT n FROM t", []).expect("select");
        assert_eq!(result, vec![vec![Value::Integer(3)]]);
        assert!(session.is_autocommit());
    }

    #[test]
    fn failed_row_rolls_back_the_whole_load() {
        let mut session = Session::open(None, SessionOptions::default()).expect("open");
        let s = schema("t", &[("n", ColumnState::Integer)]);
        session
            .replace_table(&s, rows(vec![vec![Value::Integer(1)]]))
            .expect("first load");
        let err = session
            .replace_table(
                &s,
                vec![Ok(vec![Value::Integer(5)]), Err(anyhow::anyhow!("bad row"))],
            )
            .expect_err("second load fails");
        assert!(err.to_string().contains("bad row"));
        let result = session.execute("SELECT n FROM t", []).expect("select");
        assert_eq!(result, vec![vec![Value::Integer(1)]]);
    }

    #[test]
    fn driver_errors_report_the_statement() {
        let mut session = Session::open(None, SessionOptions::default()).expect("open");
        let s = schema("t", &[("a", ColumnState::Text)]);
        let err = session
            .replace_table(&s, rows(vec![vec![Value::Text("x".into()), Value::Integer(1)]]))
            .expect_err("too many parameters");
        match err.downcast_ref::<ImportError>() {
            Some(ImportError::Insert { row, statement, .. }) => {
                assert_eq!(*row, 1);
                assert!(statement.starts_with("INSERT INTO \"t\""));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn execute_all_runs_each_statement() {
        let session = Session::open(None, SessionOptions::default()).expect("open");
        let rows = session
            .execute_all("CREATE TABLE t (a); INSERT INTO t VALUES (1), (2); SELECT a FROM t;")
            .expect("script");
        assert_eq!(rows, vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]);
        assert!(session.execute_all("SELECT * FROM missing;").is_err());
    }

    #[test]
    fn completeness_respects_quotes_and_comments() {
        assert!(is_complete_statement("SELECT 1;"));
        assert!(!is_complete_statement("SELECT 1"));
        assert!(!is_complete_statement("SELECT ';"));
        assert!(!is_complete_statement("SELECT 1 /* ; */"));
        assert!(is_complete_statement("SELECT ';';"));
    }

    #[test]
    fn wal_is_enabled_for_files() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("out.db");
        let session = Session::open(Some(&path), SessionOptions { wal: true }).expect("open");
        assert_eq!(
            session.pragma("journal_mode").expect("pragma"),
            Value::Text("wal".to_string())
        );
    }

    #[test]
    fn unopenable_path_is_a_database_open_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("missing").join("out.db");
        let err = Session::open(Some(&path), SessionOptions::default())
            .err()
            .expect("open fails");
        assert!(matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::DatabaseOpen { .. })
        ));
    }
}
