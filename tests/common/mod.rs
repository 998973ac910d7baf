#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use rusqlite::{Connection, types::Value};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    pub fn db_path(&self) -> PathBuf {
        self.temp_dir.path().join("out.db")
    }
}

/// The binary with a predictable log filter.
pub fn csv_to_sqlite() -> Command {
    let mut cmd = Command::cargo_bin("csv-to-sqlite").expect("binary exists");
    cmd.env_remove("RUST_LOG");
    cmd
}

pub fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

/// Every row of `sql` against the database at `db`.
pub fn query(db: &Path, sql: &str) -> Vec<Vec<Value>> {
    let conn = Connection::open(db).expect("open result db");
    let mut stmt = conn.prepare(sql).expect("prepare query");
    let width = stmt.column_count();
    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|idx| row.get::<_, Value>(idx))
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .expect("run query")
        .collect::<rusqlite::Result<Vec<_>>>()
        .expect("read rows");
    rows
}

pub fn table_names(db: &Path) -> Vec<String> {
    query(db, "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .into_iter()
        .filter_map(|row| match row.into_iter().next() {
            Some(Value::Text(name)) => Some(name),
            _ => None,
        })
        .collect()
}
