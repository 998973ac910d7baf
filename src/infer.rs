//! Column affinity inference.
//!
//! Each column starts [`ColumnState::Unset`] and only ever widens along
//! `Unset -> Integer -> Float -> Text` as cells are observed. Empty cells carry
//! no information and leave the state alone; `Text` absorbs everything, so a
//! column that reaches it stops parsing cells altogether.

use std::fmt;

use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ColumnState {
    #[default]
    Unset,
    Integer,
    Float,
    Text,
}

impl ColumnState {
    /// Folds one cell into the running state.
    pub fn observe(self, cell: &str) -> Self {
        if cell.is_empty() || self == ColumnState::Text {
            return self;
        }
        state_for(self, cell)
    }

    pub fn affinity(self) -> Affinity {
        match self {
            ColumnState::Integer => Affinity::Integer,
            ColumnState::Float => Affinity::Real,
            ColumnState::Unset | ColumnState::Text => Affinity::Text,
        }
    }
}

/// Next state for a non-empty `cell` given the current one. Integers are only
/// tried while the column has seen nothing wider.
pub fn state_for(state: ColumnState, cell: &str) -> ColumnState {
    if matches!(state, ColumnState::Unset | ColumnState::Integer) && is_integer(cell) {
        return ColumnState::Integer;
    }
    if is_float(cell) {
        return ColumnState::Float;
    }
    ColumnState::Text
}

/// Base-10 literal with an optional sign that fits in an `i64`.
pub fn is_integer(cell: &str) -> bool {
    cell.parse::<i64>().is_ok()
}

/// Decimal or exponent literal, including `inf`/`nan` spellings.
pub fn is_float(cell: &str) -> bool {
    cell.parse::<f64>().is_ok()
}

/// Storage type declared for a column in DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Text,
}

impl Affinity {
    pub fn as_sql(self) -> &'static str {
        match self {
            Affinity::Integer => "INTEGER",
            Affinity::Real => "REAL",
            Affinity::Text => "TEXT",
        }
    }
}

impl fmt::Display for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub raw_name: String,
    pub name: String,
    pub state: ColumnState,
}

impl Column {
    pub fn new(raw_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            raw_name: raw_name.into(),
            name: name.into(),
            state: ColumnState::Unset,
        }
    }

    pub fn affinity(&self) -> Affinity {
        self.state.affinity()
    }
}

/// Cleaned table name plus its columns in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn affinities(&self) -> Vec<Affinity> {
        self.columns.iter().map(Column::affinity).collect()
    }

    /// `name:AFFINITY` for every column, space separated.
    pub fn describe(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{}:{}", c.name, c.affinity()))
            .join(" ")
    }
}

/// A data row whose cell count disagrees with the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowShapeError {
    /// 1-based index among data rows; the header is not counted.
    pub row: usize,
    pub expected: usize,
    pub cells: Vec<String>,
}

impl fmt::Display for RowShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {} has {} cells (expected {}): [{}]",
            self.row,
            self.cells.len(),
            self.expected,
            self.cells.iter().map(|c| format!("{c:?}")).join(", ")
        )
    }
}

#[derive(Debug, Clone)]
pub struct ColumnInferencer {
    columns: Vec<Column>,
    rows_seen: usize,
    shape_errors: Vec<RowShapeError>,
}

impl ColumnInferencer {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows_seen: 0,
            shape_errors: Vec::new(),
        }
    }

    /// Feeds one data row. Rows of the wrong width are recorded and still
    /// contribute the cells that line up with a column.
    pub fn observe_row<S: AsRef<str>>(&mut self, cells: &[S]) {
        self.rows_seen += 1;
        if cells.len() != self.columns.len() {
            self.shape_errors.push(RowShapeError {
                row: self.rows_seen,
                expected: self.columns.len(),
                cells: cells.iter().map(|c| c.as_ref().to_string()).collect(),
            });
        }
        for (column, cell) in self.columns.iter_mut().zip(cells) {
            column.state = column.state.observe(cell.as_ref());
        }
    }

    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    /// Final columns, or every shape error seen if any row was malformed.
    pub fn finish(self) -> Result<Vec<Column>, Vec<RowShapeError>> {
        if self.shape_errors.is_empty() {
            Ok(self.columns)
        } else {
            Err(self.shape_errors)
        }
    }
}
