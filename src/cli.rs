use std::path::PathBuf;

use clap::{Parser, ValueEnum};

const AFTER_HELP: &str = "\
If no output path is given, a private in-memory database is created and, once every \
table is loaded, an interactive SQL session starts. Statements run once they are \
complete (terminated by ';'). Ctrl-C clears the pending statement; Ctrl-D exits.

Every run drops and recreates the named tables; there is no append mode.";

#[derive(Debug, Parser)]
#[command(
    name = "csv-to-sqlite",
    author,
    version,
    about = "Import CSV data into SQLite tables, inferring column affinities from the data",
    long_about = None,
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// Path to the new or existing SQLite database (omit for a temporary in-memory DB)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV dialect used to read every input file
    #[arg(short = 'd', long = "dialect", value_enum, default_value = "excel")]
    pub dialect: Dialect,
    /// Character encoding of the input files (defaults to utf-8; a BOM takes precedence)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Enable write-ahead logging on the output database (ignored in memory)
    #[arg(long)]
    pub wal: bool,
    /// Reject header names that are not valid identifiers instead of rewriting them
    #[arg(long = "strict-identifiers")]
    pub strict_identifiers: bool,
    /// How to treat table or column names that are SQLite keywords
    #[arg(long = "reserved-words", value_enum, default_value = "quote")]
    pub reserved_words: ReservedWordPolicy,
    /// Consecutive pairs of CSV_PATH TABLE_NAME
    #[arg(value_name = "CSV_TABLE_PAIRS", required = true, num_args = 1..)]
    pub csv_table_pairs: Vec<String>,
}

/// Named sets of CSV syntax rules.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum Dialect {
    /// Comma separated, double-quoted fields, doubled quotes as escapes
    #[default]
    Excel,
    /// Like `excel` but tab separated
    ExcelTab,
    /// Comma separated; written with `\n` line endings, read like `excel`
    Unix,
}

impl Dialect {
    pub fn delimiter(self) -> u8 {
        match self {
            Dialect::Excel | Dialect::Unix => b',',
            Dialect::ExcelTab => b'\t',
        }
    }

    pub fn quote(self) -> u8 {
        b'"'
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Excel => "excel",
            Dialect::ExcelTab => "excel-tab",
            Dialect::Unix => "unix",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum ReservedWordPolicy {
    /// Accept keywords; identifiers are always quoted in generated SQL
    #[default]
    Quote,
    /// Refuse to import when a table or column name is a keyword
    Reject,
}

impl Cli {
    /// Splits the positional arguments into `(csv_path, table_name)` pairs.
    pub fn table_pairs(&self) -> Option<Vec<(PathBuf, String)>> {
        if self.csv_table_pairs.len() % 2 != 0 {
            return None;
        }
        Some(
            self.csv_table_pairs
                .chunks(2)
                .map(|pair| (PathBuf::from(&pair[0]), pair[1].clone()))
                .collect(),
        )
    }
}
