//! Header text to SQL identifier normalisation.
//!
//! Names are reduced to word characters (letters, digits, underscore), given a
//! leading underscore when they would otherwise start with a digit, and made
//! unique within one table by appending `_1`, `_2`, ... Uniqueness and keyword
//! checks are case-insensitive, matching how SQLite resolves identifiers.
//!
//! The keyword set and the rewrite policy live in [`IdentifierRules`] so a
//! different backend can supply its own.

use std::{borrow::Cow, collections::HashSet, sync::OnceLock};

use log::warn;
use regex::Regex;

use crate::{cli::ReservedWordPolicy, error::ImportError};

/// Every keyword recognised by SQLite (see `sqlite3_keyword_name`).
pub const SQLITE_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN",
    "WHERE", "WINDOW", "WITH", "WITHOUT",
];

fn non_word_chars() -> &'static Regex {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    NON_WORD.get_or_init(|| Regex::new(r"\W").expect("static pattern compiles"))
}

/// What to do with a name that is not already a valid identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewritePolicy {
    /// Replace invalid characters and log the rename.
    #[default]
    Rewrite,
    /// Fail the import.
    Reject,
}

#[derive(Debug, Clone)]
pub struct IdentifierRules {
    reserved: HashSet<String>,
    pub rewrite: RewritePolicy,
    pub reserved_words: ReservedWordPolicy,
}

impl IdentifierRules {
    /// Builds rules from an arbitrary keyword list; keywords match case-insensitively.
    pub fn new<I, S>(
        keywords: I,
        rewrite: RewritePolicy,
        reserved_words: ReservedWordPolicy,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            reserved: keywords
                .into_iter()
                .map(|k| k.as_ref().to_ascii_lowercase())
                .collect(),
            rewrite,
            reserved_words,
        }
    }

    pub fn sqlite(rewrite: RewritePolicy, reserved_words: ReservedWordPolicy) -> Self {
        Self::new(SQLITE_KEYWORDS.iter().copied(), rewrite, reserved_words)
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(&name.to_ascii_lowercase())
    }

    /// Produces a valid identifier for `raw`, applying the rewrite and keyword
    /// policies. `kind` names the thing being checked in messages.
    pub fn clean(&self, raw: &str, kind: &'static str) -> Result<String, ImportError> {
        let cleaned = clean_identifier(raw);
        if cleaned != raw {
            if self.rewrite == RewritePolicy::Reject {
                return Err(ImportError::InvalidIdentifier {
                    kind,
                    name: raw.to_string(),
                });
            }
            warn!("{kind} {raw:?} renamed to {cleaned:?}");
        }
        let cleaned = cleaned.into_owned();
        self.check_reserved(&cleaned, kind)?;
        Ok(cleaned)
    }

    fn check_reserved(&self, name: &str, kind: &'static str) -> Result<(), ImportError> {
        if self.reserved_words == ReservedWordPolicy::Reject && self.is_reserved(name) {
            return Err(ImportError::ReservedIdentifier {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Cleans a whole header row, resolving duplicates with numeric suffixes.
    pub fn clean_header<S: AsRef<str>>(&self, header: &[S]) -> Result<Vec<String>, ImportError> {
        let mut used = HashSet::with_capacity(header.len());
        let mut names = Vec::with_capacity(header.len());
        for raw in header {
            let raw = raw.as_ref();
            let base = self.clean(raw, "column name")?;
            let unique = unique_name(&base, &used);
            if unique != base {
                warn!("duplicate column name {base:?} renamed to {unique:?}");
                self.check_reserved(&unique, "column name")?;
            }
            used.insert(unique.to_lowercase());
            names.push(unique);
        }
        Ok(names)
    }
}

impl Default for IdentifierRules {
    fn default() -> Self {
        Self::sqlite(RewritePolicy::default(), ReservedWordPolicy::default())
    }
}

/// Replaces non-word characters with `_`, never returns an empty name and
/// never returns a name starting with a digit.
pub fn clean_identifier(raw: &str) -> Cow<'_, str> {
    let replaced = non_word_chars().replace_all(raw, "_");
    let starts_with_digit = replaced.chars().next().is_some_and(|c| c.is_numeric());
    if replaced.is_empty() {
        Cow::Borrowed("_")
    } else if starts_with_digit {
        Cow::Owned(format!("_{replaced}"))
    } else {
        replaced
    }
}

/// `base` itself if unused, otherwise the first free `base_N`.
fn unique_name(base: &str, used: &HashSet<String>) -> String {
    if !used.contains(&base.to_lowercase()) {
        return base.to_string();
    }
    (1usize..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !used.contains(&candidate.to_lowercase()))
        .unwrap_or_else(|| base.to_string())
}

/// Wraps a cleaned identifier in double quotes for use in generated SQL.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
