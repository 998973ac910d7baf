//! Interactive SQL prompt over a [`Session`].
//!
//! Lines accumulate until SQLite itself considers the buffer a complete
//! statement, then the buffer runs and each result row prints on its own line.
//! An interrupt drops the pending buffer; end of input ends the session.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use itertools::Itertools;
use rusqlite::types::Value;
use rustyline::{DefaultEditor, error::ReadlineError};

use crate::session::{Session, is_complete_statement};

pub const PROMPT: &str = "> ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    Interrupted,
    Eof,
}

pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<Line>;

    fn add_history(&mut self, _entry: &str) {}
}

/// Terminal input with line editing and history.
pub struct EditorSource {
    editor: DefaultEditor,
}

impl EditorSource {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().context("Initialising line editor")?;
        Ok(Self { editor })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> Result<Line> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Line::Text(line)),
            Err(ReadlineError::Interrupted) => Ok(Line::Interrupted),
            Err(ReadlineError::Eof) => Ok(Line::Eof),
            Err(err) => Err(err).context("Reading from terminal"),
        }
    }

    fn add_history(&mut self, entry: &str) {
        let _ = self.editor.add_history_entry(entry);
    }
}

/// Plain line reader for piped input; prints no prompt.
pub struct BufReadSource<R> {
    reader: R,
}

impl<R: BufRead> BufReadSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for BufReadSource<R> {
    fn read_line(&mut self, _prompt: &str) -> Result<Line> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .context("Reading from stdin")?;
        if read == 0 {
            return Ok(Line::Eof);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Line::Text(line))
    }
}

/// Runs the prompt on stdin/stdout, with line editing when stdin is a terminal.
pub fn run_stdio(session: &Session) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if io::stdin().is_terminal() {
        let mut source = EditorSource::new()?;
        run(session, &mut source, &mut out)
    } else {
        let mut source = BufReadSource::new(io::stdin().lock());
        run(session, &mut source, &mut out)
    }
}

pub fn run<S, W>(session: &Session, source: &mut S, out: &mut W) -> Result<()>
where
    S: LineSource,
    W: Write,
{
    let mut buffer = String::new();
    loop {
        match source.read_line(PROMPT)? {
            Line::Eof => {
                writeln!(out)?;
                out.flush()?;
                return Ok(());
            }
            Line::Interrupted => buffer.clear(),
            Line::Text(line) => {
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);
                if is_complete_statement(&buffer) {
                    let statement = std::mem::take(&mut buffer);
                    let statement = statement.trim();
                    source.add_history(statement);
                    execute_statement(session, statement, out)?;
                }
            }
        }
    }
}

fn execute_statement<W: Write>(session: &Session, sql: &str, out: &mut W) -> Result<()> {
    match session.execute_all(sql) {
        Ok(rows) if rows.is_empty() => {
            writeln!(out)?;
            out.flush()?;
        }
        Ok(rows) => {
            for row in rows {
                writeln!(out, "{}", format_row(&row))?;
            }
            out.flush()?;
        }
        Err(err) => eprintln!("sqlite error: {err}"),
    }
    Ok(())
}

pub fn format_row(row: &[Value]) -> String {
    format!("({})", row.iter().map(format_value).join(", "))
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format!("{f:?}"),
        Value::Text(text) => format!("'{}'", text.replace('\'', "''")),
        Value::Blob(bytes) => format!(
            "X'{}'",
            bytes.iter().map(|b| format!("{b:02X}")).collect::<String>()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionOptions;
    use std::collections::VecDeque;

    struct ScriptedSource {
        lines: VecDeque<Line>,
        history: Vec<String>,
    }

    impl ScriptedSource {
        fn new(lines: Vec<Line>) -> Self {
            Self {
                lines: lines.into(),
                history: Vec::new(),
            }
        }
    }

    impl LineSource for ScriptedSource {
        fn read_line(&mut self, _prompt: &str) -> Result<Line> {
            Ok(self.lines.pop_front().unwrap_or(Line::Eof))
        }

        fn add_history(&mut self, entry: &str) {
            self.history.push(entry.to_string());
        }
    }

    fn text(line: &str) -> Line {
        Line::Text(line.to_string())
    }

    fn run_script(lines: Vec<Line>) -> (String, Vec<String>) {
        let session = Session::open(None, SessionOptions::default()).expect("open");
        let mut source = ScriptedSource::new(lines);
        let mut out = Vec::new();
        run(&session, &mut source, &mut out).expect("repl");
        (String::from_utf8(out).expect("utf-8 output"), source.history)
    }

    #[test]
    fn statements_accumulate_until_complete() {
        let (out, history) = run_script(vec![text("SELECT 1,"), text("  'a'"), text(";")]);
        assert_eq!(out, "(1, 'a')\n\n");
        assert_eq!(history, vec!["SELECT 1,\n  'a'\n;"]);
    }

    #[test]
    fn interrupt_discards_pending_buffer() {
        let (out, _) = run_script(vec![
            text("SELECT 'lost'"),
            Line::Interrupted,
            text("SELECT 2;"),
        ]);
        assert_eq!(out, "(2)\n\n");
    }

    #[test]
    fn errors_do_not_end_the_session() {
        let (out, _) = run_script(vec![text("SELECT * FROM nope;"), text("SELECT NULL, 1.5;")]);
        assert_eq!(out, "(NULL, 1.5)\n\n");
    }

    #[test]
    fn statements_without_rows_print_a_blank_line() {
        let (out, _) = run_script(vec![
            text("CREATE TABLE t (a);"),
            text("SELECT a FROM t;"),
            text("INSERT INTO t VALUES (1);"),
            text("SELECT a FROM t;"),
        ]);
        assert_eq!(out, "\n\n\n(1)\n\n");
    }

    #[test]
    fn comments_do_not_swallow_following_lines() {
        let (out, _) = run_script(vec![text("SELECT 3 -- three"), text(";")]);
        assert_eq!(out, "(3)\n\n");
    }

    #[test]
    fn values_render_as_sql_literals() {
        let row = vec![
            Value::Null,
            Value::Integer(-4),
            Value::Real(4.0),
            Value::Text("it's".to_string()),
            Value::Blob(vec![0xAB, 0x01]),
        ];
        assert_eq!(format_row(&row), "(NULL, -4, 4.0, 'it''s', X'AB01')");
    }

    #[test]
    fn piped_lines_are_read_without_terminators() {
        let mut source = BufReadSource::new("SELECT 1;\r\n".as_bytes());
        assert_eq!(source.read_line(PROMPT).expect("line"), text("SELECT 1;"));
        assert_eq!(source.read_line(PROMPT).expect("eof"), Line::Eof);
    }
}
