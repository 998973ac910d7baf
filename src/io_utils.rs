//! CSV source handling shared by both passes of a table load.
//!
//! A [`CsvSource`] owns the open file together with the offset where data
//! starts (just past any byte-order mark) and the encoding to decode it with.
//! Each call to [`CsvSource::reader`] rewinds to that offset and hands back a
//! fresh `csv::Reader`, so inference and insertion read the same bytes.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};

use crate::{cli::Dialect, error::ImportError};

/// Longest byte-order mark recognised by `Encoding::for_bom`.
const MAX_BOM_LEN: u64 = 3;

pub type CsvReader<'a> = csv::Reader<DecodeReaderBytes<&'a File, Vec<u8>>>;

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Returns the encoding announced by a leading byte-order mark and the mark's length.
pub fn sniff_bom(prefix: &[u8]) -> Option<(&'static Encoding, usize)> {
    Encoding::for_bom(prefix)
}

pub fn reader_builder(dialect: Dialect) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(dialect.delimiter())
        .quote(dialect.quote())
        .double_quote(true)
        .flexible(true);
    builder
}

#[derive(Debug)]
pub struct CsvSource {
    path: PathBuf,
    file: File,
    data_start: u64,
    encoding: &'static Encoding,
}

impl CsvSource {
    /// Opens `path`, skipping a byte-order mark if one is present. A BOM wins
    /// over the `fallback` encoding.
    pub fn open(path: &Path, fallback: &'static Encoding) -> Result<Self> {
        let file = File::open(path).map_err(|source| ImportError::CsvOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mut prefix = Vec::with_capacity(MAX_BOM_LEN as usize);
        (&file)
            .take(MAX_BOM_LEN)
            .read_to_end(&mut prefix)
            .with_context(|| format!("Reading {path:?}"))?;
        let (encoding, data_start) = match sniff_bom(&prefix) {
            Some((encoding, bom_len)) => (encoding, bom_len as u64),
            None => (fallback, 0),
        };
        Ok(Self {
            path: path.to_path_buf(),
            file,
            data_start,
            encoding,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Rewinds to the first byte after the BOM and returns a reader positioned
    /// before the header row.
    pub fn reader(&self, dialect: Dialect) -> Result<CsvReader<'_>> {
        (&self.file)
            .seek(SeekFrom::Start(self.data_start))
            .with_context(|| format!("Rewinding {:?}", self.path))?;
        let decoder = DecodeReaderBytesBuilder::new()
            .encoding(Some(self.encoding))
            .bom_sniffing(false)
            .utf8_passthru(true)
            .build(&self.file);
        Ok(reader_builder(dialect).from_reader(decoder))
    }
}
