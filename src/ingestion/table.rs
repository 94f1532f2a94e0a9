//! Delimited flow-table reader
//!
//! # Format
//!
//! ```text
//! # comment lines and blank lines are skipped
//! timestamp,src,dst,label          <- optional header
//! 1700000000.25,10.0.0.1,10.0.0.2,benign
//! 1700000000.50,7,8
//! 1700000000.75,"web,01",db,"scan, fast"
//! ```
//!
//! Columns are positional: timestamp, source, destination, then an optional
//! label. Fields follow CSV quoting rules and are trimmed; node identifiers
//! are parsed with [`NodeId::parse`]. See [`HeaderMode`] for how a header
//! row is recognized.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{StringRecord, StringRecordsIntoIter, Trim};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IngestionError, Result};
use crate::types::{FlowRecord, NodeId};

/// Column names accepted as a timestamp header in [`HeaderMode::Auto`]
const TIMESTAMP_HEADERS: [&str; 5] = ["timestamp", "time", "ts", "t", "epoch"];

/// How the first data row is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    /// Header only when the first column is named like a timestamp column
    #[default]
    Auto,
    /// The first data row is always a header
    Present,
    /// Every row is data
    Absent,
}

/// Flow-table parser configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    /// Column separator (default: `,`)
    pub delimiter: u8,
    /// Lines starting with this byte are ignored (default: `#`)
    pub comment: Option<u8>,
    /// Header handling (default: auto-detect)
    pub header: HeaderMode,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            comment: Some(b'#'),
            header: HeaderMode::Auto,
        }
    }
}

impl TableConfig {
    /// Set the column separator
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set header handling
    pub fn with_header(mut self, header: HeaderMode) -> Self {
        self.header = header;
        self
    }
}

/// Iterator of [`FlowRecord`]s over delimited text
///
/// Yields one `Err` per malformed row and keeps going; the caller decides
/// whether to stop.
pub struct FlowTableReader<R: Read> {
    records: StringRecordsIntoIter<R>,
    header: HeaderMode,
    header_checked: bool,
}

impl<R: Read> std::fmt::Debug for FlowTableReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowTableReader")
            .field("header", &self.header)
            .field("header_checked", &self.header_checked)
            .finish_non_exhaustive()
    }
}

impl<R: Read> FlowTableReader<R> {
    /// Read records from any byte source
    pub fn new(reader: R, config: TableConfig) -> Self {
        let records = csv::ReaderBuilder::new()
            .delimiter(config.delimiter)
            .comment(config.comment)
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader)
            .into_records();

        Self {
            records,
            header: config.header,
            header_checked: false,
        }
    }

    /// Whether `fields` is the header row under the configured mode
    fn is_header(&self, fields: &StringRecord) -> bool {
        match self.header {
            HeaderMode::Present => true,
            HeaderMode::Absent => false,
            HeaderMode::Auto => fields.get(0).is_some_and(|first| {
                TIMESTAMP_HEADERS
                    .iter()
                    .any(|name| first.eq_ignore_ascii_case(name))
            }),
        }
    }
}

impl FlowTableReader<BufReader<File>> {
    /// Open a flow table on disk
    pub fn open(path: impl AsRef<Path>, config: TableConfig) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), config))
    }
}

impl<R: Read> Iterator for FlowTableReader<R> {
    type Item = Result<FlowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let fields = match self.records.next()? {
                Ok(fields) => fields,
                Err(e) => return Some(Err(e.into())),
            };

            // whitespace-only lines survive the csv reader as empty fields
            if fields.iter().all(str::is_empty) {
                continue;
            }

            let line = fields.position().map_or(0, |p| p.line() as usize);
            if !self.header_checked {
                self.header_checked = true;
                if self.is_header(&fields) {
                    debug!(line, header = ?fields, "Skipping header row");
                    continue;
                }
            }

            let columns: Vec<&str> = fields.iter().collect();
            return Some(parse_fields(&columns, line).map_err(Into::into));
        }
    }
}

/// Turn one row's trimmed columns into a record
pub fn parse_fields(fields: &[&str], line: usize) -> std::result::Result<FlowRecord, IngestionError> {
    let raw_ts = fields.first().copied().unwrap_or_default();
    let timestamp = raw_ts
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or_else(|| IngestionError::InvalidTimestamp {
            line,
            value: raw_ts.to_string(),
        })?;

    let node = |index: usize, field: &'static str| match fields.get(index) {
        None => Err(IngestionError::MissingField { line, field }),
        Some(raw) if raw.is_empty() => Err(IngestionError::EmptyNode { line, field }),
        Some(raw) => Ok(NodeId::parse(raw)),
    };
    let src = node(1, "src")?;
    let dst = node(2, "dst")?;

    let mut record = FlowRecord::new(timestamp, src, dst);
    if let Some(label) = fields.get(3).filter(|l| !l.is_empty()) {
        record = record.with_label(*label);
    }
    Ok(record)
}
