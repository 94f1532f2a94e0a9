//! Score reports
//!
//! Per-event [`ScoreRecord`]s are written as CSV or JSON lines by
//! [`ReportWriter`]; [`summarize_by_tick`] folds them into per-tick
//! [`TickSummary`] rows.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::types::{FlowRecord, NodeId};

/// Score of one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Event time
    pub timestamp: f64,
    /// Source endpoint
    pub src: NodeId,
    /// Destination endpoint
    pub dst: NodeId,
    /// Transformed anomaly score
    pub score: f64,
    /// Threshold decision
    pub anomalous: bool,
    /// Ground-truth label from the input, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ScoreRecord {
    /// Build a report row for a scored flow
    pub fn from_flow(record: &FlowRecord, score: f64, anomalous: bool) -> Self {
        Self {
            timestamp: record.timestamp,
            src: record.src.clone(),
            dst: record.dst.clone(),
            score,
            anomalous,
            label: record.label.clone(),
        }
    }
}

/// Output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReportFormat {
    /// Comma-separated values with a header row
    #[default]
    Csv,
    /// One JSON object per line
    Jsonl,
}

impl ReportFormat {
    /// Every supported format
    pub const ALL: [ReportFormat; 2] = [ReportFormat::Csv, ReportFormat::Jsonl];

    /// Format name
    pub fn name(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Jsonl => "jsonl",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| ConfigError::InvalidFormat {
                name: s.to_string(),
                valid: Self::ALL.iter().map(ReportFormat::name).collect(),
            })
    }
}

impl TryFrom<String> for ReportFormat {
    type Error = ConfigError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ReportFormat> for String {
    fn from(format: ReportFormat) -> Self {
        format.name().to_string()
    }
}

// =============================================================================
// Writer
// =============================================================================

const CSV_HEADER: [&str; 6] = ["timestamp", "src", "dst", "score", "anomalous", "label"];

#[derive(Debug)]
enum Sink<W: Write> {
    Csv(csv::Writer<W>),
    Jsonl(W),
}

/// Streams score records to any [`Write`]
#[derive(Debug)]
pub struct ReportWriter<W: Write> {
    sink: Sink<W>,
    anomalies_only: bool,
    header_written: bool,
    written: usize,
    filtered: usize,
}

impl<W: Write> ReportWriter<W> {
    /// Create a writer
    pub fn new(out: W, format: ReportFormat) -> Self {
        let sink = match format {
            ReportFormat::Csv => Sink::Csv(csv::Writer::from_writer(out)),
            ReportFormat::Jsonl => Sink::Jsonl(out),
        };
        Self {
            sink,
            anomalies_only: false,
            header_written: false,
            written: 0,
            filtered: 0,
        }
    }

    /// Only write records flagged anomalous
    pub fn anomalies_only(mut self, enabled: bool) -> Self {
        self.anomalies_only = enabled;
        self
    }

    /// Write one record; returns `false` when it was filtered out
    pub fn write(&mut self, record: &ScoreRecord) -> Result<bool> {
        if self.anomalies_only && !record.anomalous {
            self.filtered += 1;
            return Ok(false);
        }

        match &mut self.sink {
            Sink::Csv(csv) => {
                if !self.header_written {
                    csv.write_record(CSV_HEADER)?;
                    self.header_written = true;
                }
                csv.write_record([
                    record.timestamp.to_string(),
                    record.src.to_string(),
                    record.dst.to_string(),
                    record.score.to_string(),
                    record.anomalous.to_string(),
                    record.label.clone().unwrap_or_default(),
                ])?;
            }
            Sink::Jsonl(out) => {
                serde_json::to_writer(&mut *out, record)?;
                out.write_all(b"\n")?;
            }
        }

        self.written += 1;
        Ok(true)
    }

    /// Records written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Records dropped by the anomalies-only filter
    pub fn filtered(&self) -> usize {
        self.filtered
    }

    /// Flush and return the underlying writer
    pub fn finish(self) -> Result<W> {
        match self.sink {
            Sink::Csv(csv) => csv.into_inner().map_err(|e| e.into_error().into()),
            Sink::Jsonl(mut out) => {
                out.flush()?;
                Ok(out)
            }
        }
    }
}

// =============================================================================
// Per-tick summaries
// =============================================================================

/// Aggregate of the events falling into one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSummary {
    /// Bucket index, `floor(timestamp / ticksize)`
    pub tick: i64,
    /// Events in the tick
    pub events: usize,
    /// Events flagged anomalous
    pub anomalies: usize,
    /// Largest score seen in the tick
    pub max_score: f64,
}

impl TickSummary {
    /// Fraction of events flagged anomalous
    pub fn anomaly_rate(&self) -> f64 {
        if self.events == 0 {
            0.0
        } else {
            self.anomalies as f64 / self.events as f64
        }
    }
}

/// Group records by tick, sorted by tick
///
/// Records with a non-finite timestamp are ignored.
pub fn summarize_by_tick<'a>(
    records: impl IntoIterator<Item = &'a ScoreRecord>,
    ticksize: f64,
) -> Vec<TickSummary> {
    let mut ticks: BTreeMap<i64, TickSummary> = BTreeMap::new();

    for record in records {
        if !record.timestamp.is_finite() {
            continue;
        }
        let tick = (record.timestamp / ticksize).floor() as i64;
        let summary = ticks.entry(tick).or_insert(TickSummary {
            tick,
            events: 0,
            anomalies: 0,
            max_score: f64::NEG_INFINITY,
        });
        summary.events += 1;
        if record.anomalous {
            summary.anomalies += 1;
        }
        summary.max_score = summary.max_score.max(record.score);
    }

    ticks.into_values().collect()
}

/// Write tick summaries in `format`
pub fn write_tick_summaries<W: Write>(
    mut out: W,
    summaries: &[TickSummary],
    format: ReportFormat,
) -> Result<()> {
    match format {
        ReportFormat::Csv => {
            let mut csv = csv::Writer::from_writer(&mut out);
            for s in summaries {
                csv.serialize(s)?;
            }
            csv.flush()?;
        }
        ReportFormat::Jsonl => {
            for s in summaries {
                serde_json::to_writer(&mut out, s)?;
                out.write_all(b"\n")?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(t: f64, score: f64, anomalous: bool) -> ScoreRecord {
        ScoreRecord {
            timestamp: t,
            src: NodeId::from("a"),
            dst: NodeId::from(2),
            score,
            anomalous,
            label: None,
        }
    }

    #[test]
    fn test_csv_output() {
        let mut writer = ReportWriter::new(Vec::new(), ReportFormat::Csv);
        writer.write(&scored(1.0, 0.0, false)).unwrap();
        let mut labelled = scored(2.5, 9.5, true);
        labelled.label = Some("scan, fast".to_string());
        writer.write(&labelled).unwrap();

        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(lines[1], "1,a,2,0,false,");
        assert_eq!(lines[2], "2.5,a,2,9.5,true,\"scan, fast\"");
    }

    #[test]
    fn test_jsonl_output_parses_back() {
        let mut writer = ReportWriter::new(Vec::new(), ReportFormat::Jsonl);
        writer.write(&scored(1.0, 4.25, true)).unwrap();
        let bytes = writer.finish().unwrap();

        let line = std::str::from_utf8(&bytes).unwrap().trim_end();
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["src"], "a");
        assert_eq!(value["dst"], 2);
        assert_eq!(value["score"], 4.25);
        assert!(value.get("label").is_none());
    }

    #[test]
    fn test_anomalies_only_filter() {
        let mut writer = ReportWriter::new(Vec::new(), ReportFormat::Jsonl).anomalies_only(true);
        assert!(!writer.write(&scored(1.0, 0.0, false)).unwrap());
        assert!(writer.write(&scored(1.0, 5.0, true)).unwrap());
        assert_eq!(writer.written(), 1);
        assert_eq!(writer.filtered(), 1);
    }

    #[test]
    fn test_summarize_by_tick() {
        let records = vec![
            scored(10.2, 1.0, false),
            scored(3.0, 0.0, false),
            scored(10.9, 7.0, true),
            scored(f64::NAN, 100.0, true),
        ];
        let summaries = summarize_by_tick(&records, 1.0);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].tick, 3);
        assert_eq!(summaries[1].tick, 10);
        assert_eq!(summaries[1].events, 2);
        assert_eq!(summaries[1].anomalies, 1);
        assert_eq!(summaries[1].max_score, 7.0);
        assert_eq!(summaries[1].anomaly_rate(), 0.5);
    }

    #[test]
    fn test_csv_quotes_node_identifiers() {
        let mut record = scored(1.0, 0.5, false);
        record.src = NodeId::from("web,01");
        record.label = Some("say \"hi\"".to_string());
        let mut writer = ReportWriter::new(Vec::new(), ReportFormat::Csv);
        writer.write(&record).unwrap();

        let bytes = writer.finish().unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[1], "web,01");
        assert_eq!(&row[5], "say \"hi\"");
    }

    #[test]
    fn test_tick_summaries_csv() {
        let summaries = summarize_by_tick(&[scored(4.2, 3.0, true)], 1.0);
        let mut out = Vec::new();
        write_tick_summaries(&mut out, &summaries, ReportFormat::Csv).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["tick,events,anomalies,max_score", "4,1,1,3.0"]);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("jsonl".parse::<ReportFormat>().unwrap(), ReportFormat::Jsonl);
        assert!(matches!(
            "xml".parse::<ReportFormat>(),
            Err(ConfigError::InvalidFormat { .. })
        ));
    }
}
