//! Integration tests for flow ingestion, scoring and reports
//!
//! Drives the full pipeline: flow table on disk -> reader -> replayer ->
//! monitor -> report writer.

use std::io::Write;

use kuba_burst::config::Config;
use kuba_burst::error::{Error, IngestionError};
use kuba_burst::ingestion::{FlowReplayer, FlowTableReader, ReplayConfig, TableConfig};
use kuba_burst::monitor::Monitor;
use kuba_burst::report::{summarize_by_tick, ReportFormat, ReportWriter, ScoreRecord};
use kuba_burst::types::NodeId;
use tempfile::{NamedTempFile, TempDir};

// ============================================================================
// Helper Functions
// ============================================================================

/// Write a flow table with one quiet tick and a labelled burst
fn write_table(delimiter: char) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    let d = delimiter;
    writeln!(file, "# synthetic capture").unwrap();
    writeln!(file, "timestamp{d}src{d}dst{d}label").unwrap();
    writeln!(file, "1000.0{d}192.168.1.10{d}192.168.1.1{d}benign").unwrap();
    writeln!(file, "1000.4{d}192.168.1.11{d}192.168.1.1{d}benign").unwrap();
    for _ in 0..150 {
        writeln!(file, "1001.0{d}192.168.1.66{d}192.168.1.1{d}attack").unwrap();
    }
    file.flush().unwrap();
    file
}

fn score_all(config: &Config, table: &NamedTempFile) -> Vec<ScoreRecord> {
    let mut monitor = config.detector.kind.build(&config.detector).unwrap();
    let reader = FlowTableReader::open(table.path(), config.ingestion.table_config()).unwrap();
    FlowReplayer::new(reader, config.ingestion.replay_config())
        .map(|record| {
            let record = record.unwrap();
            let (score, anomalous) = monitor.evaluate(&record).unwrap();
            ScoreRecord::from_flow(&record, score, anomalous)
        })
        .collect()
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn test_table_to_scores() {
    let table = write_table(',');
    let scores = score_all(&Config::default(), &table);

    assert_eq!(scores.len(), 152);
    assert_eq!(scores[0].src, NodeId::parse("192.168.1.10"));
    assert!(!scores[0].anomalous);
    assert!(!scores[1].anomalous);

    let last = scores.last().unwrap();
    assert_eq!(last.label.as_deref(), Some("attack"));
    assert!(last.anomalous);

    let flagged_benign = scores
        .iter()
        .filter(|s| s.anomalous && s.label.as_deref() == Some("benign"))
        .count();
    assert_eq!(flagged_benign, 0);
}

#[test]
fn test_tab_delimited_table_from_config() {
    let table = write_table('\t');
    let config: Config = toml::from_str("[ingestion]\ndelimiter = \"\\t\"\nlimit = 10\n").unwrap();
    let scores = score_all(&config, &table);
    assert_eq!(scores.len(), 10);
}

#[test]
fn test_skip_drops_leading_records() {
    let table = write_table(',');
    let mut config = Config::default();
    config.ingestion.skip = 2;
    let scores = score_all(&config, &table);

    assert_eq!(scores.len(), 150);
    assert!(scores.iter().all(|s| s.label.as_deref() == Some("attack")));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result = FlowTableReader::open(dir.path().join("absent.csv"), TableConfig::default());
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_malformed_lines_strict_and_lenient() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "1,a,b").unwrap();
    writeln!(file, "oops,a,b").unwrap();
    writeln!(file, "2,a").unwrap();
    writeln!(file, "3,a,b").unwrap();
    file.flush().unwrap();

    let reader = FlowTableReader::open(file.path(), TableConfig::default()).unwrap();
    let strict: Vec<_> = FlowReplayer::new(reader, ReplayConfig::default()).collect();
    assert_eq!(strict.len(), 4);
    assert!(matches!(
        strict[1],
        Err(Error::Ingestion(IngestionError::InvalidTimestamp { line: 2, .. }))
    ));
    assert!(matches!(
        strict[2],
        Err(Error::Ingestion(IngestionError::MissingField { line: 3, field: "dst" }))
    ));

    let reader = FlowTableReader::open(file.path(), TableConfig::default()).unwrap();
    let mut lenient = FlowReplayer::new(reader, ReplayConfig::default().lenient());
    let timestamps: Vec<f64> = lenient.by_ref().map(|r| r.unwrap().timestamp).collect();
    assert_eq!(timestamps, vec![1.0, 3.0]);
    assert_eq!(lenient.malformed(), 2);
}

// ============================================================================
// Reports
// ============================================================================

#[test]
fn test_report_file_round_trip() {
    let table = write_table(',');
    let scores = score_all(&Config::default(), &table);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scores.jsonl");
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ReportWriter::new(file, ReportFormat::Jsonl).anomalies_only(true);
    for score in &scores {
        writer.write(score).unwrap();
    }
    let written = writer.written();
    writer.finish().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let parsed: Vec<ScoreRecord> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(parsed.len(), written);
    assert!(!parsed.is_empty());
    assert!(parsed.iter().all(|r| r.anomalous));
    assert_eq!(parsed[0].src, NodeId::parse("192.168.1.66"));
}

#[test]
fn test_quoted_nodes_survive_csv_report() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "abc,a,b").unwrap();
    writeln!(file, "1,\"web,01\",db,\"scan, fast\"").unwrap();
    writeln!(file, "2,\"web,01\",db,").unwrap();
    file.flush().unwrap();

    let reader = FlowTableReader::open(file.path(), TableConfig::default()).unwrap();
    let results: Vec<_> = reader.collect();
    assert!(matches!(
        results[0],
        Err(Error::Ingestion(IngestionError::InvalidTimestamp { line: 1, .. }))
    ));

    let mut writer = ReportWriter::new(Vec::new(), ReportFormat::Csv);
    for record in results.into_iter().skip(1) {
        let record = record.unwrap();
        assert_eq!(record.src, NodeId::from("web,01"));
        writer.write(&ScoreRecord::from_flow(&record, 0.0, false)).unwrap();
    }
    let bytes = writer.finish().unwrap();

    let mut report = csv::Reader::from_reader(bytes.as_slice());
    let rows: Vec<csv::StringRecord> = report.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][1], "web,01");
    assert_eq!(&rows[0][5], "scan, fast");
    assert_eq!(&rows[1][5], "");
}

#[test]
fn test_tick_summaries_for_replay() {
    let table = write_table(',');
    let scores = score_all(&Config::default(), &table);
    let summaries = summarize_by_tick(&scores, 1.0);

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].tick, 1000);
    assert_eq!(summaries[0].events, 2);
    assert_eq!(summaries[0].anomalies, 0);
    assert_eq!(summaries[1].tick, 1001);
    assert_eq!(summaries[1].events, 150);
    assert!(summaries[1].anomalies > 100);
    assert!(summaries[1].max_score > summaries[0].max_score);
}

#[test]
fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("burst.toml");

    let mut config = Config::default();
    config.detector.midas.alpha = 0.01;
    config.ingestion.speed = Some(20.0);
    config.report.format = ReportFormat::Jsonl;
    config.save_to_file(&path).unwrap();

    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded, config);
}
