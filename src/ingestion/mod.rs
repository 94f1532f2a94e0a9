//! Flow ingestion
//!
//! # Architecture
//!
//! ```text
//! [flow table] → [FlowTableReader] → [FlowReplayer] → [Monitor]
//!                  parse + validate     skip / limit / pace
//! ```
//!
//! # Example
//!
//! ```rust
//! use kuba_burst::ingestion::{FlowReplayer, FlowTableReader, ReplayConfig, TableConfig};
//! use std::io::Cursor;
//!
//! let table = "timestamp,src,dst\n1,10.0.0.1,10.0.0.2\n2,10.0.0.1,10.0.0.3\n";
//! let reader = FlowTableReader::new(Cursor::new(table), TableConfig::default());
//! let replayer = FlowReplayer::new(reader, ReplayConfig::default().with_limit(1));
//!
//! let records: Vec<_> = replayer.collect::<Result<_, _>>().unwrap();
//! assert_eq!(records.len(), 1);
//! ```

pub mod replay;
pub mod table;

pub use replay::{FlowReplayer, ReplayConfig};
pub use table::{parse_fields, FlowTableReader, HeaderMode, TableConfig};
