//! Core data types shared by the detector, ingestion and reporting layers
//!
//! # Key Types
//!
//! - **`NodeId`**: identifier of a flow endpoint (integer, IP address or string)
//! - **`FlowRecord`**: a single directed edge event `(timestamp, src, dst, count)`
//!
//! # Example
//!
//! ```rust
//! use kuba_burst::types::{FlowRecord, NodeId};
//!
//! let flow = FlowRecord::new(1_700_000_000.0, "10.0.0.1".parse().unwrap(), NodeId::from(443));
//! assert_eq!(flow.count, 1);
//! assert_eq!(flow.src.to_string(), "10.0.0.1");
//! ```

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Identifier of a flow endpoint
///
/// Variants are distinct key spaces: `Int(1)` and `Str("1")` are different
/// nodes. Parsing from text tries integer, then IP address, then falls back to
/// a plain string, so the same input text always maps to the same variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    /// Numeric identifier (port, host index, AS number...)
    Int(i64),
    /// IPv4 or IPv6 address
    Ip(IpAddr),
    /// Any other textual identifier
    Str(String),
}

impl NodeId {
    /// Classify a raw text identifier
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(n) = raw.parse::<i64>() {
            return NodeId::Int(n);
        }
        if let Ok(ip) = raw.parse::<IpAddr>() {
            return NodeId::Ip(ip);
        }
        NodeId::Str(raw.to_string())
    }
}

impl FromStr for NodeId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(NodeId::parse(s))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Int(n) => write!(f, "{}", n),
            NodeId::Ip(ip) => write!(f, "{}", ip),
            NodeId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for NodeId {
    fn from(n: i64) -> Self {
        NodeId::Int(n)
    }
}

impl From<i32> for NodeId {
    fn from(n: i32) -> Self {
        NodeId::Int(i64::from(n))
    }
}

impl From<u32> for NodeId {
    fn from(n: u32) -> Self {
        NodeId::Int(i64::from(n))
    }
}

impl From<IpAddr> for NodeId {
    fn from(ip: IpAddr) -> Self {
        NodeId::Ip(ip)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId::Str(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId::Str(s)
    }
}

fn default_count() -> u64 {
    1
}

/// A single directed edge event
///
/// This is what the ingestion layer hands to a [`Monitor`](crate::monitor::Monitor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    /// Event time in seconds (any real clock, must be finite)
    pub timestamp: f64,
    /// Source endpoint
    pub src: NodeId,
    /// Destination endpoint
    pub dst: NodeId,
    /// Number of events this record stands for
    #[serde(default = "default_count")]
    pub count: u64,
    /// Optional ground-truth label carried through to reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FlowRecord {
    /// Create a record for a single event
    pub fn new(timestamp: f64, src: NodeId, dst: NodeId) -> Self {
        Self {
            timestamp,
            src,
            dst,
            count: 1,
            label: None,
        }
    }

    /// Set the event multiplicity
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    /// Attach a label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
