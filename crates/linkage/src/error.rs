use std::fmt;

use serde::Serialize;

use crate::model::{RecordRef, Side, Source};

#[derive(Debug)]
pub enum LinkageError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (negative weight, empty vocabulary, etc.).
    ConfigValidation(String),
    /// Missing required column in canonical input data.
    MissingColumn { source: Source, column: String },
    /// Amount parse error.
    AmountParse { source: Source, record_id: String, value: String },
    /// Call duration parse error.
    DurationParse { source: Source, record_id: String, value: String },
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for LinkageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { source, column } => {
                write!(f, "source '{source}': missing column '{column}'")
            }
            Self::AmountParse { source, record_id, value } => {
                write!(f, "source '{source}', record '{record_id}': cannot parse amount '{value}'")
            }
            Self::DurationParse { source, record_id, value } => {
                write!(f, "source '{source}', record '{record_id}': cannot parse duration '{value}'")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for LinkageError {}

/// Non-fatal conditions met during a run. None of these stop the analysis;
/// the affected record is excluded from the features it cannot feed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No usable key on one side. A missing self key drops the record; a
    /// missing counterparty key keeps it for cash classification only.
    UnresolvedIdentity { record: RecordRef, side: Side },
    /// No cash rule matched; the record is labeled unknown.
    AmbiguousCashClassification { record: RecordRef },
    /// Timestamp present but unparseable; the record still counts toward
    /// amounts and frequencies.
    MalformedTimestamp { record: RecordRef, value: String },
    /// Nothing usable in the input.
    EmptyDataset,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedIdentity { record, side } => {
                write!(f, "record '{record}': no usable {side} identity key")
            }
            Self::AmbiguousCashClassification { record } => {
                write!(f, "record '{record}': no cash rule matched")
            }
            Self::MalformedTimestamp { record, value } => {
                write!(f, "record '{record}': cannot parse timestamp '{value}'")
            }
            Self::EmptyDataset => write!(f, "dataset has no usable records"),
        }
    }
}
