//! Error types for the normalization pipeline.
//!
//! Per-record failures (`MalformedRecord`, `Oracle`) are recovered inside the
//! record loop. Per-run failures (`CorruptCheckpoint`, `CorruptSourceDocument`)
//! stop the run before anything is written. `SharedOutput` stops a source
//! before it starts.

use std::path::PathBuf;

use thiserror::Error;

use crate::record::SourceKind;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("malformed {source_kind} record: expected a JSON object, found {found}")]
    MalformedRecord {
        source_kind: SourceKind,
        found: &'static str,
    },

    #[error("oracle failure: {0}")]
    Oracle(#[from] OracleError),

    #[error("duplicate unique_key {0:?} appended to checkpoint")]
    DuplicateKey(String),

    #[error("corrupt checkpoint for {source_kind} at {}: {reason}", path.display())]
    CorruptCheckpoint {
        source_kind: SourceKind,
        path: PathBuf,
        reason: String,
    },

    #[error("corrupt source document for {source_kind} at {}: {reason}", path.display())]
    CorruptSourceDocument {
        source_kind: SourceKind,
        path: PathBuf,
        reason: String,
    },

    #[error("{found} record {unique_key:?} does not belong in the {expected} checkpoint")]
    SourceMismatch {
        expected: SourceKind,
        found: SourceKind,
        unique_key: String,
    },

    #[error("output {} is shared by {first} and {second}", path.display())]
    SharedOutput {
        path: PathBuf,
        first: SourceKind,
        second: SourceKind,
    },

    #[error("{source_kind} task failed: {reason}")]
    TaskFailed {
        source_kind: SourceKind,
        reason: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything that can go wrong between handing a record to the oracle and
/// holding a parsed field mapping. None of these escape the oracle client.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle request timed out after {0} seconds")]
    Timeout(u64),

    #[error("oracle returned an empty response")]
    EmptyResponse,

    #[error("oracle response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("oracle response is missing field {0:?}")]
    MissingField(&'static str),

    #[error("oracle response has the wrong shape: {0}")]
    InvalidShape(String),

    #[error("could not build oracle request: {0}")]
    Request(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
