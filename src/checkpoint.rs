//! Checkpointed output store.
//!
//! The whole collection lives in memory for the duration of a run and is
//! rewritten in full on every persist. Writes go to a temporary file in the
//! target directory which is then renamed over the previous checkpoint, so
//! the file on disk is always a complete snapshot.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::record::{CanonicalRecord, SourceKind, CSV_HEADER};
use crate::TARGET_CHECKPOINT;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON array
    Json,
    /// CSV with the sixteen-column header
    Csv,
}

impl OutputFormat {
    /// `.csv` selects CSV, anything else JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => OutputFormat::Csv,
            _ => OutputFormat::Json,
        }
    }
}

#[derive(Debug)]
pub struct CheckpointStore {
    source_kind: SourceKind,
    path: PathBuf,
    format: OutputFormat,
    records: Vec<CanonicalRecord>,
    seen: HashSet<String>,
    unsaved: usize,
    on_disk: bool,
}

impl CheckpointStore {
    /// Loads the checkpoint at `path`, or starts an empty one if the file
    /// does not exist. A file that exists but cannot be parsed is fatal.
    pub fn load(source_kind: SourceKind, path: impl Into<PathBuf>, format: OutputFormat) -> Result<Self> {
        let path = path.into();

        let contents = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(PipelineError::Io { path, source: e }),
        };
        let on_disk = contents.is_some();

        let records = match contents {
            None => Vec::new(),
            Some(bytes) => {
                let parsed = match format {
                    OutputFormat::Json => parse_json(&bytes),
                    OutputFormat::Csv => parse_csv(&bytes),
                };
                parsed.map_err(|reason| PipelineError::CorruptCheckpoint {
                    source_kind,
                    path: path.clone(),
                    reason,
                })?
            }
        };

        if let Some(foreign) = records.iter().find(|r| r.source != source_kind) {
            return Err(PipelineError::CorruptCheckpoint {
                source_kind,
                path,
                reason: format!(
                    "record {:?} belongs to {}",
                    foreign.unique_key, foreign.source
                ),
            });
        }

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.unique_key.clone()) {
                warn!(
                    target: TARGET_CHECKPOINT,
                    "Checkpoint {} already contains {} more than once",
                    path.display(),
                    record.unique_key
                );
            }
        }

        info!(
            target: TARGET_CHECKPOINT,
            "Loaded {} {} records from {}",
            records.len(),
            source_kind,
            path.display()
        );

        Ok(Self {
            source_kind,
            path,
            format,
            records,
            seen,
            unsaved: 0,
            on_disk,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends made since the last persist.
    pub fn unsaved(&self) -> usize {
        self.unsaved
    }

    pub fn already_seen(&self, unique_key: &str) -> bool {
        self.seen.contains(unique_key)
    }

    /// Adds a record. Callers must check [`already_seen`](Self::already_seen)
    /// first; appending a known key is a `DuplicateKey` error, and a record
    /// from another source is a `SourceMismatch`.
    pub fn append(&mut self, record: CanonicalRecord) -> Result<()> {
        if record.source != self.source_kind {
            return Err(PipelineError::SourceMismatch {
                expected: self.source_kind,
                found: record.source,
                unique_key: record.unique_key,
            });
        }
        if !self.seen.insert(record.unique_key.clone()) {
            return Err(PipelineError::DuplicateKey(record.unique_key));
        }
        self.records.push(record);
        self.unsaved += 1;
        Ok(())
    }

    /// Writes the entire collection, replacing the previous file.
    pub fn persist(&mut self) -> Result<()> {
        let bytes = match self.format {
            OutputFormat::Json => render_json(&self.records),
            OutputFormat::Csv => render_csv(&self.records),
        }
        .map_err(|e| self.io_error(e))?;

        write_atomic(&self.path, &bytes).map_err(|e| self.io_error(e))?;

        debug!(
            target: TARGET_CHECKPOINT,
            "Persisted {} records to {}",
            self.records.len(),
            self.path.display()
        );
        self.unsaved = 0;
        self.on_disk = true;
        Ok(())
    }

    /// Persists only if there are unsaved appends or no file exists yet.
    pub fn flush(&mut self) -> Result<bool> {
        if self.unsaved == 0 && self.on_disk {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn io_error(&self, source: io::Error) -> PipelineError {
        PipelineError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn parse_json(bytes: &[u8]) -> std::result::Result<Vec<CanonicalRecord>, String> {
    serde_json::from_slice(bytes).map_err(|e| e.to_string())
}

fn parse_csv(bytes: &[u8]) -> std::result::Result<Vec<CanonicalRecord>, String> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new().from_reader(bytes);
    let headers = reader.headers().map_err(|e| e.to_string())?;
    if headers.iter().ne(CSV_HEADER.iter().copied()) {
        return Err(format!(
            "unexpected CSV header: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        ));
    }

    reader
        .deserialize()
        .collect::<std::result::Result<Vec<CanonicalRecord>, csv::Error>>()
        .map_err(|e| e.to_string())
}

fn render_json(records: &[CanonicalRecord]) -> io::Result<Vec<u8>> {
    serde_json::to_vec_pretty(records).map_err(io::Error::from)
}

fn render_csv(records: &[CanonicalRecord]) -> io::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.into_inner().map_err(|e| e.into_error())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    // The temp file is created 0600; keep whatever the checkpoint had.
    if let Ok(existing) = fs::metadata(path) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
