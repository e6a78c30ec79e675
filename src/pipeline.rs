//! Per-source normalization loop.
//!
//! Loading -> Iterating -> (Deriving -> Extracting -> Appending)* -> Done.
//! A bad record or a failed oracle call never stops the loop; only an
//! unreadable source document, a corrupt checkpoint or a failed write does.

use std::fs;
use std::path::{self, Path, PathBuf};

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointStore, OutputFormat};
use crate::error::{PipelineError, Result};
use crate::oracle::{Extraction, ExtractionClient};
use crate::record::{json_kind, CanonicalRecord, SourceKind};
use crate::source::{adapter_for, SourceAdapter};
use crate::TARGET_PIPELINE;

#[derive(Clone, Copy, Debug)]
pub struct RunOptions {
    /// Stop after this many new records.
    pub limit: Option<usize>,
    /// Stop once the checkpoint holds this many records, counting those
    /// loaded from earlier runs.
    pub max_total: Option<usize>,
    /// Persist after this many appends. The end of the run always flushes.
    pub persist_every: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limit: None,
            max_total: None,
            persist_every: 1,
        }
    }
}

/// One source to process: where to read and where to checkpoint.
#[derive(Clone, Debug)]
pub struct SourceJob {
    pub kind: SourceKind,
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
}

impl SourceJob {
    /// Job with the format inferred from the output extension.
    pub fn new(kind: SourceKind, input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let output = output.into();
        let format = OutputFormat::from_path(&output);
        Self {
            kind,
            input: input.into(),
            output,
            format,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Records in the checkpoint at the end of the run.
    pub total: usize,
    pub appended: usize,
    pub skipped: usize,
    pub fallbacks: usize,
    pub malformed: usize,
}

/// Reads and parses a raw source document. The document must be a JSON
/// object.
pub fn load_document(source_kind: SourceKind, path: &Path) -> Result<Value> {
    let corrupt = |reason: String| PipelineError::CorruptSourceDocument {
        source_kind,
        path: path.to_path_buf(),
        reason,
    };

    let text = fs::read_to_string(path).map_err(|e| corrupt(e.to_string()))?;
    let document: Value = serde_json::from_str(&text).map_err(|e| corrupt(e.to_string()))?;
    if !document.is_object() {
        return Err(corrupt(format!(
            "expected a JSON object at the top level, found {}",
            json_kind(&document)
        )));
    }
    Ok(document)
}

/// Runs one source end to end: parse the document, load the checkpoint,
/// process every unseen record.
pub async fn run_source(
    job: &SourceJob,
    client: &ExtractionClient,
    options: RunOptions,
) -> Result<RunSummary> {
    let adapter = adapter_for(job.kind);
    info!(
        target: TARGET_PIPELINE,
        "Processing {} from {} into {}",
        job.kind,
        job.input.display(),
        job.output.display()
    );

    let document = load_document(job.kind, &job.input)?;
    let mut store = CheckpointStore::load(job.kind, &job.output, job.format)?;
    process_document(adapter.as_ref(), &document, &mut store, client, options).await
}

/// The record loop over an already parsed document.
pub async fn process_document(
    adapter: &dyn SourceAdapter,
    document: &Value,
    store: &mut CheckpointStore,
    client: &ExtractionClient,
    options: RunOptions,
) -> Result<RunSummary> {
    let persist_every = options.persist_every.max(1);
    let mut summary = RunSummary::default();

    for unit in adapter.records(document) {
        if options.limit.is_some_and(|limit| summary.appended >= limit) {
            info!(target: TARGET_PIPELINE, "Reached limit of {} new {} records", summary.appended, adapter.kind());
            break;
        }
        if options.max_total.is_some_and(|max| store.len() >= max) {
            info!(target: TARGET_PIPELINE, "Checkpoint {} is full at {} records", store.path().display(), store.len());
            break;
        }

        let unique_key = adapter.derive_key(&unit);
        if store.already_seen(&unique_key) {
            debug!(target: TARGET_PIPELINE, "Skipping already processed {}", unique_key);
            summary.skipped += 1;
            continue;
        }

        let extraction = match adapter.flatten(&unit) {
            Ok(input) => client.extract(&input).await,
            Err(e) => {
                warn!(target: TARGET_PIPELINE, "{} ({}), using empty fields", e, unique_key);
                summary.malformed += 1;
                Extraction::fallback()
            }
        };
        if extraction.is_fallback() {
            summary.fallbacks += 1;
        }

        let record = CanonicalRecord::assemble(
            unique_key.clone(),
            adapter.kind(),
            extraction.into_fields(),
            &adapter.raw_url(&unit),
        );
        store.append(record)?;
        summary.appended += 1;
        info!(target: TARGET_PIPELINE, "Processed {}", unique_key);

        if store.unsaved() >= persist_every {
            store.persist()?;
        }
    }

    store.flush()?;
    summary.total = store.len();
    info!(
        target: TARGET_PIPELINE,
        "Finished processing {}. Total records: {} ({} new, {} skipped, {} fallbacks)",
        adapter.kind(),
        summary.total,
        summary.appended,
        summary.skipped,
        summary.fallbacks
    );
    Ok(summary)
}

/// Runs independent sources concurrently, one task per source. Each job
/// must own its output path: jobs that share one are never started and
/// fail with `SharedOutput`. Records within one source are still processed
/// one at a time.
pub async fn run_sources(
    jobs: Vec<SourceJob>,
    client: ExtractionClient,
    options: RunOptions,
) -> Vec<(SourceJob, Result<RunSummary>)> {
    let conflicts = shared_outputs(&jobs);

    let mut handles = Vec::with_capacity(jobs.len());
    for (job, conflict) in jobs.iter().zip(conflicts) {
        let job = job.clone();
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            match conflict {
                Some(e) => Err(e),
                None => run_source(&job, &client, options).await,
            }
        }));
    }

    let joined = join_all(handles).await;
    jobs.into_iter()
        .zip(joined)
        .map(|(job, joined)| {
            let result = joined.unwrap_or_else(|e| {
                Err(PipelineError::TaskFailed {
                    source_kind: job.kind,
                    reason: e.to_string(),
                })
            });
            (job, result)
        })
        .collect()
}

/// For each job, the conflict with another job writing the same output, if
/// any.
fn shared_outputs(jobs: &[SourceJob]) -> Vec<Option<PipelineError>> {
    let outputs: Vec<PathBuf> = jobs
        .iter()
        .map(|job| path::absolute(&job.output).unwrap_or_else(|_| job.output.clone()))
        .collect();

    (0..jobs.len())
        .map(|i| {
            let j = (0..jobs.len()).find(|&j| j != i && outputs[j] == outputs[i])?;
            let (first, second) = if i < j { (i, j) } else { (j, i) };
            Some(PipelineError::SharedOutput {
                path: jobs[i].output.clone(),
                first: jobs[first].kind,
                second: jobs[second].kind,
            })
        })
        .collect()
}
