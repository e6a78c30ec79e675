//! # dcnorm
//!
//! Normalizes scraped data center listings from datacentermap, datacenterhawk
//! and datacenters.com into one sixteen-column schema, using an LLM to pull
//! the fields out of each source's own nested JSON.
//!
//! ```text
//! # all three sources, default file names, OpenAI
//! OPENAI_API_KEY=... dcnorm run
//!
//! # only datacenterhawk, through a local Ollama model, as CSV
//! dcnorm run --source hawk --llm ollama --model llama3.1 --format csv
//!
//! # the first 50 facilities of every source through two models
//! dcnorm compare --models "gpt-3.5-turbo;gpt-4"
//! ```
//!
//! Runs are resumable: records already present in the output file are
//! skipped, so an interrupted run is continued by starting it again.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use dcnorm::checkpoint::OutputFormat;
use dcnorm::compare::{compare_models, DEFAULT_COMPARE_LIMIT};
use dcnorm::environment::{get_env_var_as_vec, OracleSettings};
use dcnorm::error::PipelineError;
use dcnorm::logging::configure_logging;
use dcnorm::oracle::{ExtractionClient, LlmOracle};
use dcnorm::pipeline::{run_sources, RunOptions, RunSummary, SourceJob};
use dcnorm::record::SourceKind;

#[derive(Parser, Debug)]
#[command(name = "dcnorm", version, about = "Normalize scraped data center records into one schema")]
struct Cli {
    /// Directory for the daily log file
    #[arg(long, env = "LOG_DIR", default_value = "logs", global = true)]
    log_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize sources into their checkpointed output files
    Run(RunArgs),
    /// Run the same records through several models, one CSV per model
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct InputPaths {
    /// datacentermap document
    #[arg(long)]
    map_input: Option<PathBuf>,
    /// datacenterhawk document
    #[arg(long)]
    hawk_input: Option<PathBuf>,
    /// datacenters.com document
    #[arg(long)]
    centers_input: Option<PathBuf>,
}

impl InputPaths {
    fn input(&self, kind: SourceKind) -> PathBuf {
        let explicit = match kind {
            SourceKind::Map => &self.map_input,
            SourceKind::Hawk => &self.hawk_input,
            SourceKind::Centers => &self.centers_input,
        };
        explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(kind.default_input()))
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Sources to process; all three when omitted
    #[arg(short, long = "source", value_enum)]
    sources: Vec<SourceKind>,

    #[command(flatten)]
    inputs: InputPaths,

    /// datacentermap output
    #[arg(long)]
    map_output: Option<PathBuf>,
    /// datacenterhawk output
    #[arg(long)]
    hawk_output: Option<PathBuf>,
    /// datacenters.com output
    #[arg(long)]
    centers_output: Option<PathBuf>,

    /// Output format; inferred from the output extension when omitted
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Process at most this many new records per source
    #[arg(long)]
    limit: Option<usize>,

    /// Rewrite the checkpoint after this many new records
    #[arg(long, env = "PERSIST_EVERY", default_value_t = 1)]
    persist_every: usize,

    #[command(flatten)]
    oracle: OracleSettings,
}

impl RunArgs {
    fn job(&self, kind: SourceKind) -> SourceJob {
        let explicit = match kind {
            SourceKind::Map => &self.map_output,
            SourceKind::Hawk => &self.hawk_output,
            SourceKind::Centers => &self.centers_output,
        };
        let output = match (explicit, self.format) {
            (Some(path), _) => path.clone(),
            (None, Some(OutputFormat::Csv)) => PathBuf::from(kind.default_output()).with_extension("csv"),
            (None, _) => PathBuf::from(kind.default_output()),
        };

        let mut job = SourceJob::new(kind, self.inputs.input(kind), output);
        if let Some(format) = self.format {
            job.format = format;
        }
        job
    }
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Models to compare, `;`-separated (default: COMPARE_MODELS, else gpt-3.5-turbo;gpt-4)
    #[arg(long, value_delimiter = ';')]
    models: Vec<String>,

    /// Sources to process; all three when omitted
    #[arg(short, long = "source", value_enum)]
    sources: Vec<SourceKind>,

    #[command(flatten)]
    inputs: InputPaths,

    /// Records kept per source and model, across runs
    #[arg(long, default_value_t = DEFAULT_COMPARE_LIMIT)]
    limit: usize,

    /// Directory for the per-model CSV files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    #[command(flatten)]
    oracle: OracleSettings,
}

fn selected(sources: &[SourceKind]) -> Vec<SourceKind> {
    if sources.is_empty() {
        SourceKind::ALL.to_vec()
    } else {
        let mut unique = Vec::new();
        for kind in sources {
            if !unique.contains(kind) {
                unique.push(*kind);
            }
        }
        unique
    }
}

fn report(kind: SourceKind, model: Option<&str>, result: &Result<RunSummary, PipelineError>) -> bool {
    let label = match model {
        Some(model) => format!("{} [{}]", kind, model),
        None => kind.to_string(),
    };
    match result {
        Ok(summary) => {
            info!(
                "{}: {} records total, {} new, {} skipped, {} fallbacks, {} malformed",
                label, summary.total, summary.appended, summary.skipped, summary.fallbacks, summary.malformed
            );
            true
        }
        Err(e) => {
            error!("{}: {}", label, e);
            false
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let llm_client = args.oracle.llm_client()?;
    let params = args.oracle.params_for(&llm_client, &args.oracle.model);
    let oracle = Arc::new(LlmOracle::new(params, args.oracle.request_timeout()));
    let client = ExtractionClient::new(oracle, args.oracle.pace());

    let jobs: Vec<SourceJob> = selected(&args.sources).into_iter().map(|k| args.job(k)).collect();
    let options = RunOptions {
        limit: args.limit,
        persist_every: args.persist_every,
        ..RunOptions::default()
    };

    let results = run_sources(jobs, client, options).await;
    let failed = results
        .iter()
        .filter(|(job, result)| !report(job.kind, None, result))
        .count();
    if failed > 0 {
        bail!("{} of {} sources failed", failed, results.len());
    }
    Ok(())
}

async fn compare(args: CompareArgs) -> Result<()> {
    let mut models = args.models.clone();
    if models.is_empty() {
        models = get_env_var_as_vec("COMPARE_MODELS", ';');
    }
    if models.is_empty() {
        models = vec!["gpt-3.5-turbo".to_string(), "gpt-4".to_string()];
    }

    let llm_client = args.oracle.llm_client()?;
    let clients: Vec<ExtractionClient> = models
        .iter()
        .map(|model| {
            let params = args.oracle.params_for(&llm_client, model);
            let oracle = Arc::new(LlmOracle::new(params, args.oracle.request_timeout()));
            ExtractionClient::new(oracle, args.oracle.pace())
        })
        .collect();

    let inputs: Vec<(SourceKind, PathBuf)> = selected(&args.sources)
        .into_iter()
        .map(|kind| (kind, args.inputs.input(kind)))
        .collect();

    let runs = compare_models(clients, &inputs, &args.out_dir, args.limit).await;
    let failed = runs
        .iter()
        .filter(|run| !report(run.job.kind, Some(&run.model), &run.result))
        .count();
    if failed > 0 {
        bail!("{} of {} comparison runs failed", failed, runs.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = configure_logging(&cli.log_dir);

    let outcome = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Compare(args) => compare(args).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
