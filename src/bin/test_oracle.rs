use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use serde_json::{json, to_string_pretty, Value};
use tokio::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use dcnorm::environment::OracleSettings;
use dcnorm::flatten::{flatten, Context};
use dcnorm::oracle::{parse_extraction, LlmOracle, Oracle};
use dcnorm::record::SourceKind;

/// Sends one facility through the extraction oracle and prints what comes back.
#[derive(Parser, Debug)]
#[command(name = "test_oracle")]
struct Cli {
    /// JSON file holding a single facility object; a built-in sample otherwise
    #[arg(long)]
    input: Option<PathBuf>,

    /// Source the facility came from, used to label errors
    #[arg(long, value_enum, default_value = "map")]
    source: SourceKind,

    #[command(flatten)]
    oracle: OracleSettings,
}

fn sample_facility() -> Value {
    json!({
        "state": "California",
        "city": "Santa Clara",
        "detail_url": "https://www.datacentermap.com/usa/california/santa-clara/sv1/",
        "name": "SV1 Santa Clara",
        "company": "Acme Data",
        "address": "2820 Northwestern Pkwy",
        "zip": "95051",
        "country": "USA",
        "latitude": 37.3741,
        "longitude": -121.9697,
        "url": "https://www.datacentermap.com/usa/california/santa-clara/sv1/"
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let facility = match &cli.input {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => sample_facility(),
    };
    let payload = flatten(cli.source, &Context::new(), &facility)?.to_compact_json();

    let llm_client = cli.oracle.llm_client()?;
    let params = cli.oracle.params_for(&llm_client, &cli.oracle.model);
    let oracle = LlmOracle::new(params, cli.oracle.request_timeout());
    info!(
        "Using model: {} with temperature: {}",
        oracle.model(),
        cli.oracle.temperature
    );

    let start = Instant::now();
    let text = oracle.complete(&payload).await?;
    info!("Oracle answered in {:?}", start.elapsed());

    println!("--- raw response ---\n{}", text);
    match parse_extraction(&text) {
        Ok(fields) => println!("--- extracted fields ---\n{}", to_string_pretty(&fields)?),
        Err(e) => warn!("Response would fall back to empty fields: {}", e),
    }

    Ok(())
}
