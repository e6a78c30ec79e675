//! Side-by-side model comparison.
//!
//! Runs the same sources through several models, each into its own CSV
//! checkpoint named after the dataset and model, capped at a small number of
//! records so the outputs can be diffed by hand.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::checkpoint::OutputFormat;
use crate::error::Result;
use crate::oracle::ExtractionClient;
use crate::pipeline::{run_sources, RunOptions, RunSummary, SourceJob};
use crate::record::SourceKind;
use crate::TARGET_PIPELINE;

pub const DEFAULT_COMPARE_LIMIT: usize = 50;

pub struct ComparisonRun {
    pub model: String,
    pub job: SourceJob,
    pub result: Result<RunSummary>,
}

/// Makes a model name safe to embed in a file name (`llama3.1:8b` ->
/// `llama3.1_8b`).
pub fn sanitize_model_name(model: &str) -> String {
    model
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn comparison_output(out_dir: &Path, kind: SourceKind, model: &str) -> PathBuf {
    out_dir.join(format!(
        "{}_extracted_{}.csv",
        kind.dataset(),
        sanitize_model_name(model)
    ))
}

/// Runs every source once per model, filling each model's CSV up to `limit`
/// records. Models are processed one after the other; the sources of a
/// single model run side by side.
pub async fn compare_models(
    clients: Vec<ExtractionClient>,
    inputs: &[(SourceKind, PathBuf)],
    out_dir: &Path,
    limit: usize,
) -> Vec<ComparisonRun> {
    // The per-model files are resumable, so the cap is on their size.
    let options = RunOptions {
        max_total: Some(limit),
        ..RunOptions::default()
    };

    let mut runs = Vec::new();
    for client in clients {
        let model = client.model().to_string();
        info!(target: TARGET_PIPELINE, "=== Testing with model: {} ===", model);

        let jobs: Vec<SourceJob> = inputs
            .iter()
            .map(|(kind, input)| SourceJob {
                kind: *kind,
                input: input.clone(),
                output: comparison_output(out_dir, *kind, &model),
                format: OutputFormat::Csv,
            })
            .collect();

        for (job, result) in run_sources(jobs, client, options).await {
            runs.push(ComparisonRun {
                model: model.clone(),
                job,
                result,
            });
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::checkpoint::CheckpointStore;
    use crate::error::OracleError;
    use crate::oracle::testing::response;
    use crate::oracle::Oracle;

    struct NamedOracle(&'static str);

    #[async_trait]
    impl Oracle for NamedOracle {
        fn model(&self) -> &str {
            self.0
        }

        async fn complete(&self, _facility_json: &str) -> std::result::Result<String, OracleError> {
            response(self.0, "").map_err(OracleError::Unavailable)
        }
    }

    #[test]
    fn test_sanitize_model_name() {
        assert_eq!(sanitize_model_name("gpt-3.5-turbo"), "gpt-3.5-turbo");
        assert_eq!(sanitize_model_name("llama3.1:8b"), "llama3.1_8b");
        assert_eq!(sanitize_model_name("org/model name"), "org_model_name");
    }

    #[test]
    fn test_comparison_output_name() {
        let path = comparison_output(Path::new("out"), SourceKind::Centers, "gpt-4");
        assert_eq!(path, Path::new("out").join("datacenters_extracted_gpt-4.csv"));
    }

    #[tokio::test]
    async fn test_each_model_gets_its_own_capped_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = serde_json::Map::new();
        for i in 0..5 {
            doc.insert(format!("fac_{}", i), json!({"Name": format!("F{}", i)}));
        }
        let input = dir.path().join("centers_final.json");
        fs::write(&input, serde_json::to_string(&doc).unwrap()).unwrap();

        let clients = vec![
            ExtractionClient::new(Arc::new(NamedOracle("model-a")), Duration::ZERO),
            ExtractionClient::new(Arc::new(NamedOracle("model-b")), Duration::ZERO),
        ];
        let runs = compare_models(clients, &[(SourceKind::Centers, input)], dir.path(), 3).await;
        assert_eq!(runs.len(), 2);

        for run in &runs {
            assert_eq!(run.result.as_ref().unwrap().total, 3);
            let store = CheckpointStore::load(SourceKind::Centers, &run.job.output, OutputFormat::Csv).unwrap();
            assert!(store.records().iter().all(|r| r.name == run.model));
        }
        assert!(dir.path().join("datacenters_extracted_model-a.csv").exists());
        assert!(dir.path().join("datacenters_extracted_model-b.csv").exists());
    }

    #[tokio::test]
    async fn test_rerun_does_not_grow_capped_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = serde_json::Map::new();
        for i in 0..10 {
            doc.insert(format!("fac_{}", i), json!({"Name": format!("F{}", i)}));
        }
        let input = dir.path().join("centers_final.json");
        fs::write(&input, serde_json::to_string(&doc).unwrap()).unwrap();
        let inputs = [(SourceKind::Centers, input)];

        for _ in 0..2 {
            let clients = vec![ExtractionClient::new(Arc::new(NamedOracle("model-a")), Duration::ZERO)];
            let runs = compare_models(clients, &inputs, dir.path(), 3).await;
            assert_eq!(runs[0].result.as_ref().unwrap().total, 3);
        }

        let output = comparison_output(dir.path(), SourceKind::Centers, "model-a");
        let store = CheckpointStore::load(SourceKind::Centers, &output, OutputFormat::Csv).unwrap();
        assert_eq!(store.len(), 3);
    }
}
