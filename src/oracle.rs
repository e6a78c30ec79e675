//! Extraction oracle client.
//!
//! The oracle is anything that turns a facility's JSON text into response
//! text. [`ExtractionClient`] wraps it with the fixed pacing delay and the
//! fallback policy: whatever happens upstream, callers get a complete
//! [`CanonicalFields`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::OracleError;
use crate::flatten::FlattenedInput;
use crate::llm::generate_llm_response;
use crate::prompts::facility_extraction_prompt;
use crate::record::CanonicalFields;
use crate::{LLMParams, TARGET_LLM_REQUEST};

pub const DEFAULT_PACE: Duration = Duration::from_millis(500);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Human-readable identity, used in logs and output file names.
    fn model(&self) -> &str;

    /// Returns the raw response text for one compact-JSON facility payload.
    async fn complete(&self, facility_json: &str) -> Result<String, OracleError>;
}

/// Oracle backed by an Ollama or OpenAI model.
pub struct LlmOracle {
    params: LLMParams,
    request_timeout: Duration,
}

impl LlmOracle {
    pub fn new(params: LLMParams, request_timeout: Duration) -> Self {
        Self {
            params,
            request_timeout,
        }
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    fn model(&self) -> &str {
        &self.params.model
    }

    async fn complete(&self, facility_json: &str) -> Result<String, OracleError> {
        let prompt = facility_extraction_prompt(facility_json);
        generate_llm_response(&prompt, &self.params, self.request_timeout).await
    }
}

/// Result at the client boundary. Both arms carry a well-formed mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Extraction {
    Extracted(CanonicalFields),
    Fallback(CanonicalFields),
}

impl Extraction {
    pub fn fallback() -> Self {
        Extraction::Fallback(CanonicalFields::empty())
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Extraction::Fallback(_))
    }

    pub fn into_fields(self) -> CanonicalFields {
        match self {
            Extraction::Extracted(fields) | Extraction::Fallback(fields) => fields,
        }
    }
}

/// Parses oracle response text into the canonical mapping.
pub fn parse_extraction(text: &str) -> Result<CanonicalFields, OracleError> {
    if text.trim().is_empty() {
        return Err(OracleError::EmptyResponse);
    }
    let value: Value = serde_json::from_str(text)?;
    CanonicalFields::from_oracle_value(&value)
}

#[derive(Clone)]
pub struct ExtractionClient {
    oracle: Arc<dyn Oracle>,
    pace: Duration,
}

impl ExtractionClient {
    pub fn new(oracle: Arc<dyn Oracle>, pace: Duration) -> Self {
        Self { oracle, pace }
    }

    pub fn model(&self) -> &str {
        self.oracle.model()
    }

    /// Sends `input` to the oracle. Never fails: any error is logged and
    /// replaced by the all-empty fallback. Sleeps for the pacing delay after
    /// every call, whatever the outcome.
    pub async fn extract(&self, input: &FlattenedInput) -> Extraction {
        let payload = input.to_compact_json();
        let outcome = match self.oracle.complete(&payload).await {
            Ok(text) => parse_extraction(&text),
            Err(e) => Err(e),
        };

        if !self.pace.is_zero() {
            sleep(self.pace).await;
        }

        match outcome {
            Ok(fields) => {
                debug!(target: TARGET_LLM_REQUEST, "Extracted fields for {}: {:?}", self.model(), fields);
                Extraction::Extracted(fields)
            }
            Err(e) => {
                warn!(target: TARGET_LLM_REQUEST, "Error during extraction with {}: {}", self.model(), e);
                Extraction::fallback()
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::flatten::{flatten, Context};
    use crate::record::SourceKind;
    use serde_json::json;

    fn input() -> FlattenedInput {
        flatten(SourceKind::Centers, &Context::new(), &json!({"Name": "F1"})).unwrap()
    }

    fn client(oracle: ScriptedOracle) -> (Arc<ScriptedOracle>, ExtractionClient) {
        let oracle = Arc::new(oracle);
        let client = ExtractionClient::new(oracle.clone(), Duration::ZERO);
        (oracle, client)
    }

    #[tokio::test]
    async fn test_extract_success() {
        let (oracle, client) = client(ScriptedOracle::always(response("F1", "https://f1")));
        let extraction = client.extract(&input()).await;
        assert!(!extraction.is_fallback());
        let fields = extraction.into_fields();
        assert_eq!(fields.name, "F1");
        assert_eq!(fields.url, "https://f1");
        assert_eq!(oracle.payloads.lock().unwrap()[0], r#"{"Name":"F1"}"#);
    }

    #[tokio::test]
    async fn test_fallback_on_every_malformed_response() {
        let malformed = vec![
            Ok("not json at all".to_string()),
            Ok(String::new()),
            Ok("{\"Name\": \"F1\"}".to_string()),
            Ok("[1, 2, 3]".to_string()),
            Ok("{\"Name\": ".to_string()),
            Err("connection refused".to_string()),
        ];
        let count = malformed.len();
        let (_, client) = client(ScriptedOracle::new(malformed));
        for _ in 0..count {
            let extraction = client.extract(&input()).await;
            assert_eq!(extraction, Extraction::fallback());
            assert!(extraction.into_fields().is_empty());
        }
    }

    #[tokio::test]
    async fn test_pacing_applies_after_failures_too() {
        let oracle = Arc::new(ScriptedOracle::always(Err("down".to_string())));
        let client = ExtractionClient::new(oracle, Duration::from_millis(40));
        let start = tokio::time::Instant::now();
        client.extract(&input()).await;
        client.extract(&input()).await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn test_parse_extraction_errors() {
        assert!(matches!(parse_extraction("  "), Err(OracleError::EmptyResponse)));
        assert!(matches!(parse_extraction("nope"), Err(OracleError::InvalidJson(_))));
        assert!(matches!(
            parse_extraction("{}"),
            Err(OracleError::MissingField("Name"))
        ));
    }
}
