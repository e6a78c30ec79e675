use std::sync::OnceLock;
use std::time::Duration;

use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::options::GenerationOptions;
use ollama_rs::generation::parameters::FormatType;
use regex::Regex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::OracleError;
use crate::prompts::EXTRACTION_SYSTEM_PROMPT;
use crate::{LLMClient, LLMParams, TARGET_LLM_REQUEST};

/// Sends one prompt to the configured model and returns the cleaned response
/// text. A single attempt, bounded by `request_timeout`.
pub async fn generate_llm_response(
    prompt: &str,
    params: &LLMParams,
    request_timeout: Duration,
) -> Result<String, OracleError> {
    debug!(target: TARGET_LLM_REQUEST, "Sending LLM request to model {}: {}", params.model, prompt);

    let raw = match &params.llm_client {
        LLMClient::Ollama(ollama) => {
            let options = GenerationOptions::default()
                .temperature(params.temperature)
                .num_predict(params.max_tokens as i32);
            let request = GenerationRequest::new(params.model.clone(), prompt.to_string())
                .system(EXTRACTION_SYSTEM_PROMPT.to_string())
                .options(options)
                .format(FormatType::Json);

            match timeout(request_timeout, ollama.generate(request)).await {
                Ok(Ok(response)) => response.response,
                Ok(Err(e)) => {
                    warn!(target: TARGET_LLM_REQUEST, "Ollama error: {}", e);
                    return Err(OracleError::Unavailable(e.to_string()));
                }
                Err(_) => return Err(OracleError::Timeout(request_timeout.as_secs())),
            }
        }
        LLMClient::OpenAI(client) => {
            let messages: Vec<ChatCompletionRequestMessage> = vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(EXTRACTION_SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| OracleError::Request(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| OracleError::Request(e.to_string()))?
                    .into(),
            ];
            let request = CreateChatCompletionRequestArgs::default()
                .model(params.model.as_str())
                .messages(messages)
                .temperature(params.temperature)
                .max_completion_tokens(params.max_tokens)
                .build()
                .map_err(|e| OracleError::Request(e.to_string()))?;

            match timeout(request_timeout, client.chat().create(request)).await {
                Ok(Ok(response)) => response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .unwrap_or_default(),
                Ok(Err(e)) => {
                    warn!(target: TARGET_LLM_REQUEST, "OpenAI error: {}", e);
                    return Err(OracleError::Unavailable(e.to_string()));
                }
                Err(_) => return Err(OracleError::Timeout(request_timeout.as_secs())),
            }
        }
    };

    debug!(target: TARGET_LLM_REQUEST, "LLM response received: {}", raw);

    let cleaned = clean_response_text(&raw);
    if cleaned.is_empty() {
        return Err(OracleError::EmptyResponse);
    }
    Ok(cleaned)
}

fn thinking_tags() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").ok())
        .as_ref()
}

/// Strips `<think>...</think>` blocks and a surrounding Markdown code fence,
/// then trims.
pub fn clean_response_text(text: &str) -> String {
    let stripped = match thinking_tags() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };
    let trimmed = stripped.trim();

    if let Some(body) = trimmed.strip_prefix("```") {
        if let Some(body) = body.strip_suffix("```") {
            // Drop an info string such as `json` on the opening fence line.
            let body = match body.split_once('\n') {
                Some((info, rest)) if !info.trim_start().starts_with('{') => rest,
                _ => body,
            };
            return body.trim().to_string();
        }
    }
    trimmed.to_string()
}
