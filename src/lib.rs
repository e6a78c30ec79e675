pub mod checkpoint;
pub mod compare;
pub mod environment;
pub mod error;
pub mod flatten;
pub mod key;
pub mod llm;
pub mod logging;
pub mod oracle;
pub mod pipeline;
pub mod prompts;
pub mod record;
pub mod source;

use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use ollama_rs::Ollama;

pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_CHECKPOINT: &str = "checkpoint";
pub const TARGET_PIPELINE: &str = "pipeline";

#[derive(Clone, Debug)]
pub enum LLMClient {
    Ollama(Ollama),
    OpenAI(OpenAIClient<OpenAIConfig>),
}

#[derive(Clone, Debug)]
pub struct LLMParams {
    pub llm_client: LLMClient,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}
