use std::env;
use std::time::Duration;

use anyhow::{bail, Result};
use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use clap::{Args, ValueEnum};
use ollama_rs::Ollama;
use tracing::info;

use crate::oracle::{DEFAULT_PACE, DEFAULT_REQUEST_TIMEOUT};
use crate::{LLMClient, LLMParams};

/// Retrieves an environment variable and splits it into a vector of strings based on a delimiter.
///
/// # Arguments
/// - `var`: The name of the environment variable.
/// - `delimiter`: The character to split the environment variable's value by.
///
/// # Returns
/// - `Vec<String>`, empty entries removed
pub fn get_env_var_as_vec(var: &str, delimiter: char) -> Vec<String> {
    env::var(var)
        .unwrap_or_default()
        .split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LlmType {
    Ollama,
    Openai,
}

/// Oracle wiring shared by every binary. Each flag can also be set through
/// its environment variable.
#[derive(Args, Clone, Debug)]
pub struct OracleSettings {
    /// Which model server to talk to
    #[arg(long = "llm", env = "LLM_TYPE", value_enum, default_value = "openai")]
    pub llm_type: LlmType,

    /// Model name
    #[arg(long, env = "LLM_MODEL", default_value = "gpt-3.5-turbo")]
    pub model: String,

    /// Sampling temperature
    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = 0.0)]
    pub temperature: f32,

    /// Upper bound on generated tokens
    #[arg(long, env = "LLM_MAX_TOKENS", default_value_t = 300)]
    pub max_tokens: u32,

    /// Ollama host name or URL
    #[arg(long, env = "OLLAMA_HOST", default_value = "localhost")]
    pub ollama_host: String,

    /// Ollama port
    #[arg(long, env = "OLLAMA_PORT", default_value_t = 11434)]
    pub ollama_port: u16,

    /// OpenAI API key, required with `--llm openai`
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Delay after every oracle call, in milliseconds
    #[arg(long, env = "ORACLE_PACE_MS", default_value_t = DEFAULT_PACE.as_millis() as u64)]
    pub pace_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, env = "ORACLE_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    pub timeout_secs: u64,
}

impl OracleSettings {
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds the client for the configured server.
    pub fn llm_client(&self) -> Result<LLMClient> {
        match self.llm_type {
            LlmType::Openai => {
                let Some(api_key) = self.openai_api_key.as_deref().filter(|k| !k.is_empty()) else {
                    bail!("OPENAI_API_KEY must be set when using the openai oracle");
                };
                let config = OpenAIConfig::new().with_api_key(api_key);
                Ok(LLMClient::OpenAI(OpenAIClient::with_config(config)))
            }
            LlmType::Ollama => {
                let base_url = if self.ollama_host.starts_with("http://")
                    || self.ollama_host.starts_with("https://")
                {
                    self.ollama_host.clone()
                } else {
                    format!("http://{}", self.ollama_host)
                };
                info!("Connecting to Ollama at {}:{}", base_url, self.ollama_port);
                Ok(LLMClient::Ollama(Ollama::new(base_url, self.ollama_port)))
            }
        }
    }

    /// Parameters for `model`, sharing one client.
    pub fn params_for(&self, llm_client: &LLMClient, model: &str) -> LLMParams {
        LLMParams {
            llm_client: llm_client.clone(),
            model: model.to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}
