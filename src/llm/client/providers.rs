//! LLM Provider支持模块

use rig::{
    agent::Agent,
    client::CompletionClient,
    completion::Prompt,
    extractor::Extractor,
    providers::gemini::completion::gemini_api_types::{AdditionalParameters, GenerationConfig},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ModelError};
use crate::llm::provider::ProviderConfig;

/// 统一的Provider客户端枚举
#[derive(Clone)]
pub enum ProviderClient {
    Ollama(rig::providers::ollama::Client),
    Groq(rig::providers::groq::Client),
    Gemini(rig::providers::gemini::Client),
    OpenRouter(rig::providers::openrouter::Client),
}

impl ProviderClient {
    /// 根据配置创建相应的provider客户端
    pub fn new(config: &ProviderConfig) -> Result<Self, ConfigurationError> {
        match config {
            ProviderConfig::Ollama(cfg) => {
                let client = rig::providers::ollama::Client::builder()
                    .base_url(&cfg.base_url)
                    .build();
                Ok(ProviderClient::Ollama(client))
            }
            ProviderConfig::Groq(cfg) => {
                let api_key = cfg.api_key.as_deref().unwrap_or_default();
                let client = rig::providers::groq::Client::builder(api_key)
                    .base_url(&cfg.base_url)
                    .build();
                Ok(ProviderClient::Groq(client))
            }
            ProviderConfig::Gemini(cfg) => {
                let api_key = cfg.api_key.as_deref().unwrap_or_default();
                let mut builder = rig::providers::gemini::Client::builder(api_key);
                if let Some(base_url) = &cfg.base_url {
                    builder = builder.base_url(base_url);
                }
                let client = builder.build().map_err(|e| ConfigurationError::Backend {
                    provider: "gemini".to_string(),
                    message: e.to_string(),
                })?;
                Ok(ProviderClient::Gemini(client))
            }
            ProviderConfig::OpenRouter(cfg) => {
                let api_key = cfg.api_key.as_deref().unwrap_or_default();
                let client = rig::providers::openrouter::Client::builder(api_key)
                    .base_url(&cfg.base_url)
                    .build();
                Ok(ProviderClient::OpenRouter(client))
            }
        }
    }

    /// 创建Agent
    pub fn create_agent(
        &self,
        model: &str,
        system_prompt: &str,
        temperature: f64,
    ) -> ProviderAgent {
        match self {
            ProviderClient::Ollama(client) => {
                let agent = client
                    .agent(model)
                    .preamble(system_prompt)
                    .temperature(temperature)
                    .build();
                ProviderAgent::Ollama(agent)
            }
            ProviderClient::Groq(client) => {
                let agent = client
                    .agent(model)
                    .preamble(system_prompt)
                    .temperature(temperature)
                    .build();
                ProviderAgent::Groq(agent)
            }
            ProviderClient::Gemini(client) => {
                let gen_cfg = GenerationConfig::default();
                let cfg = AdditionalParameters::default().with_config(gen_cfg);

                let agent = client
                    .agent(model)
                    .preamble(system_prompt)
                    .temperature(temperature)
                    .additional_params(serde_json::to_value(cfg).unwrap())
                    .build();
                ProviderAgent::Gemini(agent)
            }
            ProviderClient::OpenRouter(client) => {
                let agent = client
                    .agent(model)
                    .preamble(system_prompt)
                    .temperature(temperature)
                    .build();
                ProviderAgent::OpenRouter(agent)
            }
        }
    }

    /// 创建Extractor
    pub fn create_extractor<T>(&self, model: &str, system_prompt: &str) -> ProviderExtractor<T>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
    {
        match self {
            ProviderClient::Ollama(client) => {
                let extractor = client
                    .extractor::<T>(model)
                    .preamble(system_prompt)
                    .build();
                ProviderExtractor::Ollama(extractor)
            }
            ProviderClient::Groq(client) => {
                let extractor = client
                    .extractor::<T>(model)
                    .preamble(system_prompt)
                    .build();
                ProviderExtractor::Groq(extractor)
            }
            ProviderClient::Gemini(client) => {
                let gen_cfg = GenerationConfig::default();
                let cfg = AdditionalParameters::default().with_config(gen_cfg);

                let extractor = client
                    .extractor::<T>(model)
                    .preamble(system_prompt)
                    .additional_params(serde_json::to_value(cfg).unwrap())
                    .build();
                ProviderExtractor::Gemini(extractor)
            }
            ProviderClient::OpenRouter(client) => {
                let extractor = client
                    .extractor::<T>(model)
                    .preamble(system_prompt)
                    .build();
                ProviderExtractor::OpenRouter(extractor)
            }
        }
    }
}

/// 统一的Agent枚举
pub enum ProviderAgent {
    Ollama(Agent<rig::providers::ollama::CompletionModel<reqwest::Client>>),
    Groq(Agent<rig::providers::groq::CompletionModel<reqwest::Client>>),
    Gemini(Agent<rig::providers::gemini::completion::CompletionModel>),
    OpenRouter(Agent<rig::providers::openrouter::CompletionModel>),
}

impl ProviderAgent {
    /// 执行prompt
    pub async fn prompt(&self, prompt: &str) -> Result<String, ModelError> {
        match self {
            ProviderAgent::Ollama(agent) => agent
                .prompt(prompt)
                .await
                .map_err(|e| ModelError::Invocation(e.to_string())),
            ProviderAgent::Groq(agent) => agent
                .prompt(prompt)
                .await
                .map_err(|e| ModelError::Invocation(e.to_string())),
            ProviderAgent::Gemini(agent) => agent
                .prompt(prompt)
                .await
                .map_err(|e| ModelError::Invocation(e.to_string())),
            ProviderAgent::OpenRouter(agent) => agent
                .prompt(prompt)
                .await
                .map_err(|e| ModelError::Invocation(e.to_string())),
        }
    }
}

/// 统一的Extractor枚举
pub enum ProviderExtractor<T>
where
    T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
{
    Ollama(Extractor<rig::providers::ollama::CompletionModel<reqwest::Client>, T>),
    Groq(Extractor<rig::providers::groq::CompletionModel<reqwest::Client>, T>),
    Gemini(Extractor<rig::providers::gemini::completion::CompletionModel, T>),
    OpenRouter(Extractor<rig::providers::openrouter::CompletionModel, T>),
}

impl<T> ProviderExtractor<T>
where
    T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
{
    /// 执行提取
    pub async fn extract(&self, prompt: &str) -> Result<T, ModelError> {
        match self {
            ProviderExtractor::Ollama(extractor) => extractor
                .extract(prompt)
                .await
                .map_err(|e| ModelError::Invocation(e.to_string())),
            ProviderExtractor::Groq(extractor) => extractor
                .extract(prompt)
                .await
                .map_err(|e| ModelError::Invocation(e.to_string())),
            ProviderExtractor::Gemini(extractor) => extractor
                .extract(prompt)
                .await
                .map_err(|e| ModelError::Invocation(e.to_string())),
            ProviderExtractor::OpenRouter(extractor) => extractor
                .extract(prompt)
                .await
                .map_err(|e| ModelError::Invocation(e.to_string())),
        }
    }
}
