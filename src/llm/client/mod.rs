//! LLM客户端 - 提供统一的模型调用接口

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod providers;

pub use providers::{ProviderAgent, ProviderClient, ProviderExtractor};

use crate::error::ModelError;
use crate::utils::retry::{RetryPolicy, retry_with_backoff};

/// 模型调用超时的默认值（秒）
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// 语言模型后端契约：单轮调用与结构化提取
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 执行单轮对话，返回模型文本
    async fn invoke(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ModelError>;

    /// 执行结构化提取，按schema返回类型化结果
    async fn extract<T>(&self, system_prompt: &str, user_prompt: &str) -> Result<T, ModelError>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static;
}

/// 模型句柄 - 绑定具体后端客户端、模型名与调用参数
pub struct ModelHandle {
    client: ProviderClient,
    model_name: String,
    temperature: f64,
    timeout: Duration,
    /// 客户端侧重试策略，仅部分变体（Groq）配置
    client_retry: Option<RetryPolicy>,
}

impl ModelHandle {
    pub fn new(client: ProviderClient, model_name: &str, temperature: f64) -> Self {
        Self {
            client,
            model_name: model_name.to_string(),
            temperature,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            client_retry: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_client_retry(mut self, policy: RetryPolicy) -> Self {
        self.client_retry = Some(policy);
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 检查模型连接是否正常
    pub async fn check_connection(&self) -> Result<(), ModelError> {
        println!("🔄 正在检查模型连接...");
        match self
            .invoke("You are a helpful assistant.", "Hello")
            .await
        {
            Ok(_) => {
                println!("✅ 模型连接正常");
                Ok(())
            }
            Err(e) => {
                eprintln!("❌ 模型连接失败: {}", e);
                Err(e)
            }
        }
    }

    async fn invoke_once(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ModelError> {
        let agent = self
            .client
            .create_agent(&self.model_name, system_prompt, self.temperature);

        tokio::time::timeout(self.timeout, agent.prompt(user_prompt))
            .await
            .map_err(|_| ModelError::Timeout(self.timeout.as_secs()))?
    }
}

#[async_trait]
impl LanguageModel for ModelHandle {
    async fn invoke(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ModelError> {
        match &self.client_retry {
            Some(policy) => {
                retry_with_backoff(policy, || self.invoke_once(system_prompt, user_prompt)).await
            }
            None => self.invoke_once(system_prompt, user_prompt).await,
        }
    }

    async fn extract<T>(&self, system_prompt: &str, user_prompt: &str) -> Result<T, ModelError>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
    {
        let extractor = self
            .client
            .create_extractor::<T>(&self.model_name, system_prompt);

        tokio::time::timeout(self.timeout, extractor.extract(user_prompt))
            .await
            .map_err(|_| ModelError::Timeout(self.timeout.as_secs()))?
    }
}
