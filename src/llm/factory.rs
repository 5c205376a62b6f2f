//! 模型构建注册表 - 变体到后端构造函数的唯一绑定点

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::llm::client::{ModelHandle, ProviderClient};
use crate::llm::provider::{ConfigManager, ProviderConfig, ProviderKind};
use crate::utils::retry::RetryPolicy;

/// 变体构造函数签名
pub type ModelBuilder = fn(&ProviderConfig) -> Result<ModelHandle, ConfigurationError>;

/// Groq客户端侧重试的起始退避
const GROQ_CLIENT_RETRY_BASE: Duration = Duration::from_millis(500);

fn build_standard(config: &ProviderConfig) -> Result<ModelHandle, ConfigurationError> {
    let client = ProviderClient::new(config)?;
    Ok(ModelHandle::new(
        client,
        config.model_name(),
        config.temperature(),
    ))
}

fn build_groq(config: &ProviderConfig) -> Result<ModelHandle, ConfigurationError> {
    let handle = build_standard(config)?;
    match config {
        ProviderConfig::Groq(cfg) if cfg.max_retries > 0 => {
            // max_retries为重试次数，总尝试次数多一次
            Ok(handle.with_client_retry(RetryPolicy::new(
                cfg.max_retries + 1,
                GROQ_CLIENT_RETRY_BASE,
                2.0,
            )))
        }
        _ => Ok(handle),
    }
}

/// 进程级注册表，首次使用时填充内置变体
fn registry() -> &'static RwLock<HashMap<ProviderKind, ModelBuilder>> {
    static REGISTRY: OnceLock<RwLock<HashMap<ProviderKind, ModelBuilder>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        RwLock::new(HashMap::from([
            (ProviderKind::Ollama, build_standard as ModelBuilder),
            (ProviderKind::Groq, build_groq as ModelBuilder),
            (ProviderKind::Gemini, build_standard as ModelBuilder),
            (ProviderKind::OpenRouter, build_standard as ModelBuilder),
        ]))
    })
}

/// 注册或替换某个变体的构造函数
pub fn register_builder(kind: ProviderKind, builder: ModelBuilder) {
    registry()
        .write()
        .expect("model builder registry lock poisoned")
        .insert(kind, builder);
}

/// 按配置变体分发到对应的后端构造函数
pub fn build_model(config: &ProviderConfig) -> Result<ModelHandle, ConfigurationError> {
    let builder = registry()
        .read()
        .expect("model builder registry lock poisoned")
        .get(&config.kind())
        .copied();

    match builder {
        Some(builder) => builder(config),
        None => Err(ConfigurationError::UnsupportedProvider {
            given: config.kind().to_string(),
            supported: ConfigManager::supported_types(),
        }),
    }
}
