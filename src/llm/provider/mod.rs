//! 模型Provider配置层 - 按变体划分的配置结构、批量校验与多来源构造

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;

/// Provider变体标识
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProviderKind {
    #[serde(rename = "ollama")]
    #[default]
    Ollama,
    #[serde(rename = "groq")]
    Groq,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

impl ProviderKind {
    /// 全部内置变体，注册表与错误信息共用
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Ollama,
        ProviderKind::Groq,
        ProviderKind::Gemini,
        ProviderKind::OpenRouter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::Groq => "groq",
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenRouter => "openrouter",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "groq" => Ok(ProviderKind::Groq),
            "gemini" => Ok(ProviderKind::Gemini),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

fn default_temperature() -> f64 {
    0.0
}

fn default_ollama_base_url() -> String {
    String::from("http://localhost:11434")
}

fn default_groq_base_url() -> String {
    String::from("https://api.groq.com/v1")
}

fn default_groq_max_retries() -> u32 {
    2
}

fn default_openrouter_base_url() -> String {
    String::from("https://openrouter.ai/api/v1")
}

fn default_app_title() -> String {
    String::from("LLM Agent")
}

/// 本地守护进程风格：无凭据，仅需服务地址
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OllamaConfig {
    #[serde(default)]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

/// 托管Key风格，带客户端侧重试次数
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GroqConfig {
    #[serde(default)]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_groq_base_url")]
    pub base_url: String,
    #[serde(default = "default_groq_max_retries")]
    pub max_retries: u32,
}

/// 托管Key风格，可选区域化基地址
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GeminiConfig {
    #[serde(default)]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// 托管Key风格，带代理归因头
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OpenRouterConfig {
    #[serde(default)]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub app_url: Option<String>,
    #[serde(default = "default_app_title")]
    pub app_title: String,
}

impl OpenRouterConfig {
    /// 计算归因请求头（HTTP-Referer / X-Title）
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "HTTP-Referer",
                self.app_url.clone().unwrap_or_default(),
            ),
            ("X-Title", self.app_title.clone()),
        ]
    }
}

/// 封闭的配置变体集合，每个Provider家族一个标签
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    Ollama(OllamaConfig),
    Groq(GroqConfig),
    Gemini(GeminiConfig),
    OpenRouter(OpenRouterConfig),
}

/// 通用字段校验，返回全部违反项
fn validate_common(model_name: &str, temperature: f64) -> Vec<String> {
    let mut errors = Vec::new();
    if model_name.is_empty() {
        errors.push("model_name is required".to_string());
    }
    if temperature.is_nan() || temperature < 0.0 {
        errors.push("temperature must be a non-negative number".to_string());
    }
    errors
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::Ollama(_) => ProviderKind::Ollama,
            ProviderConfig::Groq(_) => ProviderKind::Groq,
            ProviderConfig::Gemini(_) => ProviderKind::Gemini,
            ProviderConfig::OpenRouter(_) => ProviderKind::OpenRouter,
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            ProviderConfig::Ollama(c) => &c.model_name,
            ProviderConfig::Groq(c) => &c.model_name,
            ProviderConfig::Gemini(c) => &c.model_name,
            ProviderConfig::OpenRouter(c) => &c.model_name,
        }
    }

    pub fn temperature(&self) -> f64 {
        match self {
            ProviderConfig::Ollama(c) => c.temperature,
            ProviderConfig::Groq(c) => c.temperature,
            ProviderConfig::Gemini(c) => c.temperature,
            ProviderConfig::OpenRouter(c) => c.temperature,
        }
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        match self {
            ProviderConfig::Ollama(c) => c.temperature = temperature,
            ProviderConfig::Groq(c) => c.temperature = temperature,
            ProviderConfig::Gemini(c) => c.temperature = temperature,
            ProviderConfig::OpenRouter(c) => c.temperature = temperature,
        }
    }

    /// 校验配置并返回全部违反约束的描述，空列表即有效
    pub fn validate(&self) -> Vec<String> {
        match self {
            ProviderConfig::Ollama(c) => {
                let mut errors = validate_common(&c.model_name, c.temperature);
                if c.base_url.is_empty() {
                    errors.push("base_url is required for Ollama".to_string());
                }
                errors
            }
            ProviderConfig::Groq(c) => {
                let mut errors = validate_common(&c.model_name, c.temperature);
                if c.api_key.as_deref().is_none_or(str::is_empty) {
                    errors.push(
                        "api_key is required for Groq (set GROQ_API_KEY environment variable)"
                            .to_string(),
                    );
                }
                errors
            }
            ProviderConfig::Gemini(c) => {
                let mut errors = validate_common(&c.model_name, c.temperature);
                if c.api_key.as_deref().is_none_or(str::is_empty) {
                    errors.push(
                        "api_key is required for Gemini (set GOOGLE_API_KEY environment variable)"
                            .to_string(),
                    );
                }
                errors
            }
            ProviderConfig::OpenRouter(c) => {
                let mut errors = validate_common(&c.model_name, c.temperature);
                if c.api_key.as_deref().is_none_or(str::is_empty) {
                    errors.push(
                        "api_key is required for OpenRouter (set OPENROUTER_API_KEY environment variable)"
                            .to_string(),
                    );
                }
                errors
            }
        }
    }

    /// 未显式提供凭据时回退读取约定的环境变量
    fn apply_env_fallback(&mut self) {
        match self {
            ProviderConfig::Ollama(_) => {}
            ProviderConfig::Groq(c) => {
                if c.api_key.is_none()
                    && let Ok(key) = env::var("GROQ_API_KEY")
                {
                    c.api_key = Some(key);
                }
            }
            ProviderConfig::Gemini(c) => {
                if c.api_key.is_none()
                    && let Ok(key) = env::var("GOOGLE_API_KEY")
                {
                    c.api_key = Some(key);
                }
            }
            ProviderConfig::OpenRouter(c) => {
                if c.api_key.is_none()
                    && let Ok(key) = env::var("OPENROUTER_API_KEY")
                {
                    c.api_key = Some(key);
                }
                if c.app_url.is_none()
                    && let Ok(url) = env::var("APP_URL")
                {
                    c.app_url = Some(url);
                }
            }
        }
    }
}

/// 配置构造入口 - 变体查找、参数反序列化与批量校验
pub struct ConfigManager;

impl ConfigManager {
    /// 当前支持的Provider标识列表
    pub fn supported_types() -> Vec<String> {
        ProviderKind::ALL
            .iter()
            .map(|kind| kind.to_string())
            .collect()
    }

    /// 按标识创建指定变体的配置，校验失败时汇总全部错误
    pub fn create_config(
        model_type: &str,
        params: Value,
    ) -> Result<ProviderConfig, ConfigurationError> {
        let kind: ProviderKind =
            model_type
                .parse()
                .map_err(|_| ConfigurationError::UnsupportedProvider {
                    given: model_type.to_string(),
                    supported: Self::supported_types(),
                })?;

        let parse = |e: serde_json::Error| ConfigurationError::Parse(e.to_string());
        let mut config = match kind {
            ProviderKind::Ollama => {
                ProviderConfig::Ollama(serde_json::from_value(params).map_err(parse)?)
            }
            ProviderKind::Groq => {
                ProviderConfig::Groq(serde_json::from_value(params).map_err(parse)?)
            }
            ProviderKind::Gemini => {
                ProviderConfig::Gemini(serde_json::from_value(params).map_err(parse)?)
            }
            ProviderKind::OpenRouter => {
                ProviderConfig::OpenRouter(serde_json::from_value(params).map_err(parse)?)
            }
        };

        config.apply_env_fallback();

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigurationError::Invalid {
                provider: kind.to_string(),
                errors,
            });
        }
        Ok(config)
    }

    /// 从参数字典创建配置，要求包含model_type键
    pub fn from_dict(
        mut dict: serde_json::Map<String, Value>,
    ) -> Result<ProviderConfig, ConfigurationError> {
        let model_type = dict
            .remove("model_type")
            .ok_or(ConfigurationError::MissingModelType)?;
        let model_type = model_type
            .as_str()
            .ok_or_else(|| ConfigurationError::Parse("model_type must be a string".to_string()))?
            .to_string();

        Self::create_config(&model_type, Value::Object(dict))
    }

    /// 从TOML文件中按名称加载配置，文件为 名称→配置表 的映射
    pub fn from_file(
        path: &Path,
        config_name: &str,
    ) -> Result<ProviderConfig, ConfigurationError> {
        if !path.exists() {
            return Err(ConfigurationError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        let table: toml::Table =
            toml::from_str(&content).map_err(|e| ConfigurationError::Parse(e.to_string()))?;

        let entry = table
            .get(config_name)
            .ok_or_else(|| ConfigurationError::EntryNotFound {
                name: config_name.to_string(),
                path: PathBuf::from(path),
            })?;

        let value =
            serde_json::to_value(entry).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        let dict = value
            .as_object()
            .cloned()
            .ok_or_else(|| {
                ConfigurationError::Parse(format!(
                    "configuration '{config_name}' must be a table"
                ))
            })?;

        Self::from_dict(dict)
    }
}

/// 从约定环境变量读取各变体配置
pub struct EnvironmentConfigLoader;

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EnvironmentConfigLoader {
    /// 按变体从环境变量加载配置并校验
    pub fn load_config(
        kind: ProviderKind,
        model_name: &str,
    ) -> Result<ProviderConfig, ConfigurationError> {
        let config = match kind {
            ProviderKind::Ollama => ProviderConfig::Ollama(OllamaConfig {
                model_name: model_name.to_string(),
                temperature: env_f64("OLLAMA_TEMPERATURE", 0.0),
                base_url: env_or("OLLAMA_BASE_URL", "http://localhost:11434"),
            }),
            ProviderKind::Groq => ProviderConfig::Groq(GroqConfig {
                model_name: model_name.to_string(),
                temperature: env_f64("GROQ_TEMPERATURE", 0.0),
                api_key: env::var("GROQ_API_KEY").ok(),
                base_url: env_or("GROQ_BASE_URL", "https://api.groq.com/v1"),
                max_retries: env_u32("GROQ_MAX_RETRIES", 2),
            }),
            ProviderKind::Gemini => ProviderConfig::Gemini(GeminiConfig {
                model_name: model_name.to_string(),
                temperature: env_f64("GEMINI_TEMPERATURE", 0.0),
                api_key: env::var("GOOGLE_API_KEY").ok(),
                base_url: env::var("GEMINI_BASE_URL").ok(),
            }),
            ProviderKind::OpenRouter => ProviderConfig::OpenRouter(OpenRouterConfig {
                model_name: model_name.to_string(),
                temperature: env_f64("OPENROUTER_TEMPERATURE", 0.0),
                api_key: env::var("OPENROUTER_API_KEY").ok(),
                base_url: env_or("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1"),
                app_url: env::var("APP_URL").ok(),
                app_title: env_or("APP_TITLE", "LLM Agent"),
            }),
        };

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigurationError::Invalid {
                provider: kind.to_string(),
                errors,
            });
        }
        Ok(config)
    }
}
