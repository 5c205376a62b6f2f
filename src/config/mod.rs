use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::error::ConfigurationError;
use crate::llm::provider::{
    ConfigManager, EnvironmentConfigLoader, ProviderConfig, ProviderKind,
};

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 一次性查询；缺省时进入交互式问答
    pub query: Option<String>,

    /// 模型Provider变体
    pub model_type: ProviderKind,

    /// 模型名称
    pub model_name: String,

    /// 温度参数，覆盖环境变量来源的取值
    pub temperature: Option<f64>,

    /// 模型配置映射文件路径（名称→配置表）
    pub model_config_file: Option<PathBuf>,

    /// 映射文件中要使用的配置名称
    pub model_config_name: Option<String>,

    /// 模型调用超时时间（秒）
    pub llm_timeout_seconds: u64,

    /// 第二阶段逐工具调研的并发上限，1为严格顺序
    pub max_parallels: usize,

    /// 是否启用详细日志
    pub verbose: bool,

    /// 检索服务配置
    pub firecrawl: FirecrawlConfig,
}

/// Firecrawl检索服务配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FirecrawlConfig {
    /// API KEY，缺省时读取FIRECRAWL_API_KEY环境变量
    pub api_key: Option<String>,

    /// 服务基地址
    pub base_url: String,

    /// 单次请求超时时间（秒）
    pub timeout_seconds: u64,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 解析出本次运行使用的模型Provider配置
    ///
    /// 优先级：映射文件 > 环境变量装载；CLI指定的温度最后覆盖并重新校验。
    pub fn resolve_provider_config(&self) -> Result<ProviderConfig, ConfigurationError> {
        if let Some(path) = &self.model_config_file {
            let name = self.model_config_name.as_deref().unwrap_or("default");
            return ConfigManager::from_file(path, name);
        }

        let mut config = EnvironmentConfigLoader::load_config(self.model_type, &self.model_name)?;

        if let Some(temperature) = self.temperature {
            config.set_temperature(temperature);
            let errors = config.validate();
            if !errors.is_empty() {
                return Err(ConfigurationError::Invalid {
                    provider: config.kind().to_string(),
                    errors,
                });
            }
        }
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query: None,
            model_type: ProviderKind::default(),
            model_name: String::from("qwen3:8b"),
            temperature: None,
            model_config_file: None,
            model_config_name: None,
            llm_timeout_seconds: 300,
            max_parallels: 1,
            verbose: false,
            firecrawl: FirecrawlConfig::default(),
        }
    }
}

impl Default for FirecrawlConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: String::from("https://api.firecrawl.dev"),
            timeout_seconds: 60,
        }
    }
}
