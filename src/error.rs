//! 错误类型定义 - 按失败来源划分的显式错误分类

use std::path::PathBuf;
use thiserror::Error;

/// 模型配置阶段的错误，构建期同步抛出，始终上抛给调用方
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// 未知的Provider标识
    #[error("Unsupported model type: {given}. Supported types: [{}]", .supported.join(", "))]
    UnsupportedProvider {
        given: String,
        supported: Vec<String>,
    },

    /// 校验失败，errors中包含全部违反项
    #[error("Configuration validation failed for {provider}:\n{}", .errors.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Invalid {
        provider: String,
        errors: Vec<String>,
    },

    /// 参数字典中缺少model_type键
    #[error("model_type is required in configuration dictionary")]
    MissingModelType,

    /// 配置文件不存在
    #[error("Configuration file not found: {0:?}")]
    FileNotFound(PathBuf),

    /// 配置文件中不存在指定名称的配置项
    #[error("Configuration '{name}' not found in {path:?}")]
    EntryNotFound { name: String, path: PathBuf },

    /// 配置内容解析失败
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// 后端客户端初始化失败
    #[error("Failed to initialize {provider} backend: {message}")]
    Backend { provider: String, message: String },
}

/// 检索/抓取服务错误，使用处就地吸收，降级继续
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("search service transport error: {0}")]
    Transport(String),

    #[error("search service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode search service response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

/// 模型调用错误，阶段内吸收或重试，绝不越过流水线边界
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model invocation failed: {0}")]
    Invocation(String),

    #[error("model invocation timed out after {0}s")]
    Timeout(u64),
}

/// 流水线运行期错误，取消是唯一会上抛的运行中失败
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("research pipeline run was cancelled")]
    Cancelled,
}
