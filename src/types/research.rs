use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 一次调研运行的完整状态，随流水线各阶段递增填充
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchState {
    /// 用户查询，构造后不再变更
    pub query: String,
    /// 第一阶段提取的候选工具名，可能为空
    #[serde(default)]
    pub extracted_tools: Vec<String>,
    /// 第二阶段逐个追加的公司信息，运行内只增不删
    #[serde(default)]
    pub companies: Vec<CompanyInfo>,
    /// 第三阶段的最终建议，完成时必定为Some（成功或兜底）
    pub analysis: Option<String>,
}

impl ResearchState {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            extracted_tools: Vec::new(),
            companies: Vec::new(),
            analysis: None,
        }
    }
}

/// 单个被调研工具/公司的信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyInfo {
    pub name: String,
    /// 初始为检索摘要原文，内容分析成功后被覆盖
    pub description: String,
    /// 官网URL，未找到时为空字符串
    pub website: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    /// 预留字段，当前阶段不填充
    #[serde(default)]
    pub competitors: Vec<String>,
    pub pricing_model: Option<String>,
    pub is_open_source: Option<bool>,
    pub api_available: Option<bool>,
    #[serde(default)]
    pub language_support: Vec<String>,
    #[serde(default)]
    pub integration_capabilities: Vec<String>,
}

impl CompanyInfo {
    /// 以占位字段创建，等待内容分析覆盖
    pub fn new(name: &str, description: &str, website: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            website: website.to_string(),
            tech_stack: Vec::new(),
            competitors: Vec::new(),
            pricing_model: None,
            is_open_source: None,
            api_available: None,
            language_support: Vec::new(),
            integration_capabilities: Vec::new(),
        }
    }

    /// 用内容分析结果就地覆盖分析所属字段
    pub fn apply_analysis(&mut self, analysis: CompanyAnalysis) {
        self.pricing_model = Some(analysis.pricing_model);
        self.is_open_source = analysis.is_open_source;
        self.tech_stack = analysis.tech_stack;
        self.description = analysis.description;
        self.api_available = analysis.api_available;
        self.language_support = analysis.language_support;
        self.integration_capabilities = analysis.integration_capabilities;
    }
}

/// 内容分析的结构化输出，消费后即弃
///
/// 字段文档使用英文：schemars会把它们写进提供给模型的输出schema。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CompanyAnalysis {
    /// Pricing model: "Free", "Freemium", "Paid", "Enterprise" or "Unknown"
    pub pricing_model: String,
    /// Whether the tool is open source, if mentioned
    pub is_open_source: Option<bool>,
    /// Technologies and frameworks the tool is built with or supports
    #[serde(default)]
    pub tech_stack: Vec<String>,
    /// One or two sentence description of what the tool does
    #[serde(default)]
    pub description: String,
    /// Whether the tool exposes an API, if mentioned
    pub api_available: Option<bool>,
    /// Programming languages the tool supports
    #[serde(default)]
    pub language_support: Vec<String>,
    /// Tools and platforms it integrates with
    #[serde(default)]
    pub integration_capabilities: Vec<String>,
}

impl CompanyAnalysis {
    /// 分析失败时的固定描述，下游可据此识别哨兵值
    pub const FAILED_DESCRIPTION: &'static str = "Failed to analyze company content";

    /// 内容分析失败时返回的哨兵值
    pub fn failed() -> Self {
        Self {
            pricing_model: "Unknown".to_string(),
            is_open_source: None,
            tech_stack: Vec::new(),
            description: Self::FAILED_DESCRIPTION.to_string(),
            api_available: None,
            language_support: Vec::new(),
            integration_capabilities: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_research_state_new() {
        let state = ResearchState::new("vector databases");

        assert_eq!(state.query, "vector databases");
        assert!(state.extracted_tools.is_empty());
        assert!(state.companies.is_empty());
        assert!(state.analysis.is_none());
    }

    #[test]
    fn test_company_info_placeholders() {
        let company = CompanyInfo::new("Pinecone", "snippet", "https://pinecone.io");

        assert_eq!(company.name, "Pinecone");
        assert_eq!(company.description, "snippet");
        assert_eq!(company.website, "https://pinecone.io");
        assert!(company.tech_stack.is_empty());
        assert!(company.pricing_model.is_none());
        assert!(company.is_open_source.is_none());
    }

    #[test]
    fn test_apply_analysis_overwrites_owned_fields() {
        let mut company = CompanyInfo::new("Weaviate", "raw snippet", "https://weaviate.io");
        let analysis = CompanyAnalysis {
            pricing_model: "Freemium".to_string(),
            is_open_source: Some(true),
            tech_stack: vec!["Go".to_string()],
            description: "Vector database".to_string(),
            api_available: Some(true),
            language_support: vec!["Python".to_string(), "Rust".to_string()],
            integration_capabilities: vec!["LangChain".to_string()],
        };

        company.apply_analysis(analysis);

        assert_eq!(company.pricing_model.as_deref(), Some("Freemium"));
        assert_eq!(company.is_open_source, Some(true));
        assert_eq!(company.tech_stack, vec!["Go".to_string()]);
        assert_eq!(company.description, "Vector database");
        assert_eq!(company.api_available, Some(true));
        assert_eq!(company.language_support.len(), 2);
        // name和website不属于分析输出，保持不变
        assert_eq!(company.name, "Weaviate");
        assert_eq!(company.website, "https://weaviate.io");
    }

    #[test]
    fn test_failed_analysis_sentinel() {
        let sentinel = CompanyAnalysis::failed();

        assert_eq!(sentinel.pricing_model, "Unknown");
        assert_eq!(sentinel.description, CompanyAnalysis::FAILED_DESCRIPTION);
        assert!(sentinel.is_open_source.is_none());
        assert!(sentinel.api_available.is_none());
        assert!(sentinel.tech_stack.is_empty());
        assert!(sentinel.language_support.is_empty());
        assert!(sentinel.integration_capabilities.is_empty());
    }

    #[test]
    fn test_company_info_deserialize_defaults() {
        // 省略列表字段的JSON应能正常加载
        let json = r#"{
            "name": "Milvus",
            "description": "open-source vector database",
            "website": "https://milvus.io",
            "pricing_model": null,
            "is_open_source": null,
            "api_available": null
        }"#;

        let company: CompanyInfo = serde_json::from_str(json).unwrap();
        assert_eq!(company.name, "Milvus");
        assert!(company.tech_stack.is_empty());
        assert!(company.competitors.is_empty());
    }
}
