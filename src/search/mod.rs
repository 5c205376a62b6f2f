//! 检索与抓取服务 - Firecrawl REST客户端及其抽象契约

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::FirecrawlConfig;
use crate::error::{ConfigurationError, ServiceError};

/// 单条检索结果
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    /// 页面元数据中的标题
    pub title: Option<String>,
    /// 结果摘要原文（抓取到的markdown或描述）
    pub snippet: String,
}

/// 抓取到的页面内容
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedPage {
    pub markdown: String,
}

/// 检索+抓取服务契约
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// 检索，返回有序结果；传输/鉴权失败返回ServiceError
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>, ServiceError>;

    /// 抓取单个URL，无法取得内容时返回None
    async fn scrape(&self, url: &str) -> Result<Option<ScrapedPage>, ServiceError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeOptions {
    formats: Vec<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    limit: u32,
    scrape_options: ScrapeOptions,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    metadata: Option<ResultMetadata>,
}

#[derive(Deserialize)]
struct ResultMetadata {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: Vec<&'static str>,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    data: Option<ScrapeData>,
}

#[derive(Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
}

/// Firecrawl服务客户端
pub struct FirecrawlClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl FirecrawlClient {
    /// 创建客户端，凭据取配置或FIRECRAWL_API_KEY环境变量
    pub fn new(config: &FirecrawlConfig) -> Result<Self, ConfigurationError> {
        println!("🔥 正在初始化Firecrawl服务");
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("FIRECRAWL_API_KEY").ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigurationError::Invalid {
                provider: "firecrawl".to_string(),
                errors: vec![
                    "api_key is required (set FIRECRAWL_API_KEY environment variable)".to_string(),
                ],
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ConfigurationError::Backend {
                provider: "firecrawl".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for FirecrawlClient {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>, ServiceError> {
        println!("🔍 正在检索: '{}'，限制{}条", query, limit);

        // 服务层统一在检索词后追加商业上下文
        let enriched_query = format!("{query} company pricing");
        let request = SearchRequest {
            query: &enriched_query,
            limit,
            scrape_options: ScrapeOptions {
                formats: vec!["markdown"],
            },
        };

        let response = self
            .http
            .post(format!("{}/v1/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        let hits = parsed
            .data
            .into_iter()
            .map(|result| SearchHit {
                title: result
                    .metadata
                    .and_then(|m| m.title)
                    .or(result.title),
                snippet: result.markdown.or(result.description).unwrap_or_default(),
                url: result.url,
            })
            .collect::<Vec<_>>();

        println!("✅ 检索到{}条结果", hits.len());
        Ok(hits)
    }

    async fn scrape(&self, url: &str) -> Result<Option<ScrapedPage>, ServiceError> {
        println!("📄 正在抓取: {}", url);

        let request = ScrapeRequest {
            url,
            formats: vec!["markdown"],
        };

        let response = self
            .http
            .post(format!("{}/v1/scrape", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        Ok(parsed
            .data
            .and_then(|data| data.markdown)
            .map(|markdown| ScrapedPage { markdown }))
    }
}
