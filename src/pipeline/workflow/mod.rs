//! 调研流水线 - 三阶段状态机：候选提取、逐个调研、综合推荐
//!
//! 阶段内部失败一律降级为空值/哨兵值继续推进，绝不中断整次运行；
//! 唯一会上抛的运行期错误是显式取消。

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{ModelError, PipelineError};
use crate::llm::client::LanguageModel;
use crate::llm::factory::build_model;
use crate::pipeline::prompts;
use crate::search::{FirecrawlClient, SearchProvider};
use crate::types::research::{CompanyAnalysis, CompanyInfo, ResearchState};
use crate::utils::retry::{RetryPolicy, retry_with_backoff_if};

/// 候选文章检索条数
const ARTICLE_SEARCH_LIMIT: u32 = 3;
/// 每篇文章参与提取的最大字符数
const ARTICLE_EXCERPT_CHARS: usize = 1500;
/// 进入逐个调研的候选工具上限，靠前的候选优先保留
const MAX_CANDIDATE_TOOLS: usize = 4;
/// 官网检索条数
const OFFICIAL_SITE_SEARCH_LIMIT: u32 = 1;

/// 流水线状态，线性推进且不回退
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Init,
    Extracting,
    Researching,
    Analyzing,
    Done,
}

/// 综合阶段内部的失败分类，取消不参与重试
enum SynthesisError {
    Cancelled,
    Model(ModelError),
}

/// 按字符数截断，保持UTF-8边界
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

/// 全部重试失败后的确定性兜底分析
fn fallback_analysis(state: &ResearchState) -> String {
    let company_lines = state
        .companies
        .iter()
        .map(|company| format!("- {}: {}", company.name, company.website))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analysis temporarily unavailable due to API issues.\n\n\
         Found {} companies for query: {}\n\n\
         Companies analyzed:\n{}\n\n\
         Please try again later for detailed analysis.",
        state.companies.len(),
        state.query,
        company_lines
    )
}

/// 调研流水线 - 持有模型与检索服务，单次run独占一个ResearchState
pub struct ResearchPipeline<M, S> {
    model: M,
    search: S,
    retry_policy: RetryPolicy,
    max_parallels: usize,
}

impl<M, S> ResearchPipeline<M, S>
where
    M: LanguageModel,
    S: SearchProvider,
{
    pub fn new(model: M, search: S) -> Self {
        Self {
            model,
            search,
            retry_policy: RetryPolicy::default(),
            max_parallels: 1,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// 第二阶段逐工具调研的并发上限，结果顺序始终与候选顺序一致
    pub fn with_max_parallels(mut self, max_parallels: usize) -> Self {
        self.max_parallels = max_parallels;
        self
    }

    /// 执行一次完整调研
    pub async fn run(&self, query: &str) -> Result<ResearchState, PipelineError> {
        self.run_with_cancel(query, &CancellationToken::new())
            .await
    }

    /// 执行一次完整调研，在每个外部调用边界检查取消信号
    pub async fn run_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<ResearchState, PipelineError> {
        let mut state = ResearchState::new(query);
        let mut stage = PipelineStage::Init;

        loop {
            stage = match stage {
                PipelineStage::Init => {
                    println!("🚀 开始执行调研流程: '{}'", state.query);
                    PipelineStage::Extracting
                }
                PipelineStage::Extracting => {
                    self.extract_tools(&mut state, cancel).await?;
                    PipelineStage::Researching
                }
                PipelineStage::Researching => {
                    self.research_companies(&mut state, cancel).await?;
                    PipelineStage::Analyzing
                }
                PipelineStage::Analyzing => {
                    self.synthesize_analysis(&mut state, cancel).await?;
                    PipelineStage::Done
                }
                PipelineStage::Done => break,
            };
        }

        println!("✅ 调研流程执行完毕");
        Ok(state)
    }

    /// 第一阶段：从对比类文章中提取候选工具名
    async fn extract_tools(
        &self,
        state: &mut ResearchState,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        println!("🔍 正在查找相关文章: {}", state.query);
        let article_query = format!("{} tools comparison best alternatives", state.query);

        ensure_live(cancel)?;
        let hits = match self.search.search(&article_query, ARTICLE_SEARCH_LIMIT).await {
            Ok(hits) => hits,
            Err(e) => {
                eprintln!("⚠️ 文章检索失败: {}，候选列表置空", e);
                return Ok(());
            }
        };

        let mut all_content = String::new();
        for hit in &hits {
            ensure_live(cancel)?;
            match self.search.scrape(&hit.url).await {
                Ok(Some(page)) => {
                    all_content.push_str(truncate_chars(&page.markdown, ARTICLE_EXCERPT_CHARS));
                    all_content.push_str("\n\n");
                }
                // 单个URL抓取失败直接跳过，不中断本阶段
                Ok(None) => {}
                Err(e) => eprintln!("⚠️ 页面抓取失败 {}: {}", hit.url, e),
            }
        }

        ensure_live(cancel)?;
        match self
            .model
            .invoke(
                prompts::TOOL_EXTRACTION_SYSTEM,
                &prompts::tool_extraction_user(&state.query, &all_content),
            )
            .await
        {
            Ok(response) => {
                let tools: Vec<String> = response
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(ToString::to_string)
                    .collect();
                println!("✅ 提取到候选工具: {}", tools.join(", "));
                state.extracted_tools = tools;
            }
            Err(e) => {
                eprintln!("❌ 候选工具提取失败: {}，候选列表置空", e);
                state.extracted_tools = Vec::new();
            }
        }
        Ok(())
    }

    /// 第二阶段：逐个调研候选工具
    async fn research_companies(
        &self,
        state: &mut ResearchState,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let tool_names: Vec<String> = if state.extracted_tools.is_empty() {
            // 回退路径：没有候选时重新检索，用结果标题充当工具名
            println!("⚠️ 未提取到候选工具，回退为直接检索");
            let fallback_query = format!("{} tools comparison best alternatives", state.query);

            ensure_live(cancel)?;
            match self.search.search(&fallback_query, ARTICLE_SEARCH_LIMIT).await {
                Ok(hits) => hits
                    .into_iter()
                    .map(|hit| hit.title.unwrap_or_else(|| "Unknown".to_string()))
                    .collect(),
                Err(e) => {
                    eprintln!("⚠️ 回退检索失败: {}", e);
                    Vec::new()
                }
            }
        } else {
            state
                .extracted_tools
                .iter()
                .take(MAX_CANDIDATE_TOOLS)
                .cloned()
                .collect()
        };

        println!("🔬 开始调研工具: {}", tool_names.join(", "));

        // buffered按输入顺序产出，companies顺序与候选顺序一致
        let mut researched = stream::iter(tool_names)
            .map(|tool| self.research_single_tool(tool, cancel))
            .buffered(self.max_parallels.max(1));

        while let Some(result) = researched.next().await {
            if let Some(company) = result? {
                state.companies.push(company);
            }
        }

        println!("✅ 完成{}家公司的调研", state.companies.len());
        Ok(())
    }

    /// 调研单个工具：官网检索、抓取与内容分析
    async fn research_single_tool(
        &self,
        tool: String,
        cancel: &CancellationToken,
    ) -> Result<Option<CompanyInfo>, PipelineError> {
        ensure_live(cancel)?;
        println!("🔍 正在调研: {}", tool);

        let official_site_query = format!("{} official site", tool);
        let hits = match self
            .search
            .search(&official_site_query, OFFICIAL_SITE_SEARCH_LIMIT)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                eprintln!("⚠️ 官网检索失败 {}: {}", tool, e);
                return Ok(None);
            }
        };

        // 检索无结果则跳过该工具，不追加占位条目
        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        let mut company = CompanyInfo::new(&tool, &hit.snippet, &hit.url);

        ensure_live(cancel)?;
        match self.search.scrape(&company.website).await {
            Ok(Some(page)) => {
                ensure_live(cancel)?;
                let analysis = self
                    .analyze_company_content(&company.name, &page.markdown)
                    .await;
                company.apply_analysis(analysis);
            }
            Ok(None) => {}
            Err(e) => eprintln!("⚠️ 页面抓取失败 {}: {}", company.website, e),
        }

        Ok(Some(company))
    }

    /// 内容分析辅助：失败时返回哨兵值
    async fn analyze_company_content(&self, company_name: &str, content: &str) -> CompanyAnalysis {
        match self
            .model
            .extract::<CompanyAnalysis>(
                prompts::TOOL_ANALYSIS_SYSTEM,
                &prompts::tool_analysis_user(company_name, content),
            )
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                eprintln!("❌ 内容分析失败 {}: {}", company_name, e);
                CompanyAnalysis::failed()
            }
        }
    }

    /// 第三阶段：带退避重试的综合推荐，重试耗尽后使用兜底分析
    async fn synthesize_analysis(
        &self,
        state: &mut ResearchState,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        println!("📝 正在生成最终推荐");

        let company_data = state
            .companies
            .iter()
            .filter_map(|company| serde_json::to_string(company).ok())
            .collect::<Vec<_>>()
            .join(",");
        let user_prompt = prompts::recommendations_user(&state.query, &company_data);

        let result = retry_with_backoff_if(
            &self.retry_policy,
            || async {
                if cancel.is_cancelled() {
                    return Err(SynthesisError::Cancelled);
                }
                self.model
                    .invoke(prompts::RECOMMENDATIONS_SYSTEM, &user_prompt)
                    .await
                    .map_err(SynthesisError::Model)
            },
            |err| matches!(err, SynthesisError::Model(_)),
        )
        .await;

        match result {
            Ok(analysis) => {
                println!("✅ 推荐生成完成");
                state.analysis = Some(analysis);
            }
            Err(SynthesisError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(SynthesisError::Model(e)) => {
                eprintln!("❌ 模型调用多次失败: {}，使用兜底分析", e);
                let fallback = fallback_analysis(state);
                state.analysis = Some(fallback);
            }
        }
        Ok(())
    }
}

/// 启动调研Agent工作流
pub async fn launch(config: &Config) -> Result<()> {
    println!("🚀 正在初始化开发者工具调研Agent");

    let provider_config = config.resolve_provider_config()?;
    if config.verbose {
        println!(
            "🤖 使用模型: {} ({})",
            provider_config.model_name(),
            provider_config.kind()
        );
    }
    let model = build_model(&provider_config)?
        .with_timeout(Duration::from_secs(config.llm_timeout_seconds));

    // 启动时检查模型连接，失败只告警不中止
    if let Err(e) = model.check_connection().await {
        eprintln!("⚠️ 模型连接检查未通过: {}，继续执行", e);
    }

    let search = FirecrawlClient::new(&config.firecrawl)?;
    let pipeline = ResearchPipeline::new(model, search).with_max_parallels(config.max_parallels);

    match &config.query {
        Some(query) => {
            let state = pipeline.run(query).await?;
            crate::cli::print_research_report(&state);
        }
        None => crate::cli::run_repl(&pipeline).await?,
    }

    Ok(())
}

// Include tests
#[cfg(test)]
mod tests;
