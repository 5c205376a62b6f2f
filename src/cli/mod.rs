use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::AsyncBufReadExt;

use crate::config::Config;
use crate::llm::client::LanguageModel;
use crate::llm::provider::ProviderKind;
use crate::pipeline::ResearchPipeline;
use crate::search::SearchProvider;
use crate::types::research::{CompanyAnalysis, ResearchState};

/// DevScout - 由Rust与AI驱动的开发者工具调研Agent
#[derive(Parser, Debug)]
#[command(name = "devscout-rs")]
#[command(
    about = "AI-powered research agent for developer tooling. Discovers relevant tools for a query, researches each one on the web and produces a structured comparison with recommendations."
)]
#[command(version)]
pub struct Args {
    /// 一次性查询内容，缺省时进入交互模式
    pub query: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 模型Provider (ollama, groq, gemini, openrouter)
    #[arg(long)]
    pub model_type: Option<String>,

    /// 模型名称
    #[arg(long)]
    pub model_name: Option<String>,

    /// 温度参数
    #[arg(long)]
    pub temperature: Option<f64>,

    /// 模型配置映射文件路径
    #[arg(long)]
    pub model_config: Option<PathBuf>,

    /// 映射文件中要使用的配置名称
    #[arg(long)]
    pub model_config_name: Option<String>,

    /// 模型调用超时时间（秒）
    #[arg(long)]
    pub llm_timeout_seconds: Option<u64>,

    /// 第二阶段调研的并发上限
    #[arg(long)]
    pub max_parallels: Option<usize>,

    /// Firecrawl API KEY，缺省时读取FIRECRAWL_API_KEY
    #[arg(long)]
    pub firecrawl_api_key: Option<String>,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// 将CLI参数转换为配置
    pub fn into_config(self) -> Config {
        let mut config = if let Some(config_path) = &self.config {
            // 显式指定配置文件时必须可读，否则直接失败
            Config::from_file(config_path).unwrap_or_else(|_| {
                panic!("⚠️ 警告: 无法读取配置文件 {:?}", config_path)
            })
        } else {
            // 尝试从默认位置加载
            let default_config_path = std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("devscout.toml");

            if default_config_path.exists() {
                Config::from_file(&default_config_path).unwrap_or_else(|_| {
                    panic!(
                        "⚠️ 警告: 无法读取默认配置文件 {:?}",
                        default_config_path
                    )
                })
            } else {
                Config::default()
            }
        };

        if let Some(query) = self.query {
            config.query = Some(query);
        }

        // 覆盖模型配置
        if let Some(model_type_str) = self.model_type {
            if let Ok(model_type) = model_type_str.parse::<ProviderKind>() {
                config.model_type = model_type;
            } else {
                eprintln!(
                    "⚠️ 警告: 未知的provider: {}，使用默认provider",
                    model_type_str
                );
            }
        }
        if let Some(model_name) = self.model_name {
            config.model_name = model_name;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = Some(temperature);
        }
        if let Some(model_config) = self.model_config {
            config.model_config_file = Some(model_config);
        }
        if let Some(model_config_name) = self.model_config_name {
            config.model_config_name = Some(model_config_name);
        }
        if let Some(llm_timeout_seconds) = self.llm_timeout_seconds {
            config.llm_timeout_seconds = llm_timeout_seconds;
        }
        if let Some(max_parallels) = self.max_parallels {
            config.max_parallels = max_parallels;
        }
        if let Some(firecrawl_api_key) = self.firecrawl_api_key {
            config.firecrawl.api_key = Some(firecrawl_api_key);
        }
        config.verbose = self.verbose;

        config
    }
}

/// 交互式问答循环，quit/exit退出
pub async fn run_repl<M, S>(pipeline: &ResearchPipeline<M, S>) -> Result<()>
where
    M: LanguageModel,
    S: SearchProvider,
{
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("\n🔍 开发者工具查询: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();

        if query.eq_ignore_ascii_case("quit") || query.eq_ignore_ascii_case("exit") {
            println!("👋 再见");
            break;
        }
        if query.is_empty() {
            eprintln!("⚠️ 查询内容为空，请重新输入");
            continue;
        }

        let state = pipeline.run(query).await?;
        print_research_report(&state);
    }

    Ok(())
}

/// 打印单次调研的结果报告
pub fn print_research_report(state: &ResearchState) {
    println!("\n📊 调研结果: {}", state.query);
    println!("{}", "=".repeat(60));

    for (i, company) in state.companies.iter().enumerate() {
        println!("\n{}. 🏢 {}", i + 1, company.name);
        println!("   🌐 官网: {}", company.website);

        if let Some(pricing_model) = &company.pricing_model {
            println!("   💰 定价: {}", pricing_model);
        }
        if let Some(is_open_source) = company.is_open_source {
            println!("   📖 开源: {}", if is_open_source { "是" } else { "否" });
        }
        if !company.tech_stack.is_empty() {
            println!(
                "   🛠️ 技术栈: {}",
                company.tech_stack.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
            );
        }
        if !company.language_support.is_empty() {
            println!(
                "   💻 语言支持: {}",
                company
                    .language_support
                    .iter()
                    .take(5)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        if let Some(api_available) = company.api_available {
            println!(
                "   🔌 API: {}",
                if api_available { "✅ 可用" } else { "❌ 不可用" }
            );
        }
        if !company.integration_capabilities.is_empty() {
            println!(
                "   🔗 集成: {}",
                company
                    .integration_capabilities
                    .iter()
                    .take(4)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        if !company.description.is_empty()
            && company.description != CompanyAnalysis::FAILED_DESCRIPTION
        {
            println!("   📝 简介: {}", company.description);
        }
    }

    if let Some(analysis) = &state.analysis {
        println!("\n💡 开发者建议:");
        println!("{}", "-".repeat(40));
        println!("{}", analysis);
    }
}
