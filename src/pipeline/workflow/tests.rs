#[cfg(test)]
mod tests {
    use crate::error::{ModelError, PipelineError, ServiceError};
    use crate::llm::client::LanguageModel;
    use crate::pipeline::ResearchPipeline;
    use crate::search::{ScrapedPage, SearchHit, SearchProvider};
    use crate::types::research::CompanyAnalysis;
    use crate::utils::retry::RetryPolicy;
    use async_trait::async_trait;
    use schemars::JsonSchema;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// 按脚本顺序吐出响应的模型桩
    #[derive(Default)]
    struct ScriptedModel {
        invocations: Mutex<VecDeque<Result<String, ModelError>>>,
        extractions: Mutex<VecDeque<Result<serde_json::Value, ModelError>>>,
    }

    impl ScriptedModel {
        fn with_invocations(responses: Vec<Result<String, ModelError>>) -> Self {
            Self {
                invocations: Mutex::new(responses.into()),
                extractions: Mutex::new(VecDeque::new()),
            }
        }

        fn with_extraction(self, response: Result<serde_json::Value, ModelError>) -> Self {
            self.extractions.lock().unwrap().push_back(response);
            self
        }
    }

    fn model_err() -> ModelError {
        ModelError::Invocation("scripted failure".to_string())
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn invoke(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
        ) -> Result<String, ModelError> {
            self.invocations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::Invocation("no scripted response".to_string())))
        }

        async fn extract<T>(&self, _system_prompt: &str, _user_prompt: &str) -> Result<T, ModelError>
        where
            T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
        {
            match self.extractions.lock().unwrap().pop_front() {
                Some(Ok(value)) => serde_json::from_value(value)
                    .map_err(|e| ModelError::Invocation(e.to_string())),
                Some(Err(e)) => Err(e),
                None => Err(ModelError::Invocation("no scripted extraction".to_string())),
            }
        }
    }

    /// 按查询词返回预设结果的检索桩
    #[derive(Default)]
    struct ScriptedSearch {
        results: HashMap<String, Vec<SearchHit>>,
        pages: HashMap<String, String>,
        fail_all: bool,
    }

    impl ScriptedSearch {
        fn with_results(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
            self.results.insert(query.to_string(), hits);
            self
        }

        fn with_page(mut self, url: &str, markdown: &str) -> Self {
            self.pages.insert(url.to_string(), markdown.to_string());
            self
        }

        fn failing() -> Self {
            Self {
                fail_all: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SearchProvider for ScriptedSearch {
        async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>, ServiceError> {
            if self.fail_all {
                return Err(ServiceError::Transport("scripted outage".to_string()));
            }
            let hits = self.results.get(query).cloned().unwrap_or_default();
            Ok(hits.into_iter().take(limit as usize).collect())
        }

        async fn scrape(&self, url: &str) -> Result<Option<ScrapedPage>, ServiceError> {
            if self.fail_all {
                return Err(ServiceError::Transport("scripted outage".to_string()));
            }
            Ok(self.pages.get(url).map(|markdown| ScrapedPage {
                markdown: markdown.clone(),
            }))
        }
    }

    fn hit(url: &str, title: Option<&str>, snippet: &str) -> SearchHit {
        SearchHit {
            url: url.to_string(),
            title: title.map(ToString::to_string),
            snippet: snippet.to_string(),
        }
    }

    fn article_query(query: &str) -> String {
        format!("{query} tools comparison best alternatives")
    }

    fn site_query(tool: &str) -> String {
        format!("{tool} official site")
    }

    #[tokio::test]
    async fn test_stage1_empty_search_yields_empty_tools() {
        let model = ScriptedModel::with_invocations(vec![
            Ok(String::new()),            // 提取阶段：空响应
            Ok("some advice".to_string()), // 综合阶段
        ]);
        let search = ScriptedSearch::default();
        let pipeline = ResearchPipeline::new(model, search);

        let state = pipeline.run("vector databases").await.unwrap();

        assert!(state.extracted_tools.is_empty());
        assert!(state.companies.is_empty());
        assert_eq!(state.analysis.as_deref(), Some("some advice"));
    }

    #[tokio::test]
    async fn test_stage1_model_failure_degrades_to_empty_candidates() {
        let model = ScriptedModel::with_invocations(vec![
            Err(model_err()),              // 提取阶段失败
            Ok("fallback advice".to_string()),
        ]);
        let search = ScriptedSearch::default()
            .with_results(&article_query("ci servers"), vec![hit(
                "https://article.example/top-ci",
                Some("Top CI"),
                "",
            )])
            .with_page("https://article.example/top-ci", "Jenkins vs others");
        let pipeline = ResearchPipeline::new(model, search);

        let state = pipeline.run("ci servers").await.unwrap();

        assert!(state.extracted_tools.is_empty());
        // 回退路径用结果标题充当工具名
        assert_eq!(state.companies.len(), 0); // 没有官网检索结果，全部跳过
        assert!(state.analysis.is_some());
    }

    #[tokio::test]
    async fn test_stage2_truncates_to_first_four_candidates() {
        let model = ScriptedModel::with_invocations(vec![
            Ok("T1\nT2\nT3\nT4\nT5\nT6".to_string()),
            Ok("final advice".to_string()),
        ]);
        let mut search = ScriptedSearch::default();
        for tool in ["T1", "T2", "T3", "T4", "T5", "T6"] {
            search = search.with_results(
                &site_query(tool),
                vec![hit(
                    &format!("https://{}.example", tool.to_lowercase()),
                    Some(tool),
                    "snippet",
                )],
            );
        }
        let pipeline = ResearchPipeline::new(model, search);

        let state = pipeline.run("load testing").await.unwrap();

        assert_eq!(state.extracted_tools.len(), 6);
        let names: Vec<&str> = state.companies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["T1", "T2", "T3", "T4"]);
    }

    #[tokio::test]
    async fn test_stage2_fallback_derives_names_from_titles() {
        let model = ScriptedModel::with_invocations(vec![
            Ok(String::new()),             // 没有候选
            Ok("advice".to_string()),
        ]);
        let search = ScriptedSearch::default()
            .with_results(
                &article_query("feature flags"),
                vec![
                    hit("https://alpha.example", Some("Alpha"), ""),
                    hit("https://beta.example", None, ""),
                ],
            )
            .with_results(
                &site_query("Alpha"),
                vec![hit("https://alpha.example", Some("Alpha"), "alpha snippet")],
            )
            .with_results(
                &site_query("Unknown"),
                vec![hit("https://unknown.example", None, "unknown snippet")],
            );
        let pipeline = ResearchPipeline::new(model, search);

        let state = pipeline.run("feature flags").await.unwrap();

        let names: Vec<&str> = state.companies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Unknown"]);
    }

    #[tokio::test]
    async fn test_stage2_skips_tool_without_official_site_hit() {
        let model = ScriptedModel::with_invocations(vec![
            Ok("Found\nMissing\nAlsoFound".to_string()),
            Ok("advice".to_string()),
        ]);
        let search = ScriptedSearch::default()
            .with_results(
                &site_query("Found"),
                vec![hit("https://found.example", None, "s1")],
            )
            .with_results(
                &site_query("AlsoFound"),
                vec![hit("https://alsofound.example", None, "s2")],
            );
        let pipeline = ResearchPipeline::new(model, search);

        let state = pipeline.run("linters").await.unwrap();

        // 无命中的候选被跳过，顺序保持候选顺序
        let names: Vec<&str> = state.companies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Found", "AlsoFound"]);
    }

    #[tokio::test]
    async fn test_stage2_analysis_overwrites_company_fields() {
        let analysis_json = json!({
            "pricing_model": "Freemium",
            "is_open_source": true,
            "tech_stack": ["Rust"],
            "description": "A fast vector database",
            "api_available": true,
            "language_support": ["Python", "Rust"],
            "integration_capabilities": ["LangChain"]
        });
        let model = ScriptedModel::with_invocations(vec![
            Ok("Qdrant".to_string()),
            Ok("advice".to_string()),
        ])
        .with_extraction(Ok(analysis_json));
        let search = ScriptedSearch::default()
            .with_results(
                &site_query("Qdrant"),
                vec![hit("https://qdrant.tech", Some("Qdrant"), "raw snippet")],
            )
            .with_page("https://qdrant.tech", "Qdrant landing page markdown");
        let pipeline = ResearchPipeline::new(model, search);

        let state = pipeline.run("vector databases").await.unwrap();

        assert_eq!(state.companies.len(), 1);
        let company = &state.companies[0];
        assert_eq!(company.pricing_model.as_deref(), Some("Freemium"));
        assert_eq!(company.is_open_source, Some(true));
        assert_eq!(company.description, "A fast vector database");
        assert_eq!(company.website, "https://qdrant.tech");
    }

    #[tokio::test]
    async fn test_content_analysis_failure_returns_sentinel() {
        let model = ScriptedModel::with_invocations(vec![
            Ok("BrokenTool".to_string()),
            Ok("advice".to_string()),
        ])
        .with_extraction(Err(model_err()));
        let search = ScriptedSearch::default()
            .with_results(
                &site_query("BrokenTool"),
                vec![hit("https://broken.example", None, "raw snippet")],
            )
            .with_page("https://broken.example", "page content");
        let pipeline = ResearchPipeline::new(model, search);

        let state = pipeline.run("observability").await.unwrap();

        let company = &state.companies[0];
        assert_eq!(company.pricing_model.as_deref(), Some("Unknown"));
        assert_eq!(company.description, CompanyAnalysis::FAILED_DESCRIPTION);
        assert!(company.tech_stack.is_empty());
        assert!(company.is_open_source.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage3_retries_with_backoff_then_succeeds() {
        let model = ScriptedModel::with_invocations(vec![
            Ok("ToolA".to_string()),
            Err(model_err()),
            Err(model_err()),
            Ok("Third attempt advice".to_string()),
        ]);
        let search = ScriptedSearch::default().with_results(
            &site_query("ToolA"),
            vec![hit("https://toola.example", None, "snippet")],
        );
        let pipeline = ResearchPipeline::new(model, search);

        let started = tokio::time::Instant::now();
        let state = pipeline.run("api clients").await.unwrap();

        assert_eq!(state.analysis.as_deref(), Some("Third attempt advice"));
        // 两次失败之间分别退避2秒与4秒
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage3_all_attempts_fail_produces_fallback() {
        let model = ScriptedModel::with_invocations(vec![
            Ok("ToolA\nToolB".to_string()),
            Err(model_err()),
            Err(model_err()),
            Err(model_err()),
        ]);
        let search = ScriptedSearch::default()
            .with_results(
                &site_query("ToolA"),
                vec![hit("https://toola.example", None, "s1")],
            )
            .with_results(
                &site_query("ToolB"),
                vec![hit("https://toolb.example", None, "s2")],
            );
        let pipeline = ResearchPipeline::new(model, search);

        let state = pipeline.run("secret managers").await.unwrap();

        let analysis = state.analysis.expect("fallback analysis must be set");
        assert!(analysis.contains("Analysis temporarily unavailable"));
        assert!(analysis.contains("secret managers"));
        assert!(analysis.contains("Found 2 companies"));
        assert!(analysis.contains("- ToolA: https://toola.example"));
        assert!(analysis.contains("- ToolB: https://toolb.example"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_retry_policy_changes_backoff() {
        let model = ScriptedModel::with_invocations(vec![
            Ok(String::new()),
            Err(model_err()),
            Err(model_err()),
            Ok("advice".to_string()),
        ]);
        let pipeline = ResearchPipeline::new(model, ScriptedSearch::default())
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10), 2.0));

        let started = tokio::time::Instant::now();
        let state = pipeline.run("queues").await.unwrap();

        assert_eq!(state.analysis.as_deref(), Some("advice"));
        assert_eq!(started.elapsed(), Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_search_outage_degrades_but_run_completes() {
        let model = ScriptedModel::with_invocations(vec![Ok("advice".to_string())]);
        let pipeline = ResearchPipeline::new(model, ScriptedSearch::failing());

        let state = pipeline.run("vector databases").await.unwrap();

        assert!(state.extracted_tools.is_empty());
        assert!(state.companies.is_empty());
        assert_eq!(state.analysis.as_deref(), Some("advice"));
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_run() {
        let model = ScriptedModel::default();
        let pipeline = ResearchPipeline::new(model, ScriptedSearch::default());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = pipeline.run_with_cancel("anything", &cancel).await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn test_parallel_research_preserves_candidate_order() {
        let model = ScriptedModel::with_invocations(vec![
            Ok("A\nB\nC\nD".to_string()),
            Ok("advice".to_string()),
        ]);
        let mut search = ScriptedSearch::default();
        for tool in ["A", "B", "C", "D"] {
            search = search.with_results(
                &site_query(tool),
                vec![hit(
                    &format!("https://{}.example", tool.to_lowercase()),
                    None,
                    "snippet",
                )],
            );
        }
        let pipeline = ResearchPipeline::new(model, search).with_max_parallels(3);

        let state = pipeline.run("parsers").await.unwrap();

        let names: Vec<&str> = state.companies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }
}
