//! 三个LLM触点的固定提示词

/// 候选工具提取的系统指令
pub const TOOL_EXTRACTION_SYSTEM: &str = r#"You are a tech researcher. Extract specific tool, library, platform or service names from articles.
Focus on actual products and services that developers can use, not generic concepts or categories.
Respond with only the tool names, one per line, no numbering, bullets or descriptions."#;

/// 候选工具提取的用户指令
pub fn tool_extraction_user(query: &str, content: &str) -> String {
    format!(
        r#"Query: {query}
Article content:
{content}

Extract a list of up to 8 specific tool/service names relevant to "{query}".
One tool name per line."#
    )
}

/// 公司内容分析的系统指令
pub const TOOL_ANALYSIS_SYSTEM: &str = r#"You are analyzing developer tools and programming platforms.
Focus on extracting information that matters to developers: pricing model, open source status,
tech stack, API availability, supported programming languages and integration capabilities.
If a field is not mentioned in the content, leave it unset or empty."#;

/// 公司内容分析的用户指令
pub fn tool_analysis_user(company_name: &str, content: &str) -> String {
    format!(
        r#"Company/Tool: {company_name}

Website content:
{content}

Analyze this content from a developer's perspective and fill in the structured output."#
    )
}

/// 最终推荐生成的系统指令
pub const RECOMMENDATIONS_SYSTEM: &str = r#"You are a senior software engineer giving quick, concise tech recommendations to developers.
Keep the answer brief and actionable: 3-4 sentences total.
Mention specific tools by name, include pricing or open source considerations, and name the best choice for most developers."#;

/// 最终推荐生成的用户指令
pub fn recommendations_user(query: &str, company_data: &str) -> String {
    format!(
        r#"Developer query: {query}

Researched tools (structured data):
{company_data}

Give your concise recommendation for this query."#
    )
}
