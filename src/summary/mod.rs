use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::common::client::HttpClient;
use crate::common::utils::FormatTool;
use crate::config::{AiConfig, RetryConfig};
use crate::downloader::retry::RetryPolicy;
use crate::search::QueryGenerator;
use crate::search::errors::SearchError;
use crate::search::models::Paper;

use self::error::SummaryError;
use self::extract::{MIN_TEXT_LENGTH, TRUNCATION_NOTE};

pub mod error;
pub mod extract;
pub mod render;

const SUMMARY_SYSTEM_PROMPT: &str = "你是专业学术论文分析师，擅长总结科学论文。";
const QUERY_SYSTEM_PROMPT: &str = "你是学术搜索专家";

/// 根据论文内容生成 Markdown 格式的总结
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, paper: &Paper, content: &str) -> Result<String, SummaryError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI 兼容的 `chat/completions` 客户端
#[derive(Debug, Clone)]
pub struct LlmSummarizer {
    client: HttpClient,
    api_key: String,
    config: AiConfig,
    policy: RetryPolicy,
}

impl LlmSummarizer {
    pub fn new(config: &AiConfig, retry: RetryConfig) -> Result<Self, SummaryError> {
        let api_key = config.api_key.clone().ok_or(SummaryError::NotConfigured)?;
        let client = HttpClient::new(Some(config.timeout), &[])?;
        Ok(Self {
            client,
            api_key,
            config: config.clone(),
            policy: RetryPolicy::new(retry),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn chat(&self, system: &str, user: &str, max_tokens: u32, temperature: f32) -> Result<String, SummaryError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            max_tokens,
            temperature,
        };

        self.policy
            .run(|attempt| {
                let request = &request;
                async move {
                    debug!("调用模型 {} (尝试 {})", self.config.model, attempt + 1);
                    let response = self
                        .client
                        .post(&self.endpoint())
                        .bearer_auth(&self.api_key)
                        .json(request)
                        .send()
                        .await?;

                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(SummaryError::Status {
                            status,
                            body: FormatTool::truncate_text(&body, 200, "..."),
                        });
                    }

                    let reply: ChatResponse = response.json().await?;
                    reply
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.message.content)
                        .map(|content| content.trim().to_string())
                        .filter(|content| !content.is_empty())
                        .ok_or(SummaryError::EmptyResponse)
                }
            })
            .await
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, paper: &Paper, content: &str) -> Result<String, SummaryError> {
        let content = FormatTool::truncate_text(content, self.config.max_content_length, TRUNCATION_NOTE);
        let prompt = format!(
            "请对以下论文进行详细总结分析，包括：\n\
1. 研究背景和问题\n\
2. 主要贡献和创新点\n\
3. 方法论\n\
4. 实验结果和结论\n\n\
请用中文总结，格式清晰，各部分用标题分隔。\n\
如果论文内容不完整，请根据现有内容进行总结。\n\n\
论文内容：\n{}\n",
            content
        );

        info!("正在生成论文总结: {}", FormatTool::truncate_text(&paper.title, 50, "..."));
        let summary = self
            .chat(SUMMARY_SYSTEM_PROMPT, &prompt, self.config.max_tokens, self.config.temperature)
            .await?;
        info!("总结生成成功，长度: {}字符", summary.chars().count());
        Ok(summary)
    }
}

#[async_trait]
impl QueryGenerator for LlmSummarizer {
    async fn generate_query(&self, topic: &str) -> Result<String, SearchError> {
        let prompt = format!(
            "为arXiv生成精确搜索查询，要求：\n\
1. 使用双引号包裹关键短语\n\
2. 包含标题、摘要和分类字段\n\
3. 返回查询格式如：'ti:\"transformer\" AND abs:\"attention\" OR cat:cs.CL'\n\
4. 主题：{}\n\
5. 只返回查询字符串，无需解释",
            topic
        );
        self.chat(QUERY_SYSTEM_PROMPT, &prompt, 100, 0.0)
            .await
            .map_err(|e| SearchError::QueryGeneration(e.to_string()))
    }
}

/// 正文过短时使用的元数据
pub fn metadata_content(paper: &Paper) -> String {
    format!(
        "标题: {}\n作者: {}\n摘要: {}",
        paper.title,
        paper.authors_label(),
        paper.summary
    )
}

/// 组合论文元数据与 PDF 正文，作为总结的输入
pub async fn paper_content(paper: &Paper, pdf_path: &Path, max_chars: usize) -> String {
    let pdf_text = match extract::extract_text(pdf_path, max_chars).await {
        Ok(text) if text.chars().count() >= MIN_TEXT_LENGTH => text,
        Ok(_) => {
            warn!("PDF内容提取失败或内容过少，可能是扫描版: {}", pdf_path.display());
            metadata_content(paper)
        }
        Err(e) => {
            warn!("PDF内容提取失败: {}", e);
            metadata_content(paper)
        }
    };

    format!(
        "# {}\n\n## 作者\n{}\n\n## 发布日期\n{}\n\n## ArXiv ID\n{}\n\n## 摘要\n{}\n\n## PDF内容\n{}\n",
        paper.title,
        paper.authors_label(),
        paper.published_label(),
        paper.id,
        paper.summary,
        pdf_text
    )
}

/// 把单篇总结写成 `<id>_summary.html`，返回文件路径
pub async fn save_summary(data_dir: &Path, paper: &Paper, summary: &str) -> Result<PathBuf, SummaryError> {
    tokio::fs::create_dir_all(data_dir).await?;
    let path = data_dir.join(format!("{}_summary.html", FormatTool::safe_filename(&paper.id)));
    tokio::fs::write(&path, render::paper_html(paper, summary)).await?;
    info!("总结已保存: {}", path.display());
    Ok(path)
}
