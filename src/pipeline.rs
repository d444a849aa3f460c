use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::{Config, ConfigError};
use crate::downloader::PaperDownloader;
use crate::downloader::models::BatchReport;
use crate::mail::{self, Mailer, ResendMailer};
use crate::search::ArxivResearcher;
use crate::search::models::Paper;
use crate::search::stats::PaperStatistics;
use crate::summary::{self, LlmSummarizer, Summarizer, render};

pub const DEFAULT_MAX_PAPERS: usize = 5;
pub const MAX_PAPERS_LIMIT: usize = 20;

pub fn clamp_max_papers(requested: usize) -> usize {
    requested.clamp(1, MAX_PAPERS_LIMIT)
}

/// 一次完整运行的结果
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub topic: String,
    pub papers_found: usize,
    pub download: BatchReport,
    /// 成功生成总结的论文 ID，顺序与检索结果一致
    pub summarized: Vec<String>,
    pub summary_failures: Vec<(String, String)>,
    pub summary_files: Vec<PathBuf>,
    pub email_id: String,
    pub elapsed: Duration,
}

pub struct Pipeline {
    config: Config,
    researcher: ArxivResearcher,
    downloader: PaperDownloader,
    summarizer: Option<Arc<dyn Summarizer>>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl Pipeline {
    /// 按配置组装各个组件，未配置的 AI / 邮件组件留空
    pub fn from_config(config: Config) -> Result<Self> {
        let downloader = PaperDownloader::new(&config.download).context("初始化下载器失败")?;
        let mut researcher = ArxivResearcher::new(&config.search).context("初始化检索器失败")?;

        let summarizer = if config.has_ai_config() {
            let llm = Arc::new(
                LlmSummarizer::new(&config.ai, config.download.retry.clone()).context("初始化模型客户端失败")?,
            );
            researcher = researcher.with_query_generator(llm.clone());
            Some(llm as Arc<dyn Summarizer>)
        } else {
            warn!("未设置API密钥，将跳过AI总结功能");
            None
        };

        let mailer = if config.has_email_config() {
            Some(Arc::new(ResendMailer::new(&config.mail).context("初始化邮件客户端失败")?) as Arc<dyn Mailer>)
        } else {
            None
        };

        Ok(Self::new(config, researcher, downloader, summarizer, mailer))
    }

    pub fn new(
        config: Config,
        researcher: ArxivResearcher,
        downloader: PaperDownloader,
        summarizer: Option<Arc<dyn Summarizer>>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        Self {
            config,
            researcher,
            downloader,
            summarizer,
            mailer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn researcher(&self) -> &ArxivResearcher {
        &self.researcher
    }

    pub fn downloader(&self) -> &PaperDownloader {
        &self.downloader
    }

    /// 检索并记录统计信息
    pub async fn search(&self, topic: &str, max_papers: usize) -> Vec<Paper> {
        info!("开始搜索主题: {}", topic);
        let papers = self.researcher.search(topic, max_papers).await;

        let stats = PaperStatistics::from_papers(&papers);
        if stats.total_papers > 0 {
            info!("论文统计: 总数={}", stats.total_papers);
            if !stats.top_categories.is_empty() {
                info!("主要分类: {}", stats.category_summary(3));
            }
        }
        papers
    }

    /// 只检索和下载，不生成总结
    pub async fn download_only(
        &self,
        topic: &str,
        max_papers: usize,
        cancel: CancellationToken,
    ) -> Result<(Vec<Paper>, BatchReport)> {
        let papers = self.search(topic, clamp_max_papers(max_papers)).await;
        if papers.is_empty() {
            bail!("未找到符合条件的论文");
        }
        let report = self.downloader.download_papers(&papers, cancel).await;
        Ok((papers, report))
    }

    /// 检索、下载、逐篇总结、合并成一封邮件发送
    pub async fn process_and_send(
        &self,
        topic: &str,
        email: &str,
        max_papers: usize,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        self.run(run_id, topic, email, max_papers, cancel)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        run_id: Uuid,
        topic: &str,
        email: &str,
        max_papers: usize,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let started = Instant::now();

        let summarizer = self.summarizer.as_ref().ok_or(ConfigError::Missing("MODEL_API_KEY"))?;
        let mailer = self.mailer.as_ref().ok_or(ConfigError::Missing("RESEND_API_KEY"))?;
        if !mail::validate_email(email) {
            bail!("无效的邮箱地址: {}", email);
        }
        let topic = topic.trim();
        if topic.is_empty() {
            bail!("搜索主题不能为空");
        }

        // 1. 检索
        let papers = self.search(topic, clamp_max_papers(max_papers)).await;
        if papers.is_empty() {
            bail!("未找到符合条件的论文");
        }
        info!("找到 {} 篇论文", papers.len());

        // 2. 批量下载
        info!("开始批量下载PDF...");
        let report = self.downloader.download_papers(&papers, cancel.clone()).await;
        for (id, kind, reason) in report.failures() {
            warn!("下载失败 [{}] {}: {}", kind, id, reason);
        }

        let downloaded: Vec<(&Paper, PathBuf)> = papers
            .iter()
            .zip(&report.results)
            .filter_map(|(paper, result)| result.path().map(|p| (paper, p.to_path_buf())))
            .collect();
        if downloaded.is_empty() {
            bail!("没有成功下载任何论文");
        }
        info!("成功下载 {} 篇论文，开始生成总结...", downloaded.len());

        // 3. 逐篇总结，单篇失败只跳过该篇
        let mut entries: Vec<(Paper, String)> = Vec::new();
        let mut summary_failures = Vec::new();
        let mut summary_files = Vec::new();
        for (paper, path) in downloaded {
            if cancel.is_cancelled() {
                bail!("任务已取消");
            }
            let content = summary::paper_content(paper, &path, self.config.ai.max_content_length).await;
            match summarizer.summarize(paper, &content).await {
                Ok(text) => {
                    match summary::save_summary(&self.config.download.data_dir, paper, &text).await {
                        Ok(file) => summary_files.push(file),
                        Err(e) => warn!("保存HTML文件失败: {}", e),
                    }
                    entries.push((paper.clone(), text));
                }
                Err(e) => {
                    error!("总结生成失败 {}: {}", paper.id, e);
                    summary_failures.push((paper.id.clone(), e.to_string()));
                }
            }
        }
        if entries.is_empty() {
            bail!("总结生成失败");
        }

        // 4. 合并并发送
        let titles: Vec<&str> = entries.iter().map(|(p, _)| p.title.as_str()).collect();
        let subject = mail::subject_for(topic, &titles);
        let html = match entries.as_slice() {
            [(paper, text)] => render::paper_html(paper, text),
            _ => render::digest_html(topic, &entries),
        };

        info!("正在发送邮件到: {}", email);
        let email_id = mailer.send(email, &subject, &html).await.context("邮件发送失败")?;
        if entries.len() == 1 {
            info!("✓ 邮件发送成功");
        } else {
            info!("✓ 合并邮件发送成功，包含 {} 篇论文", entries.len());
        }

        Ok(RunReport {
            run_id,
            topic: topic.to_string(),
            papers_found: papers.len(),
            download: report,
            summarized: entries.into_iter().map(|(p, _)| p.id).collect(),
            summary_failures,
            summary_files,
            email_id,
            elapsed: started.elapsed(),
        })
    }
}
