use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use arxiv_digest::common::logger::PrettyLogger;
use arxiv_digest::common::utils::FormatTool;
use arxiv_digest::config::{Config, ConfigError};
use arxiv_digest::pipeline::{DEFAULT_MAX_PAPERS, Pipeline, RunReport, clamp_max_papers};
use arxiv_digest::scheduler;
use arxiv_digest::search::models::Paper;

use crate::cli::{Cli, Command};

mod cli;

fn init_tracing(verbose: bool) {
    // --verbose 优先于 RUST_LOG
    let filter = if verbose {
        EnvFilter::new("arxiv_digest=debug,arxivd=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// 环境变量 + 命令行覆盖
fn load_config(args: &Cli) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(dir) = &args.data_dir {
        config.download.data_dir = dir.clone();
    }
    if let Some(n) = args.concurrency {
        config.download.concurrency = n.max(1);
    }
    config.download.show_progress = true;
    config.trace_loaded();
    Ok(config)
}

fn print_papers(papers: &[Paper]) {
    PrettyLogger::separator();
    for paper in papers {
        PrettyLogger::paper_info(&paper.id, &paper.title);
        println!("   作者: {}", FormatTool::truncate_text(&paper.authors_label(), 80, "..."));
        println!("   日期: {}  分类: {}", paper.published_label(), paper.categories.join(", "));
        println!("   PDF: {}", paper.pdf_url);
    }
    PrettyLogger::separator();
    PrettyLogger::info(format!("共 {} 篇论文", papers.len()));
}

fn print_run_report(report: &RunReport) {
    PrettyLogger::batch_report(&report.download);
    for (id, reason) in &report.summary_failures {
        PrettyLogger::warning(format!("{} 总结失败: {}", id, reason));
    }
    for file in &report.summary_files {
        PrettyLogger::file_info("总结", file.display().to_string());
    }
    PrettyLogger::success(format!(
        "主题 '{}' 完成：{} 篇论文已总结并发送 (耗时 {:.1}s，运行 {})",
        report.topic,
        report.summarized.len(),
        report.elapsed.as_secs_f64(),
        report.run_id
    ));
}

async fn run_scheduled(pipeline: &Pipeline, run_now: bool, shutdown: CancellationToken) -> Result<()> {
    let schedule = &pipeline.config().schedule;
    let topic = schedule.topic.clone().ok_or(ConfigError::Missing("SCHEDULED_TOPIC"))?;
    let email = schedule.email.clone().ok_or(ConfigError::Missing("SCHEDULED_EMAIL"))?;
    let max_papers = clamp_max_papers(schedule.max_papers.unwrap_or(DEFAULT_MAX_PAPERS));

    PrettyLogger::step_start("ArXiv论文自动总结定时任务");
    PrettyLogger::info(format!("搜索主题: '{}'", topic));
    PrettyLogger::info(format!("目标邮箱: {}", email));
    PrettyLogger::info(format!("最大论文数: {}", max_papers));
    PrettyLogger::info("按 Ctrl+C 停止程序");

    let job_shutdown = shutdown.clone();
    scheduler::run_daily(schedule.time, run_now, shutdown, || {
        let (topic, email, cancel) = (&topic, &email, job_shutdown.clone());
        async move {
            match pipeline.process_and_send(topic, email, max_papers, cancel).await {
                Ok(report) => print_run_report(&report),
                Err(e) => {
                    error!("定时任务执行出错: {:#}", e);
                    PrettyLogger::error(format!("定时任务执行失败: {:#}", e));
                }
            }
        }
    })
    .await;
    Ok(())
}

async fn dispatch(args: Cli, pipeline: Pipeline, shutdown: CancellationToken) -> Result<()> {
    match args.command {
        Command::Run { topic, email } => {
            let max_papers = clamp_max_papers(topic.max_papers);
            PrettyLogger::step_start(format!("处理主题: '{}'，最大论文数: {}", topic.topic, max_papers));
            let report = pipeline
                .process_and_send(&topic.topic, &email, max_papers, shutdown)
                .await?;
            print_run_report(&report);
        }
        Command::Schedule { now } => run_scheduled(&pipeline, now, shutdown).await?,
        Command::Search {
            topic,
            category,
            author,
            max,
            json,
        } => {
            let max = clamp_max_papers(max);
            let papers = match (topic, category, author) {
                (_, Some(category), _) => pipeline.researcher().search_by_category(&category, max).await,
                (_, _, Some(author)) => pipeline.researcher().search_by_author(&author, max).await,
                (Some(topic), _, _) => pipeline.search(&topic, max).await,
                (None, None, None) => Vec::new(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&papers)?);
            } else {
                print_papers(&papers);
            }
        }
        Command::Download { topic } => {
            PrettyLogger::step_start(format!("下载主题: '{}'", topic.topic));
            let (_, report) = pipeline
                .download_only(&topic.topic, topic.max_papers, shutdown)
                .await?;
            PrettyLogger::batch_report(&report);
        }
        Command::Cleanup => {
            let removed = pipeline.downloader().cleanup_invalid().await?;
            PrettyLogger::success(format!("清理完成，删除了 {} 个无效文件", removed));
        }
        Command::List => {
            let files = pipeline.downloader().list_downloaded().await?;
            for file in &files {
                let size = tokio::fs::metadata(file).await.map(|m| m.len()).unwrap_or(0);
                PrettyLogger::file_info(FormatTool::format_size(size), file.display().to_string());
            }
            PrettyLogger::info(format!(
                "{} 中共有 {} 个PDF文件",
                pipeline.downloader().data_dir().display(),
                files.len()
            ));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);
    debug!("命令行参数: {:?}", args);

    let config = load_config(&args).context("加载配置失败")?;
    let pipeline = Pipeline::from_config(config)?;

    // Ctrl+C 取消正在进行的下载和定时任务
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("用户中断，正在停止...");
            token.cancel();
        }
    });

    if let Err(e) = dispatch(args, pipeline, shutdown).await {
        error!("程序执行出错: {:#}", e);
        PrettyLogger::error(format!("{:#}", e));
        return Err(e);
    }
    info!("{}", "程序运行完成！".green());
    Ok(())
}
