use colored::*;

use crate::downloader::models::{BatchReport, DownloadOutcome};

use super::utils::FormatTool;

/// 漂亮的终端输出工具
pub struct PrettyLogger;

impl PrettyLogger {
    /// 显示成功消息
    pub fn success(message: impl AsRef<str>) {
        println!("{} {}", "✓".green().bold(), message.as_ref());
    }

    /// 显示信息消息
    pub fn info(message: impl AsRef<str>) {
        println!("{} {}", "ℹ".blue().bold(), message.as_ref());
    }

    /// 显示警告消息
    pub fn warning(message: impl AsRef<str>) {
        println!("{} {}", "⚠".yellow().bold(), message.as_ref());
    }

    /// 显示错误消息
    pub fn error(message: impl AsRef<str>) {
        println!("{} {}", "✗".red().bold(), message.as_ref());
    }

    /// 显示步骤开始
    pub fn step_start(step: impl AsRef<str>) {
        println!("\n{} {}", "▶".cyan().bold(), step.as_ref().bold());
    }

    /// 显示文件信息
    pub fn file_info(label: impl AsRef<str>, path: impl AsRef<str>) {
        println!("{} {}: {}", "📁".blue().bold(), label.as_ref().bold(), path.as_ref());
    }

    /// 显示论文信息
    pub fn paper_info(id: impl AsRef<str>, title: impl AsRef<str>) {
        println!("{} {} {}", "📄".magenta().bold(), id.as_ref().cyan(), title.as_ref().bold());
    }

    /// 显示分割线
    pub fn separator() {
        println!("{}", "─".repeat(50).bright_black());
    }

    /// 按任务顺序打印批量下载结果，失败项附带原因
    pub fn batch_report(report: &BatchReport) {
        Self::separator();
        for result in &report.results {
            match &result.outcome {
                DownloadOutcome::Downloaded { path, bytes } => Self::success(format!(
                    "{} 下载完成 ({}) -> {}",
                    result.task.id,
                    FormatTool::format_size(*bytes),
                    path.display()
                )),
                DownloadOutcome::AlreadyPresent { path, .. } => Self::info(format!(
                    "{} 已存在，跳过 -> {}",
                    result.task.id,
                    path.display()
                )),
                DownloadOutcome::Failed { kind, reason } => {
                    Self::error(format!("{} 失败 [{}]: {}", result.task.id, kind, reason))
                }
            }
        }
        Self::separator();
        println!(
            "{} 成功 {}，跳过 {}，失败 {}",
            "📊".bold(),
            report.succeeded.to_string().green(),
            report.skipped.to_string().blue(),
            report.failed.to_string().red()
        );
    }
}
