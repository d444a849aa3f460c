use indicatif::{ProgressBar, ProgressStyle};

use super::models::{DownloadOutcome, DownloadResult};

/// 批量下载的总进度条，关闭时为隐藏的进度条
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new(total: usize, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    pub fn record(&self, result: &DownloadResult) {
        let status = match result.outcome {
            DownloadOutcome::Downloaded { .. } => "完成",
            DownloadOutcome::AlreadyPresent { .. } => "跳过",
            DownloadOutcome::Failed { .. } => "失败",
        };
        self.bar.set_message(format!("{} {}", result.task.id, status));
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("批量下载结束");
    }
}
