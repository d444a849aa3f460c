use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::core::Fetch;
use super::error::ErrorKind;
use super::models::{BatchReport, DownloadResult, DownloadTask};
use super::progress::BatchProgress;

/// 并发受限的批量下载器。单个任务失败不会影响其它任务，结果顺序与输入一致。
#[derive(Clone)]
pub struct BatchDownloader {
    fetcher: Arc<dyn Fetch>,
    semaphore: Arc<Semaphore>, // 控制并发数
    show_progress: bool,
}

impl BatchDownloader {
    pub fn new(fetcher: Arc<dyn Fetch>, concurrency: usize) -> Self {
        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub async fn download_all(&self, tasks: Vec<DownloadTask>) -> BatchReport {
        self.download_all_until(tasks, CancellationToken::new()).await
    }

    /// 取消后，尚未完成的任务记为 `Cancelled`，正在进行的下载会清理临时文件
    pub async fn download_all_until(
        &self,
        tasks: Vec<DownloadTask>,
        cancel: CancellationToken,
    ) -> BatchReport {
        info!("开始批量下载 {} 篇论文的PDF", tasks.len());
        let progress = BatchProgress::new(tasks.len(), self.show_progress);

        let downloads = tasks.into_iter().map(|task| {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&self.semaphore);
            let cancel = cancel.clone();
            let progress = &progress;

            async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => DownloadResult::cancelled(task.clone()),
                    result = async {
                        let _permit = match semaphore.acquire().await {
                            Ok(permit) => permit,
                            Err(_) => {
                                return DownloadResult::failed(task.clone(), ErrorKind::Cancelled, "信号量已关闭");
                            }
                        };
                        fetcher.fetch(&task).await
                    } => result,
                };
                progress.record(&result);
                result
            }
        });

        let results = join_all(downloads).await;
        progress.finish();

        let report = BatchReport::from_results(results);
        info!(
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            "批量下载完成: 成功 {}/{} 篇论文",
            report.succeeded + report.skipped,
            report.len()
        );
        for (id, kind, reason) in report.failures() {
            warn!("✗ 下载失败: {} [{}] {}", id, kind, reason);
        }
        report
    }
}
