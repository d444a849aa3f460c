use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::DownloadConfig;
use crate::search::models::Paper;

use self::batch::BatchDownloader;
use self::core::{Fetch, Fetcher};
use self::error::DownloadError;
use self::models::{BatchReport, DownloadTask};
use self::validator::PdfValidator;

pub mod batch;
pub mod core;
pub mod error;
pub mod models;
pub mod progress;
pub mod retry;
pub mod validator;

/// 面向论文的下载入口：生成任务、批量下载、整理数据目录
pub struct PaperDownloader {
    data_dir: PathBuf,
    batch: BatchDownloader,
    validator: PdfValidator,
}

impl PaperDownloader {
    pub fn new(config: &DownloadConfig) -> Result<Self, DownloadError> {
        let fetcher = Fetcher::new(config)?;
        Ok(Self::with_fetcher(Arc::new(fetcher), config))
    }

    pub fn with_fetcher(fetcher: Arc<dyn Fetch>, config: &DownloadConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            batch: BatchDownloader::new(fetcher, config.concurrency).with_progress(config.show_progress),
            validator: PdfValidator::from_config(config),
        }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn tasks_for(&self, papers: &[Paper]) -> Vec<DownloadTask> {
        papers
            .iter()
            .map(|paper| DownloadTask::for_paper(paper, &self.data_dir))
            .collect()
    }

    pub async fn download_papers(&self, papers: &[Paper], cancel: CancellationToken) -> BatchReport {
        let tasks = self.tasks_for(papers);
        self.batch.download_all_until(tasks, cancel).await
    }

    /// 数据目录下所有已下载的 PDF，按文件名排序
    pub async fn list_downloaded(&self) -> Result<Vec<PathBuf>, DownloadError> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")) {
                files.push(path);
            }
        }
        files.sort();
        info!("找到 {} 个已下载的PDF文件", files.len());
        Ok(files)
    }

    /// 删除无效的 PDF 和遗留的 `.part` 临时文件，返回删除数量
    pub async fn cleanup_invalid(&self) -> Result<usize, DownloadError> {
        info!("开始清理无效PDF文件");
        let mut cleaned = 0;

        for path in self.list_downloaded().await? {
            let outcome = self.validator.validate(&path).await;
            if let Some(reason) = outcome.reason {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {
                        info!("已删除无效PDF: {} ({})", path.display(), reason);
                        cleaned += 1;
                    }
                    Err(e) => error!("删除文件失败 {}: {}", path.display(), e),
                }
            }
        }

        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(cleaned),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "part") {
                tokio::fs::remove_file(&path).await?;
                info!("已删除残留临时文件: {}", path.display());
                cleaned += 1;
            }
        }

        info!("清理完成，删除了 {} 个无效文件", cleaned);
        Ok(cleaned)
    }
}
