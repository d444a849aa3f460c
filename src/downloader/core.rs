use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::common::client::HttpClient;
use crate::config::DownloadConfig;

use super::error::DownloadError;
use super::models::{DownloadResult, DownloadTask};
use super::retry::RetryPolicy;
use super::validator::PdfValidator;

/// 单个任务的下载。批量下载器只依赖这个接口，测试时可以替换实现。
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, task: &DownloadTask) -> DownloadResult;
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: HttpClient,
    validator: PdfValidator,
    policy: RetryPolicy,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(config: &DownloadConfig) -> Result<Self, DownloadError> {
        // 超时由下载器按阶段控制，客户端本身不设整体超时
        let client = HttpClient::new(None, &config.user_agents)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: HttpClient, config: &DownloadConfig) -> Self {
        Self {
            client,
            validator: PdfValidator::from_config(config),
            policy: RetryPolicy::new(config.retry.clone()),
            timeout: config.request_timeout,
        }
    }

    pub fn validator(&self) -> &PdfValidator {
        &self.validator
    }

    pub async fn fetch(&self, task: &DownloadTask) -> DownloadResult {
        // 已存在且有效的文件直接跳过
        if let Some(bytes) = self.existing_valid_size(&task.dest).await {
            info!("PDF文件已存在: {}", task.dest.display());
            return DownloadResult::already_present(task.clone(), bytes);
        }

        if let Err(e) = self.prepare_destination(&task.dest).await {
            error!("❌ 无法准备目标路径: {}, 错误: {}", task.dest.display(), e);
            return DownloadResult::failed(task.clone(), e.kind(), e.to_string());
        }

        let this = self;
        let result = self
            .policy
            .run(move |attempt| this.download_once(task, attempt))
            .await;

        match result {
            Ok(bytes) => {
                info!("✅ PDF下载成功: {} ({} 字节)", task.dest.display(), bytes);
                DownloadResult::downloaded(task.clone(), bytes)
            }
            Err(e) => {
                error!("❌ 下载失败: {}, 错误: {}", task.id, e);
                DownloadResult::failed(task.clone(), e.kind(), e.to_string())
            }
        }
    }

    async fn existing_valid_size(&self, dest: &Path) -> Option<u64> {
        let metadata = tokio::fs::metadata(dest).await.ok()?;
        let outcome = self.validator.validate(dest).await;
        if outcome.valid {
            Some(metadata.len())
        } else {
            if let Some(reason) = outcome.reason {
                warn!("已有文件无效，将重新下载: {} - {}", dest.display(), reason);
            }
            None
        }
    }

    // 删除无效的旧文件并确保目录存在
    async fn prepare_destination(&self, dest: &Path) -> Result<(), DownloadError> {
        match tokio::fs::remove_file(dest).await {
            Ok(()) => debug!("已删除旧文件: {}", dest.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// 一次完整的尝试：流式写入临时文件，校验后原子重命名。
    /// 任何提前返回（包括 future 被丢弃）都会删除临时文件。
    async fn download_once(&self, task: &DownloadTask, attempt: u32) -> Result<u64, DownloadError> {
        info!(
            "正在下载论文PDF: {} (尝试 {}/{})",
            task.id,
            attempt + 1,
            self.policy.max_attempts()
        );

        let partial = PartialFile::new(task.temp_path());

        let response = tokio::time::timeout(self.timeout, self.client.get(&task.url, attempt).send())
            .await
            .map_err(|_| DownloadError::Timeout(self.timeout))??;
        check_response_status(&response, &task.url)?;

        let mut file = tokio::fs::File::create(partial.path()).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;

        loop {
            let next = tokio::time::timeout(self.timeout, stream.next())
                .await
                .map_err(|_| DownloadError::Timeout(self.timeout))?;
            match next {
                Some(Ok(chunk)) => {
                    file.write_all(&chunk).await?;
                    downloaded += chunk.len() as u64;
                }
                Some(Err(e)) => return Err(DownloadError::Stream(e.to_string())),
                None => break,
            }
        }
        file.flush().await?;
        drop(file);

        debug!("数据流结束: {} ({} 字节)", task.id, downloaded);

        let outcome = self.validator.validate(partial.path()).await;
        if let Some(reason) = outcome.reason {
            warn!("下载的文件未通过校验: {} - {}", task.id, reason);
            return Err(DownloadError::Validation(reason));
        }

        tokio::fs::rename(partial.path(), &task.dest).await?;
        partial.keep();
        Ok(downloaded)
    }
}

#[async_trait]
impl Fetch for Fetcher {
    async fn fetch(&self, task: &DownloadTask) -> DownloadResult {
        Fetcher::fetch(self, task).await
    }
}

// 检查响应状态并处理特殊情况
fn check_response_status(response: &reqwest::Response, url: &str) -> Result<(), DownloadError> {
    let status = response.status();
    debug!("Response Status: {}", status);

    if status.is_success() {
        return Ok(());
    }
    if matches!(
        status,
        reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::TOO_MANY_REQUESTS
    ) {
        warn!("⚠️ 状态码 {}，可能触发了频率限制: {}", status, url);
    } else {
        warn!("❌ 非成功状态码: {}", status);
    }
    Err(DownloadError::Status {
        status,
        url: url.to_string(),
    })
}

/// 临时文件守卫：除非调用 `keep`，离开作用域时删除文件
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("已清理临时文件: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("清理临时文件失败: {} - {}", self.path.display(), e),
        }
    }
}
