use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use super::retry::IsRetryable;
use super::validator::InvalidReason;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("请求超时 (超过 {0:?} 未收到数据)")]
    Timeout(Duration),

    #[error("HTTP 请求失败，状态码: {status}，URL: {url}")]
    Status { status: StatusCode, url: String },

    #[error("数据流中断: {0}")]
    Stream(String),

    #[error("文件校验失败: {0}")]
    Validation(InvalidReason),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("任务已取消")]
    Cancelled,
}

/// 按任务上报的错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 连接、超时、状态码或数据流错误，可重试
    Network,
    /// 下载完整但文件格式不正确，不在本次调用内重试
    Validation,
    /// 无法创建、写入或重命名文件
    Filesystem,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "NetworkError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Filesystem => "FilesystemError",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::Http(_)
            | DownloadError::Timeout(_)
            | DownloadError::Status { .. }
            | DownloadError::Stream(_) => ErrorKind::Network,
            DownloadError::Validation(_) => ErrorKind::Validation,
            DownloadError::Io(_) => ErrorKind::Filesystem,
            DownloadError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl IsRetryable for DownloadError {
    fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Network
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let status = DownloadError::Status {
            status: StatusCode::NOT_FOUND,
            url: "http://example.com/x.pdf".to_string(),
        };
        assert_eq!(status.kind(), ErrorKind::Network);
        assert!(status.is_retryable());

        let invalid = DownloadError::Validation(InvalidReason::WrongHeader);
        assert_eq!(invalid.kind(), ErrorKind::Validation);
        assert!(!invalid.is_retryable());

        let io = DownloadError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(io.kind(), ErrorKind::Filesystem);
        assert!(!io.is_retryable());
    }

    #[test]
    fn test_kind_display_names() {
        assert_eq!(ErrorKind::Network.to_string(), "NetworkError");
        assert_eq!(ErrorKind::Validation.to_string(), "ValidationError");
        assert_eq!(ErrorKind::Filesystem.to_string(), "FilesystemError");
    }
}
