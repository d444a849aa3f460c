use reqwest::StatusCode;
use thiserror::Error;

use crate::downloader::retry::IsRetryable;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("未配置模型 API 密钥")]
    NotConfigured,

    #[error("HTTP错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("模型接口返回状态码 {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("模型返回了空内容")]
    EmptyResponse,

    #[error("PDF内容提取失败: {0}")]
    Extract(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

impl IsRetryable for SummaryError {
    fn is_retryable(&self) -> bool {
        match self {
            SummaryError::Http(e) => !e.is_builder() && !e.is_decode(),
            SummaryError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            SummaryError::EmptyResponse => true,
            _ => false,
        }
    }
}
