use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("arXiv 返回状态码 {0}")]
    Status(StatusCode),

    #[error("API错误: {0}")]
    Api(String),

    #[error("解析错误: {0}")]
    Feed(String),

    #[error("查询生成失败: {0}")]
    QueryGeneration(String),
}

impl From<atom_syndication::Error> for SearchError {
    fn from(err: atom_syndication::Error) -> Self {
        SearchError::Feed(err.to_string())
    }
}
