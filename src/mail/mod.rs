use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::common::client::HttpClient;
use crate::common::utils::FormatTool;
use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("未配置邮件 API 密钥")]
    NotConfigured,

    #[error("无效的邮箱地址: {0}")]
    InvalidAddress(String),

    #[error("HTTP错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("邮件服务返回状态码 {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// 发送成功时返回服务端的消息 ID
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<String, MailError>;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: String,
}

/// Resend 邮件接口
#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: HttpClient,
    api_key: String,
    from: String,
    base_url: String,
}

impl ResendMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let api_key = config.api_key.clone().ok_or(MailError::NotConfigured)?;
        Ok(Self {
            client: HttpClient::new(None, &[])?,
            api_key,
            from: config.from.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<String, MailError> {
        let to = to.trim();
        if !validate_email(to) {
            return Err(MailError::InvalidAddress(to.to_string()));
        }

        let email = Email {
            from: self.from.clone(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        };
        debug!("发送邮件: {} -> {}", subject, to);

        let response = self
            .client
            .post(&format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&email)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Status {
                status,
                body: FormatTool::truncate_text(&body, 200, "..."),
            });
        }

        let reply: SendResponse = response.json().await?;
        info!("邮件发送成功: {}", reply.id);
        Ok(reply.id)
    }
}

pub fn validate_email(address: &str) -> bool {
    FormatTool::validate_email(address.trim())
}

/// 单篇用论文标题，多篇用主题和数量
pub fn subject_for(topic: &str, titles: &[&str]) -> String {
    match titles {
        [title] => {
            let short: String = title.chars().take(30).collect();
            format!("ArXiv论文总结 - {}...", short)
        }
        _ => format!("ArXiv论文总结合集 - {} ({}篇)", topic, titles.len()),
    }
}
