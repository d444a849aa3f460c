use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use thiserror::Error;
use tracing::{debug, info};

use crate::common::client::DEFAULT_USER_AGENTS;

pub const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const RESEND_API_URL: &str = "https://api.resend.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置项 {key} 的值无效: {value}")]
    InvalidValue { key: String, value: String },

    #[error("缺少必要配置: {0}")]
    Missing(&'static str),
}

/// 重试策略参数
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 总尝试次数（包含第一次）
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub data_dir: PathBuf,
    /// 建立连接、等待响应头以及两个数据块之间的最长等待时间
    pub request_timeout: Duration,
    pub concurrency: usize,
    pub min_file_size: u64,
    pub structure_check: bool,
    pub user_agents: Vec<String>,
    pub show_progress: bool,
    pub retry: RetryConfig,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            request_timeout: Duration::from_secs(60),
            concurrency: 3,
            min_file_size: 1000,
            structure_check: true,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            show_progress: false,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: ARXIV_API_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_content_length: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: OPENAI_API_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            max_content_length: 50_000,
            max_tokens: 1500,
            temperature: 0.2,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: Option<String>,
    pub from: String,
    pub base_url: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            from: "ArXiv论文助手 <onboarding@resend.dev>".to_string(),
            base_url: RESEND_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub time: NaiveTime,
    pub topic: Option<String>,
    pub email: Option<String>,
    pub max_papers: Option<usize>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
            topic: None,
            email: None,
            max_papers: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub download: DownloadConfig,
    pub search: SearchConfig,
    pub ai: AiConfig,
    pub mail: MailConfig,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// 读取 `.env` 与进程环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("已加载环境文件: {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源构建配置，空字符串视为未设置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Config::default();

        if let Some(dir) = get("DATA_DIR") {
            config.download.data_dir = PathBuf::from(dir);
        }
        if let Some(attempts) = parse_var::<u32>(&get, "MAX_DOWNLOAD_RETRIES")? {
            config.download.retry.max_attempts = attempts.max(1);
        }
        if let Some(secs) = parse_var::<u64>(&get, "DOWNLOAD_TIMEOUT")? {
            config.download.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<f64>(&get, "RETRY_DELAY")? {
            config.download.retry.initial_delay = Duration::try_from_secs_f64(secs)
                .map_err(|_| invalid("RETRY_DELAY", &secs.to_string()))?;
        }
        if let Some(n) = parse_var::<usize>(&get, "DOWNLOAD_CONCURRENCY")? {
            config.download.concurrency = n.max(1);
        }
        if let Some(size) = parse_var::<u64>(&get, "MIN_PDF_SIZE")? {
            config.download.min_file_size = size;
        }
        if let Some(flag) = get("PDF_STRUCTURE_CHECK") {
            config.download.structure_check = parse_bool("PDF_STRUCTURE_CHECK", &flag)?;
        }

        if let Some(url) = get("ARXIV_BASE_URL") {
            config.search.base_url = url;
        }

        config.ai.api_key = get("MODEL_API_KEY").or_else(|| get("OPENAI_API_KEY"));
        if let Some(url) = get("MODEL_BASE_URL").or_else(|| get("OPENAI_BASE_URL")) {
            config.ai.base_url = url;
        }
        if let Some(model) = get("MODEL_NAME") {
            config.ai.model = model;
        }
        if let Some(len) = parse_var::<usize>(&get, "MAX_CONTENT_LENGTH")? {
            config.ai.max_content_length = len;
        }

        config.mail.api_key = get("RESEND_API_KEY");
        if let Some(from) = get("EMAIL_FROM") {
            config.mail.from = from;
        }

        if let Some(time) = get("SCHEDULED_TIME") {
            config.schedule.time = NaiveTime::parse_from_str(&time, "%H:%M")
                .map_err(|_| invalid("SCHEDULED_TIME", &time))?;
        }
        config.schedule.topic = get("SCHEDULED_TOPIC");
        config.schedule.email = get("SCHEDULED_EMAIL");
        config.schedule.max_papers = parse_var::<usize>(&get, "SCHEDULED_MAX_PAPERS")?;

        Ok(config)
    }

    pub fn has_ai_config(&self) -> bool {
        self.ai.api_key.is_some()
    }

    pub fn has_email_config(&self) -> bool {
        self.mail.api_key.is_some()
    }

    pub fn trace_loaded(&self) {
        info!(
            data_dir = %self.download.data_dir.display(),
            concurrency = self.download.concurrency,
            max_attempts = self.download.retry.max_attempts,
            timeout_secs = self.download.request_timeout.as_secs(),
            ai_configured = self.has_ai_config(),
            email_configured = self.has_email_config(),
            "配置加载完成"
        );
    }
}

fn parse_var<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match get(key) {
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| invalid(key, &raw)),
        None => Ok(None),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw)),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
