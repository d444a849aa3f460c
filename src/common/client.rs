use std::sync::Arc;
use std::time::Duration;

use reqwest::{
    Client, ClientBuilder, RequestBuilder,
    header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT},
};
use tracing::debug;

pub const DEFAULT_USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
];

// 共享连接池的客户端，每次尝试轮换 User-Agent
#[derive(Debug, Clone)]
pub struct HttpClient {
    pub inner: Client,
    user_agents: Arc<Vec<String>>,
}

impl HttpClient {
    /// `timeout` 为整次请求的超时，下载器自己控制分段超时时传 `None`
    pub fn new(timeout: Option<Duration>, user_agents: &[String]) -> Result<Self, reqwest::Error> {
        let mut builder = ClientBuilder::new().default_headers(Self::get_default_headers());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let user_agents = if user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
        } else {
            user_agents.to_vec()
        };

        Ok(Self {
            inner: builder.build()?,
            user_agents: Arc::new(user_agents),
        })
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/pdf,application/atom+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9,zh-CN;q=0.8"));
        headers
    }

    pub fn user_agent(&self, attempt: u32) -> &str {
        let index = attempt as usize % self.user_agents.len();
        &self.user_agents[index]
    }

    pub fn get(&self, url: &str, attempt: u32) -> RequestBuilder {
        let ua = self.user_agent(attempt);
        debug!("GET {} (UA #{})", url, attempt as usize % self.user_agents.len());
        self.inner.get(url).header(USER_AGENT, ua)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.inner.post(url).header(USER_AGENT, self.user_agent(0))
    }
}
