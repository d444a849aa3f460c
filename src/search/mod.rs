use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::common::client::HttpClient;
use crate::config::SearchConfig;

use self::errors::SearchError;
use self::models::{Paper, SearchQuery, SortBy, SortOrder};

pub mod atom;
pub mod errors;
pub mod models;
pub mod stats;

/// 把自然语言主题转换成 arXiv 查询语法，通常由大模型实现
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate_query(&self, topic: &str) -> Result<String, SearchError>;
}

pub struct ArxivResearcher {
    client: HttpClient,
    base_url: Url,
    query_generator: Option<Arc<dyn QueryGenerator>>,
}

impl ArxivResearcher {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| SearchError::InvalidUrl(format!("{} ({})", config.base_url, e)))?;
        let client = HttpClient::new(Some(config.timeout), &[])?;
        Ok(Self {
            client,
            base_url,
            query_generator: None,
        })
    }

    pub fn with_query_generator(mut self, generator: Arc<dyn QueryGenerator>) -> Self {
        self.query_generator = Some(generator);
        self
    }

    /// 按主题搜索，按提交时间倒序
    pub async fn search(&self, topic: &str, max_results: usize) -> Vec<Paper> {
        self.search_sorted(topic, max_results, SortBy::default(), SortOrder::default())
            .await
    }

    /// 先用（可能经 AI 优化的）查询检索；出错或没有结果时回退到基本查询，
    /// 回退也失败则返回空列表
    pub async fn search_sorted(
        &self,
        topic: &str,
        max_results: usize,
        sort_by: SortBy,
        sort_order: SortOrder,
    ) -> Vec<Paper> {
        if max_results == 0 {
            return Vec::new();
        }

        let query = self.build_query(topic).await;
        info!("搜索论文: '{}'", topic);
        info!("查询: {}", query);

        // 多取一些，过滤掉没有 PDF 的条目后仍然够用
        let request = SearchQuery {
            query,
            max_results: max_results * 2,
            sort_by,
            sort_order,
        };

        match self.fetch(&request, 0).await {
            Ok(mut papers) if !papers.is_empty() => {
                papers.truncate(max_results);
                info!("成功获取 {} 篇论文", papers.len());
                papers
            }
            Ok(_) => {
                info!("未找到有效论文，尝试备用搜索");
                self.fallback_search(topic, max_results, sort_by, sort_order).await
            }
            Err(e) => {
                error!("搜索失败: {}", e);
                self.fallback_search(topic, max_results, sort_by, sort_order).await
            }
        }
    }

    async fn fallback_search(
        &self,
        topic: &str,
        max_results: usize,
        sort_by: SortBy,
        sort_order: SortOrder,
    ) -> Vec<Paper> {
        let request = SearchQuery {
            query: SearchQuery::simple(topic),
            max_results: max_results * 2,
            sort_by,
            sort_order,
        };
        info!("执行备用搜索: {}", request.query);

        match self.fetch(&request, 1).await {
            Ok(mut papers) => {
                papers.truncate(max_results);
                info!("备用搜索获取了 {} 篇有效论文", papers.len());
                papers
            }
            Err(e) => {
                error!("备用搜索失败: {}", e);
                Vec::new()
            }
        }
    }

    async fn build_query(&self, topic: &str) -> String {
        let Some(generator) = &self.query_generator else {
            return SearchQuery::simple(topic);
        };

        match generator.generate_query(topic).await {
            Ok(query) => {
                let query = query.trim().trim_matches('`').trim();
                if query.is_empty() {
                    warn!("AI返回了空查询，使用基本查询");
                    SearchQuery::simple(topic)
                } else {
                    info!("AI生成查询: {}", query);
                    query.to_string()
                }
            }
            Err(e) => {
                warn!("查询生成失败: {}，使用基本查询", e);
                SearchQuery::simple(topic)
            }
        }
    }

    /// 按分类检索，例如 `cs.AI`
    pub async fn search_by_category(&self, category: &str, max_results: usize) -> Vec<Paper> {
        info!("按分类搜索: {}", category);
        let request = SearchQuery::new(format!("cat:{}", category.trim()), max_results);
        match self.fetch(&request, 0).await {
            Ok(papers) => {
                info!("分类 {} 找到 {} 篇论文", category, papers.len());
                papers
            }
            Err(e) => {
                error!("分类搜索失败: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn search_by_author(&self, author: &str, max_results: usize) -> Vec<Paper> {
        info!("按作者搜索: {}", author);
        let request = SearchQuery::new(format!("au:\"{}\"", author.trim()), max_results);
        match self.fetch(&request, 0).await {
            Ok(papers) => {
                info!("作者 {} 找到 {} 篇论文", author, papers.len());
                papers
            }
            Err(e) => {
                error!("作者搜索失败: {}", e);
                Vec::new()
            }
        }
    }

    /// 取三倍数量的结果后按发布日期（闭区间）过滤，没有日期的论文保留
    pub async fn search_by_date_range(
        &self,
        topic: &str,
        start: NaiveDate,
        end: NaiveDate,
        max_results: usize,
    ) -> Vec<Paper> {
        let papers = self.search(topic, max_results * 3).await;
        let filtered: Vec<Paper> = papers
            .into_iter()
            .filter(|paper| match paper.published_date() {
                Some(date) => start <= date && date <= end,
                None => true,
            })
            .take(max_results)
            .collect();

        info!("日期范围 [{}, {}] 内找到 {} 篇论文", start, end, filtered.len());
        filtered
    }

    async fn fetch(&self, request: &SearchQuery, attempt: u32) -> Result<Vec<Paper>, SearchError> {
        debug!("请求 arXiv: {}", request);
        let response = self
            .client
            .get(self.base_url.as_str(), attempt)
            .query(&request.params())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status));
        }

        let body = response.bytes().await?;
        atom::parse_feed(&body)
    }
}
