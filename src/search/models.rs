use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 从 arXiv 检索到的一篇论文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// 去掉 `abs/` 前缀后的 arXiv 标识，如 `2301.12345v2`
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub pdf_url: String,
    pub abs_url: String,
    pub categories: Vec<String>,
}

impl Paper {
    pub fn published_date(&self) -> Option<NaiveDate> {
        self.published.map(|dt| dt.date_naive())
    }

    /// 用于展示的发布日期
    pub fn published_label(&self) -> String {
        self.published_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "日期不可用".to_string())
    }

    pub fn authors_label(&self) -> String {
        if self.authors.is_empty() {
            "作者不可用".to_string()
        } else {
            self.authors.join(", ")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    Relevance,
    LastUpdatedDate,
    #[default]
    SubmittedDate,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::LastUpdatedDate => "lastUpdatedDate",
            SortBy::SubmittedDate => "submittedDate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ascending",
            SortOrder::Descending => "descending",
        }
    }
}

/// 一次 API 请求的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: usize,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            max_results,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
        }
    }

    /// 不经过 AI 优化的基本查询
    pub fn simple(topic: &str) -> String {
        format!("all:\"{}\"", topic.trim())
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("search_query", self.query.clone()),
            ("start", "0".to_string()),
            ("max_results", self.max_results.to_string()),
            ("sortBy", self.sort_by.as_str().to_string()),
            ("sortOrder", self.sort_order.as_str().to_string()),
        ]
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (max_results={})", self.query, self.max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_query_quotes_topic() {
        assert_eq!(SearchQuery::simple("  large language models "), "all:\"large language models\"");
    }

    #[test]
    fn test_query_params() {
        let params = SearchQuery::new("cat:cs.AI", 10).params();
        assert!(params.contains(&("max_results", "10".to_string())));
        assert!(params.contains(&("sortBy", "submittedDate".to_string())));
        assert!(params.contains(&("sortOrder", "descending".to_string())));
    }

    #[test]
    fn test_paper_json_keeps_published_timestamp() {
        use chrono::TimeZone;

        let paper = Paper {
            id: "2401.00001v1".into(),
            title: "t".into(),
            authors: vec!["A".into()],
            summary: String::new(),
            published: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
            pdf_url: "http://x/2401.00001v1.pdf".into(),
            abs_url: "http://x/abs/2401.00001v1".into(),
            categories: vec!["cs.AI".into()],
        };
        let json = serde_json::to_value(&paper).unwrap();
        assert_eq!(json["published"], "2024-01-02T03:04:05Z");

        let back: Paper = serde_json::from_value(json).unwrap();
        assert_eq!(back.published, paper.published);
    }

    #[test]
    fn test_labels_for_missing_metadata() {
        let paper = Paper {
            id: "1".into(),
            title: "t".into(),
            authors: vec![],
            summary: String::new(),
            published: None,
            pdf_url: "http://x/1.pdf".into(),
            abs_url: "http://x/abs/1".into(),
            categories: vec![],
        };
        assert_eq!(paper.published_label(), "日期不可用");
        assert_eq!(paper.authors_label(), "作者不可用");
    }
}
