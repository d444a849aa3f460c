use atom_syndication::{Entry, Feed};
use chrono::Utc;
use tracing::{debug, warn};

use crate::common::utils::FormatTool;

use super::errors::SearchError;
use super::models::Paper;

const API_ERROR_MARKER: &str = "/api/errors";

/// 解析 arXiv Atom 响应。API 返回的错误条目会转成 `SearchError::Api`，
/// 缺少标题、ID 或 PDF 链接的条目会被跳过。
pub fn parse_feed(body: &[u8]) -> Result<Vec<Paper>, SearchError> {
    let feed = Feed::read_from(body)?;

    if let Some(entry) = feed.entries().iter().find(|e| e.id().contains(API_ERROR_MARKER)) {
        let message = entry
            .summary()
            .map(|s| FormatTool::collapse_whitespace(s.as_str()))
            .unwrap_or_else(|| entry.title().as_str().to_string());
        return Err(SearchError::Api(message));
    }

    debug!("找到 {} 个条目", feed.entries().len());
    Ok(feed.entries().iter().filter_map(parse_entry).collect())
}

fn parse_entry(entry: &Entry) -> Option<Paper> {
    let abs_url = entry.id().trim();
    let title = FormatTool::collapse_whitespace(entry.title().as_str());
    if abs_url.is_empty() || title.is_empty() {
        warn!("论文条目缺少标题或ID");
        return None;
    }

    let id = arxiv_id(abs_url);
    let Some(pdf_url) = entry
        .links()
        .iter()
        .find(|link| link.mime_type() == Some("application/pdf") || link.title() == Some("pdf"))
        .map(|link| link.href().to_string())
    else {
        warn!("论文 {} 没有PDF链接", id);
        return None;
    };

    let summary = entry
        .summary()
        .map(|s| FormatTool::collapse_whitespace(s.as_str()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "摘要不可用".to_string());

    let authors = entry
        .authors()
        .iter()
        .map(|person| person.name().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    let categories = entry
        .categories()
        .iter()
        .map(|category| category.term().to_string())
        .filter(|term| !term.is_empty())
        .collect();

    Some(Paper {
        id,
        title,
        authors,
        summary,
        published: entry.published().map(|dt| dt.with_timezone(&Utc)),
        pdf_url,
        abs_url: abs_url.to_string(),
        categories,
    })
}

/// `http://arxiv.org/abs/2301.12345v2` -> `2301.12345v2`，
/// 旧式标识 `abs/hep-th/9901001v1` 保留分类前缀
pub fn arxiv_id(abs_url: &str) -> String {
    match abs_url.split_once("abs/") {
        Some((_, id)) if !id.is_empty() => id.trim_end_matches('/').to_string(),
        _ => abs_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(abs_url)
            .to_string(),
    }
}
