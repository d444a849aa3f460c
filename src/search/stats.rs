use std::collections::HashMap;

use chrono::Datelike;
use serde::Serialize;

use super::models::Paper;

const TOP_N: usize = 10;

/// 一批检索结果的简单统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaperStatistics {
    pub total_papers: usize,
    /// 出现次数最多的分类，按次数降序
    pub top_categories: Vec<(String, usize)>,
    pub top_authors: Vec<(String, usize)>,
    /// 按年份降序
    pub papers_by_year: Vec<(i32, usize)>,
}

impl PaperStatistics {
    pub fn from_papers(papers: &[Paper]) -> Self {
        if papers.is_empty() {
            return Self::default();
        }

        let mut categories: HashMap<&str, usize> = HashMap::new();
        let mut authors: HashMap<&str, usize> = HashMap::new();
        let mut years: HashMap<i32, usize> = HashMap::new();

        for paper in papers {
            for category in &paper.categories {
                *categories.entry(category.as_str()).or_default() += 1;
            }
            for author in &paper.authors {
                *authors.entry(author.as_str()).or_default() += 1;
            }
            if let Some(published) = paper.published {
                *years.entry(published.year()).or_default() += 1;
            }
        }

        let mut papers_by_year: Vec<_> = years.into_iter().collect();
        papers_by_year.sort_by(|a, b| b.0.cmp(&a.0));

        Self {
            total_papers: papers.len(),
            top_categories: top_n(categories),
            top_authors: top_n(authors),
            papers_by_year,
        }
    }

    /// `cs.CL(3), cs.LG(2)` 形式的前 n 个分类
    pub fn category_summary(&self, n: usize) -> String {
        self.top_categories
            .iter()
            .take(n)
            .map(|(cat, count)| format!("{}({})", cat, count))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn top_n(counts: HashMap<&str, usize>) -> Vec<(String, usize)> {
    let mut items: Vec<_> = counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    // 次数相同按名称排序，保证输出稳定
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items.truncate(TOP_N);
    items
}
