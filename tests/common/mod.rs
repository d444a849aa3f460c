#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use arxiv_digest::config::{DownloadConfig, RetryConfig};

/// 一页的最小合法 PDF，`padding` 用来撑过最小体积限制
pub fn minimal_pdf(padding: usize) -> Vec<u8> {
    let mut pdf = b"%PDF-1.4\n\
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n\
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >> endobj\n"
        .to_vec();
    pdf.extend(std::iter::repeat_n(b'%', padding));
    pdf.extend_from_slice(b"\ntrailer << /Root 1 0 R >>\n%%EOF\n");
    pdf
}

pub fn valid_pdf() -> Vec<u8> {
    minimal_pdf(1500)
}

/// 测试用下载配置：重试间隔很短，不显示进度条
pub fn create_test_config(data_dir: &Path) -> DownloadConfig {
    DownloadConfig {
        data_dir: data_dir.to_path_buf(),
        request_timeout: Duration::from_secs(5),
        concurrency: 3,
        min_file_size: 1000,
        structure_check: true,
        show_progress: false,
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..DownloadConfig::default()
    }
}

/// 列出目录里的文件名，排序后返回
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
