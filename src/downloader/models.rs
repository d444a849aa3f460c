use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::common::utils::FormatTool;
use crate::search::models::Paper;

use super::error::ErrorKind;

/// 单个下载任务，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTask {
    pub id: String,
    pub url: String,
    pub dest: PathBuf,
}

impl DownloadTask {
    pub fn new(id: impl Into<String>, url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            dest: dest.into(),
        }
    }

    /// 目标文件名只由标识决定，重复运行时才能识别已下载的文件
    pub fn in_dir(id: impl Into<String>, url: impl Into<String>, data_dir: &Path) -> Self {
        let id = id.into();
        let dest = data_dir.join(file_name_for(&id));
        Self::new(id, url, dest)
    }

    pub fn for_paper(paper: &Paper, data_dir: &Path) -> Self {
        Self::in_dir(paper.id.clone(), paper.pdf_url.clone(), data_dir)
    }

    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .dest
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        self.dest.with_file_name(name)
    }
}

pub fn file_name_for(id: &str) -> String {
    format!("{}.pdf", FormatTool::safe_filename(id))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    AlreadyPresent { path: PathBuf, bytes: u64 },
    Failed { kind: ErrorKind, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub task: DownloadTask,
    pub outcome: DownloadOutcome,
}

impl DownloadResult {
    pub fn downloaded(task: DownloadTask, bytes: u64) -> Self {
        let path = task.dest.clone();
        Self {
            task,
            outcome: DownloadOutcome::Downloaded { path, bytes },
        }
    }

    pub fn already_present(task: DownloadTask, bytes: u64) -> Self {
        let path = task.dest.clone();
        Self {
            task,
            outcome: DownloadOutcome::AlreadyPresent { path, bytes },
        }
    }

    pub fn failed(task: DownloadTask, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            task,
            outcome: DownloadOutcome::Failed {
                kind,
                reason: reason.into(),
            },
        }
    }

    pub fn cancelled(task: DownloadTask) -> Self {
        Self::failed(task, ErrorKind::Cancelled, "任务已取消")
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, DownloadOutcome::Failed { .. })
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.outcome {
            DownloadOutcome::Downloaded { path, .. } | DownloadOutcome::AlreadyPresent { path, .. } => {
                Some(path)
            }
            DownloadOutcome::Failed { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            DownloadOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// 批量下载结果，`results[i]` 对应输入的第 i 个任务
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub results: Vec<DownloadResult>,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn from_results(results: Vec<DownloadResult>) -> Self {
        let mut report = BatchReport::default();
        for result in &results {
            match result.outcome {
                DownloadOutcome::Downloaded { .. } => report.succeeded += 1,
                DownloadOutcome::AlreadyPresent { .. } => report.skipped += 1,
                DownloadOutcome::Failed { .. } => report.failed += 1,
            }
        }
        report.results = results;
        report
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// 可用于后续总结的文件（新下载或已存在），保持原顺序
    pub fn available(&self) -> impl Iterator<Item = (&DownloadTask, &Path)> {
        self.results
            .iter()
            .filter_map(|r| r.path().map(|path| (&r.task, path)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, ErrorKind, &str)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            DownloadOutcome::Failed { kind, reason } => Some((r.task.id.as_str(), *kind, reason.as_str())),
            _ => None,
        })
    }
}
