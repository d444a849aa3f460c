use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::bytes::Regex;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::config::DownloadConfig;

pub const PDF_SIGNATURE: &[u8] = b"%PDF-";
const EOF_MARKER: &[u8] = b"%%EOF";
// 有些生成器在 %%EOF 之后还会追加少量字节
const TAIL_WINDOW: usize = 1024;

static PAGE_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)/Type\s*/Page\b").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    Missing,
    NotAFile,
    TooSmall { size: u64, min: u64 },
    WrongHeader,
    Truncated,
    NoPages,
    Unreadable(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Missing => write!(f, "文件不存在"),
            InvalidReason::NotAFile => write!(f, "路径不是普通文件"),
            InvalidReason::TooSmall { size, min } => {
                write!(f, "文件过小 ({} 字节，至少需要 {} 字节)", size, min)
            }
            InvalidReason::WrongHeader => write!(f, "文件头不是 PDF 签名 (wrong header bytes)"),
            InvalidReason::Truncated => write!(f, "缺少 %%EOF 结束标记，文件可能被截断 (truncated)"),
            InvalidReason::NoPages => write!(f, "未找到任何页面对象"),
            InvalidReason::Unreadable(e) => write!(f, "无法读取文件: {}", e),
        }
    }
}

/// 校验结果。`valid` 为 true 时文件一定满足最小体积与 PDF 签名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub reason: Option<InvalidReason>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self { valid: true, reason: None }
    }

    pub fn invalid(reason: InvalidReason) -> Self {
        Self { valid: false, reason: Some(reason) }
    }
}

#[derive(Debug, Clone)]
pub struct PdfValidator {
    min_size: u64,
    structure_check: bool,
}

impl PdfValidator {
    pub fn new(min_size: u64, structure_check: bool) -> Self {
        Self { min_size, structure_check }
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self::new(config.min_file_size, config.structure_check)
    }

    /// 依次检查体积、文件头和（可选的）结构。从不返回错误，IO 失败也归入无效原因。
    pub async fn validate(&self, path: &Path) -> ValidationOutcome {
        let outcome = self.check(path).await;
        match &outcome.reason {
            None => debug!("PDF文件验证通过: {}", path.display()),
            Some(reason) => debug!("PDF文件验证失败: {} - {}", path.display(), reason),
        }
        outcome
    }

    async fn check(&self, path: &Path) -> ValidationOutcome {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ValidationOutcome::invalid(InvalidReason::Missing);
            }
            Err(e) => return ValidationOutcome::invalid(InvalidReason::Unreadable(e.to_string())),
        };
        if !metadata.is_file() {
            return ValidationOutcome::invalid(InvalidReason::NotAFile);
        }

        let size = metadata.len();
        if size == 0 || size < self.min_size {
            return ValidationOutcome::invalid(InvalidReason::TooSmall {
                size,
                min: self.min_size,
            });
        }

        if !self.structure_check {
            return match read_header(path).await {
                Ok(header) if header.starts_with(PDF_SIGNATURE) => ValidationOutcome::ok(),
                Ok(_) => ValidationOutcome::invalid(InvalidReason::WrongHeader),
                Err(e) => ValidationOutcome::invalid(InvalidReason::Unreadable(e.to_string())),
            };
        }

        match tokio::fs::read(path).await {
            Ok(bytes) => inspect_document(&bytes),
            Err(e) => ValidationOutcome::invalid(InvalidReason::Unreadable(e.to_string())),
        }
    }
}

async fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut header = vec![0u8; PDF_SIGNATURE.len()];
    let mut filled = 0;
    while filled < header.len() {
        let n = file.read(&mut header[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    header.truncate(filled);
    Ok(header)
}

/// 轻量结构检查：签名、结束标记和页面对象，不解析内容流
pub fn inspect_document(bytes: &[u8]) -> ValidationOutcome {
    if !bytes.starts_with(PDF_SIGNATURE) {
        return ValidationOutcome::invalid(InvalidReason::WrongHeader);
    }

    let tail_start = bytes.len().saturating_sub(TAIL_WINDOW);
    if !contains(&bytes[tail_start..], EOF_MARKER) {
        return ValidationOutcome::invalid(InvalidReason::Truncated);
    }

    // 页面对象可能被压缩进对象流，此时无法在不解压的情况下计数
    if PAGE_OBJECT.is_match(bytes) || contains(bytes, b"/ObjStm") {
        ValidationOutcome::ok()
    } else {
        ValidationOutcome::invalid(InvalidReason::NoPages)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn minimal_pdf(padding: usize) -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n\
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n\
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >> endobj\n"
            .to_vec();
        pdf.extend(std::iter::repeat_n(b'%', padding));
        pdf.extend_from_slice(b"\ntrailer << /Root 1 0 R >>\n%%EOF\n");
        pdf
    }

    async fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, bytes).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_accepts_minimal_valid_pdf() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "ok.pdf", &minimal_pdf(1200)).await;
        let outcome = PdfValidator::new(1000, true).validate(&path).await;
        assert_eq!(outcome, ValidationOutcome::ok());
    }

    #[tokio::test]
    async fn test_rejects_zero_byte_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.pdf", b"").await;
        let outcome = PdfValidator::new(0, false).validate(&path).await;
        assert!(!outcome.valid);
        assert_eq!(outcome.reason, Some(InvalidReason::TooSmall { size: 0, min: 0 }));
    }

    #[tokio::test]
    async fn test_rejects_wrong_signature() {
        let dir = TempDir::new().unwrap();
        let mut bytes = b"<html><body>Rate limited</body></html>".to_vec();
        bytes.extend(std::iter::repeat_n(b' ', 2000));
        let path = write(&dir, "page.pdf", &bytes).await;

        for structure_check in [false, true] {
            let outcome = PdfValidator::new(1000, structure_check).validate(&path).await;
            assert_eq!(outcome.reason, Some(InvalidReason::WrongHeader));
        }
    }

    #[tokio::test]
    async fn test_rejects_small_file_before_header_check() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "tiny.pdf", b"%PDF-1.4 tiny").await;
        let outcome = PdfValidator::new(1000, true).validate(&path).await;
        assert!(matches!(outcome.reason, Some(InvalidReason::TooSmall { size: 13, min: 1000 })));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let outcome = PdfValidator::new(1, true).validate(&dir.path().join("nope.pdf")).await;
        assert_eq!(outcome.reason, Some(InvalidReason::Missing));
    }

    #[tokio::test]
    async fn test_structure_check_detects_truncation() {
        let dir = TempDir::new().unwrap();
        let full = minimal_pdf(2000);
        let truncated = &full[..full.len() - 40];
        let path = write(&dir, "cut.pdf", truncated).await;

        let strict = PdfValidator::new(1000, true).validate(&path).await;
        assert_eq!(strict.reason, Some(InvalidReason::Truncated));

        let lenient = PdfValidator::new(1000, false).validate(&path).await;
        assert!(lenient.valid);
    }

    #[test]
    fn test_pages_collection_alone_is_not_a_page() {
        let mut bytes = b"%PDF-1.7\n1 0 obj << /Type /Pages /Count 0 >> endobj\n".to_vec();
        bytes.extend_from_slice(b"%%EOF\n");
        assert_eq!(inspect_document(&bytes).reason, Some(InvalidReason::NoPages));
    }

    #[test]
    fn test_object_streams_pass_page_check() {
        let mut bytes = b"%PDF-1.5\n5 0 obj << /Type /ObjStm /N 3 /First 20 >> stream\n".to_vec();
        bytes.extend_from_slice(b"endstream endobj\n%%EOF");
        assert!(inspect_document(&bytes).valid);
    }
}
