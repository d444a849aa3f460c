use std::sync::LazyLock;

use regex::Regex;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"));
static REPEATED_UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("valid regex"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid regex")
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

pub struct FormatTool;

impl FormatTool {
    // 格式化文件大小
    pub fn format_size(size: u64) -> String {
        if size < 1024 {
            format!("{} B", size)
        } else if size < 1024 * 1024 {
            format!("{:.1} KB", size as f64 / 1024.0)
        } else if size < 1024 * 1024 * 1024 {
            format!("{:.1} MB", size as f64 / 1024.0 / 1024.0)
        } else {
            format!("{:.1} GB", size as f64 / 1024.0 / 1024.0 / 1024.0)
        }
    }

    /// 生成安全的文件名：替换路径分隔符等特殊字符，合并连续下划线
    pub fn safe_filename(name: &str) -> String {
        let replaced = UNSAFE_CHARS.replace_all(name, "_");
        let collapsed = REPEATED_UNDERSCORES.replace_all(&replaced, "_");
        let trimmed = collapsed.trim_matches('_');
        if trimmed.is_empty() {
            "unnamed".to_string()
        } else {
            trimmed.to_string()
        }
    }

    // 按字符截断，避免切断多字节字符
    pub fn truncate_text(text: &str, max_chars: usize, suffix: &str) -> String {
        if text.chars().count() <= max_chars {
            return text.to_string();
        }
        let keep = max_chars.saturating_sub(suffix.chars().count());
        let mut out: String = text.chars().take(keep).collect();
        out.push_str(suffix);
        out
    }

    // 合并连续空白
    pub fn collapse_whitespace(text: &str) -> String {
        WHITESPACE.replace_all(text.trim(), " ").into_owned()
    }

    pub fn validate_email(email: &str) -> bool {
        EMAIL.is_match(email)
    }
}
