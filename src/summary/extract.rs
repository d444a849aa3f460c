//! PDF 正文的粗略提取
//!
//! 只处理未压缩或 `FlateDecode` 压缩的内容流，收集 `Tj`/`TJ`/`'`/`"`
//! 操作符显示的字符串。使用自定义编码或 CID 字体的文档通常提取不到
//! 多少内容，调用方应当在文本过短时改用论文元数据。

use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use flate2::read::ZlibDecoder;
use regex::bytes::Regex;
use tracing::{debug, info};

use crate::common::utils::FormatTool;

use super::error::SummaryError;

pub const MAX_CONTENT_LENGTH: usize = 50_000;
/// 少于这个长度视为提取失败（多半是扫描版）
pub const MIN_TEXT_LENGTH: usize = 100;
pub const TRUNCATION_NOTE: &str = "...\n[内容已截断]";

static STREAM_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)stream\r?\n").expect("valid regex"));

const END_STREAM: &[u8] = b"endstream";

/// 读取文件并提取文本，超过 `max_chars` 时截断
pub async fn extract_text(path: &Path, max_chars: usize) -> Result<String, SummaryError> {
    let bytes = tokio::fs::read(path).await?;
    let text = tokio::task::spawn_blocking(move || text_from_pdf_bytes(&bytes))
        .await
        .map_err(|e| SummaryError::Extract(e.to_string()))?;

    let len = text.chars().count();
    if len > max_chars {
        info!("截断PDF内容从{}到{}字符", len, max_chars);
    } else {
        debug!("提取到 {} 个字符: {}", len, path.display());
    }
    Ok(FormatTool::truncate_text(&text, max_chars, TRUNCATION_NOTE))
}

pub fn text_from_pdf_bytes(bytes: &[u8]) -> String {
    let mut raw = String::new();
    for stream in content_streams(bytes) {
        show_text(&stream, &mut raw);
        raw.push('\n');
    }

    raw.lines()
        .map(FormatTool::collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn content_streams(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut streams = Vec::new();
    let mut cursor = 0;

    while let Some(m) = STREAM_START.find_at(bytes, cursor) {
        let data_start = m.end();
        let Some(len) = find(&bytes[data_start..], END_STREAM) else {
            break;
        };
        let dict_start = rfind(&bytes[cursor..m.start()], b"obj")
            .map(|i| cursor + i)
            .unwrap_or(cursor);
        let dict = &bytes[dict_start..m.start()];
        let data = &bytes[data_start..data_start + len];
        cursor = data_start + len + END_STREAM.len();

        if is_binary_payload(dict) {
            continue;
        }
        if find(dict, b"/FlateDecode").is_some() {
            streams.push(inflate(data));
        } else if find(dict, b"/Filter").is_none() {
            streams.push(data.to_vec());
        }
    }
    streams
}

// 图片、字体和对象流里没有可显示的文本
fn is_binary_payload(dict: &[u8]) -> bool {
    [&b"/Image"[..], b"/Length1", b"/FontFile", b"/ObjStm", b"/XRef"]
        .iter()
        .any(|marker| find(dict, marker).is_some())
}

fn inflate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    // 损坏的流保留已经解压出的部分
    if let Err(e) = ZlibDecoder::new(data).read_to_end(&mut out) {
        debug!("内容流解压不完整: {}", e);
    }
    out
}

fn show_text(content: &[u8], out: &mut String) {
    let mut pending: Vec<Vec<u8>> = Vec::new();
    let mut i = 0;

    while i < content.len() {
        match content[i] {
            b'(' => {
                let (s, next) = read_literal(content, i + 1);
                pending.push(s);
                i = next;
            }
            b'<' if content.get(i + 1) == Some(&b'<') => {
                pending.clear();
                i += 2;
            }
            b'<' => {
                let (s, next) = read_hex(content, i + 1);
                pending.push(s);
                i = next;
            }
            b'%' => {
                while i < content.len() && content[i] != b'\n' && content[i] != b'\r' {
                    i += 1;
                }
            }
            b'/' => {
                i += 1;
                while i < content.len() && is_regular(content[i]) {
                    i += 1;
                }
            }
            // ' 和 " 操作符先换行再显示
            b'\'' | b'"' => {
                push_break(out, '\n');
                flush(&mut pending, out);
                i += 1;
            }
            b if b.is_ascii_alphabetic() => {
                let start = i;
                while i < content.len() && (content[i].is_ascii_alphanumeric() || content[i] == b'*') {
                    i += 1;
                }
                match &content[start..i] {
                    b"Tj" | b"TJ" => flush(&mut pending, out),
                    b"Td" | b"TD" | b"T*" | b"Tm" => push_break(out, ' '),
                    b"ET" => push_break(out, '\n'),
                    _ => pending.clear(),
                }
            }
            _ => i += 1,
        }
    }
}

fn flush(pending: &mut Vec<Vec<u8>>, out: &mut String) {
    for s in pending.drain(..) {
        for b in s {
            match b {
                b' '..=b'~' => out.push(b as char),
                b'\n' | b'\r' | b'\t' => out.push(' '),
                _ => {}
            }
        }
    }
}

fn push_break(out: &mut String, c: char) {
    if !out.ends_with(char::is_whitespace) {
        out.push(c);
    }
}

fn is_regular(b: u8) -> bool {
    !b.is_ascii_whitespace() && !b"()<>[]{}/%".contains(&b)
}

/// 读取字面量字符串，`start` 指向左括号之后，返回内容和右括号之后的位置
fn read_literal(content: &[u8], start: usize) -> (Vec<u8>, usize) {
    let mut out = Vec::new();
    let mut depth = 1;
    let mut i = start;

    while i < content.len() {
        let b = content[i];
        match b {
            b'\\' => {
                i += 1;
                let Some(&next) = content.get(i) else { break };
                match next {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' | b'f' => {}
                    b'0'..=b'7' => {
                        let mut value: u32 = 0;
                        let mut digits = 0;
                        while digits < 3 && i < content.len() && (b'0'..=b'7').contains(&content[i]) {
                            value = value * 8 + u32::from(content[i] - b'0');
                            i += 1;
                            digits += 1;
                        }
                        out.push((value & 0xff) as u8);
                        continue;
                    }
                    b'\r' | b'\n' => {}
                    other => out.push(other),
                }
                i += 1;
            }
            b'(' => {
                depth += 1;
                out.push(b);
                i += 1;
            }
            b')' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    break;
                }
                out.push(b);
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }
    (out, i)
}

fn read_hex(content: &[u8], start: usize) -> (Vec<u8>, usize) {
    let mut digits = Vec::new();
    let mut i = start;
    while i < content.len() && content[i] != b'>' {
        if content[i].is_ascii_hexdigit() {
            digits.push(content[i]);
        }
        i += 1;
    }
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }
    let bytes = digits
        .chunks(2)
        .filter_map(|pair| std::str::from_utf8(pair).ok())
        .filter_map(|pair| u8::from_str_radix(pair, 16).ok())
        .collect();
    (bytes, (i + 1).min(content.len()))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn pdf_with_stream(dict: &str, data: &[u8]) -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n4 0 obj ".to_vec();
        pdf.extend_from_slice(dict.as_bytes());
        pdf.extend_from_slice(b"\nstream\n");
        pdf.extend_from_slice(data);
        pdf.extend_from_slice(b"\nendstream\nendobj\n%%EOF\n");
        pdf
    }

    #[test]
    fn test_uncompressed_text_operators() {
        let content = b"BT /F1 12 Tf 72 712 Td (Hello \\(world\\)) Tj ET\nBT [(Deep) -250 (Learning)] TJ ET";
        let text = text_from_pdf_bytes(&pdf_with_stream("<< /Length 80 >>", content));
        assert_eq!(text, "Hello (world)\nDeepLearning");
    }

    #[test]
    fn test_flate_stream_is_inflated() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"BT (Compressed text) Tj ET").unwrap();
        let data = encoder.finish().unwrap();

        let text = text_from_pdf_bytes(&pdf_with_stream("<< /Filter /FlateDecode >>", &data));
        assert_eq!(text, "Compressed text");
    }

    #[test]
    fn test_quote_operator_starts_new_line() {
        let content = b"BT (first) Tj (second) ' ET";
        let text = text_from_pdf_bytes(&pdf_with_stream("<< >>", content));
        assert_eq!(text, "first\nsecond");
    }

    #[test]
    fn test_hex_and_octal_strings() {
        let content = b"BT <48656c6c6f> Tj ( \\101BC) Tj ET";
        let text = text_from_pdf_bytes(&pdf_with_stream("<< >>", content));
        assert_eq!(text, "Hello ABC");
    }

    #[test]
    fn test_image_streams_are_ignored() {
        let content = b"BT (not text) Tj ET";
        let text = text_from_pdf_bytes(&pdf_with_stream("<< /Subtype /Image >>", content));
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_extract_text_truncates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("long.pdf");
        let body = format!("BT ({}) Tj ET", "a".repeat(500));
        tokio::fs::write(&path, pdf_with_stream("<< >>", body.as_bytes())).await.unwrap();

        let text = extract_text(&path, 100).await.unwrap();
        assert_eq!(text.chars().count(), 100);
        assert!(text.ends_with(TRUNCATION_NOTE));
    }
}
