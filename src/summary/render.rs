use std::sync::LazyLock;

use chrono::Local;
use regex::Regex;

use crate::search::models::Paper;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*$").expect("valid regex"));
static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]\s+(.*)$").expect("valid regex"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));
static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));

const STYLE: &str = "\
body { font-family: 'Arial', sans-serif; line-height: 1.6; max-width: 800px; margin: 0 auto; padding: 20px; background-color: #f5f5f5; }
.container { background-color: white; padding: 30px; border-radius: 10px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
h1 { color: #2c3e50; border-bottom: 3px solid #3498db; padding-bottom: 10px; }
h2 { color: #34495e; margin-top: 25px; }
.paper-info { background-color: #ecf0f1; padding: 15px; border-radius: 5px; margin-bottom: 20px; }
.summary-content { text-align: justify; }
hr { border: none; border-top: 1px solid #ddd; margin: 30px 0; }";

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(PartialEq)]
enum Block {
    None,
    Paragraph,
    Unordered,
    Ordered,
}

/// 只支持总结里常见的写法：标题、列表、粗体、行内代码和段落
pub fn markdown_to_html(markdown: &str) -> String {
    let mut html = String::new();
    let mut block = Block::None;

    for line in markdown.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            close_block(&mut html, &mut block);
            continue;
        }

        if let Some(caps) = HEADING.captures(trimmed) {
            close_block(&mut html, &mut block);
            let level = caps[1].len();
            html.push_str(&format!("<h{0}>{1}</h{0}>\n", level, inline(&caps[2])));
            continue;
        }

        let bullet = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
            .or_else(|| trimmed.strip_prefix("+ "));
        if let Some(item) = bullet {
            open_block(&mut html, &mut block, Block::Unordered);
            html.push_str(&format!("<li>{}</li>\n", inline(item.trim())));
            continue;
        }

        if let Some(caps) = ORDERED_ITEM.captures(trimmed) {
            open_block(&mut html, &mut block, Block::Ordered);
            html.push_str(&format!("<li>{}</li>\n", inline(caps[1].trim())));
            continue;
        }

        if block == Block::Paragraph {
            html.push('\n');
        } else {
            open_block(&mut html, &mut block, Block::Paragraph);
        }
        html.push_str(&inline(trimmed));
    }

    close_block(&mut html, &mut block);
    html
}

fn open_block(html: &mut String, block: &mut Block, next: Block) {
    if *block == next {
        return;
    }
    close_block(html, block);
    html.push_str(match next {
        Block::Paragraph => "<p>",
        Block::Unordered => "<ul>\n",
        Block::Ordered => "<ol>\n",
        Block::None => "",
    });
    *block = next;
}

fn close_block(html: &mut String, block: &mut Block) {
    html.push_str(match block {
        Block::Paragraph => "</p>\n",
        Block::Unordered => "</ul>\n",
        Block::Ordered => "</ol>\n",
        Block::None => "",
    });
    *block = Block::None;
}

fn inline(text: &str) -> String {
    let escaped = escape_html(text);
    let bold = BOLD.replace_all(&escaped, "<strong>$1</strong>");
    CODE.replace_all(&bold, "<code>$1</code>").into_owned()
}

fn paper_info(paper: &Paper) -> String {
    let pdf = escape_html(&paper.pdf_url);
    format!(
        r#"<div class="paper-info">
<p><strong>标题：</strong>{title}</p>
<p><strong>作者：</strong>{authors}</p>
<p><strong>发布日期：</strong>{published}</p>
<p><strong>ArXiv ID：</strong>{id}</p>
<p><strong>PDF链接：</strong><a href="{pdf}" target="_blank">{pdf}</a></p>
</div>"#,
        title = escape_html(&paper.title),
        authors = escape_html(&paper.authors_label()),
        published = paper.published_label(),
        id = escape_html(&paper.id),
        pdf = pdf,
    )
}

fn document(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<style>
{style}
</style>
</head>
<body>
<div class="container">
{body}
</div>
</body>
</html>
"#,
        title = escape_html(title),
        style = STYLE,
        body = body,
    )
}

/// 单篇论文的总结页面
pub fn paper_html(paper: &Paper, summary: &str) -> String {
    let short_title: String = paper.title.chars().take(50).collect();
    let body = format!(
        "<h1>论文总结</h1>\n{}\n<div class=\"summary-content\">\n<h2>详细总结</h2>\n{}</div>",
        paper_info(paper),
        markdown_to_html(summary)
    );
    document(&format!("论文总结 - {}", short_title), &body)
}

/// 多篇论文合并成一封邮件的页面，顺序与 `entries` 一致
pub fn digest_html(topic: &str, entries: &[(Paper, String)]) -> String {
    let mut body = format!(
        "<h1>ArXiv论文总结合集</h1>\n<p><strong>主题：</strong>{}　<strong>论文数：</strong>{}　<strong>生成时间：</strong>{}</p>\n",
        escape_html(topic),
        entries.len(),
        Local::now().format("%Y-%m-%d %H:%M")
    );

    for (index, (paper, summary)) in entries.iter().enumerate() {
        if index > 0 {
            body.push_str("<hr>\n");
        }
        body.push_str(&format!(
            "<h2>{}. {}</h2>\n{}\n<div class=\"summary-content\">\n{}</div>\n",
            index + 1,
            escape_html(&paper.title),
            paper_info(paper),
            markdown_to_html(summary)
        ));
    }

    document(&format!("ArXiv论文总结合集 - {}", topic), &body)
}
