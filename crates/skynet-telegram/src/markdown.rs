//! Markdown → Telegram HTML conversion.
//!
//! Covers the subset of Markdown the agent typically produces: bold,
//! italic, inline code, fenced code blocks, links, headings, blockquotes,
//! lists, strikethrough, horizontal rules and tables. Only tags Telegram's
//! `parse_mode=HTML` actually supports are emitted: `<b>`, `<i>`, `<s>`,
//! `<code>`, `<pre>`, `<a>`, `<blockquote>`. Everything else is escaped.

use once_cell::sync::Lazy;
use regex::Regex;

pub fn to_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(text.len() + 32);
    for (is_code, segment) in split_code_blocks(text) {
        if is_code {
            out.push_str(&segment);
            continue;
        }
        for (is_table, chunk) in split_tables(&segment) {
            if is_table {
                out.push_str(&chunk);
            } else {
                out.push_str(&convert_inline(&chunk));
            }
        }
    }
    out
}

// ---------------------------------------------------------------------
// Fenced code blocks
// ---------------------------------------------------------------------

static CODE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```(\w*)\n(.*?)```").unwrap());

fn split_code_blocks(text: &str) -> Vec<(bool, String)> {
    let mut parts = Vec::new();
    let mut last_end = 0;

    for caps in CODE_BLOCK_RE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        if whole.start() > last_end {
            parts.push((false, text[last_end..whole.start()].to_string()));
        }
        let lang = caps.get(1).unwrap().as_str();
        let mut code = caps.get(2).unwrap().as_str();
        if let Some(stripped) = code.strip_suffix('\n') {
            code = stripped;
        }
        let rendered = if lang.is_empty() {
            format!("<pre>{}</pre>", escape_html(code))
        } else {
            format!(
                "<pre><code class=\"language-{}\">{}</code></pre>",
                escape_html(lang),
                escape_html(code)
            )
        };
        parts.push((true, rendered));
        last_end = whole.end();
    }

    if last_end < text.len() {
        parts.push((false, text[last_end..].to_string()));
    }

    parts
}

// ---------------------------------------------------------------------
// Markdown tables → <pre> with aligned columns
// ---------------------------------------------------------------------

static TABLE_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\|.+\|[ \t]*$").unwrap());
static TABLE_SEP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|[ \t]*:?-{2,}:?[ \t]*(\|[ \t]*:?-{2,}:?[ \t]*)*\|[ \t]*$").unwrap());

fn split_tables(text: &str) -> Vec<(bool, String)> {
    let mut parts = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    let mut table_buf: Vec<&str> = Vec::new();
    let mut in_table = false;

    for line in text.split('\n') {
        if TABLE_LINE_RE.is_match(line) {
            if !in_table {
                if !buf.is_empty() {
                    parts.push((false, buf.join("\n")));
                    buf.clear();
                }
                in_table = true;
                table_buf.clear();
            }
            table_buf.push(line);
        } else {
            if in_table {
                parts.push((true, render_table(&table_buf)));
                in_table = false;
                table_buf.clear();
            }
            buf.push(line);
        }
    }

    if in_table {
        parts.push((true, render_table(&table_buf)));
    } else {
        parts.push((false, buf.join("\n")));
    }

    parts
}

fn render_table(lines: &[&str]) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();

    for line in lines {
        let mut stripped = line.trim();
        if TABLE_SEP_RE.is_match(stripped) {
            continue;
        }
        if let Some(s) = stripped.strip_prefix('|') {
            stripped = s;
        }
        if let Some(s) = stripped.strip_suffix('|') {
            stripped = s;
        }
        let cells: Vec<String> = stripped.split('|').map(|c| c.trim().replace("**", "")).collect();
        rows.push(cells);
    }

    if rows.is_empty() {
        return escape_html(&lines.join("\n"));
    }

    let n_cols = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut widths = vec![0usize; n_cols];
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < n_cols {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut formatted = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut cells = Vec::with_capacity(n_cols);
        for i in 0..n_cols {
            let cell = row.get(i).map(String::as_str).unwrap_or("");
            let pad = widths[i].saturating_sub(cell.chars().count());
            cells.push(format!("{cell}{}", " ".repeat(pad)));
        }
        formatted.push(cells.join("  "));
    }

    format!("<pre>{}</pre>", escape_html(&formatted.join("\n")))
}

// ---------------------------------------------------------------------
// Inline conversion
// ---------------------------------------------------------------------

static INLINE_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").unwrap());
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap());
static STRIKE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~(.+?)~~").unwrap());
static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());
static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(#{1,6})\s+(.+)$").unwrap());
static BLOCKQUOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>\s?(.*)$").unwrap());
static HR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[-*_]{3,}\s*$").unwrap());
static UL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*•]\s+").unwrap());
static OL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*(\d+)\.\s+").unwrap());

/// Group consecutive `> ...` lines into a single `<blockquote>`, returned as
/// a `\x00PHn\x00` placeholder so later escaping leaves it untouched.
fn collapse_blockquotes(text: &str, placeholders: &mut Vec<String>) -> String {
    let mut result: Vec<String> = Vec::new();
    let mut quote_buf: Vec<String> = Vec::new();

    let flush = |quote_buf: &mut Vec<String>, result: &mut Vec<String>, placeholders: &mut Vec<String>| {
        if !quote_buf.is_empty() {
            let inner = quote_buf.join("\n");
            let idx = placeholders.len();
            placeholders.push(format!("<blockquote>{}</blockquote>", escape_html(&inner)));
            result.push(format!("\x00PH{idx}\x00"));
            quote_buf.clear();
        }
    };

    for line in text.split('\n') {
        if let Some(caps) = BLOCKQUOTE_RE.captures(line) {
            quote_buf.push(caps.get(1).unwrap().as_str().to_string());
        } else {
            flush(&mut quote_buf, &mut result, placeholders);
            result.push(line.to_string());
        }
    }
    flush(&mut quote_buf, &mut result, placeholders);

    result.join("\n")
}

fn convert_inline(text: &str) -> String {
    let mut placeholders: Vec<String> = Vec::new();
    let mut text = text.to_string();

    // Phase 1: protect spans that must not be escaped.
    text = INLINE_CODE_RE
        .replace_all(&text, |caps: &regex::Captures| {
            let idx = placeholders.len();
            placeholders.push(format!("<code>{}</code>", escape_html(&caps[1])));
            format!("\x00PH{idx}\x00")
        })
        .into_owned();

    text = HR_RE
        .replace_all(&text, |_: &regex::Captures| {
            let idx = placeholders.len();
            placeholders.push("—".repeat(20));
            format!("\x00PH{idx}\x00")
        })
        .into_owned();

    text = HEADING_RE
        .replace_all(&text, |caps: &regex::Captures| {
            let idx = placeholders.len();
            placeholders.push(format!("<b>{}</b>", escape_html(&caps[2])));
            format!("\x00PH{idx}\x00")
        })
        .into_owned();

    text = collapse_blockquotes(&text, &mut placeholders);

    text = LINK_RE
        .replace_all(&text, |caps: &regex::Captures| {
            let idx = placeholders.len();
            placeholders.push(format!(
                "<a href=\"{}\">{}</a>",
                escape_html(&caps[2]),
                escape_html(&caps[1])
            ));
            format!("\x00PH{idx}\x00")
        })
        .into_owned();

    // Phase 2: escape everything else.
    text = escape_html(&text);

    // Phase 3: inline formatting on the escaped text.
    text = BOLD_RE
        .replace_all(&text, |caps: &regex::Captures| {
            let inner = caps.get(1).or_else(|| caps.get(2)).unwrap().as_str();
            format!("<b>{inner}</b>")
        })
        .into_owned();

    text = replace_italics(&text);

    text = STRIKE_RE.replace_all(&text, "<s>$1</s>").into_owned();
    text = UL_RE.replace_all(&text, "  • ").into_owned();
    text = OL_RE.replace_all(&text, "  $1. ").into_owned();

    // Phase 4: restore placeholders.
    for (idx, replacement) in placeholders.iter().enumerate() {
        text = text.replace(&format!("\x00PH{idx}\x00"), replacement);
    }

    text
}

/// `*italic*`, but not `**bold**` — Rust's `regex` crate has no lookaround,
/// so this walks the escaped text by hand matching Python's negative
/// lookaround `(?<!\*)\*(?!\*)(.+?)(?<!\*)\*(?!\*)`.
fn replace_italics(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let is_single_star = chars[i] == '*'
            && (i == 0 || chars[i - 1] != '*')
            && (i + 1 >= chars.len() || chars[i + 1] != '*');
        if is_single_star {
            if let Some(close) = find_italic_close(&chars, i + 1) {
                let inner: String = chars[i + 1..close].iter().collect();
                out.push_str("<i>");
                out.push_str(&inner);
                out.push_str("</i>");
                i = close + 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn find_italic_close(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len()).find(|&j| {
        chars[j] == '*' && (j == 0 || chars[j - 1] != '*') && (j + 1 >= chars.len() || chars[j + 1] != '*')
    })
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_bold_and_italic() {
        assert_eq!(to_html("**bold** and *italic*"), "<b>bold</b> and <i>italic</i>");
    }

    #[test]
    fn converts_inline_code_without_escaping_inside() {
        assert_eq!(to_html("run `a < b` now"), "run <code>a &lt; b</code> now");
    }

    #[test]
    fn fenced_code_block_with_language() {
        let input = "```rust\nfn main() {}\n```";
        assert_eq!(to_html(input), "<pre><code class=\"language-rust\">fn main() {}</code></pre>");
    }

    #[test]
    fn fenced_code_block_without_language() {
        let input = "```\nplain\n```";
        assert_eq!(to_html(input), "<pre>plain</pre>");
    }

    #[test]
    fn escapes_raw_angle_brackets_outside_code() {
        assert_eq!(to_html("1 < 2 and 3 > 2"), "1 &lt; 2 and 3 &gt; 2");
    }

    #[test]
    fn converts_heading_and_link() {
        assert_eq!(to_html("# Title"), "<b>Title</b>");
        assert_eq!(
            to_html("see [docs](https://example.com)"),
            "see <a href=\"https://example.com\">docs</a>"
        );
    }

    #[test]
    fn converts_blockquote_and_strike() {
        assert_eq!(to_html("> quoted line"), "<blockquote>quoted line</blockquote>");
        assert_eq!(to_html("~~gone~~"), "<s>gone</s>");
    }

    #[test]
    fn converts_unordered_and_ordered_lists() {
        assert_eq!(to_html("- a\n- b"), "  • a\n  • b");
        assert_eq!(to_html("1. a\n2. b"), "  1. a\n  2. b");
    }

    #[test]
    fn converts_table_to_padded_pre_block() {
        let input = "| Name | Age |\n| --- | --- |\n| Alice | 30 |";
        let html = to_html(input);
        assert!(html.starts_with("<pre>"));
        assert!(html.contains("Name"));
        assert!(html.contains("Alice"));
        assert!(!html.contains("---"));
    }

    #[test]
    fn horizontal_rule_becomes_em_dashes() {
        assert_eq!(to_html("---"), "—".repeat(20));
    }
}
