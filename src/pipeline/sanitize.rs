//! HTML sanitization and Markdown conversion.
//!
//! Strips non-content HTML (scripts, styles, tracking pixels), converts
//! the remainder to Markdown, then cleans footer boilerplate, tracking
//! URLs, and excess whitespace out of the result. Conversion is pure:
//! identical input always yields identical output.

use std::sync::LazyLock;

use regex::Regex;

/// Result of converting an HTML fragment.
#[derive(Debug, Clone)]
pub struct SanitizedHtml {
    pub markdown: String,
    /// Set when structural conversion produced nothing and the output
    /// fell back to raw tag stripping.
    pub degraded: bool,
}

/// Phrases that mark the start of footer boilerplate. Only matches in
/// the latter half of the document count, so a short message that talks
/// about its privacy policy is left alone.
const FOOTER_INDICATORS: &[&str] = &[
    "unsubscribe",
    "update your preferences",
    "privacy policy",
    "terms of service",
    "© 20",
    "(c) 20",
    "copyright",
    "forward to a friend",
    "view in your browser",
    "manage your subscription",
];

static IMG_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").unwrap());

static WIDTH_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bwidth\s*=\s*["']?\s*(\d+)"#).unwrap());

static HEIGHT_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bheight\s*=\s*["']?\s*(\d+)"#).unwrap());

static STYLE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bstyle\s*=\s*["']([^"']*)["']"#).unwrap());

static STYLE_PIXEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|;)\s*(?:width|height)\s*:\s*[01](?:\.0+)?\s*(?:px)?\s*(?:;|$)").unwrap()
});

static EXCESS_BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{4,}").unwrap());

static EXCESS_SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{3,}").unwrap());

static TRACKING_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://[^\s)\]]*(?:track|click|analytics|pixel|utm_|mailchi\.mp|list-manage\.com)[^\s)\]]*",
    )
    .unwrap()
});

/// Convert an HTML fragment to cleaned Markdown.
pub fn sanitize_html(html: &str) -> SanitizedHtml {
    let mut cleaned = html.to_string();
    for tag in ["script", "style", "head"] {
        cleaned = remove_tag_block(&cleaned, tag);
    }
    cleaned = strip_tracking_pixels(&cleaned);

    let markdown = html2md::parse_html(&cleaned);

    if markdown.trim().is_empty() {
        // Structural conversion produced nothing. If the input had
        // visible text, emit it as a flat paragraph and flag the
        // degradation for the caller.
        let residual = strip_all_tags(html);
        if residual.is_empty() {
            return SanitizedHtml {
                markdown: String::new(),
                degraded: false,
            };
        }
        return SanitizedHtml {
            markdown: residual,
            degraded: true,
        };
    }

    SanitizedHtml {
        markdown: clean_markdown(&markdown),
        degraded: false,
    }
}

/// Remove `<img>` elements that are 0 or 1 pixel wide or tall.
fn strip_tracking_pixels(html: &str) -> String {
    IMG_TAG_RE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            if is_tracking_pixel(tag) {
                String::new()
            } else {
                tag.to_string()
            }
        })
        .into_owned()
}

fn is_tracking_pixel(tag: &str) -> bool {
    let attr_is_pixel = |re: &Regex| {
        re.captures(tag)
            .and_then(|c| c.get(1).map(|m| matches!(m.as_str(), "0" | "1")))
            .unwrap_or(false)
    };
    if attr_is_pixel(&WIDTH_ATTR_RE) || attr_is_pixel(&HEIGHT_ATTR_RE) {
        return true;
    }
    STYLE_ATTR_RE
        .captures(tag)
        .and_then(|c| c.get(1).map(|m| STYLE_PIXEL_RE.is_match(m.as_str())))
        .unwrap_or(false)
}

/// Clean converted Markdown: cut footer boilerplate anchored near the
/// end, normalize whitespace, and replace tracking URLs with `[link]`.
pub fn clean_markdown(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    let mut content = cut_footer(content);

    content = EXCESS_BLANK_LINES_RE
        .replace_all(&content, "\n\n\n")
        .into_owned();
    content = EXCESS_SPACES_RE.replace_all(&content, "  ").into_owned();
    content = TRACKING_URL_RE.replace_all(&content, "[link]").into_owned();

    content.trim().to_string()
}

/// Cut the document at the earliest footer indicator found in its
/// latter half.
fn cut_footer(content: &str) -> String {
    let lower = content.to_lowercase();
    let mut footer_start = content.len();

    for indicator in FOOTER_INDICATORS {
        if let Some(pos) = lower.find(indicator) {
            if pos > 0 && pos < footer_start && pos * 2 > content.len() {
                footer_start = pos;
            }
        }
    }

    // `find` on the lowercased text can land inside a multi-byte
    // character of the original; back up to the nearest boundary.
    while footer_start < content.len() && !content.is_char_boundary(footer_start) {
        footer_start -= 1;
    }

    content[..footer_start].to_string()
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case
/// insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    while let Some(start) = remaining.to_lowercase().find(&open) {
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        if let Some(end) = after.to_lowercase().find(&close) {
            remaining = &after[end + close.len()..];
        } else {
            // No closing tag — remove rest
            remaining = "";
            break;
        }
    }
    result.push_str(remaining);
    result
}

/// Last-resort extraction: drop every tag, decode common entities, and
/// collapse whitespace into a flat paragraph.
pub fn strip_all_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    text = text.replace("&amp;", "&");
    text = text.replace("&lt;", "<");
    text = text.replace("&gt;", ">");
    text = text.replace("&quot;", "\"");
    text = text.replace("&#39;", "'");
    text = text.replace("&apos;", "'");
    text = text.replace("&nbsp;", " ");
    text = text.replace("&#160;", " ");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
