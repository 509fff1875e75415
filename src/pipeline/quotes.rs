//! Quoted-reply detection: truncate a body at the first quote boundary.
//!
//! Each heuristic is an independent (tag, finder) pair. All applicable
//! finders run, the earliest boundary in document order wins, and the
//! declaration order below breaks ties. The result is always either the
//! full original body or the body cut at exactly one boundary.

use std::sync::LazyLock;

use regex::Regex;

/// Minimum number of contiguous `>`-prefixed lines that counts as a
/// quote run. A single quoted line inside fresh content is left alone.
const QUOTE_RUN_MIN: usize = 2;

/// Which kind of body is being inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Plain,
    Html,
}

/// The heuristic that found a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteHeuristic {
    /// "On <date>, <name> wrote:" and localized equivalents.
    AttributionLine,
    /// A forwarded/reply header block (`From:` … `Sent:`/`To:`/`Subject:`)
    /// or an "-----Original Message-----" divider.
    HeaderBlock,
    /// A contiguous run of `>`-prefixed lines.
    QuoteMarkerRun,
    /// An HTML quote container (blockquote, Gmail/Thunderbird/Yahoo/
    /// Outlook signatures), matched on tag structure.
    HtmlContainer,
}

/// A detected quote boundary: byte offset where quoting begins.
#[derive(Debug, Clone, Copy)]
pub struct QuoteBoundary {
    pub heuristic: QuoteHeuristic,
    pub offset: usize,
}

static ATTRIBUTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?mi)^\*{0,2}(?:On [^\n]{1,200}? ?wrote:|Am [^\n]{1,200}? ?schrieb[^\n]{0,100}:|Le [^\n]{1,200}? a écrit ?:|El [^\n]{1,200}? escribió ?:)\*{0,2}[ \t]*$",
    )
    .unwrap()
});

static ORIGINAL_MESSAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^-{3,}[ \t]*(?:Original|Forwarded) (?:Message|Appointment)[ \t]*-{3,}[ \t]*$")
        .unwrap()
});

static FROM_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\*{0,2}From:\*{0,2}[ \t]").unwrap());

static HEADER_FOLLOWUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\*{0,2}(?:Sent|To|Subject|Date|Cc):\*{0,2}[ \t]").unwrap());

static HTML_QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<blockquote[\s>]|<(?:div|span|table)[^>]*(?:class|id)\s*=\s*["'][^"']*(?:gmail_quote|moz-cite-prefix|yahoo_quoted|divRplyFwdMsg|OLK_SRC_BODY_SECTION)[^"']*["']"#,
    )
    .unwrap()
});

/// Truncate `body` before the first detected quote boundary.
///
/// Returns the (possibly shortened) body and whether truncation
/// occurred. Trailing whitespace left by the cut is trimmed.
pub fn strip_quotes(body: &str, kind: BodyKind) -> (String, bool) {
    match detect_boundary(body, kind) {
        Some(boundary) => (body[..boundary.offset].trim_end().to_string(), true),
        None => (body.to_string(), false),
    }
}

/// Find the earliest quote boundary, if any.
pub fn detect_boundary(body: &str, kind: BodyKind) -> Option<QuoteBoundary> {
    let mut finders: Vec<(QuoteHeuristic, Option<usize>)> = vec![
        (QuoteHeuristic::AttributionLine, find_attribution(body)),
        (QuoteHeuristic::HeaderBlock, find_header_block(body)),
        (QuoteHeuristic::QuoteMarkerRun, find_quote_run(body)),
    ];
    if kind == BodyKind::Html {
        finders.push((QuoteHeuristic::HtmlContainer, find_html_container(body)));
    }

    finders
        .into_iter()
        .filter_map(|(heuristic, offset)| offset.map(|offset| QuoteBoundary { heuristic, offset }))
        .min_by_key(|b| b.offset)
}

fn find_attribution(body: &str) -> Option<usize> {
    ATTRIBUTION_RE.find(body).map(|m| m.start())
}

/// A `From:` line only counts as a boundary when one of the other
/// header fields follows within the next few lines; a lone "From: ..."
/// sentence in fresh prose does not truncate the message.
fn find_header_block(body: &str) -> Option<usize> {
    let divider = ORIGINAL_MESSAGE_RE.find(body).map(|m| m.start());

    let lines = line_offsets(body);
    let mut from_block = None;
    for (i, &(offset, line)) in lines.iter().enumerate() {
        if !FROM_LINE_RE.is_match(line) {
            continue;
        }
        let followed = lines[i + 1..]
            .iter()
            .filter(|(_, l)| !l.trim().is_empty())
            .take(4)
            .any(|(_, l)| HEADER_FOLLOWUP_RE.is_match(l));
        if followed {
            from_block = Some(offset);
            break;
        }
    }

    match (divider, from_block) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn find_quote_run(body: &str) -> Option<usize> {
    let mut run_start = None;
    let mut run_len = 0;

    for (offset, line) in line_offsets(body) {
        if line.trim_start().starts_with('>') {
            if run_len == 0 {
                run_start = Some(offset);
            }
            run_len += 1;
            if run_len >= QUOTE_RUN_MIN {
                return run_start;
            }
        } else {
            run_start = None;
            run_len = 0;
        }
    }
    None
}

fn find_html_container(body: &str) -> Option<usize> {
    HTML_QUOTE_RE.find(body).map(|m| m.start())
}

/// Lines of `body` with their starting byte offsets.
fn line_offsets(body: &str) -> Vec<(usize, &str)> {
    let mut result = Vec::new();
    let mut offset = 0;
    for line in body.split('\n') {
        result.push((offset, line));
        offset += line.len() + 1;
    }
    result
}
