pub mod section;

pub use section::{locate, locate_for_merge};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

/// Section title used in merged PR descriptions and by the merge-dedup mode.
pub const DEFAULT_SECTION_TITLE: &str = "設計書一覧";

/// Section title written by the skip-if-present mode.
pub const RELATED_SECTION_TITLE: &str = "関連設計書";

/// Only links into this spreadsheet host are recognized.
pub const SPREADSHEET_URL_PREFIX: &str = "https://docs.google.com/spreadsheets/d/";

const SPREADSHEET_HOST: &str = "docs.google.com/spreadsheets";

static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\*\s*\[.*?\]\({}.*?\)",
        regex::escape(SPREADSHEET_URL_PREFIX)
    ))
    .expect("design doc link pattern is valid")
});

/// One Markdown list item pointing at a design document, e.g.
/// `* [API 設計](https://docs.google.com/spreadsheets/d/abc)`.
///
/// Always stored trimmed; equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DesignDocLink(String);

impl DesignDocLink {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DesignDocLink {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<DesignDocLink> for String {
    fn from(link: DesignDocLink) -> Self {
        link.0
    }
}

impl fmt::Display for DesignDocLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the design doc links listed under `## 設計書一覧`.
#[allow(dead_code)] // Default-title entry point; the pipeline passes the configured title
pub fn extract(body: &str) -> Vec<DesignDocLink> {
    extract_with_title(body, DEFAULT_SECTION_TITLE)
}

/// Extract the design doc links listed in the section titled `title`.
///
/// Never fails: a description without a section, or a section without
/// recognizable links, yields an empty list. When no heading strategy
/// matches, the text following the first occurrence of the title is
/// searched instead.
pub fn extract_with_title(body: &str, title: &str) -> Vec<DesignDocLink> {
    if let Some(found) = locate(body, title) {
        debug!(
            matcher = %found.matcher,
            body_bytes = found.body.len(),
            links = found.links.len(),
            "found design doc section"
        );
        if found.links.is_empty() {
            let candidates = spreadsheet_lines(&body[found.body.clone()]);
            debug!(?candidates, "no links found in design doc section");
        }
        return found.links;
    }

    debug!(title, "no design doc section heading, trying loose search");
    match section::loose_body(body, title) {
        Some(text) => {
            let links = find_links(text);
            debug!(links = links.len(), "loose search finished");
            links
        }
        None => {
            debug!(title, "title not present in description");
            Vec::new()
        }
    }
}

/// All design doc links in `text`, in document order.
pub fn find_links(text: &str) -> Vec<DesignDocLink> {
    LINK_PATTERN
        .find_iter(text)
        .map(|m| DesignDocLink::new(m.as_str()))
        .collect()
}

/// Lines mentioning the spreadsheet host, trimmed. Used to diagnose a
/// section whose links are not in `* [label](url)` form.
fn spreadsheet_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.contains(SPREADSHEET_HOST))
        .collect()
}

/// Render a section: heading, blank line, one link per line.
pub fn render_section(title: &str, links: &[DesignDocLink]) -> String {
    let mut out = format!("## {}\n\n", title);
    let lines: Vec<&str> = links.iter().map(DesignDocLink::as_str).collect();
    out.push_str(&lines.join("\n"));
    out
}
