use std::fmt;
use std::ops::Range;

use super::{find_links, DesignDocLink};

/// Strategy for recognizing the line that opens a design doc section.
///
/// Strategies are tried in [`HEADING_MATCHERS`] order and the first one that
/// finds a heading decides the section. Each strategy also knows which lines
/// close the section it opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionMatcher {
    /// `## <title>`
    Level2Heading,
    /// `# <title>`
    Level1Heading,
    /// `<title>` alone on a line, without a heading marker
    BareTitle,
}

pub const HEADING_MATCHERS: [SectionMatcher; 3] = [
    SectionMatcher::Level2Heading,
    SectionMatcher::Level1Heading,
    SectionMatcher::BareTitle,
];

impl fmt::Display for SectionMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionMatcher::Level2Heading => write!(f, "level-2 heading"),
            SectionMatcher::Level1Heading => write!(f, "level-1 heading"),
            SectionMatcher::BareTitle => write!(f, "bare title"),
        }
    }
}

impl SectionMatcher {
    fn level(self) -> Option<usize> {
        match self {
            SectionMatcher::Level2Heading => Some(2),
            SectionMatcher::Level1Heading => Some(1),
            SectionMatcher::BareTitle => None,
        }
    }

    /// Whether `line` opens a section titled `title`.
    ///
    /// The text after the heading marker must be exactly the title, so
    /// `## 設計書一覧（旧）` does not open a `設計書一覧` section.
    pub fn opens(self, line: &str, title: &str) -> bool {
        let line = line.trim_end();
        match self.level() {
            Some(level) => {
                if heading_level(line) != Some(level) {
                    return false;
                }
                line[level..].trim() == title
            }
            None => line.trim() == title,
        }
    }

    /// Whether `line` ends a section opened by this matcher.
    pub fn closes(self, line: &str) -> bool {
        if is_rule(line) {
            return true;
        }
        match (heading_level(line), self.level()) {
            (Some(found), Some(opened)) => found <= opened,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Locate the first section in `text` opened by this matcher.
    pub fn find(self, text: &str, title: &str) -> Option<DesignDocSection> {
        self.scan(text, title, |line| self.closes(line))
    }

    fn scan(
        self,
        text: &str,
        title: &str,
        closes: impl Fn(&str) -> bool,
    ) -> Option<DesignDocSection> {
        let mut lines = text.split_inclusive('\n');
        let mut offset = 0;
        let mut start = None;

        for line in lines.by_ref() {
            let line_start = offset;
            offset += line.len();
            if self.opens(line, title) {
                start = Some(line_start);
                break;
            }
        }
        let start = start?;

        let body_start = offset;
        let mut body_end = text.len();
        for line in lines {
            if closes(line) {
                body_end = offset;
                break;
            }
            offset += line.len();
        }

        Some(DesignDocSection {
            matcher: self,
            span: start..body_end,
            body: body_start..body_end,
            links: find_links(&text[body_start..body_end]),
        })
    }
}

/// A design doc section found in a PR description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignDocSection {
    /// Strategy that recognized the heading
    pub matcher: SectionMatcher,
    /// Byte range of the heading line plus the section body
    pub span: Range<usize>,
    /// Byte range of the section body alone
    pub body: Range<usize>,
    /// Links found in the body, in document order
    pub links: Vec<DesignDocLink>,
}

impl DesignDocSection {
    /// Whitespace that ends the section span, e.g. the blank line before the
    /// next heading. Kept when the section is re-rendered.
    pub fn trailing_whitespace<'a>(&self, text: &'a str) -> &'a str {
        let span = &text[self.span.clone()];
        &span[span.trim_end().len()..]
    }
}

/// Locate the section titled `title` using the heading strategies in order.
pub fn locate(text: &str, title: &str) -> Option<DesignDocSection> {
    HEADING_MATCHERS
        .iter()
        .find_map(|matcher| matcher.find(text, title))
}

/// Locate the section a merge may rewrite: only a `## <title>` heading
/// qualifies, and the section ends at the first heading of any level or
/// horizontal rule, so subsections and surrounding text are never part of
/// the span.
pub fn locate_for_merge(text: &str, title: &str) -> Option<DesignDocSection> {
    SectionMatcher::Level2Heading.scan(text, title, |line| {
        heading_level(line).is_some() || is_rule(line)
    })
}

/// Loose fallback: the text after the first occurrence of `title` anywhere
/// in `text`, up to the next heading or horizontal-rule line.
pub fn loose_body<'a>(text: &'a str, title: &str) -> Option<&'a str> {
    let pos = text.find(title)?;
    let after = &text[pos + title.len()..];

    let mut pieces = after.split_inclusive('\n');
    // Remainder of the line holding the title.
    let mut end = pieces.next().map_or(0, str::len);
    for line in pieces {
        if heading_level(line).is_some() || is_rule(line) {
            break;
        }
        end += line.len();
    }
    Some(&after[..end])
}

fn heading_level(line: &str) -> Option<usize> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    (hashes > 0).then_some(hashes)
}

fn is_rule(line: &str) -> bool {
    line.starts_with("---")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: &str = "設計書一覧";

    #[test]
    fn test_level2_heading_opens_exact_title_only() {
        let m = SectionMatcher::Level2Heading;
        assert!(m.opens("## 設計書一覧\n", TITLE));
        assert!(m.opens("##設計書一覧\r\n", TITLE));
        assert!(m.opens("##   設計書一覧   ", TITLE));
        assert!(!m.opens("### 設計書一覧", TITLE));
        assert!(!m.opens("# 設計書一覧", TITLE));
        assert!(!m.opens("## 設計書一覧（旧）", TITLE));
        assert!(!m.opens("## 旧設計書一覧", TITLE));
    }

    #[test]
    fn test_bare_title_rejects_headings() {
        let m = SectionMatcher::BareTitle;
        assert!(m.opens("設計書一覧\n", TITLE));
        assert!(!m.opens("## 設計書一覧", TITLE));
        assert!(!m.opens("設計書一覧です", TITLE));
    }

    #[test]
    fn test_closing_lines_depend_on_opening_level() {
        assert!(SectionMatcher::Level2Heading.closes("## Other"));
        assert!(SectionMatcher::Level2Heading.closes("# Top"));
        assert!(!SectionMatcher::Level2Heading.closes("### Sub"));
        assert!(SectionMatcher::Level1Heading.closes("# Top"));
        assert!(!SectionMatcher::Level1Heading.closes("## Other"));
        assert!(SectionMatcher::BareTitle.closes("### Sub"));
        assert!(SectionMatcher::Level1Heading.closes("---"));
        assert!(!SectionMatcher::Level2Heading.closes("* item"));
    }

    #[test]
    fn test_find_records_span_and_body() {
        let text = "intro\n## 設計書一覧\n\n* a\n\n## Other\n";
        let section = SectionMatcher::Level2Heading.find(text, TITLE).unwrap();
        assert_eq!(&text[section.span.clone()], "## 設計書一覧\n\n* a\n\n");
        assert_eq!(&text[section.body.clone()], "\n* a\n\n");
        assert_eq!(section.trailing_whitespace(text), "\n\n");
    }

    #[test]
    fn test_find_runs_to_end_of_text() {
        let text = "## 設計書一覧";
        let section = SectionMatcher::Level2Heading.find(text, TITLE).unwrap();
        assert_eq!(section.span, 0..text.len());
        assert!(section.body.is_empty());
        assert_eq!(section.trailing_whitespace(text), "");
    }

    #[test]
    fn test_locate_prefers_level2_over_level1() {
        let text = "# 設計書一覧\n\nfirst\n\n## 設計書一覧\n\nsecond\n";
        let section = locate(text, TITLE).unwrap();
        assert_eq!(section.matcher, SectionMatcher::Level2Heading);
        assert!(text[section.body.clone()].contains("second"));
    }

    #[test]
    fn test_locate_returns_none_without_heading() {
        assert!(locate("just some text about 設計書一覧 here", TITLE).is_none());
    }

    #[test]
    fn test_locate_for_merge_stops_at_subsection() {
        let text = "## 設計書一覧\n\n* a\n\n### 補足\n\nメモ\n\n## Other\n";
        let section = locate_for_merge(text, TITLE).unwrap();
        assert_eq!(&text[section.span.clone()], "## 設計書一覧\n\n* a\n\n");

        // The extraction locator keeps subsections inside the section.
        let section = locate(text, TITLE).unwrap();
        assert!(text[section.span.clone()].contains("### 補足"));
    }

    #[test]
    fn test_locate_for_merge_requires_level2_heading() {
        assert!(locate_for_merge("# 設計書一覧\n* a\n", TITLE).is_none());
        assert!(locate_for_merge("設計書一覧\nprose\n", TITLE).is_none());
        assert!(locate_for_merge("### 設計書一覧\n* a\n", TITLE).is_none());
    }

    #[test]
    fn test_loose_body_stops_at_heading() {
        let text = "see ### 設計書一覧 below\n* x\n---\n* y";
        assert_eq!(loose_body(text, TITLE), Some(" below\n* x\n"));
        assert_eq!(loose_body("nothing here", TITLE), None);
    }
}
