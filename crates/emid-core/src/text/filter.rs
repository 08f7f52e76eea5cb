//! Latin-script line filtering for bilingual (Arabic/English) cards.

use tracing::debug;

/// Delimiter used when joining filtered lines into one text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Keep line structure; required by line-anchored patterns.
    Newline,
    /// Collapse lines into a single space-separated run.
    Space,
}

impl JoinMode {
    pub fn from_preserve_line_breaks(preserve: bool) -> Self {
        if preserve { JoinMode::Newline } else { JoinMode::Space }
    }

    pub fn delimiter(&self) -> &'static str {
        match self {
            JoinMode::Newline => "\n",
            JoinMode::Space => " ",
        }
    }
}

/// Keeps the lines that carry Latin text and no Arabic.
///
/// Mixed lines are dropped whole rather than stripped of their Arabic part.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFilter;

impl LineFilter {
    pub fn new() -> Self {
        Self
    }

    /// True when the line has at least one ASCII letter and no character in
    /// the Arabic block (U+0600..=U+06FF).
    pub fn is_usable(line: &str) -> bool {
        let mut has_latin = false;
        for c in line.chars() {
            if is_arabic(c) {
                return false;
            }
            has_latin |= c.is_ascii_alphabetic();
        }
        has_latin
    }

    /// Retained lines, in input order.
    pub fn filter<'a, S: AsRef<str>>(&self, lines: &'a [S]) -> Vec<&'a str> {
        let kept: Vec<&str> = lines
            .iter()
            .map(AsRef::as_ref)
            .filter(|line| Self::is_usable(line))
            .collect();

        debug!("Line filter kept {}/{} lines", kept.len(), lines.len());
        kept
    }

    /// Retained lines joined with the delimiter of `mode`.
    pub fn filtered_text<S: AsRef<str>>(&self, lines: &[S], mode: JoinMode) -> String {
        self.filter(lines).join(mode.delimiter())
    }
}

fn is_arabic(c: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&c)
}
