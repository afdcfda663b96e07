//! Narration scripts.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One timed section of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScriptSection {
    /// Timestamp label such as `0:00-0:30`
    pub time_label: String,
    pub title: String,
    /// Narration text for this section
    pub text: String,
}

/// A narration script split into timed sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Script {
    pub full_text: String,
    pub sections: Vec<ScriptSection>,
    pub word_count: usize,
}

impl Script {
    /// Build a script from already split sections.
    pub fn from_sections(full_text: impl Into<String>, sections: Vec<ScriptSection>) -> Self {
        let full_text = full_text.into();
        let word_count = count_words(&full_text);
        Self {
            full_text,
            sections,
            word_count,
        }
    }

    /// Parse script text made of `[time_label] TITLE` header lines, each
    /// followed by its narration lines.
    ///
    /// Lines before the first header are ignored. Text without any header
    /// becomes a single untitled section.
    pub fn parse(text: &str) -> Self {
        let mut sections: Vec<ScriptSection> = Vec::new();
        let mut current: Option<ScriptSection> = None;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(header) = parse_header(line) {
                if let Some(section) = current.take() {
                    sections.push(section);
                }
                current = Some(header);
            } else if let Some(section) = current.as_mut() {
                if !section.text.is_empty() {
                    section.text.push(' ');
                }
                section.text.push_str(line);
            }
        }

        if let Some(section) = current.take() {
            sections.push(section);
        }

        if sections.is_empty() && !text.trim().is_empty() {
            sections.push(ScriptSection {
                time_label: String::new(),
                title: String::new(),
                text: text.split_whitespace().collect::<Vec<_>>().join(" "),
            });
        }

        Self::from_sections(text, sections)
    }

    /// Narration text of all sections joined together.
    pub fn narration_text(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.text.trim().is_empty())
    }
}

fn parse_header(line: &str) -> Option<ScriptSection> {
    let rest = line.strip_prefix('[')?;
    let (time_label, title) = rest.split_once(']')?;
    Some(ScriptSection {
        time_label: time_label.trim().to_string(),
        title: title.trim().to_string(),
        text: String::new(),
    })
}

/// Whitespace-separated word count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Keep at most `limit` words of `text`.
pub fn truncate_words(text: &str, limit: usize) -> String {
    text.split_whitespace()
        .take(limit)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Intro notes that are dropped\n\
        [0:00-0:30] GIRIS\n\
        Welcome to the project.\n\
        It does things.\n\
        \n\
        [0:30-1:00] KURULUM\n\
        Run cargo install.\n";

    #[test]
    fn test_parse_sections() {
        let script = Script::parse(SAMPLE);
        assert_eq!(script.sections.len(), 2);
        assert_eq!(script.sections[0].time_label, "0:00-0:30");
        assert_eq!(script.sections[0].title, "GIRIS");
        assert_eq!(
            script.sections[0].text,
            "Welcome to the project. It does things."
        );
        assert_eq!(script.sections[1].title, "KURULUM");
        assert_eq!(script.word_count, count_words(SAMPLE));
    }

    #[test]
    fn test_parse_without_headers() {
        let script = Script::parse("just some\nplain narration");
        assert_eq!(script.sections.len(), 1);
        assert_eq!(script.sections[0].text, "just some plain narration");
        assert_eq!(script.word_count, 4);
    }

    #[test]
    fn test_parse_empty() {
        let script = Script::parse("   \n");
        assert!(script.sections.is_empty());
        assert!(script.is_empty());
        assert_eq!(script.word_count, 0);
    }

    #[test]
    fn test_narration_text() {
        let script = Script::parse(SAMPLE);
        assert_eq!(
            script.narration_text(),
            "Welcome to the project. It does things. Run cargo install."
        );
    }

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("a b  c d", 2), "a b");
        assert_eq!(truncate_words("a b", 10), "a b");
        assert_eq!(truncate_words("", 3), "");
    }
}
