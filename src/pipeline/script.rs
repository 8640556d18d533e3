//! Narration script produced by the script stage.

use serde::{Deserialize, Serialize};

/// Ordered, non-empty paragraphs. One paragraph per line of the generated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    paragraphs: Vec<String>,
}

impl Script {
    /// Split generated text on line breaks, trimming each line and dropping empty ones.
    pub fn parse(text: &str) -> Self {
        let paragraphs = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        Self { paragraphs }
    }

    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Whole script as one text, paragraphs joined by newlines.
    pub fn full_text(&self) -> String {
        self.paragraphs.join("\n")
    }
}
