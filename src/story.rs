//! Story files for the terminal narrator.
//!
//! A story is plain text; pages are separated by blank lines. The story id
//! sent to the narration service defaults to the file stem.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Story {
    pub id: String,
    pub pages: Vec<String>,
}

impl Story {
    pub fn load(path: &Path, id: Option<String>) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Reading story {}", path.display()))?;
        let id = id
            .or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
            })
            .unwrap_or_else(|| "story".to_string());
        Self::from_text(id, &text)
    }

    pub fn from_text(id: String, text: &str) -> Result<Self> {
        let pages = split_pages(text);
        if pages.is_empty() {
            return Err(anyhow!("Story {id} has no narratable text"));
        }
        Ok(Self { id, pages })
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Next page, wrapping to the first.
    pub fn next_page(&self, page: usize) -> usize {
        (page + 1) % self.len()
    }

    /// Previous page, wrapping to the last.
    pub fn prev_page(&self, page: usize) -> usize {
        (page + self.len() - 1) % self.len()
    }

    pub fn is_last_page(&self, page: usize) -> bool {
        page + 1 >= self.len()
    }
}

/// Split text into pages separated by blank lines.
fn split_pages(text: &str) -> Vec<String> {
    let mut pages = Vec::new();
    let mut buffer = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !buffer.is_empty() {
                pages.push(buffer.join("\n"));
                buffer.clear();
            }
        } else {
            buffer.push(line);
        }
    }

    if !buffer.is_empty() {
        pages.push(buffer.join("\n"));
    }

    pages
}
