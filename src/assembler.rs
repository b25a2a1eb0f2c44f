use anyhow::{anyhow, Result};
use lopdf::Document;
use std::path::Path;
use tracing::debug;

use crate::merger::PdfMerger;

/// A chapter marker in the finished book. `start_page` is the cumulative
/// page count of everything that came before the chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub title: String,
    pub start_page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberingState {
    OutsideChapters,
    InsideChapters,
}

/// Assigns "Chapter {n}: {title}" prefixes to the span of titles between
/// the introduction and the conclusion (inclusive on both ends).
#[derive(Debug)]
pub struct ChapterNumbering {
    state: NumberingState,
    next_chapter: u32,
}

impl ChapterNumbering {
    pub fn new() -> Self {
        Self {
            state: NumberingState::OutsideChapters,
            next_chapter: 1,
        }
    }

    pub fn format_title(&mut self, title: &str) -> String {
        let lower = title.to_lowercase();

        // An introduction enters the numbered span before formatting, so
        // it receives a chapter number itself.
        if lower.contains("introduction") {
            self.state = NumberingState::InsideChapters;
        }

        let formatted = match self.state {
            NumberingState::InsideChapters => {
                let number = self.next_chapter;
                self.next_chapter += 1;
                format!("Chapter {}: {}", number, title)
            }
            NumberingState::OutsideChapters => title.to_string(),
        };

        // A conclusion leaves the span only after formatting, so the
        // conclusion still carries its own chapter number.
        if lower.contains("conclusion") {
            self.state = NumberingState::OutsideChapters;
        }

        formatted
    }
}

impl Default for ChapterNumbering {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects rendered chapters in crawl order and writes them out as one
/// bookmarked book.
pub struct BookAssembler {
    merger: PdfMerger,
    bookmarks: Vec<Bookmark>,
    current_page: u32,
}

impl BookAssembler {
    pub fn new() -> Self {
        Self {
            merger: PdfMerger::new(),
            bookmarks: Vec::new(),
            current_page: 0,
        }
    }

    pub fn chapter_count(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    /// Parses a rendered page and queues it as the next chapter. The
    /// bookmark is recorded at the page count *before* this chapter's own
    /// pages are added.
    pub fn append_chapter(&mut self, title: &str, pdf_bytes: &[u8]) -> Result<()> {
        let document = Document::load_mem(pdf_bytes)
            .map_err(|e| anyhow!("Failed to parse rendered PDF for '{}': {}", title, e))?;
        let page_count = document.get_pages().len() as u32;

        self.bookmarks.push(Bookmark {
            title: title.to_string(),
            start_page: self.current_page,
        });
        self.current_page += page_count;
        self.merger.add_document(document);

        debug!(
            "Appended chapter '{}' with {} pages (book is now {} pages)",
            title, page_count, self.current_page
        );
        Ok(())
    }

    /// Merges the queued chapters and writes the book. Returns `Ok(false)`
    /// without touching the filesystem when no chapter was appended.
    pub async fn finish(&self, output_path: &Path) -> Result<bool> {
        if self.merger.is_empty() {
            return Ok(false);
        }

        let outline = self.numbered_bookmarks();
        self.merger.save(output_path, &outline).await?;
        Ok(true)
    }

    fn numbered_bookmarks(&self) -> Vec<Bookmark> {
        let mut numbering = ChapterNumbering::new();
        self.bookmarks
            .iter()
            .map(|bookmark| Bookmark {
                title: numbering.format_title(&bookmark.title),
                start_page: bookmark.start_page,
            })
            .collect()
    }
}

impl Default for BookAssembler {
    fn default() -> Self {
        Self::new()
    }
}
