//! # sdxbook
//!
//! Builds bookmarked PDF books of the *Software Design by Example* sites
//! (<https://third-bit.com/sdxpy/> and <https://third-bit.com/sdxjs/>).
//!
//! Each site's sidebar is crawled for internal links, every discovered
//! page is printed to PDF with headless Chrome (the sidebar hidden via a
//! shared style override), and the per-page PDFs are concatenated into a
//! single book whose outline numbers the chapters between the
//! introduction and the conclusion.

mod assembler;
mod driver;
mod extractor;
mod fetch;
mod merger;
mod renderer;

pub use assembler::{BookAssembler, Bookmark, ChapterNumbering};
pub use driver::{run, TARGET_SITES};
pub use extractor::{extract_internal_links, Link};
pub use fetch::fetch_html;
pub use merger::PdfMerger;
pub use renderer::{Renderer, StyleOverride};
