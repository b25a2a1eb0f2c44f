use anyhow::{anyhow, Result};
use lopdf::{Bookmark as OutlineItem, Document, Object, ObjectId};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::assembler::Bookmark;

/// Concatenates in-memory PDF documents and attaches a flat bookmark
/// outline to the result.
pub struct PdfMerger {
    documents: Vec<Document>,
}

impl PdfMerger {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
        }
    }

    pub fn add_document(&mut self, document: Document) {
        debug!("Queued PDF with {} pages for merge", document.get_pages().len());
        self.documents.push(document);
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Merges the queued documents in order and writes the result.
    ///
    /// Each bookmark's `start_page` indexes into the merged page list; a
    /// bookmark pointing past the end is logged and skipped without
    /// aborting the merge.
    pub async fn save(&self, output_path: &Path, outline: &[Bookmark]) -> Result<()> {
        if self.documents.is_empty() {
            return Err(anyhow!("No PDFs added to merge"));
        }

        info!(
            "Starting PDF merge process with {} documents",
            self.documents.len()
        );

        // Use the first document as the base
        let mut merged_doc = self.documents[0].clone();
        let mut all_page_ids: Vec<ObjectId> = merged_doc.get_pages().values().copied().collect();
        let mut max_id = merged_doc.max_id;

        for (i, document) in self.documents.iter().skip(1).enumerate() {
            debug!(
                "Processing document {} with {} pages",
                i + 2,
                document.get_pages().len()
            );

            let mut doc_copy = document.clone();

            // Renumber objects to avoid conflicts
            doc_copy.renumber_objects_with(max_id + 1);
            max_id = doc_copy.max_id;

            let pages = doc_copy.get_pages();

            for (obj_id, obj) in doc_copy.objects.iter() {
                merged_doc.objects.insert(*obj_id, obj.clone());
            }

            for (_, page_id) in pages {
                all_page_ids.push(page_id);
            }
        }
        merged_doc.max_id = max_id;

        info!("Total pages collected: {}", all_page_ids.len());

        let pages_id = {
            let catalog = merged_doc
                .catalog()
                .map_err(|e| anyhow!("Merged document has no catalog: {}", e))?;
            catalog
                .get(b"Pages")
                .and_then(Object::as_reference)
                .map_err(|e| anyhow!("Merged document has no page tree: {}", e))?
        };

        // Re-parent every page onto the base page tree and rebuild it
        for page_id in &all_page_ids {
            if let Ok(Object::Dictionary(page)) = merged_doc.get_object_mut(*page_id) {
                page.set("Parent", Object::Reference(pages_id));
            }
        }
        if let Ok(Object::Dictionary(pages)) = merged_doc.get_object_mut(pages_id) {
            pages.set(
                "Kids",
                Object::Array(
                    all_page_ids
                        .iter()
                        .copied()
                        .map(Object::Reference)
                        .collect(),
                ),
            );
            pages.set("Count", Object::Integer(all_page_ids.len() as i64));
        }

        self.attach_outline(&mut merged_doc, &all_page_ids, outline)?;

        let mut data = Vec::new();
        merged_doc
            .save_to(&mut data)
            .map_err(|e| anyhow!("Failed to serialize merged PDF: {}", e))?;

        fs::write(output_path, data).await.map_err(|e| {
            anyhow!(
                "Failed to write merged PDF to {}: {}",
                output_path.display(),
                e
            )
        })?;

        info!(
            "Successfully merged {} PDFs into {}",
            self.documents.len(),
            output_path.display()
        );
        Ok(())
    }

    fn attach_outline(
        &self,
        doc: &mut Document,
        page_ids: &[ObjectId],
        outline: &[Bookmark],
    ) -> Result<()> {
        if outline.is_empty() {
            return Ok(());
        }

        for bookmark in outline {
            match page_ids.get(bookmark.start_page as usize) {
                Some(page_id) => {
                    doc.add_bookmark(
                        OutlineItem::new(bookmark.title.clone(), [0.0, 0.0, 0.0], 0, *page_id),
                        None,
                    );
                    info!(
                        "Added bookmark: {} at page {}",
                        bookmark.title, bookmark.start_page
                    );
                }
                None => warn!(
                    "Could not add bookmark '{}' at page {}: page is out of range",
                    bookmark.title, bookmark.start_page
                ),
            }
        }

        if let Some(outline_id) = doc.build_outline() {
            let catalog_id = doc
                .trailer
                .get(b"Root")
                .and_then(Object::as_reference)
                .map_err(|e| anyhow!("Merged document has no catalog: {}", e))?;
            if let Ok(Object::Dictionary(catalog)) = doc.get_object_mut(catalog_id) {
                catalog.set("Outlines", Object::Reference(outline_id));
            }
        }

        Ok(())
    }
}

impl Default for PdfMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a minimal PDF with the given number of empty pages.
#[cfg(test)]
pub(crate) fn pdf_with_pages(count: usize) -> Vec<u8> {
    use lopdf::{dictionary, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..count)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            page_id.into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(bytes: &[u8]) -> Document {
        Document::load_mem(bytes).unwrap()
    }

    #[tokio::test]
    async fn merges_documents_and_attaches_outline() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("merged.pdf");

        let mut merger = PdfMerger::new();
        merger.add_document(load(&pdf_with_pages(2)));
        merger.add_document(load(&pdf_with_pages(3)));

        let outline = vec![
            Bookmark {
                title: "First".to_string(),
                start_page: 0,
            },
            Bookmark {
                title: "Second".to_string(),
                start_page: 2,
            },
        ];
        merger.save(&out, &outline).await.unwrap();

        let merged = Document::load(&out).unwrap();
        assert_eq!(merged.get_pages().len(), 5);
        assert!(merged.catalog().unwrap().get(b"Outlines").is_ok());
    }

    #[tokio::test]
    async fn single_document_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("single.pdf");

        let mut merger = PdfMerger::new();
        merger.add_document(load(&pdf_with_pages(4)));
        merger.save(&out, &[]).await.unwrap();

        let merged = Document::load(&out).unwrap();
        assert_eq!(merged.get_pages().len(), 4);
    }

    #[tokio::test]
    async fn out_of_range_bookmark_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("skip.pdf");

        let mut merger = PdfMerger::new();
        merger.add_document(load(&pdf_with_pages(1)));

        let outline = vec![
            Bookmark {
                title: "Valid".to_string(),
                start_page: 0,
            },
            Bookmark {
                title: "Dangling".to_string(),
                start_page: 99,
            },
        ];
        merger.save(&out, &outline).await.unwrap();

        let merged = Document::load(&out).unwrap();
        assert_eq!(merged.get_pages().len(), 1);
    }

    #[tokio::test]
    async fn refuses_to_save_with_nothing_queued() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("never.pdf");

        let merger = PdfMerger::new();
        assert!(merger.save(&out, &[]).await.is_err());
        assert!(!out.exists());
    }
}
