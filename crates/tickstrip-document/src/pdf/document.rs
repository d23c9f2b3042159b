// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Exam document: open a PDF, hand out its pages for editing, save once.

use std::collections::BTreeSet;
use std::path::Path;

use lopdf::{Document, ObjectId};
use tickstrip_core::error::{Result, TickstripError};
use tracing::{debug, info, instrument};

use super::images::purge_unreferenced;
use super::page::LopdfPage;

/// A PDF opened for in-place editing.
///
/// Wraps `lopdf::Document`. Pages are edited one at a time through
/// [`ExamDocument::page`]; images deleted from pages are remembered so the
/// objects can be dropped at save time once no page refers to them.
pub struct ExamDocument {
    /// The underlying lopdf document.
    document: Document,
    /// Page object ids in page order.
    page_ids: Vec<ObjectId>,
    /// Images some page stopped painting.
    removed_images: BTreeSet<ObjectId>,
    /// Source path, if opened from a file. Logged on close.
    source_path: Option<String>,
}

impl ExamDocument {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            TickstripError::Open(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        let mut opened = Self::from_document(document);
        opened.source_path = Some(path_ref.display().to_string());
        debug!(pages = opened.page_count(), "PDF loaded");
        Ok(opened)
    }

    /// Open a PDF from raw bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            TickstripError::Open(format!("failed to load PDF from memory: {}", err))
        })?;

        let opened = Self::from_document(document);
        debug!(pages = opened.page_count(), "PDF loaded from bytes");
        Ok(opened)
    }

    pub(crate) fn from_document(document: Document) -> Self {
        // lopdf keys pages by 1-based page number, in order.
        let page_ids = document.get_pages().into_values().collect();
        Self {
            document,
            page_ids,
            removed_images: BTreeSet::new(),
            source_path: None,
        }
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Read access to the underlying `lopdf` document.
    pub fn inner(&self) -> &Document {
        &self.document
    }

    pub(crate) fn inner_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    // -- Editing --------------------------------------------------------------

    /// Borrow page `index` (0-based) for editing.
    pub fn page(&mut self, index: usize) -> Result<LopdfPage<'_>> {
        let page_id = *self.page_ids.get(index).ok_or_else(|| TickstripError::Page {
            page: index,
            detail: format!("page out of range (document has {} pages)", self.page_ids.len()),
        })?;
        Ok(LopdfPage::new(
            &mut self.document,
            &mut self.removed_images,
            page_id,
            index,
        ))
    }

    // -- Output ---------------------------------------------------------------

    /// Write the document to `path`, replacing any existing file.
    ///
    /// Deleted images that no page refers to any more are dropped first.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path_ref = path.as_ref();
        let purged = purge_unreferenced(&mut self.document, &self.removed_images);
        self.removed_images.clear();

        self.document.save(path_ref).map_err(|err| {
            TickstripError::Save(format!("failed to write {}: {}", path_ref.display(), err))
        })?;

        info!(purged = purged.len(), pages = self.page_count(), "PDF saved");
        Ok(())
    }

    /// Serialise the document into memory.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        purge_unreferenced(&mut self.document, &self.removed_images);
        self.removed_images.clear();

        let mut output = Vec::new();
        self.document.save_to(&mut output).map_err(|err| {
            TickstripError::Save(format!("failed to serialise PDF: {}", err))
        })?;
        Ok(output)
    }

    /// Release the document.
    pub fn close(self) {
        debug!(source = ?self.source_path, "PDF closed");
    }
}
