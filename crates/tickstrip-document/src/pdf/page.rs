// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page surface: the per-page operations the transformer relies on, and the
// `lopdf` implementation of them.

use std::collections::BTreeSet;

use lopdf::content::Operation;
use lopdf::{Document, Object, ObjectId};
use tickstrip_core::error::Result;
use tickstrip_core::types::{EmbeddedImage, ImageRef, Point, Rect, Rgb};
use tracing::{debug, instrument};

use super::content::{PageFrame, encode_operations, read_page_operations, replace_page_content};
use super::images::{detach_image, image_dimensions, page_image_ids, strip_image_draws};
use super::objects::{inherited, resolve_dict};
use super::text::{Glyph, extract_glyphs, search};

/// Operations a page offers to the transformer.
///
/// Coordinates are in page space: origin at the top-left corner of the
/// visible page, y increasing downward, in PDF points.
pub trait PageSurface {
    fn width(&self) -> f32;
    fn height(&self) -> f32;

    /// Every non-overlapping occurrence of `needle`, in reading order.
    fn search_for(&mut self, needle: &str) -> Result<Vec<Rect>>;

    /// Stroke a straight line from `from` to `to`.
    fn draw_line(&mut self, from: Point, to: Point, color: Rgb, width: f32) -> Result<()>;

    /// Raster images painted by the page, with their pixel dimensions.
    fn images(&mut self) -> Result<Vec<EmbeddedImage>>;

    /// Stop the page from painting `image`. Deleting an image the page does
    /// not use is a no-op.
    fn delete_image(&mut self, image: ImageRef) -> Result<()>;
}

/// A page of an [`ExamDocument`](super::document::ExamDocument) being edited.
///
/// Content is decoded lazily and written back once by [`LopdfPage::commit`].
pub struct LopdfPage<'a> {
    doc: &'a mut Document,
    removed: &'a mut BTreeSet<ObjectId>,
    page_id: ObjectId,
    index: usize,
    frame: PageFrame,
    operations: Option<Vec<Operation>>,
    glyphs: Option<Vec<Glyph>>,
    strokes: Vec<Operation>,
    content_changed: bool,
}

impl<'a> LopdfPage<'a> {
    pub(crate) fn new(
        doc: &'a mut Document,
        removed: &'a mut BTreeSet<ObjectId>,
        page_id: ObjectId,
        index: usize,
    ) -> Self {
        let frame = PageFrame::for_page(doc, page_id);
        Self {
            doc,
            removed,
            page_id,
            index,
            frame,
            operations: None,
            glyphs: None,
            strokes: Vec::new(),
            content_changed: false,
        }
    }

    /// Zero-based page index within the document.
    pub fn index(&self) -> usize {
        self.index
    }

    fn operations(&mut self) -> Result<&mut Vec<Operation>> {
        if self.operations.is_none() {
            self.operations = Some(read_page_operations(self.doc, self.page_id)?);
        }
        Ok(self.operations.get_or_insert_with(Vec::new))
    }

    /// Write pending changes into the page's content stream.
    ///
    /// Original content is wrapped in `q`/`Q` before new strokes are
    /// appended so that its graphics state cannot leak into them. Returns
    /// whether anything was written.
    #[instrument(skip_all, fields(page = self.index))]
    pub fn commit(mut self) -> Result<bool> {
        if self.strokes.is_empty() && !self.content_changed {
            return Ok(false);
        }
        let mut operations = std::mem::take(self.operations()?);
        if !self.strokes.is_empty() {
            operations.insert(0, Operation::new("q", vec![]));
            operations.push(Operation::new("Q", vec![]));
            operations.append(&mut self.strokes);
        }
        let data = encode_operations(operations)?;
        let bytes = data.len();
        replace_page_content(self.doc, self.page_id, data)?;
        debug!(bytes, "Page content committed");
        Ok(true)
    }
}

impl PageSurface for LopdfPage<'_> {
    fn width(&self) -> f32 {
        self.frame.width
    }

    fn height(&self) -> f32 {
        self.frame.height
    }

    fn search_for(&mut self, needle: &str) -> Result<Vec<Rect>> {
        if self.glyphs.is_none() {
            let frame = self.frame;
            let page_id = self.page_id;
            self.operations()?;
            let doc: &Document = self.doc;
            let operations = self.operations.as_deref().unwrap_or_default();
            let resources = inherited(doc, page_id, b"Resources").and_then(|r| resolve_dict(doc, r));
            self.glyphs = Some(extract_glyphs(doc, resources, operations, frame));
        }
        let glyphs = self.glyphs.as_deref().unwrap_or_default();
        let hits = search(glyphs, needle);
        debug!(page = self.index, needle, hits = hits.len(), "Text searched");
        Ok(hits)
    }

    fn draw_line(&mut self, from: Point, to: Point, color: Rgb, width: f32) -> Result<()> {
        let (x0, y0) = self.frame.to_user(from.x, from.y);
        let (x1, y1) = self.frame.to_user(to.x, to.y);
        self.strokes.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "RG",
                vec![Object::Real(color.r), Object::Real(color.g), Object::Real(color.b)],
            ),
            Operation::new("w", vec![Object::Real(width)]),
            Operation::new("m", vec![Object::Real(x0), Object::Real(y0)]),
            Operation::new("l", vec![Object::Real(x1), Object::Real(y1)]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    fn images(&mut self) -> Result<Vec<EmbeddedImage>> {
        let doc: &Document = self.doc;
        page_image_ids(doc, self.page_id)
            .into_iter()
            .map(|id| {
                let (width, height) = image_dimensions(doc, id)?;
                Ok(EmbeddedImage {
                    id: ImageRef::new(id.0, id.1),
                    width,
                    height,
                })
            })
            .collect()
    }

    fn delete_image(&mut self, image: ImageRef) -> Result<()> {
        let target: ObjectId = (image.object, image.generation);
        let detached = detach_image(self.doc, self.page_id, target)?;
        if detached.is_empty() {
            debug!(page = self.index, %image, "Image not used by page");
            return Ok(());
        }
        let stripped = strip_image_draws(self.operations()?, &detached.names);
        self.content_changed |= stripped > 0;
        self.removed.insert(target);
        self.removed.extend(detached.replaced_forms.iter().copied());
        debug!(
            page = self.index,
            %image,
            stripped,
            forms = detached.replaced_forms.len(),
            "Image deleted"
        );
        Ok(())
    }
}
