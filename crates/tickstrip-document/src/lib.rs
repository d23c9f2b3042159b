// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// tickstrip-document: Document processing for Tickstrip.
//
// Provides PDF access on top of `lopdf` (open, per-page text search, line
// drawing, image enumeration and removal, save), the per-page transform that
// rules question headers and strips tick/cross images, the background
// document pipeline, and an in-process greyscale rewrite.

pub mod image;
pub mod pdf;
pub mod pipeline;
pub mod transform;

// Re-export the primary structs so callers can use `tickstrip_document::ExamDocument` etc.
pub use image::processor::ImageProcessor;
pub use pdf::document::ExamDocument;
pub use pdf::greyscale::{GreyscaleReport, GreyscaleRewriter};
pub use pdf::page::{LopdfPage, PageSurface};
pub use pipeline::{COMPLETION_MESSAGE, DocumentPipeline, EventSender, PipelineRunner};
pub use transform::{PageTransformer, TransformReport};
