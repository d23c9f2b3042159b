// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: document lifecycle, page surfaces, text layout, embedded
// images, and greyscale rewriting.

pub(crate) mod cmap;
pub(crate) mod content;
pub mod document;
pub(crate) mod font;
pub mod greyscale;
pub(crate) mod images;
pub(crate) mod objects;
pub mod page;
pub(crate) mod text;

#[cfg(test)]
pub(crate) mod fixtures;

pub use document::ExamDocument;
pub use greyscale::{GreyscaleReport, GreyscaleRewriter};
pub use page::{LopdfPage, PageSurface};
