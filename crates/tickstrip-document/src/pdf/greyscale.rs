// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Greyscale rewriting of a whole PDF: device colour operators in page and
// form content become grey operators, and colour raster images are
// re-encoded with a single grey channel.
//
// Shadings, patterns and colour spaces named through resources are left as
// they are.

use std::path::Path;

use lopdf::content::Operation;
use lopdf::{Document, Object, ObjectId, Stream};
use serde::Serialize;
use tickstrip_core::error::Result;
use tracing::{debug, info, instrument, warn};

use super::content::{decode_operations, encode_operations, read_page_operations, replace_page_content, stream_bytes};
use super::document::ExamDocument;
use super::objects::{dict_get, dict_name, dict_number, number, resolve, stream_filters};
use crate::image::ImageProcessor;

/// Default JPEG quality for re-encoded DCT images.
const DEFAULT_JPEG_QUALITY: u8 = 90;

/// What a greyscale pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GreyscaleReport {
    pub colour_operators: usize,
    pub images_converted: usize,
    pub images_skipped: usize,
}

/// Rewrites documents to greyscale in process.
#[derive(Debug, Clone)]
pub struct GreyscaleRewriter {
    jpeg_quality: u8,
}

impl Default for GreyscaleRewriter {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl GreyscaleRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Read `input`, rewrite it to greyscale and write the result to `output`.
    #[instrument(skip_all, fields(input = %input.as_ref().display(), output = %output.as_ref().display()))]
    pub fn convert_file(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<GreyscaleReport> {
        let mut document = ExamDocument::open(input)?;
        let report = self.rewrite(document.inner_mut())?;
        document.save(output)?;
        info!(
            colour_operators = report.colour_operators,
            images_converted = report.images_converted,
            images_skipped = report.images_skipped,
            "Greyscale copy written"
        );
        Ok(report)
    }

    /// Rewrite `doc` in place.
    pub fn rewrite(&self, doc: &mut Document) -> Result<GreyscaleReport> {
        let mut report = GreyscaleReport::default();

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for page_id in pages {
            let mut operations = read_page_operations(doc, page_id)?;
            let changed = rewrite_colour_operations(&mut operations);
            if changed > 0 {
                replace_page_content(doc, page_id, encode_operations(operations)?)?;
                report.colour_operators += changed;
            }
        }

        for id in stream_ids_with_subtype(doc, b"Form") {
            report.colour_operators += rewrite_form(doc, id)?;
        }

        for id in stream_ids_with_subtype(doc, b"Image") {
            match self.grey_image(doc, id) {
                Some(stream) => {
                    doc.objects.insert(id, Object::Stream(stream));
                    report.images_converted += 1;
                }
                None => report.images_skipped += 1,
            }
        }

        debug!(?report, "Greyscale rewrite finished");
        Ok(report)
    }

    /// Greyscale replacement for image `id`, or `None` to leave it alone.
    fn grey_image(&self, doc: &Document, id: ObjectId) -> Option<Stream> {
        let Ok(Object::Stream(stream)) = doc.get_object(id) else {
            return None;
        };
        let dict = &stream.dict;
        if matches!(dict_get(doc, dict, b"ImageMask"), Some(Object::Boolean(true))) {
            return None;
        }
        let space = ImageSpace::of(doc, dict_get(doc, dict, b"ColorSpace"));
        if matches!(space, ImageSpace::Gray) {
            return None;
        }
        let width = dict_number(doc, dict, b"Width")? as u32;
        let height = dict_number(doc, dict, b"Height")? as u32;
        let bits = dict_number(doc, dict, b"BitsPerComponent").unwrap_or(8.0) as u32;
        let filters = stream_filters(doc, dict);

        let mut grey = stream.clone();
        let outcome = match (&space, filters.as_slice()) {
            (ImageSpace::Rgb | ImageSpace::Cmyk, [filter]) if filter.as_slice() == b"DCTDecode" => {
                ImageProcessor::from_bytes(&stream.content)
                    .and_then(|img| img.grayscale().to_jpeg_bytes(self.jpeg_quality))
                    .map(|jpeg| {
                        grey.content = jpeg;
                        grey.dict.remove(b"Decode");
                        grey.dict.set("Length", grey.content.len() as i64);
                    })
            }
            (ImageSpace::Rgb | ImageSpace::Cmyk, _) if bits == 8 && dict.get(b"DecodeParms").is_err() => {
                stream_bytes(stream)
                    .and_then(|samples| match space {
                        ImageSpace::Cmyk => ImageProcessor::from_cmyk_samples(width, height, &samples),
                        _ => ImageProcessor::from_rgb_samples(width, height, samples),
                    })
                    .map(|img| {
                        grey.set_plain_content(img.to_luma_samples());
                        grey.dict.remove(b"Decode");
                        if let Err(err) = grey.compress() {
                            warn!(object = id.0, error = %err, "Grey image left uncompressed");
                        }
                    })
            }
            (ImageSpace::IndexedRgb { high, lookup }, _) => {
                let grey_lookup: Vec<u8> = lookup
                    .chunks_exact(3)
                    .map(|rgb| luma(rgb[0] as f32 / 255.0, rgb[1] as f32 / 255.0, rgb[2] as f32 / 255.0))
                    .map(|l| (l * 255.0).round() as u8)
                    .collect();
                grey.dict.set(
                    "ColorSpace",
                    vec![
                        Object::Name(b"Indexed".to_vec()),
                        Object::Name(b"DeviceGray".to_vec()),
                        Object::Integer(*high),
                        Object::String(grey_lookup, lopdf::StringFormat::Hexadecimal),
                    ],
                );
                return Some(grey);
            }
            _ => {
                warn!(object = id.0, bits, filters = filters.len(), "Image encoding not converted");
                return None;
            }
        };

        match outcome {
            Ok(()) => {
                grey.dict.set("ColorSpace", "DeviceGray");
                grey.dict.set("BitsPerComponent", 8);
                debug!(object = id.0, width, height, "Image converted to grey");
                Some(grey)
            }
            Err(err) => {
                warn!(object = id.0, error = %err, "Image left in colour");
                None
            }
        }
    }
}

fn stream_ids_with_subtype(doc: &Document, subtype: &[u8]) -> Vec<ObjectId> {
    doc.objects
        .iter()
        .filter_map(|(id, obj)| match obj {
            Object::Stream(stream) if dict_name(doc, &stream.dict, b"Subtype") == Some(subtype) => Some(*id),
            _ => None,
        })
        .collect()
}

fn rewrite_form(doc: &mut Document, id: ObjectId) -> Result<usize> {
    let Ok(Object::Stream(form)) = doc.get_object(id) else {
        return Ok(0);
    };
    let mut operations = match stream_bytes(form).and_then(|data| decode_operations(&data)) {
        Ok(operations) => operations,
        Err(err) => {
            warn!(object = id.0, error = %err, "Form content unreadable, left in colour");
            return Ok(0);
        }
    };
    let changed = rewrite_colour_operations(&mut operations);
    if changed == 0 {
        return Ok(0);
    }
    let data = encode_operations(operations)?;
    if let Ok(Object::Stream(form)) = doc.get_object_mut(id) {
        form.set_plain_content(data);
        if let Err(err) = form.compress() {
            warn!(object = id.0, error = %err, "Form content left uncompressed");
        }
    }
    Ok(changed)
}

// -- Colour operators ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Space {
    Gray,
    Rgb,
    Cmyk,
    Other,
}

impl Space {
    fn named(name: &[u8]) -> Self {
        match name {
            b"DeviceGray" => Self::Gray,
            b"DeviceRGB" => Self::Rgb,
            b"DeviceCMYK" => Self::Cmyk,
            _ => Self::Other,
        }
    }
}

/// ITU-R BT.601 luma.
fn luma(r: f32, g: f32, b: f32) -> f32 {
    (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 1.0)
}

fn cmyk_luma(c: f32, m: f32, y: f32, k: f32) -> f32 {
    luma((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k))
}

fn grey_of(operands: &[Object]) -> Option<f32> {
    let values: Option<Vec<f32>> = operands.iter().map(number).collect();
    match values?.as_slice() {
        [r, g, b] => Some(luma(*r, *g, *b)),
        [c, m, y, k] => Some(cmyk_luma(*c, *m, *y, *k)),
        _ => None,
    }
}

/// Replace device colour operators with grey ones. Returns how many changed.
///
/// `fill` and `stroke` track the colour space the content selected, so
/// `sc`/`scn` values given in a swapped-out RGB or CMYK space are reduced too.
pub(crate) fn rewrite_colour_operations(operations: &mut [Operation]) -> usize {
    let mut changed = 0;
    let mut fill = Space::Gray;
    let mut stroke = Space::Gray;
    let mut saved: Vec<(Space, Space)> = Vec::new();

    for op in operations.iter_mut() {
        let replacement = match op.operator.as_str() {
            "q" => {
                saved.push((fill, stroke));
                None
            }
            "Q" => {
                if let Some((f, s)) = saved.pop() {
                    fill = f;
                    stroke = s;
                }
                None
            }
            "rg" | "k" => {
                fill = Space::Gray;
                grey_of(&op.operands).map(|l| ("g", vec![Object::Real(l)]))
            }
            "RG" | "K" => {
                stroke = Space::Gray;
                grey_of(&op.operands).map(|l| ("G", vec![Object::Real(l)]))
            }
            "g" => {
                fill = Space::Gray;
                None
            }
            "G" => {
                stroke = Space::Gray;
                None
            }
            "cs" | "CS" => {
                let space = match op.operands.first() {
                    Some(Object::Name(name)) => Space::named(name),
                    _ => Space::Other,
                };
                let operator = if op.operator == "cs" { "cs" } else { "CS" };
                if operator == "cs" {
                    fill = space;
                } else {
                    stroke = space;
                }
                matches!(space, Space::Rgb | Space::Cmyk)
                    .then(|| (operator, vec![Object::Name(b"DeviceGray".to_vec())]))
            }
            "sc" | "scn" if matches!(fill, Space::Rgb | Space::Cmyk) => {
                grey_of(&op.operands).map(|l| ("sc", vec![Object::Real(l)]))
            }
            "SC" | "SCN" if matches!(stroke, Space::Rgb | Space::Cmyk) => {
                grey_of(&op.operands).map(|l| ("SC", vec![Object::Real(l)]))
            }
            _ => None,
        };

        if let Some((operator, operands)) = replacement {
            *op = Operation::new(operator, operands);
            changed += 1;
        }
    }
    changed
}

// -- Image colour spaces ------------------------------------------------------

#[derive(Debug)]
enum ImageSpace {
    Gray,
    Rgb,
    Cmyk,
    IndexedRgb { high: i64, lookup: Vec<u8> },
    Unsupported,
}

impl ImageSpace {
    fn of(doc: &Document, space: Option<&Object>) -> Self {
        match space {
            Some(Object::Name(name)) => match Space::named(name) {
                Space::Gray => Self::Gray,
                Space::Rgb => Self::Rgb,
                Space::Cmyk => Self::Cmyk,
                Space::Other => Self::Unsupported,
            },
            Some(Object::Array(items)) => match items.as_slice() {
                [Object::Name(kind), profile] if kind.as_slice() == b"ICCBased" => {
                    let components = match resolve(doc, profile) {
                        Object::Stream(stream) => dict_number(doc, &stream.dict, b"N"),
                        _ => None,
                    };
                    match components.map(|n| n as u32) {
                        Some(1) => Self::Gray,
                        Some(3) => Self::Rgb,
                        Some(4) => Self::Cmyk,
                        _ => Self::Unsupported,
                    }
                }
                [Object::Name(kind), base, high, lookup] if kind.as_slice() == b"Indexed" => {
                    let base_is_rgb = matches!(resolve(doc, base), Object::Name(name) if name.as_slice() == b"DeviceRGB");
                    match (base_is_rgb, resolve(doc, high), resolve(doc, lookup)) {
                        (true, Object::Integer(high), Object::String(bytes, _)) => Self::IndexedRgb {
                            high: *high,
                            lookup: bytes.clone(),
                        },
                        _ => Self::Unsupported,
                    }
                }
                _ => Self::Unsupported,
            },
            // No colour space: image masks and JPX images carry their own.
            _ => Self::Unsupported,
        }
    }
}
