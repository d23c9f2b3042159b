// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font metrics needed to place glyphs: advance widths, ascent/descent, code
// width (one or two bytes) and code-to-text decoding.
//
// Only what text search needs is read. Glyph outlines, `/Differences`
// encodings and vertical writing are not interpreted.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};
use tracing::{debug, warn};

use super::cmap::ToUnicodeMap;
use super::objects::{dict_get, dict_name, dict_number, number, resolve, resolve_dict};

/// Width used when a font gives no metrics, in glyph units (1/1000 em).
const FALLBACK_WIDTH: f32 = 500.0;
const FALLBACK_ASCENT: f32 = 800.0;
const FALLBACK_DESCENT: f32 = -200.0;

/// Highest CID a `/W` array may describe.
const MAX_CID: f32 = 65535.0;

#[derive(Debug, Clone)]
pub(crate) struct FontMetrics {
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
    ascent: f32,
    descent: f32,
    two_byte: bool,
    to_unicode: Option<ToUnicodeMap>,
}

impl FontMetrics {
    /// Metrics for text shown without a usable font dictionary.
    pub fn fallback() -> Self {
        Self {
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: FALLBACK_WIDTH,
            ascent: FALLBACK_ASCENT,
            descent: FALLBACK_DESCENT,
            two_byte: false,
            to_unicode: None,
        }
    }

    pub fn load(doc: &Document, font: &Dictionary) -> Self {
        let mut metrics = Self::fallback();
        let subtype = dict_name(doc, font, b"Subtype").unwrap_or_default();

        metrics.to_unicode = dict_get(doc, font, b"ToUnicode").and_then(|obj| match obj {
            Object::Stream(stream) => {
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                Some(ToUnicodeMap::parse(&data))
            }
            _ => None,
        });

        let descriptor_owner = if subtype == b"Type0" {
            // Composite fonts are read as two-byte codes unless the ToUnicode
            // map clearly uses one-byte codes.
            metrics.two_byte = metrics
                .to_unicode
                .as_ref()
                .is_none_or(|m| m.code_bytes() != 1);
            let descendant = match dict_get(doc, font, b"DescendantFonts") {
                Some(Object::Array(items)) => items.first().and_then(|d| resolve_dict(doc, d)),
                _ => None,
            };
            if let Some(cid_font) = descendant {
                metrics.default_width = dict_number(doc, cid_font, b"DW").unwrap_or(1000.0);
                if let Some(Object::Array(w)) = dict_get(doc, cid_font, b"W") {
                    metrics.cid_widths = parse_cid_widths(doc, w);
                }
            }
            descendant
        } else {
            metrics.first_char = dict_number(doc, font, b"FirstChar").unwrap_or(0.0) as u32;
            if let Some(Object::Array(widths)) = dict_get(doc, font, b"Widths") {
                metrics.widths = widths
                    .iter()
                    .map(|w| number(resolve(doc, w)).unwrap_or(0.0))
                    .collect();
            }
            Some(font)
        };

        if let Some(descriptor) = descriptor_owner
            .and_then(|owner| dict_get(doc, owner, b"FontDescriptor"))
            .and_then(|d| match d {
                Object::Dictionary(dict) => Some(dict),
                _ => None,
            })
        {
            if let Some(ascent) = dict_number(doc, descriptor, b"Ascent").filter(|a| *a > 0.0) {
                metrics.ascent = ascent;
            }
            if let Some(descent) = dict_number(doc, descriptor, b"Descent").filter(|d| *d < 0.0) {
                metrics.descent = descent;
            }
            if metrics.widths.is_empty() && metrics.cid_widths.is_empty() {
                if let Some(missing) = dict_number(doc, descriptor, b"MissingWidth").filter(|w| *w > 0.0) {
                    metrics.default_width = missing;
                }
            }
        }

        debug!(
            subtype = %String::from_utf8_lossy(subtype),
            two_byte = metrics.two_byte,
            widths = metrics.widths.len() + metrics.cid_widths.len(),
            "Font metrics loaded"
        );
        metrics
    }

    /// Split a shown string into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        }
    }

    /// Advance width of `code` in glyph units.
    pub fn width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|index| self.widths.get(index as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    pub fn ascent(&self) -> f32 {
        self.ascent
    }

    pub fn descent(&self) -> f32 {
        self.descent
    }

    /// Whether word spacing applies to this code (single-byte space only).
    pub fn is_word_space(&self, code: u32) -> bool {
        !self.two_byte && code == 32
    }

    /// Text for a character code.
    pub fn decode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|m| m.get(code)) {
            return text.to_string();
        }
        if self.two_byte {
            return char::REPLACEMENT_CHARACTER.to_string();
        }
        // Single-byte fonts without a ToUnicode map: Latin-1 covers the
        // printable ASCII range shared by the standard encodings.
        char::from_u32(code)
            .map(String::from)
            .unwrap_or_default()
    }
}

/// Parse a CIDFont `/W` array: `c [w1 w2 ...]` and `c_first c_last w` forms.
fn parse_cid_widths(doc: &Document, items: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(resolve(doc, &items[i])) else {
            break;
        };
        if !(0.0..=MAX_CID).contains(&first) {
            warn!(first, "CID width entry out of range, rest of /W ignored");
            break;
        }
        match items.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = number(resolve(doc, w)) {
                        widths.insert(first as u32 + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (
                    number(last),
                    items.get(i + 2).and_then(|o| number(resolve(doc, o))),
                ) else {
                    break;
                };
                if last < first || last > MAX_CID {
                    warn!(first, last, "Malformed CID width range skipped");
                } else {
                    for code in first as u32..=last as u32 {
                        widths.insert(code, w);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}
