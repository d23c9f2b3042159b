// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Glyph layout and literal text search.
//
// The content stream is interpreted just far enough to know where each
// shown character lands: graphics state (q/Q/cm), text state
// (Tc/Tw/Tz/TL/Ts/Tf), text positioning (Td/TD/Tm/T*) and the show operators
// (Tj/TJ/'/"). Form XObjects are followed. Glyph boxes are then grouped into
// lines and searched.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tickstrip_core::types::{Point, Rect};
use tracing::{debug, warn};

use super::content::{PageFrame, decode_operations, stream_bytes};
use super::font::FontMetrics;
use super::objects::{MAX_FORM_DEPTH, Matrix, dict_get, dict_name, number, resolve, resolve_dict};

/// A baseline jump larger than this fraction of the glyph height starts a new line.
const LINE_BREAK_RATIO: f32 = 0.5;

/// A horizontal gap larger than this fraction of the glyph height reads as a space.
const SPACE_GAP_RATIO: f32 = 0.25;

/// One shown character (or ligature) with its box in page space.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Glyph {
    pub text: String,
    pub bbox: Rect,
    /// Start of the glyph on its baseline, in page space.
    pub origin: Point,
}

// -- Extraction ---------------------------------------------------------------

#[derive(Debug, Clone)]
struct TextState {
    font: Rc<FontMetrics>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

impl GraphicsState {
    fn initial() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            text: TextState {
                font: Rc::new(FontMetrics::fallback()),
                size: 0.0,
                char_spacing: 0.0,
                word_spacing: 0.0,
                horizontal_scale: 1.0,
                leading: 0.0,
                rise: 0.0,
            },
        }
    }
}

struct GlyphCollector<'a> {
    doc: &'a Document,
    frame: PageFrame,
    fonts: HashMap<ObjectId, Rc<FontMetrics>>,
    glyphs: Vec<Glyph>,
}

/// Lay out every glyph drawn by `operations` on a page.
pub(crate) fn extract_glyphs(
    doc: &Document,
    resources: Option<&Dictionary>,
    operations: &[Operation],
    frame: PageFrame,
) -> Vec<Glyph> {
    let mut collector = GlyphCollector {
        doc,
        frame,
        fonts: HashMap::new(),
        glyphs: Vec::new(),
    };
    collector.walk(operations, resources, GraphicsState::initial(), 0);
    debug!(glyphs = collector.glyphs.len(), fonts = collector.fonts.len(), "Glyphs laid out");
    collector.glyphs
}

fn pair(operands: &[Object]) -> Option<(f32, f32)> {
    match operands {
        [a, b, ..] => Some((number(a)?, number(b)?)),
        _ => None,
    }
}

fn next_line(tm: &mut Matrix, tlm: &mut Matrix, tx: f32, ty: f32) {
    *tlm = Matrix::translate(tx, ty).then(tlm);
    *tm = *tlm;
}

impl<'a> GlyphCollector<'a> {
    fn walk(
        &mut self,
        operations: &[Operation],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
        depth: usize,
    ) {
        let mut state = initial;
        let mut saved: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => saved.push(state.clone()),
                "Q" => {
                    if let Some(previous) = saved.pop() {
                        state = previous;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        state.ctm = m.then(&state.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let [Object::Name(name), size] = operands {
                        state.text.font = self.font(resources, name);
                        state.text.size = number(size).unwrap_or(state.text.size);
                    }
                }
                "Tc" => set_number(operands, &mut state.text.char_spacing),
                "Tw" => set_number(operands, &mut state.text.word_spacing),
                "TL" => set_number(operands, &mut state.text.leading),
                "Ts" => set_number(operands, &mut state.text.rise),
                "Tz" => {
                    if let Some(scale) = operands.first().and_then(number) {
                        state.text.horizontal_scale = scale / 100.0;
                    }
                }
                "Td" => {
                    if let Some((tx, ty)) = pair(operands) {
                        next_line(&mut tm, &mut tlm, tx, ty);
                    }
                }
                "TD" => {
                    if let Some((tx, ty)) = pair(operands) {
                        state.text.leading = -ty;
                        next_line(&mut tm, &mut tlm, tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => next_line(&mut tm, &mut tlm, 0.0, -state.text.leading),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes, &state, &mut tm);
                    }
                }
                "'" => {
                    next_line(&mut tm, &mut tlm, 0.0, -state.text.leading);
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes, &state, &mut tm);
                    }
                }
                "\"" => {
                    if let [aw, ac, Object::String(bytes, _)] = operands {
                        state.text.word_spacing = number(aw).unwrap_or(state.text.word_spacing);
                        state.text.char_spacing = number(ac).unwrap_or(state.text.char_spacing);
                        next_line(&mut tm, &mut tlm, 0.0, -state.text.leading);
                        self.show(bytes, &state, &mut tm);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(bytes, &state, &mut tm),
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let tx = -adjust / 1000.0
                                            * state.text.size
                                            * state.text.horizontal_scale;
                                        tm = Matrix::translate(tx, 0.0).then(&tm);
                                    }
                                }
                            }
                        }
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.form(name, resources, &state, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn font(&mut self, resources: Option<&'a Dictionary>, name: &[u8]) -> Rc<FontMetrics> {
        let doc = self.doc;
        let entry = resources
            .and_then(|res| dict_get(doc, res, b"Font"))
            .and_then(|fonts| resolve_dict(doc, fonts))
            .and_then(|fonts| fonts.get(name).ok());
        let Some(entry) = entry else {
            debug!(font = %String::from_utf8_lossy(name), "Font resource missing, using fallback metrics");
            return Rc::new(FontMetrics::fallback());
        };
        if let Object::Reference(id) = entry {
            if let Some(cached) = self.fonts.get(id) {
                return Rc::clone(cached);
            }
        }
        let metrics = Rc::new(match resolve_dict(doc, entry) {
            Some(dict) => FontMetrics::load(doc, dict),
            None => FontMetrics::fallback(),
        });
        if let Object::Reference(id) = entry {
            self.fonts.insert(*id, Rc::clone(&metrics));
        }
        metrics
    }

    fn show(&mut self, bytes: &[u8], state: &GraphicsState, tm: &mut Matrix) {
        let text = &state.text;
        let font = Rc::clone(&text.font);
        let ascent = font.ascent() / 1000.0;
        let descent = font.descent() / 1000.0;
        let params = Matrix::new(
            text.size * text.horizontal_scale,
            0.0,
            0.0,
            text.size,
            0.0,
            text.rise,
        );

        for code in font.codes(bytes) {
            let advance = font.width(code) / 1000.0;
            let trm = params.then(tm).then(&state.ctm);

            let mut bbox: Option<Rect> = None;
            for (x, y) in [(0.0, descent), (advance, descent), (0.0, ascent), (advance, ascent)] {
                let (ux, uy) = trm.apply(x, y);
                let (px, py) = self.frame.to_page(ux, uy);
                let corner = Rect::new(px, py, px, py);
                bbox = Some(bbox.map_or(corner, |b| b.union(&corner)));
            }
            let (ox, oy) = trm.apply(0.0, 0.0);
            let (ox, oy) = self.frame.to_page(ox, oy);

            if let Some(bbox) = bbox {
                self.glyphs.push(Glyph {
                    text: font.decode(code),
                    bbox,
                    origin: Point::new(ox, oy),
                });
            }

            let mut tx = advance * text.size + text.char_spacing;
            if font.is_word_space(code) {
                tx += text.word_spacing;
            }
            *tm = Matrix::translate(tx * text.horizontal_scale, 0.0).then(tm);
        }
    }

    fn form(&mut self, name: &[u8], resources: Option<&'a Dictionary>, state: &GraphicsState, depth: usize) {
        if depth >= MAX_FORM_DEPTH {
            warn!(depth, "Form XObject nesting too deep, skipping");
            return;
        }
        let doc = self.doc;
        let xobject = resources
            .and_then(|res| dict_get(doc, res, b"XObject"))
            .and_then(|xobjects| resolve_dict(doc, xobjects))
            .and_then(|xobjects| xobjects.get(name).ok())
            .map(|obj| resolve(doc, obj));
        let Some(Object::Stream(form)) = xobject else {
            return;
        };
        if dict_name(doc, &form.dict, b"Subtype") != Some(b"Form".as_slice()) {
            return;
        }

        let operations = match stream_bytes(form).and_then(|data| decode_operations(&data)) {
            Ok(operations) => operations,
            Err(err) => {
                warn!(form = %String::from_utf8_lossy(name), error = %err, "Skipping unreadable form");
                return;
            }
        };
        let matrix = form
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|m| Matrix::from_array(doc, m))
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = dict_get(doc, &form.dict, b"Resources")
            .and_then(|res| resolve_dict(doc, res))
            .or(resources);

        let mut inner = state.clone();
        inner.ctm = matrix.then(&state.ctm);
        self.walk(&operations, form_resources, inner, depth + 1);
    }
}

fn set_number(operands: &[Object], slot: &mut f32) {
    if let Some(value) = operands.first().and_then(number) {
        *slot = value;
    }
}

// -- Search -------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct LineChar {
    ch: char,
    /// Glyph the character came from; `None` for inferred spaces.
    glyph: Option<usize>,
}

/// Group glyphs into reading lines, collapsing whitespace runs to one space.
fn layout_lines(glyphs: &[Glyph]) -> Vec<Vec<LineChar>> {
    let mut lines = Vec::new();
    let mut line: Vec<LineChar> = Vec::new();
    let mut previous: Option<&Glyph> = None;

    let push_space = |line: &mut Vec<LineChar>| {
        if line.last().is_some_and(|c| c.ch != ' ') {
            line.push(LineChar { ch: ' ', glyph: None });
        }
    };

    for (index, glyph) in glyphs.iter().enumerate() {
        if let Some(prev) = previous {
            let height = glyph.bbox.height().max(prev.bbox.height());
            let new_line = (glyph.origin.y - prev.origin.y).abs() > LINE_BREAK_RATIO * height
                || glyph.origin.x < prev.origin.x;
            if new_line {
                lines.push(std::mem::take(&mut line));
            } else if glyph.bbox.x0 - prev.bbox.x1 > SPACE_GAP_RATIO * height {
                push_space(&mut line);
            }
        }
        for ch in glyph.text.chars() {
            if ch.is_whitespace() {
                push_space(&mut line);
            } else {
                line.push(LineChar {
                    ch,
                    glyph: Some(index),
                });
            }
        }
        previous = Some(glyph);
    }
    lines.push(line);
    lines
}

/// Find every non-overlapping occurrence of `needle`, matched exactly and
/// case-sensitively, with whitespace runs treated as a single space.
///
/// Each hit is returned as the union of the boxes of its glyphs, in
/// reading order.
pub(crate) fn search(glyphs: &[Glyph], needle: &str) -> Vec<Rect> {
    let pattern: Vec<char> = needle
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .collect();
    if pattern.is_empty() {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for line in layout_lines(glyphs) {
        let mut start = 0;
        while start + pattern.len() <= line.len() {
            let window = &line[start..start + pattern.len()];
            if window.iter().map(|c| c.ch).eq(pattern.iter().copied()) {
                let rect = window
                    .iter()
                    .filter_map(|c| c.glyph)
                    .map(|g| glyphs[g].bbox)
                    .reduce(|a, b| a.union(&b));
                if let Some(rect) = rect {
                    hits.push(rect);
                }
                start += pattern.len();
            } else {
                start += 1;
            }
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::content::read_page_operations;
    use crate::pdf::fixtures::{PageSpec, build_document};
    use crate::pdf::objects::inherited;

    fn glyphs_of(content: &str) -> Vec<Glyph> {
        let doc = build_document(&[PageSpec::text(content)]);
        let page_id = *doc.get_pages().values().next().expect("one page");
        let ops = read_page_operations(&doc, page_id).expect("operations");
        let resources = inherited(&doc, page_id, b"Resources").and_then(|r| resolve_dict(&doc, r));
        extract_glyphs(&doc, resources, &ops, PageFrame::for_page(&doc, page_id))
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn finds_marker_with_top_left_box() {
        let glyphs = glyphs_of("BT /F1 12 Tf 72 700 Td (Question number 1) Tj ET");
        let hits = search(&glyphs, "Question number");
        assert_eq!(hits.len(), 1);
        let hit = hits[0];
        // Fallback metrics: 500 units wide, ascent 800, descent -200.
        assert!(close(hit.x0, 72.0));
        assert!(close(hit.x1, 72.0 + 15.0 * 6.0));
        assert!(close(hit.y0, 792.0 - 700.0 - 9.6));
        assert!(close(hit.y1, 792.0 - 700.0 + 2.4));
    }

    #[test]
    fn search_is_case_sensitive() {
        let glyphs = glyphs_of("BT /F1 12 Tf 72 700 Td (question Number) Tj ET");
        assert!(search(&glyphs, "Question number").is_empty());
    }

    #[test]
    fn matches_across_show_operators_and_kerning() {
        let glyphs = glyphs_of("BT /F1 12 Tf 72 700 Td [(Ques) 20 (tion)] TJ ( number) Tj ET");
        assert_eq!(search(&glyphs, "Question number").len(), 1);
    }

    #[test]
    fn positioned_words_get_inferred_space() {
        let glyphs = glyphs_of(
            "BT /F1 12 Tf 72 700 Td (Question) Tj ET BT /F1 12 Tf 130 700 Td (number) Tj ET",
        );
        assert_eq!(search(&glyphs, "Question number").len(), 1);
    }

    #[test]
    fn separate_lines_do_not_join() {
        let glyphs = glyphs_of("BT /F1 12 Tf 14 TL 72 700 Td (Question) Tj T* (number) Tj ET");
        assert!(search(&glyphs, "Question number").is_empty());
        assert_eq!(search(&glyphs, "number").len(), 1);
    }

    #[test]
    fn every_occurrence_is_reported_in_order() {
        let glyphs = glyphs_of(
            "BT /F1 12 Tf 72 700 Td (Question number 1) Tj 0 -300 Td (Question number 2) Tj ET",
        );
        let hits = search(&glyphs, "Question number");
        assert_eq!(hits.len(), 2);
        assert!(hits[0].y0 < hits[1].y0);
    }

    #[test]
    fn scaled_text_matrix_scales_box() {
        let glyphs = glyphs_of("BT /F1 1 Tf 24 0 0 24 100 500 Tm (Q) Tj ET");
        let hits = search(&glyphs, "Q");
        assert_eq!(hits.len(), 1);
        assert!(close(hits[0].width(), 12.0));
        assert!(close(hits[0].height(), 24.0));
    }

    #[test]
    fn empty_needle_finds_nothing() {
        let glyphs = glyphs_of("BT /F1 12 Tf 72 700 Td (Question number) Tj ET");
        assert!(search(&glyphs, "   ").is_empty());
    }
}
