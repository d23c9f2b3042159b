// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page content streams and the page coordinate frame.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tickstrip_core::error::{Result, TickstripError};
use tracing::{debug, warn};

use super::objects::{inherited, number, referenced_ids, resolve};

/// Default page box when none is present (US Letter).
const LETTER: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Mapping between PDF user space (origin bottom-left, y up) and page space
/// (origin top-left, y down) for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageFrame {
    pub left: f32,
    pub bottom: f32,
    pub width: f32,
    pub height: f32,
}

impl PageFrame {
    /// Frame of the visible page: `/CropBox` if present, else `/MediaBox`.
    pub fn for_page(doc: &Document, page_id: ObjectId) -> Self {
        let rect = inherited(doc, page_id, b"CropBox")
            .and_then(|obj| box_values(doc, obj))
            .or_else(|| inherited(doc, page_id, b"MediaBox").and_then(|obj| box_values(doc, obj)))
            .unwrap_or(LETTER);
        let (x0, x1) = (rect[0].min(rect[2]), rect[0].max(rect[2]));
        let (y0, y1) = (rect[1].min(rect[3]), rect[1].max(rect[3]));
        Self {
            left: x0,
            bottom: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    fn top(&self) -> f32 {
        self.bottom + self.height
    }

    /// User space to page space.
    pub fn to_page(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.left, self.top() - y)
    }

    /// Page space to user space.
    pub fn to_user(&self, x: f32, y: f32) -> (f32, f32) {
        (x + self.left, self.top() - y)
    }
}

fn box_values(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    match obj {
        Object::Array(items) if items.len() == 4 => {
            let mut values = [0.0f32; 4];
            for (slot, item) in values.iter_mut().zip(items) {
                *slot = number(resolve(doc, item))?;
            }
            Some(values)
        }
        _ => None,
    }
}

/// Ids of the content streams of a page, in drawing order.
pub(crate) fn content_ids(doc: &Document, page_id: ObjectId) -> Result<Vec<ObjectId>> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|err| TickstripError::Pdf(format!("page object {:?}: {}", page_id, err)))?;
    Ok(match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // An indirect array of streams.
            Ok(Object::Array(items)) => items.iter().filter_map(|o| o.as_reference().ok()).collect(),
            _ => vec![*id],
        },
        Ok(Object::Array(items)) => items.iter().filter_map(|o| o.as_reference().ok()).collect(),
        _ => Vec::new(),
    })
}

/// Decoded bytes of a stream, honouring its filters.
pub(crate) fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|err| TickstripError::Pdf(format!("cannot decode stream: {}", err)))
    } else {
        Ok(stream.content.clone())
    }
}

/// Decode all content streams of a page into one operation list.
pub(crate) fn read_page_operations(doc: &Document, page_id: ObjectId) -> Result<Vec<Operation>> {
    let mut data = Vec::new();
    for id in content_ids(doc, page_id)? {
        let stream = match doc.get_object(id) {
            Ok(Object::Stream(stream)) => stream,
            Ok(_) | Err(_) => {
                return Err(TickstripError::Pdf(format!(
                    "content stream {:?} is missing or not a stream",
                    id
                )));
            }
        };
        data.extend_from_slice(&stream_bytes(stream)?);
        // Streams are concatenated as if they were one; keep tokens apart.
        data.push(b'\n');
    }
    decode_operations(&data)
}

pub(crate) fn decode_operations(data: &[u8]) -> Result<Vec<Operation>> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Content::decode(data)
        .map(|content| content.operations)
        .map_err(|err| TickstripError::Pdf(format!("cannot parse content stream: {}", err)))
}

pub(crate) fn encode_operations(operations: Vec<Operation>) -> Result<Vec<u8>> {
    Content { operations }
        .encode()
        .map_err(|err| TickstripError::Pdf(format!("cannot encode content stream: {}", err)))
}

/// Replace a page's content with a single Flate-compressed stream holding
/// `data`.
///
/// Old content streams are dropped from the document once nothing else
/// refers to them, so streams shared with other pages survive.
pub(crate) fn replace_page_content(doc: &mut Document, page_id: ObjectId, data: Vec<u8>) -> Result<()> {
    let old_ids = content_ids(doc, page_id)?;
    let old_holder = match doc.get_dictionary(page_id).ok().and_then(|p| p.get(b"Contents").ok()) {
        Some(Object::Reference(id)) if !old_ids.contains(id) => Some(*id),
        _ => None,
    };

    let mut stream = Stream::new(Dictionary::new(), data);
    if let Err(err) = stream.compress() {
        warn!(?page_id, error = %err, "Page content left uncompressed");
    }
    let new_id = doc.add_object(stream);
    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|err| TickstripError::Pdf(format!("page object {:?}: {}", page_id, err)))?;
    page.set("Contents", Object::Reference(new_id));

    let still_used = referenced_ids(doc);
    for id in old_ids.into_iter().chain(old_holder) {
        if !still_used.contains(&id) {
            doc.objects.remove(&id);
        }
    }
    debug!(?page_id, ?new_id, "Page content replaced");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{PageSpec, build_document};
    use lopdf::dictionary;

    #[test]
    fn frame_flips_y() {
        let frame = PageFrame {
            left: 0.0,
            bottom: 0.0,
            width: 612.0,
            height: 792.0,
        };
        assert_eq!(frame.to_page(72.0, 700.0), (72.0, 92.0));
        assert_eq!(frame.to_user(72.0, 92.0), (72.0, 700.0));
    }

    #[test]
    fn frame_prefers_crop_box() {
        let mut doc = Document::with_version("1.5");
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "CropBox" => vec![10.into(), 20.into(), 310.into(), 420.into()],
        });
        let frame = PageFrame::for_page(&doc, page);
        assert_eq!(frame.width, 300.0);
        assert_eq!(frame.height, 400.0);
        assert_eq!(frame.to_page(10.0, 420.0), (0.0, 0.0));
    }

    #[test]
    fn replace_content_drops_unshared_streams() {
        let mut doc = build_document(&[PageSpec::text("BT /F1 12 Tf 72 700 Td (Hi) Tj ET")]);
        let page_id = *doc.get_pages().values().next().expect("one page");
        let old = content_ids(&doc, page_id).expect("content ids");

        replace_page_content(&mut doc, page_id, b"0 0 m 10 10 l S".to_vec()).expect("replace");

        for id in old {
            assert!(!doc.objects.contains_key(&id));
        }
        let ops = read_page_operations(&doc, page_id).expect("read back");
        let operators: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators, vec!["m", "l", "S"]);
    }

    #[test]
    fn replaced_content_is_compressed() {
        let mut doc = build_document(&[PageSpec::text("BT /F1 12 Tf 72 700 Td (Hi) Tj ET")]);
        let page_id = *doc.get_pages().values().next().expect("one page");
        let data = b"q 0 0 1 RG 1.5 w 0 100 m 612 100 l S Q\n".repeat(40);

        replace_page_content(&mut doc, page_id, data.clone()).expect("replace");

        let new_id = content_ids(&doc, page_id).expect("content ids")[0];
        let stream = doc.get_object(new_id).and_then(Object::as_stream).expect("content stream");
        assert_eq!(stream.dict.get(b"Filter").and_then(Object::as_name).ok(), Some(b"FlateDecode".as_slice()));
        assert!(stream.content.len() < data.len());
        let ops = read_page_operations(&doc, page_id).expect("read back");
        assert_eq!(ops.len(), 40 * 7);
    }

    #[test]
    fn page_without_contents_reads_empty() {
        let doc = build_document(&[PageSpec::blank()]);
        let page_id = *doc.get_pages().values().next().expect("one page");
        assert!(read_page_operations(&doc, page_id).expect("read").is_empty());
    }
}
