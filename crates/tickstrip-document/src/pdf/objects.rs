// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Small helpers over `lopdf` objects: numbers, reference resolution,
// inherited page attributes, reference scanning, and affine matrices.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Maximum chain of indirect references followed before giving up.
const MAX_REFERENCE_DEPTH: usize = 32;

/// Nesting limit for Form XObjects drawn inside Form XObjects.
pub(crate) const MAX_FORM_DEPTH: usize = 8;

/// Numeric value of an Integer or Real object.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Follow indirect references until a direct object is reached.
///
/// Dangling references resolve to `Object::Null`.
pub(crate) fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> &'a Object {
    for _ in 0..MAX_REFERENCE_DEPTH {
        match obj {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => obj = next,
                Err(_) => return &Object::Null,
            },
            _ => return obj,
        }
    }
    &Object::Null
}

/// Resolve `obj` and return it as a dictionary (a stream's dictionary counts).
pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Look up `key` in `dict`, resolving references.
pub(crate) fn dict_get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

/// Numeric entry of a dictionary, resolving references.
pub(crate) fn dict_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    dict_get(doc, dict, key).and_then(number)
}

/// Name entry of a dictionary, resolving references.
pub(crate) fn dict_name<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    match dict_get(doc, dict, key)? {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

/// Look up a page attribute, walking up the `/Parent` chain for inheritable
/// keys such as `/Resources`, `/MediaBox` and `/CropBox`.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_REFERENCE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(resolve(doc, value));
        }
        node = match node.get(b"Parent") {
            Ok(parent) => resolve_dict(doc, parent)?,
            Err(_) => return None,
        };
    }
    None
}

/// Filter names of a stream, in decode order.
pub(crate) fn stream_filters(doc: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict_get(doc, dict, b"Filter") {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match resolve(doc, item) {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Every object id referenced from any object in the document or its trailer.
pub(crate) fn referenced_ids(doc: &Document) -> HashSet<ObjectId> {
    let mut found = HashSet::new();
    for object in doc.objects.values() {
        collect_references(object, &mut found);
    }
    for (_, value) in doc.trailer.iter() {
        collect_references(value, &mut found);
    }
    found
}

pub(crate) fn collect_references(object: &Object, found: &mut HashSet<ObjectId>) {
    match object {
        Object::Reference(id) => {
            found.insert(*id);
        }
        Object::Array(items) => {
            for item in items {
                collect_references(item, found);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                collect_references(value, found);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                collect_references(value, found);
            }
        }
        _ => {}
    }
}

// -- Matrices -----------------------------------------------------------------

/// PDF affine matrix `[a b c d e f]` applied to row vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Build from six numeric operands (as given to `cm` or `Tm`).
    pub fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let mut values = [0.0f32; 6];
        for (slot, operand) in values.iter_mut().zip(operands) {
            *slot = number(operand)?;
        }
        Some(Self::new(
            values[0], values[1], values[2], values[3], values[4], values[5],
        ))
    }

    /// Build from a `/Matrix` array entry.
    pub fn from_array(doc: &Document, obj: &Object) -> Option<Self> {
        match resolve(doc, obj) {
            Object::Array(items) => Self::from_operands(items),
            _ => None,
        }
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}
