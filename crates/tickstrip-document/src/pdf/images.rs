// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image XObjects on a page: enumeration, pixel dimensions, and removal of a
// page's references to an image.
//
// Images are found in the page's own resources and in the resources of Form
// XObjects the page draws, nested up to `MAX_FORM_DEPTH` levels.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Cursor;

use image::ImageReader;
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tickstrip_core::error::{Result, TickstripError};
use tracing::{debug, warn};

use super::content::{decode_operations, encode_operations, stream_bytes};
use super::objects::{
    MAX_FORM_DEPTH, collect_references, dict_get, dict_name, dict_number, inherited, referenced_ids, resolve_dict,
    stream_filters,
};

/// Image XObjects a page can paint, directly or through Form XObjects, in
/// resource order without duplicates.
pub(crate) fn page_image_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Some(xobjects) = page_xobjects(doc, page_id) else {
        return Vec::new();
    };
    let mut found = ImageWalk::default();
    found.visit(doc, xobjects, 0);
    found.ids
}

#[derive(Default)]
struct ImageWalk {
    ids: Vec<ObjectId>,
    seen: HashSet<ObjectId>,
    forms: HashSet<ObjectId>,
}

impl ImageWalk {
    fn visit(&mut self, doc: &Document, xobjects: &Dictionary, depth: usize) {
        for (_, value) in xobjects.iter() {
            let Object::Reference(id) = value else {
                continue;
            };
            let Ok(Object::Stream(stream)) = doc.get_object(*id) else {
                continue;
            };
            match dict_name(doc, &stream.dict, b"Subtype") {
                Some(b"Image") => {
                    if self.seen.insert(*id) {
                        self.ids.push(*id);
                    }
                }
                Some(b"Form") => {
                    if depth >= MAX_FORM_DEPTH {
                        warn!(object = id.0, "Form XObjects nested too deeply, images below skipped");
                        continue;
                    }
                    if !self.forms.insert(*id) {
                        continue;
                    }
                    // A form without its own resources uses the parent's, which are already listed.
                    if let Some(inner) = form_xobjects(doc, &stream.dict) {
                        self.visit(doc, inner, depth + 1);
                    }
                }
                _ => {}
            }
        }
    }
}

fn page_xobjects(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let resources = inherited(doc, page_id, b"Resources").and_then(|r| resolve_dict(doc, r))?;
    resources.get(b"XObject").ok().and_then(|x| resolve_dict(doc, x))
}

fn form_resources<'a>(doc: &'a Document, form: &'a Dictionary) -> Option<&'a Dictionary> {
    dict_get(doc, form, b"Resources").and_then(|r| resolve_dict(doc, r))
}

fn form_xobjects<'a>(doc: &'a Document, form: &'a Dictionary) -> Option<&'a Dictionary> {
    form_resources(doc, form)
        .and_then(|r| dict_get(doc, r, b"XObject"))
        .and_then(|x| resolve_dict(doc, x))
}

fn is_form(doc: &Document, id: ObjectId) -> bool {
    match doc.get_object(id) {
        Ok(Object::Stream(stream)) => dict_name(doc, &stream.dict, b"Subtype") == Some(b"Form".as_slice()),
        _ => false,
    }
}

/// Pixel dimensions of an image XObject.
///
/// JPEG data carries its own header, which wins over the dictionary when
/// the stream is plain `DCTDecode`. Every other encoding reports the
/// dictionary's `/Width` and `/Height`.
pub(crate) fn image_dimensions(doc: &Document, id: ObjectId) -> Result<(u32, u32)> {
    let stream = match doc.get_object(id) {
        Ok(Object::Stream(stream)) => stream,
        _ => {
            return Err(TickstripError::Image(format!(
                "object {} {} is not an image stream",
                id.0, id.1
            )));
        }
    };

    if stream_filters(doc, &stream.dict) == [b"DCTDecode".to_vec()] {
        match jpeg_dimensions(&stream.content) {
            Ok(dimensions) => return Ok(dimensions),
            Err(err) => warn!(object = id.0, error = %err, "JPEG header unreadable, using image dictionary"),
        }
    }

    match (
        dict_number(doc, &stream.dict, b"Width"),
        dict_number(doc, &stream.dict, b"Height"),
    ) {
        (Some(width), Some(height)) if width >= 0.0 && height >= 0.0 => Ok((width as u32, height as u32)),
        _ => Err(TickstripError::Image(format!(
            "image {} {} has no usable /Width and /Height",
            id.0, id.1
        ))),
    }
}

fn jpeg_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|err| TickstripError::Image(format!("cannot sniff image data: {}", err)))?
        .into_dimensions()
        .map_err(|err| TickstripError::Image(format!("cannot read image header: {}", err)))
}

/// What [`detach_image`] changed.
#[derive(Debug, Default)]
pub(crate) struct Detached {
    /// Names dropped from the page's own `/XObject` dictionary.
    pub names: Vec<Vec<u8>>,
    /// Form XObjects the page now reaches through edited copies instead.
    pub replaced_forms: Vec<ObjectId>,
}

impl Detached {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.replaced_forms.is_empty()
    }
}

/// Drop every name under which the page's resources, or the resources of
/// the forms it draws, refer to `target`.
///
/// The page's `/Resources` and its `/XObject` dictionary are first copied
/// onto the page itself, so resource dictionaries shared with other pages
/// are left untouched. A form that names the image is replaced by an edited
/// copy, with its `Do` operations for the image removed; the original form
/// stays for whoever else draws it. Draws in the page's own content are
/// left to the caller, using the returned names.
pub(crate) fn detach_image(doc: &mut Document, page_id: ObjectId, target: ObjectId) -> Result<Detached> {
    let Some(resources) = inherited(doc, page_id, b"Resources")
        .and_then(|r| resolve_dict(doc, r))
        .cloned()
    else {
        return Ok(Detached::default());
    };

    let mut detacher = Detacher {
        target,
        copies: HashMap::new(),
        replaced: Vec::new(),
    };
    let Some((resources, names)) = detacher.resources(doc, resources, 0)? else {
        return Ok(Detached::default());
    };
    let detached = Detached {
        names,
        replaced_forms: detacher.replaced,
    };

    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|err| TickstripError::Pdf(format!("page object {:?}: {}", page_id, err)))?;
    page.set("Resources", Object::Dictionary(resources));

    debug!(
        ?page_id,
        ?target,
        names = detached.names.len(),
        forms = detached.replaced_forms.len(),
        "Image detached from page resources"
    );
    Ok(detached)
}

struct Detacher {
    target: ObjectId,
    /// Each form seen, mapped to its replacement if it has one. The
    /// replacement id is reserved before the form's own resources are
    /// visited, so a form that draws itself ends up drawing its copy.
    copies: HashMap<ObjectId, Option<ObjectId>>,
    replaced: Vec<ObjectId>,
}

impl Detacher {
    /// Edited copy of `resources` with the target's names removed from its
    /// `/XObject` dictionary, plus those names, or `None` when nothing in it
    /// reaches the target.
    fn resources(
        &mut self,
        doc: &mut Document,
        mut resources: Dictionary,
        depth: usize,
    ) -> Result<Option<(Dictionary, Vec<Vec<u8>>)>> {
        let Some(mut xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|x| resolve_dict(doc, x))
            .cloned()
        else {
            return Ok(None);
        };

        let names: Vec<Vec<u8>> = xobjects
            .iter()
            .filter(|(_, value)| matches!(value, Object::Reference(id) if *id == self.target))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &names {
            xobjects.remove(name);
        }
        let mut changed = !names.is_empty();

        let forms: Vec<(Vec<u8>, ObjectId)> = xobjects
            .iter()
            .filter_map(|(name, value)| match value {
                Object::Reference(id) if is_form(doc, *id) => Some((name.clone(), *id)),
                _ => None,
            })
            .collect();
        for (name, form_id) in forms {
            let copy = match self.copies.get(&form_id).copied() {
                Some(copy) => copy,
                None if depth >= MAX_FORM_DEPTH => {
                    warn!(object = form_id.0, "Form XObjects nested too deeply, left as they are");
                    None
                }
                None => {
                    let reserved = doc.new_object_id();
                    self.copies.insert(form_id, Some(reserved));
                    let copy = self.form(doc, form_id, reserved, &names, depth + 1)?.then_some(reserved);
                    self.copies.insert(form_id, copy);
                    copy
                }
            };
            if let Some(copy) = copy {
                xobjects.set(name, Object::Reference(copy));
                changed = true;
            }
        }

        if !changed {
            return Ok(None);
        }
        resources.set("XObject", Object::Dictionary(xobjects));
        Ok(Some((resources, names)))
    }

    /// Store a copy of form `form_id` that no longer draws the target under
    /// `copy_id`. Returns `false`, storing nothing, when the form never drew
    /// it. `parent_names` are the names just removed from the resources the
    /// form inherits when it has none of its own.
    fn form(
        &mut self,
        doc: &mut Document,
        form_id: ObjectId,
        copy_id: ObjectId,
        parent_names: &[Vec<u8>],
        depth: usize,
    ) -> Result<bool> {
        let mut form = match doc.get_object(form_id) {
            Ok(Object::Stream(stream)) => stream.clone(),
            _ => return Ok(false),
        };

        let (resources, names) = match form_resources(doc, &form.dict).cloned() {
            Some(own) => match self.resources(doc, own, depth)? {
                Some((edited, names)) => (Some(edited), names),
                None => return Ok(false),
            },
            None if parent_names.is_empty() => return Ok(false),
            None => (None, parent_names.to_vec()),
        };

        let mut stripped = 0;
        match stream_bytes(&form).and_then(|data| decode_operations(&data)) {
            Ok(mut operations) => {
                stripped = strip_image_draws(&mut operations, &names);
                if stripped > 0 {
                    form.set_plain_content(encode_operations(operations)?);
                    if let Err(err) = form.compress() {
                        warn!(object = form_id.0, error = %err, "Form content left uncompressed");
                    }
                }
            }
            Err(err) => warn!(object = form_id.0, error = %err, "Form content unreadable, draws left in place"),
        }

        match resources {
            Some(edited) => form.dict.set("Resources", Object::Dictionary(edited)),
            None if stripped == 0 => return Ok(false),
            None => {}
        }

        doc.objects.insert(copy_id, Object::Stream(form));
        self.replaced.push(form_id);
        debug!(form = form_id.0, copy = copy_id.0, stripped, "Form XObject copied without image");
        Ok(true)
    }
}

/// Remove `Do` operations that paint any of `names`. Returns how many went.
pub(crate) fn strip_image_draws(operations: &mut Vec<Operation>, names: &[Vec<u8>]) -> usize {
    let before = operations.len();
    operations.retain(|op| {
        !(op.operator == "Do"
            && matches!(op.operands.first(), Some(Object::Name(name)) if names.contains(name)))
    });
    before - operations.len()
}

/// Delete removed images and replaced forms that nothing refers to any
/// more, along with whatever they alone kept alive: an image's soft mask
/// and stencil mask, or anything a form refers to. Returns the purged ids.
pub(crate) fn purge_unreferenced(doc: &mut Document, removed: &BTreeSet<ObjectId>) -> Vec<ObjectId> {
    let mut purged = Vec::new();
    let mut candidates: Vec<ObjectId> = removed.iter().copied().collect();

    while !candidates.is_empty() {
        let referenced = referenced_ids(doc);
        let mut next = Vec::new();
        for id in candidates {
            if referenced.contains(&id) {
                continue;
            }
            if let Some(object) = doc.objects.remove(&id) {
                next.extend(dependent_ids(doc, &object));
                purged.push(id);
            }
        }
        candidates = next;
    }
    purged
}

fn dependent_ids(doc: &Document, object: &Object) -> Vec<ObjectId> {
    let form = matches!(object, Object::Stream(stream)
        if dict_name(doc, &stream.dict, b"Subtype") == Some(b"Form".as_slice()));
    match object {
        Object::Stream(stream) if !form => mask_ids(stream),
        Object::Stream(_) | Object::Dictionary(_) => {
            let mut found = HashSet::new();
            collect_references(object, &mut found);
            found.into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn mask_ids(stream: &Stream) -> Vec<ObjectId> {
    [b"SMask".as_slice(), b"Mask".as_slice()]
        .iter()
        .filter_map(|key| match stream.dict.get(key) {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{PageSpec, add_image_form, build_document, jpeg_image_stream, raw_rgb_image_stream};
    use crate::pdf::objects::resolve;
    use lopdf::content::Content;
    use lopdf::dictionary;

    fn is_live(doc: &Document, id: ObjectId) -> bool {
        !matches!(resolve(doc, &Object::Reference(id)), Object::Null)
    }

    fn xobject(doc: &Document, page_id: ObjectId, name: &[u8]) -> Option<ObjectId> {
        page_xobjects(doc, page_id)
            .and_then(|x| x.get(name).ok())
            .and_then(|value| value.as_reference().ok())
    }

    fn form_draws(doc: &Document, form: ObjectId) -> Vec<Vec<u8>> {
        let Ok(Object::Stream(stream)) = doc.get_object(form) else {
            panic!("form {form:?} missing");
        };
        let ops = stream_bytes(stream)
            .and_then(|data| decode_operations(&data))
            .expect("form ops");
        ops.iter()
            .filter(|op| op.operator == "Do")
            .filter_map(|op| op.operands.first().and_then(|n| n.as_name().ok()))
            .map(<[u8]>::to_vec)
            .collect()
    }

    #[test]
    fn lists_only_images() {
        let mut doc = build_document(&[PageSpec::text("q /Im0 Do Q").with_image(16, 16)]);
        let page_id = *doc.get_pages().values().next().expect("page");
        let form = doc.add_object(Stream::new(
            dictionary! { "Type" => "XObject", "Subtype" => "Form" },
            Vec::new(),
        ));
        let xobjects = doc
            .get_dictionary_mut(page_id)
            .and_then(|p| p.get_mut(b"Resources"))
            .and_then(Object::as_dict_mut)
            .and_then(|r| r.get_mut(b"XObject"))
            .and_then(Object::as_dict_mut)
            .expect("xobject dict");
        xobjects.set("Fm0", Object::Reference(form));

        let ids = page_image_ids(&doc, page_id);
        assert_eq!(ids.len(), 1);
        assert_eq!(image_dimensions(&doc, ids[0]).expect("dims"), (16, 16));
    }

    #[test]
    fn lists_images_drawn_through_forms() {
        let doc = build_document(&[PageSpec::text("q /Im0 Do Q /Fm0 Do")
            .with_image(32, 32)
            .with_form_image(16, 16)]);
        let page_id = *doc.get_pages().values().next().expect("page");

        let sizes: Vec<(u32, u32)> = page_image_ids(&doc, page_id)
            .into_iter()
            .map(|id| image_dimensions(&doc, id).expect("dims"))
            .collect();
        assert_eq!(sizes, vec![(32, 32), (16, 16)]);
    }

    #[test]
    fn self_referencing_form_is_walked_once() {
        let mut doc = build_document(&[PageSpec::text("/Fm0 Do")]);
        let page_id = *doc.get_pages().values().next().expect("page");
        let image = doc.add_object(raw_rgb_image_stream(16, 16));
        let form = doc.new_object_id();
        doc.objects.insert(
            form,
            Object::Stream(Stream::new(
                dictionary! {
                    "Subtype" => "Form",
                    "Resources" => dictionary! {
                        "XObject" => dictionary! { "Im0" => image, "Fm0" => form },
                    },
                },
                b"/Im0 Do /Fm0 Do".to_vec(),
            )),
        );
        doc.get_dictionary_mut(page_id)
            .and_then(|p| p.get_mut(b"Resources"))
            .and_then(Object::as_dict_mut)
            .and_then(|r| r.get_mut(b"XObject"))
            .and_then(Object::as_dict_mut)
            .expect("xobject dict")
            .set("Fm0", Object::Reference(form));

        assert_eq!(page_image_ids(&doc, page_id), vec![image]);

        let detached = detach_image(&mut doc, page_id, image).expect("detach");
        assert!(detached.names.is_empty());
        assert_eq!(detached.replaced_forms, vec![form]);
        assert!(page_image_ids(&doc, page_id).is_empty());
        let copy = xobject(&doc, page_id, b"Fm0").expect("form copy");
        assert_eq!(form_draws(&doc, copy), vec![b"Fm0".to_vec()]);
    }

    #[test]
    fn shared_form_is_copied_before_editing() {
        let mut doc = build_document(&[PageSpec::text("/Fm0 Do"), PageSpec::text("/Fm0 Do")]);
        let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        let form = add_image_form(&mut doc, &[(16, 16), (20, 20)]);
        for page in &pages {
            doc.get_dictionary_mut(*page)
                .and_then(|p| p.get_mut(b"Resources"))
                .and_then(Object::as_dict_mut)
                .and_then(|r| r.get_mut(b"XObject"))
                .and_then(Object::as_dict_mut)
                .expect("xobject dict")
                .set("Fm0", Object::Reference(form));
        }
        let image = page_image_ids(&doc, pages[0])[0];

        let detached = detach_image(&mut doc, pages[0], image).expect("detach");
        assert_eq!(detached.replaced_forms, vec![form]);
        let copy = xobject(&doc, pages[0], b"Fm0").expect("form copy");
        assert_ne!(copy, form);
        assert_eq!(form_draws(&doc, copy), vec![b"Im1".to_vec()]);
        assert_eq!(form_draws(&doc, form), vec![b"Im0".to_vec(), b"Im1".to_vec()]);
        assert_eq!(page_image_ids(&doc, pages[1]).len(), 2);

        let removed = BTreeSet::from([image, form]);
        assert!(purge_unreferenced(&mut doc, &removed).is_empty());

        detach_image(&mut doc, pages[1], image).expect("detach second page");
        let purged = purge_unreferenced(&mut doc, &removed);
        assert!(purged.contains(&form) && purged.contains(&image));
        assert!(!is_live(&doc, image));
        assert_eq!(page_image_ids(&doc, pages[1]).len(), 1);
    }

    #[test]
    fn jpeg_header_wins_over_dictionary() {
        let mut doc = Document::with_version("1.5");
        let mut stream = jpeg_image_stream(16, 16);
        stream.dict.set("Width", 300);
        stream.dict.set("Height", 300);
        let id = doc.add_object(stream);
        assert_eq!(image_dimensions(&doc, id).expect("dims"), (16, 16));
    }

    #[test]
    fn shared_resources_are_not_edited() {
        let mut doc = build_document(&[
            PageSpec::text("q /Im0 Do Q").with_image(16, 16),
            PageSpec::text("q /Im0 Do Q"),
        ]);
        let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        // Point page 2 at page 1's image through a shared resources object.
        let shared = doc
            .get_dictionary(pages[0])
            .and_then(|p| p.get(b"Resources"))
            .cloned()
            .expect("resources");
        let shared_id = doc.add_object(shared);
        for page in &pages {
            doc.get_dictionary_mut(*page)
                .expect("page")
                .set("Resources", Object::Reference(shared_id));
        }
        let image = page_image_ids(&doc, pages[0])[0];

        let detached = detach_image(&mut doc, pages[0], image).expect("detach");
        assert_eq!(detached.names, vec![b"Im0".to_vec()]);
        assert!(detached.replaced_forms.is_empty());
        assert!(page_image_ids(&doc, pages[0]).is_empty());
        assert_eq!(page_image_ids(&doc, pages[1]), vec![image]);

        let removed = BTreeSet::from([image]);
        assert!(purge_unreferenced(&mut doc, &removed).is_empty());
        assert!(is_live(&doc, image));
    }

    #[test]
    fn purge_takes_orphaned_soft_mask() {
        let mut doc = Document::with_version("1.5");
        let mask = doc.add_object(Stream::new(
            dictionary! { "Subtype" => "Image", "Width" => 16, "Height" => 16 },
            vec![0; 256],
        ));
        let image = doc.add_object(Stream::new(
            dictionary! { "Subtype" => "Image", "Width" => 16, "Height" => 16, "SMask" => mask },
            vec![0; 768],
        ));
        let purged = purge_unreferenced(&mut doc, &BTreeSet::from([image]));
        assert_eq!(purged, vec![image, mask]);
        assert!(!is_live(&doc, mask));
    }

    #[test]
    fn strips_only_named_draws() {
        let mut ops = Content::decode(b"q /Im0 Do Q q /Im1 Do Q")
            .expect("decode")
            .operations;
        assert_eq!(strip_image_draws(&mut ops, &[b"Im0".to_vec()]), 1);
        let names: Vec<_> = ops
            .iter()
            .filter(|op| op.operator == "Do")
            .filter_map(|op| op.operands.first().and_then(|n| n.as_name().ok()))
            .collect();
        assert_eq!(names, vec![b"Im1".as_slice()]);
    }
}
