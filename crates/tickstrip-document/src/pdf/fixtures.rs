// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory PDFs for tests.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};

/// Description of one test page: raw content plus the images it names
/// `/Im0`, `/Im1`, ... in its resources. Form images live in a Form XObject
/// the page names `/Fm0`, which draws each of them.
#[derive(Debug, Clone, Default)]
pub(crate) struct PageSpec {
    content: Option<String>,
    images: Vec<(u32, u32)>,
    form_images: Vec<(u32, u32)>,
}

impl PageSpec {
    /// A page with no content stream at all.
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn text(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            ..Self::default()
        }
    }

    /// Add a raw 8-bit RGB image of the given pixel size.
    pub fn with_image(mut self, width: u32, height: u32) -> Self {
        self.images.push((width, height));
        self
    }

    /// Add a raw RGB image drawn only from inside the page's `/Fm0` form.
    pub fn with_form_image(mut self, width: u32, height: u32) -> Self {
        self.form_images.push((width, height));
        self
    }
}

/// A real baseline JPEG wrapped as a `DCTDecode` image stream.
pub(crate) fn jpeg_image_stream(width: u32, height: u32) -> Stream {
    let pixels = RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut data = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(pixels)
        .write_to(&mut data, ImageFormat::Jpeg)
        .expect("encode jpeg");
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        data.into_inner(),
    )
}

pub(crate) fn raw_rgb_image_stream(width: u32, height: u32) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        vec![0x80; (width * height * 3) as usize],
    )
}

/// Build a US Letter document with one page per spec and a Helvetica `/F1`.
pub(crate) fn build_document(pages: &[PageSpec]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for spec in pages {
        let mut xobjects = Dictionary::new();
        for (index, (width, height)) in spec.images.iter().enumerate() {
            let image_id = doc.add_object(raw_rgb_image_stream(*width, *height));
            xobjects.set(format!("Im{index}"), Object::Reference(image_id));
        }
        if !spec.form_images.is_empty() {
            xobjects.set("Fm0", Object::Reference(add_image_form(&mut doc, &spec.form_images)));
        }

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => xobjects,
            },
        };
        if let Some(content) = &spec.content {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.as_bytes().to_vec()));
            page.set("Contents", content_id);
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// A full-page Form XObject naming each image `/Im0`, `/Im1`, ... in its own
/// resources and drawing it at its pixel size.
pub(crate) fn add_image_form(doc: &mut Document, images: &[(u32, u32)]) -> lopdf::ObjectId {
    let mut xobjects = Dictionary::new();
    let mut content = String::new();
    for (index, (width, height)) in images.iter().enumerate() {
        let image_id = doc.add_object(raw_rgb_image_stream(*width, *height));
        xobjects.set(format!("Im{index}"), Object::Reference(image_id));
        content.push_str(&format!("q {width} 0 0 {height} 300 300 cm /Im{index} Do Q\n"));
    }
    doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! { "XObject" => xobjects },
        },
        content.into_bytes(),
    ))
}

/// Build a document and write it to `dir/name`.
pub(crate) fn write_document(dir: &Path, name: &str, pages: &[PageSpec]) -> PathBuf {
    let path = dir.join(name);
    build_document(pages).save(&path).expect("write fixture");
    path
}
