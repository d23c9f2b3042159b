// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page transformer: rule a double line above every marker, then drop
// tick/cross images.

use serde::Serialize;
use tickstrip_core::config::TransformSettings;
use tickstrip_core::error::Result;
use tickstrip_core::types::Point;
use tracing::{debug, instrument};

use crate::pdf::page::PageSurface;

/// What one page transform did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransformReport {
    pub matches: usize,
    pub lines_drawn: usize,
    pub images_removed: usize,
}

impl TransformReport {
    /// Whether the page was modified at all.
    pub fn changed(&self) -> bool {
        self.lines_drawn > 0 || self.images_removed > 0
    }
}

/// Applies the three per-page stages: search, rule, strip.
#[derive(Debug, Clone, Default)]
pub struct PageTransformer {
    settings: TransformSettings,
}

impl PageTransformer {
    pub fn new(settings: TransformSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TransformSettings {
        &self.settings
    }

    /// Transform one page in place. Any surface error is returned as is.
    #[instrument(skip_all)]
    pub fn transform(&self, page: &mut impl PageSurface) -> Result<TransformReport> {
        let s = &self.settings;
        let mut report = TransformReport::default();

        // Stage 1: every occurrence, no deduplication.
        let markers = page.search_for(&s.marker_text)?;
        report.matches = markers.len();

        // Stage 2: two full-width rules above each marker.
        let width = page.width();
        for marker in &markers {
            let lower = marker.y0 - s.rule_offset;
            let upper = lower - s.rule_gap;
            for y in [lower, upper] {
                page.draw_line(Point::new(0.0, y), Point::new(width, y), s.rule_color, s.rule_width)?;
                report.lines_drawn += 1;
            }
        }

        // Stage 3: exact-size images only.
        for image in page.images()? {
            if image.has_size(s.mark_width, s.mark_height) {
                page.delete_image(image.id)?;
                report.images_removed += 1;
            }
        }

        debug!(
            matches = report.matches,
            lines = report.lines_drawn,
            images_removed = report.images_removed,
            "Page transformed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickstrip_core::error::TickstripError;
    use tickstrip_core::types::{EmbeddedImage, ImageRef, Rect, Rgb};

    #[derive(Debug, Clone, PartialEq)]
    struct Stroke {
        from: Point,
        to: Point,
        color: Rgb,
        width: f32,
    }

    /// In-memory page recording what the transformer asks of it.
    #[derive(Default)]
    struct FakePage {
        width: f32,
        markers: Vec<Rect>,
        images: Vec<EmbeddedImage>,
        strokes: Vec<Stroke>,
        deleted: Vec<ImageRef>,
        searched: Vec<String>,
        fail_images: bool,
    }

    impl FakePage {
        fn new() -> Self {
            Self {
                width: 612.0,
                ..Self::default()
            }
        }

        fn image(mut self, object: u32, width: u32, height: u32) -> Self {
            self.images.push(EmbeddedImage {
                id: ImageRef::new(object, 0),
                width,
                height,
            });
            self
        }
    }

    impl PageSurface for FakePage {
        fn width(&self) -> f32 {
            self.width
        }

        fn height(&self) -> f32 {
            792.0
        }

        fn search_for(&mut self, needle: &str) -> Result<Vec<Rect>> {
            self.searched.push(needle.to_string());
            Ok(self.markers.clone())
        }

        fn draw_line(&mut self, from: Point, to: Point, color: Rgb, width: f32) -> Result<()> {
            self.strokes.push(Stroke { from, to, color, width });
            Ok(())
        }

        fn images(&mut self) -> Result<Vec<EmbeddedImage>> {
            if self.fail_images {
                return Err(TickstripError::Pdf("xobject table unreadable".into()));
            }
            Ok(self.images.clone())
        }

        fn delete_image(&mut self, image: ImageRef) -> Result<()> {
            self.deleted.push(image);
            self.images.retain(|i| i.id != image);
            Ok(())
        }
    }

    #[test]
    fn empty_page_is_left_alone() {
        let mut page = FakePage::new();
        let report = PageTransformer::default().transform(&mut page).expect("transform");
        assert_eq!(report, TransformReport::default());
        assert!(!report.changed());
        assert_eq!(page.searched, vec!["Question number".to_string()]);
    }

    #[test]
    fn marker_gets_two_full_width_rules() {
        let mut page = FakePage::new();
        page.markers.push(Rect::new(72.0, 200.0, 162.0, 212.0));
        let report = PageTransformer::default().transform(&mut page).expect("transform");

        assert_eq!(report.lines_drawn, 2);
        assert_eq!(
            page.strokes,
            vec![
                Stroke {
                    from: Point::new(0.0, 190.0),
                    to: Point::new(612.0, 190.0),
                    color: Rgb::BLACK,
                    width: 1.5,
                },
                Stroke {
                    from: Point::new(0.0, 188.0),
                    to: Point::new(612.0, 188.0),
                    color: Rgb::BLACK,
                    width: 1.5,
                },
            ]
        );
    }

    #[test]
    fn every_match_is_ruled_even_duplicates() {
        let mut page = FakePage::new();
        let marker = Rect::new(72.0, 300.0, 162.0, 312.0);
        page.markers = vec![marker, marker, Rect::new(72.0, 500.0, 162.0, 512.0)];
        let report = PageTransformer::default().transform(&mut page).expect("transform");
        assert_eq!(report.matches, 3);
        assert_eq!(page.strokes.len(), 6);
    }

    #[test]
    fn only_exact_sixteen_square_images_go() {
        let mut page = FakePage::new()
            .image(10, 16, 16)
            .image(11, 15, 16)
            .image(12, 16, 15)
            .image(13, 17, 17)
            .image(14, 16, 16);
        let report = PageTransformer::default().transform(&mut page).expect("transform");

        assert_eq!(report.images_removed, 2);
        assert_eq!(page.deleted, vec![ImageRef::new(10, 0), ImageRef::new(14, 0)]);
        let left: Vec<u32> = page.images.iter().map(|i| i.id.object).collect();
        assert_eq!(left, vec![11, 12, 13]);
    }

    #[test]
    fn custom_settings_are_honoured() {
        let settings = TransformSettings {
            marker_text: "Q.".into(),
            rule_offset: 4.0,
            rule_gap: 3.0,
            mark_width: 20,
            mark_height: 20,
            ..TransformSettings::default()
        };
        let mut page = FakePage::new().image(3, 20, 20);
        page.markers.push(Rect::new(0.0, 50.0, 10.0, 60.0));
        let report = PageTransformer::new(settings).transform(&mut page).expect("transform");

        assert_eq!(page.searched, vec!["Q.".to_string()]);
        let ys: Vec<f32> = page.strokes.iter().map(|s| s.from.y).collect();
        assert_eq!(ys, vec![46.0, 43.0]);
        assert_eq!(report.images_removed, 1);
    }

    #[test]
    fn surface_errors_propagate() {
        let mut page = FakePage::new();
        page.fail_images = true;
        let err = PageTransformer::default().transform(&mut page).err().expect("fails");
        assert!(matches!(err, TickstripError::Pdf(_)));
    }
}
