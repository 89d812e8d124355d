use std::collections::BTreeMap;

use image::RgbImage;
use tinyland_core::{estimate_homography, warp_perspective, Quad};
use tinyland_tracker::Snapshot;

use crate::{CompositorError, MarkerTemplate};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Template registry plus the render/composite passes.
#[derive(Clone, Debug)]
pub struct Compositor {
    templates: BTreeMap<u32, MarkerTemplate>,
    fallback: MarkerTemplate,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(MarkerTemplate::unknown())
    }
}

impl Compositor {
    /// Empty registry; every id renders `fallback`.
    pub fn new(fallback: MarkerTemplate) -> Self {
        Self {
            templates: BTreeMap::new(),
            fallback,
        }
    }

    /// Registry with the built-in rectangle template on id 4.
    pub fn with_builtins() -> Self {
        let mut c = Self::default();
        c.insert(4, MarkerTemplate::rectangle());
        c
    }

    pub fn insert(&mut self, id: u32, template: MarkerTemplate) -> Option<MarkerTemplate> {
        self.templates.insert(id, template)
    }

    pub fn template(&self, id: u32) -> &MarkerTemplate {
        self.templates.get(&id).unwrap_or(&self.fallback)
    }

    /// Warp the template of `id` so its marker square lands on `observed`.
    ///
    /// The result is `out_w × out_h`; everything outside the warped canvas
    /// is black.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, observed))
    )]
    pub fn render(
        &self,
        id: u32,
        observed: &Quad,
        out_w: u32,
        out_h: u32,
    ) -> Result<RgbImage, CompositorError> {
        let template = self.template(id);
        let h = estimate_homography(template.marker().points(), observed.points())?;
        Ok(warp_perspective(template.canvas(), &h, out_w, out_h)?)
    }

    /// Render every marker of `snapshot` over `base`, ascending id then
    /// detection order. Markers that cannot be rendered are skipped.
    pub fn paint_snapshot(&self, snapshot: &Snapshot, base: &RgbImage) -> RgbImage {
        let (w, h) = base.dimensions();
        let mut out = base.clone();
        for marker in snapshot.markers() {
            match self.render(marker.id, marker.output_corners(), w, h) {
                Ok(layer) => composite_in_place(&mut out, &layer),
                Err(err) => log::warn!("marker {}: template not drawn: {err}", marker.id),
            }
        }
        out
    }
}

/// Stack `layers` over `base`.
///
/// A layer pixel replaces whatever is below it when any of its channels is
/// nonzero; black is transparent. Later layers win.
pub fn composite<'a, I>(base: &RgbImage, layers: I) -> RgbImage
where
    I: IntoIterator<Item = &'a RgbImage>,
{
    let mut out = base.clone();
    for layer in layers {
        composite_in_place(&mut out, layer);
    }
    out
}

/// [`composite`] for a single layer, writing into `dst`. Only the region
/// both images cover is touched.
pub fn composite_in_place(dst: &mut RgbImage, layer: &RgbImage) {
    let w = dst.width().min(layer.width());
    let h = dst.height().min(layer.height());
    for y in 0..h {
        for x in 0..w {
            let px = layer.get_pixel(x, y);
            if px.0.iter().any(|&c| c != 0) {
                dst.put_pixel(x, y, *px);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Paint, TemplateSpec};
    use image::Rgb;
    use tinyland_core::color::{BLACK, BLUE, GREEN, RED, WHITE};
    use tinyland_core::Point2;
    use tinyland_tracker::{DetectedMarker, DetectionSpace, MarkerTracker, RecordedDetector};

    fn white_square(size: u32) -> MarkerTemplate {
        MarkerTemplate::from_spec(&TemplateSpec {
            width: size,
            height: size,
            marker_size: size,
            position: [0.0, 0.0],
            paint: vec![Paint::Fill { color: WHITE.0 }],
        })
        .unwrap()
    }

    #[test]
    fn template_on_its_own_corners_is_reproduced_exactly() {
        let mut c = Compositor::default();
        c.insert(4, white_square(150));
        let canonical = *c.template(4).marker();

        let out = c.render(4, &canonical, 150, 150).unwrap();
        assert_eq!(&out, c.template(4).canvas());
    }

    #[test]
    fn unknown_ids_use_the_fallback() {
        let c = Compositor::with_builtins();
        assert_eq!(c.template(4).canvas().dimensions(), (100, 50));
        assert_eq!(c.template(77), &MarkerTemplate::unknown());
    }

    #[test]
    fn render_translates_onto_observed_quad() {
        let c = Compositor::default();
        let observed = Quad::rect(20.0, 30.0, 100.0, 100.0);
        let out = c.render(12, &observed, 200, 200).unwrap();
        assert_eq!(*out.get_pixel(70, 80), RED);
        assert_eq!(*out.get_pixel(10, 10), BLACK);
        assert_eq!(*out.get_pixel(150, 150), BLACK);
    }

    #[test]
    fn degenerate_observed_quad_is_an_error() {
        let c = Compositor::default();
        let line = Quad::from_array([[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0]]);
        assert!(matches!(
            c.render(1, &line, 10, 10),
            Err(CompositorError::Geometry(_))
        ));
    }

    #[test]
    fn nonzero_pixels_overwrite_and_last_layer_wins() {
        let base = RgbImage::from_pixel(4, 1, Rgb([9, 9, 9]));
        let mut a = RgbImage::new(4, 1);
        a.put_pixel(0, 0, RED);
        a.put_pixel(1, 0, RED);
        let mut b = RgbImage::new(4, 1);
        b.put_pixel(1, 0, BLUE);
        b.put_pixel(2, 0, Rgb([0, 1, 0]));

        let out = composite(&base, [&a, &b]);
        assert_eq!(*out.get_pixel(0, 0), RED);
        assert_eq!(*out.get_pixel(1, 0), BLUE);
        assert_eq!(*out.get_pixel(2, 0), Rgb([0, 1, 0]));
        assert_eq!(*out.get_pixel(3, 0), Rgb([9, 9, 9]));
    }

    #[test]
    fn snapshot_markers_are_painted_in_projector_space() {
        let mut c = Compositor::default();
        let green = RgbImage::from_pixel(10, 10, GREEN);
        c.insert(2, MarkerTemplate::new(green, Quad::rect(0.0, 0.0, 10.0, 10.0)).unwrap());
        let dets = vec![
            DetectedMarker { id: 2, corners: Quad::rect(10.0, 10.0, 20.0, 20.0) },
            DetectedMarker { id: 5, corners: Quad::rect(60.0, 10.0, 20.0, 20.0) },
        ];
        let mut tracker = MarkerTracker::new(RecordedDetector::new(vec![dets]));
        let base = RgbImage::new(100, 50);
        let snap = tracker.detect(&base, &tinyland_core::Homography::identity(), DetectionSpace::Output);

        let out = c.paint_snapshot(&snap, &base);
        assert_eq!(*out.get_pixel(20, 20), GREEN);
        assert_eq!(*out.get_pixel(70, 20), RED);
        assert_eq!(*out.get_pixel(45, 20), BLACK);
        assert_eq!(snap.get(2)[0].center, Point2::new(20.0, 20.0));
    }
}
