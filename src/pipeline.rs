//! The per-frame crop → morph → recompose pipeline.
//!
//! [`FaceMorpher`] ties everything together: an external [`FaceDetector`] finds the face, a square
//! region around it is cropped out of the frame and normalized to a fixed-size working canvas, an
//! external [`LandmarkExtractor`] locates the face geometry on the canvas, the [`Warper`] reshapes
//! the reference identity onto that geometry, and the blended result is resized and pasted back
//! into the frame at the original crop coordinates.
//!
//! The pipeline is strictly best-effort: a frame on which any stage fails (no detection, empty
//! crop, no landmarks) is emitted unmodified. A live feed must never stall or blank out because of
//! one bad frame.

use std::{
    cmp,
    path::Path,
    sync::{Arc, RwLock},
};

use crate::{
    detection::{Detection, FaceDetector},
    image::{AsImageView, BlendMode, Image, Rect},
    landmark::LandmarkExtractor,
    morph::{ReferenceIdentity, Warper},
    num::TotalF32,
    resolution::Resolution,
    timer::Timer,
};

/// Shared handle to the current [`ReferenceIdentity`].
///
/// The slot can be cloned and handed to another thread (typically whatever serves the "set new
/// reference" user action) while the frame loop keeps processing. Replacement swaps the whole
/// identity at once: a frame that [`get`][Self::get]s the reference observes either the fully-old
/// or the fully-new image/point-set pair, never a mix.
#[derive(Clone)]
pub struct ReferenceSlot {
    inner: Arc<RwLock<Option<Arc<ReferenceIdentity>>>>,
}

impl ReferenceSlot {
    /// Creates an empty slot; the pipeline passes frames through until a reference is installed.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    /// Atomically installs `reference` as the new reference identity.
    pub fn set(&self, reference: ReferenceIdentity) {
        *self.inner.write().unwrap() = Some(Arc::new(reference));
    }

    /// Removes the current reference identity.
    pub fn clear(&self) {
        *self.inner.write().unwrap() = None;
    }

    /// Returns the currently installed reference identity, if any.
    ///
    /// The returned `Arc` stays valid even if another thread replaces the reference while the
    /// frame is still being processed.
    pub fn get(&self) -> Option<Arc<ReferenceIdentity>> {
        self.inner.read().unwrap().clone()
    }
}

impl Default for ReferenceSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Live face-identity transfer on a frame stream.
///
/// Frames are processed one at a time, in order; no state is carried between frames other than
/// the reference identity and the cached reference triangulation.
pub struct FaceMorpher<D, L> {
    detector: D,
    landmarker: L,
    slot: ReferenceSlot,
    warper: Warper,
    canvas_res: Resolution,
    crop_margin: f32,
    blend_factor: f32,
    t_detect: Timer,
    t_extract: Timer,
    t_recompose: Timer,
}

impl<D: FaceDetector, L: LandmarkExtractor> FaceMorpher<D, L> {
    /// Side length of the square working canvas, in pixels.
    pub const DEFAULT_CANVAS_SIZE: u32 = 400;

    /// Fraction of the detected box size added on each side of the crop, so that forehead, chin
    /// and ears make it into the canvas. The triangulation needs that context to deform the face
    /// surroundings naturally.
    pub const DEFAULT_CROP_MARGIN: f32 = 0.25;

    /// Weight of the morphed result when blending it over the original crop. Partial blending
    /// preserves some of the original lighting, which reduces visible seams at the crop boundary.
    pub const DEFAULT_BLEND_FACTOR: f32 = 0.7;

    pub fn new(detector: D, landmarker: L) -> Self {
        Self {
            detector,
            landmarker,
            slot: ReferenceSlot::new(),
            warper: Warper::new(),
            canvas_res: Resolution::square(Self::DEFAULT_CANVAS_SIZE),
            crop_margin: Self::DEFAULT_CROP_MARGIN,
            blend_factor: Self::DEFAULT_BLEND_FACTOR,
            t_detect: Timer::new("detect"),
            t_extract: Timer::new("extract"),
            t_recompose: Timer::new("recompose"),
        }
    }

    /// Returns a cloneable handle to the reference slot.
    ///
    /// Hand this to the part of the application that reacts to "set new reference" requests; it
    /// may install references concurrently with [`process_frame`][Self::process_frame].
    pub fn reference_slot(&self) -> ReferenceSlot {
        self.slot.clone()
    }

    /// Sets the crop margin. See [`Self::DEFAULT_CROP_MARGIN`].
    pub fn set_crop_margin(&mut self, margin: f32) {
        self.crop_margin = margin;
    }

    /// Sets the blend factor. `1.0` fully replaces the crop with the morphed result, `0.0`
    /// disables morphing output entirely. See [`Self::DEFAULT_BLEND_FACTOR`].
    pub fn set_blend_factor(&mut self, factor: f32) {
        self.blend_factor = factor;
    }

    /// Sets the working canvas side length.
    ///
    /// Must be called before a reference is installed; the reference identity is normalized to
    /// the canvas size at load time.
    pub fn set_canvas_size(&mut self, side: u32) {
        self.canvas_res = Resolution::square(side);
    }

    /// Loads a new reference identity from `image`.
    ///
    /// The image is stretched to the working canvas size and landmarks are extracted from it. On
    /// success the new identity atomically replaces the previous one and `true` is returned. If
    /// no face is found, the previous reference (if any) is kept and `false` is returned.
    pub fn set_reference(&mut self, image: &Image) -> bool {
        let canvas = image.resize(self.canvas_res);
        let Some(landmarks) = self.landmarker.extract(&canvas.as_view()) else {
            log::warn!("no face found in reference image");
            return false;
        };

        let reference = ReferenceIdentity::new(canvas, &landmarks);
        log::debug!(
            "installed reference identity v{} ({} landmarks)",
            reference.version(),
            landmarks.len(),
        );
        self.slot.set(reference);
        true
    }

    /// Loads a new reference identity from an image file.
    ///
    /// Like [`set_reference`][Self::set_reference], but also returns `false` (keeping the
    /// previous reference) when the file cannot be read or decoded.
    pub fn load_reference<P: AsRef<Path>>(&mut self, path: P) -> bool {
        let image = match Image::load(&path) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("failed to load reference image: {e}");
                return false;
            }
        };
        self.set_reference(&image)
    }

    /// Runs the morph pipeline on `frame`, modifying it in place.
    ///
    /// The face with the highest detection confidence is morphed; frames where no stage produces
    /// a usable result are left untouched.
    pub fn process_frame(&mut self, frame: &mut Image) {
        let Some(reference) = self.slot.get() else {
            return;
        };

        let detections = self.t_detect.time(|| self.detector.detect(&frame.as_view()));
        let Some(best) = detections
            .into_iter()
            .max_by_key(|det| TotalF32(det.confidence()))
        else {
            return;
        };

        let Some(crop_rect) = self.crop_rect(&best, frame.resolution()) else {
            log::trace!("crop region empty after clamping to the frame, skipping");
            return;
        };

        let mut crop = frame.view(crop_rect).to_image();
        let canvas = crop.resize(self.canvas_res);

        let Some(observed) = self
            .t_extract
            .time(|| self.landmarker.extract(&canvas.as_view()))
        else {
            log::trace!("no landmarks on the cropped face, skipping");
            return;
        };

        let morphed = self.warper.warp(&reference, &observed, &canvas);

        let _guard = self.t_recompose.start();
        let morphed = morphed.resize(crop.resolution());
        crop.blend_from(&morphed)
            .mode(BlendMode::Weighted(self.blend_factor));
        frame
            .view_mut(crop_rect)
            .blend_from(&crop)
            .mode(BlendMode::Overwrite);
    }

    /// Computes the square crop region around `detection`, clamped to the frame.
    ///
    /// Returns `None` when the clamped region is empty or inverted (a detection at the very edge
    /// of the frame can produce one).
    fn crop_rect(&self, detection: &Detection, frame_res: Resolution) -> Option<Rect> {
        let rect = detection.bounding_rect().to_rect();
        let side =
            (cmp::max(rect.width(), rect.height()) as f32 * (1.0 + 2.0 * self.crop_margin)) as i32;
        let (cx, cy) = rect.center();
        let (w, h) = (frame_res.width() as i32, frame_res.height() as i32);

        let x0 = cmp::max(0, cx - side / 2);
        let y0 = cmp::max(0, cy - side / 2);
        let x1 = cmp::min(w - 1, cx + side / 2);
        let y1 = cmp::min(h - 1, cy + side / 2);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::from_top_left(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
    }

    /// Returns profiling timers for all pipeline stages.
    pub fn timers(&self) -> impl IntoIterator<Item = &Timer> + '_ {
        [&self.t_detect, &self.t_extract, &self.t_recompose]
            .into_iter()
            .chain(self.warper.timers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingRect;
    use crate::image::ImageView;
    use crate::landmark::Landmarks;

    struct NoDetector;

    impl FaceDetector for NoDetector {
        fn detect(&mut self, _image: &ImageView<'_>) -> Vec<Detection> {
            Vec::new()
        }
    }

    struct NoLandmarker;

    impl LandmarkExtractor for NoLandmarker {
        fn extract(&mut self, _image: &ImageView<'_>) -> Option<Landmarks> {
            None
        }
    }

    fn morpher() -> FaceMorpher<NoDetector, NoLandmarker> {
        FaceMorpher::new(NoDetector, NoLandmarker)
    }

    fn detection(x: f32, y: f32, w: f32, h: f32) -> Detection {
        Detection::new(0.9, BoundingRect::from_top_left(x, y, w, h))
    }

    #[test]
    fn crop_rect_margin() {
        let m = morpher();
        // 200x200 box centered at (200,200): side = 200 * 1.5 = 300
        let rect = m
            .crop_rect(&detection(100.0, 100.0, 200.0, 200.0), Resolution::new(640, 480))
            .unwrap();
        assert_eq!(rect, Rect::from_top_left(50, 50, 300, 300));
    }

    #[test]
    fn crop_rect_clamps_to_frame() {
        let m = morpher();
        let rect = m
            .crop_rect(&detection(0.0, 0.0, 100.0, 100.0), Resolution::new(640, 480))
            .unwrap();
        // the square would start at (-25,-25); clamping cuts it off at the frame origin
        assert_eq!(rect.x(), 0);
        assert_eq!(rect.y(), 0);
        assert_eq!(rect.width(), 125);
        assert_eq!(rect.height(), 125);
    }

    #[test]
    fn crop_rect_empty_when_outside() {
        let m = morpher();
        // degenerate detection produces a zero-sided crop
        assert!(m
            .crop_rect(&detection(10.0, 10.0, 0.0, 0.0), Resolution::new(640, 480))
            .is_none());
        // detection entirely above-left of the frame
        assert!(m
            .crop_rect(&detection(-500.0, -500.0, 100.0, 100.0), Resolution::new(640, 480))
            .is_none());
    }

    #[test]
    fn reference_slot_swaps_whole_identity() {
        use crate::test::gradient_image;

        let slot = ReferenceSlot::new();
        assert!(slot.get().is_none());

        let marks = Landmarks::from_points(vec![[10, 10], [20, 10], [15, 20], [10, 20]]);
        slot.set(ReferenceIdentity::new(gradient_image(32, 32), &marks));
        let first = slot.get().unwrap();

        slot.set(ReferenceIdentity::new(gradient_image(32, 32), &marks));
        let second = slot.get().unwrap();
        assert!(second.version() > first.version());

        // the Arc grabbed before the swap still points at the old, complete identity
        assert_eq!(first.points().len(), marks.len() + 8);

        slot.clear();
        assert!(slot.get().is_none());
    }
}
