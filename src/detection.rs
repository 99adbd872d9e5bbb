//! Face detection interface.
//!
//! Detection itself is an external capability: any implementation of [`FaceDetector`] (a neural
//! network, a cascade classifier, a remote service) can drive the morph pipeline, as long as it
//! returns zero or more scored bounding boxes per frame.

use crate::image::{ImageView, Rect};

/// Locates faces in a frame.
///
/// Implementations take `&mut self` so they can reuse internal buffers or tracking state across
/// frames.
pub trait FaceDetector {
    /// Runs face detection on `image`, returning all detections in `image`'s coordinate system.
    fn detect(&mut self, image: &ImageView<'_>) -> Vec<Detection>;
}

/// A detected face: a bounding box and a confidence score.
///
/// Per convention, the confidence value lies between 0.0 and 1.0. The morph pipeline only uses it
/// to pick the best detection per frame, so any monotonic score works.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    rect: BoundingRect,
}

impl Detection {
    pub fn new(confidence: f32, rect: BoundingRect) -> Self {
        Self { confidence, rect }
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    #[inline]
    pub fn bounding_rect(&self) -> BoundingRect {
        self.rect
    }
}

/// Axis-aligned bounding rectangle of a detected face.
///
/// This primarily differs from [`Rect`] in that it uses float coordinates, since detectors
/// typically regress sub-pixel box positions.
#[derive(Debug, Clone, Copy)]
pub struct BoundingRect {
    xc: f32,
    yc: f32,
    w: f32,
    h: f32,
}

impl BoundingRect {
    /// Creates a bounding rectangle centered at `(xc,yc)`.
    pub fn from_center(xc: f32, yc: f32, w: f32, h: f32) -> Self {
        Self { xc, yc, w, h }
    }

    /// Creates a bounding rectangle from its top left corner and size.
    pub fn from_top_left(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            xc: x + w / 2.0,
            yc: y + h / 2.0,
            w,
            h,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.w
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.h
    }

    pub fn center(&self) -> (f32, f32) {
        (self.xc, self.yc)
    }

    /// Rounds `self` to an integer [`Rect`] in the same coordinate system.
    pub fn to_rect(&self) -> Rect {
        let x = (self.xc - self.w / 2.0).round() as i32;
        let y = (self.yc - self.h / 2.0).round() as i32;
        Rect::from_top_left(x, y, self.w.round() as u32, self.h.round() as u32)
    }

    /// Returns the amount of area covered by `self`.
    pub fn area(&self) -> f32 {
        self.w * self.h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_rect() {
        let rect = BoundingRect::from_top_left(100.0, 100.0, 200.0, 200.0).to_rect();
        assert_eq!(rect, Rect::from_top_left(100, 100, 200, 200));

        let rect = BoundingRect::from_center(10.0, 10.0, 4.0, 2.0).to_rect();
        assert_eq!(rect, Rect::from_top_left(8, 9, 4, 2));
    }

    #[test]
    fn test_area() {
        assert_eq!(BoundingRect::from_center(0.0, 0.0, 3.0, 2.0).area(), 6.0);
        assert_eq!(BoundingRect::from_center(1.0, 0.0, 0.0, 0.0).area(), 0.0);
    }
}
