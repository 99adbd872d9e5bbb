//! Facial landmark extraction interface.
//!
//! Also known as *face alignment* or *registration*. Like detection, landmark extraction is an
//! external capability consumed through a trait. The usual provider is MediaPipe's [Face Mesh]
//! model; its 468-point contract is captured by [`LANDMARK_COUNT`].
//!
//! [Face Mesh]: https://google.github.io/mediapipe/solutions/face_mesh.html

use std::ops::Index;

use crate::image::ImageView;

/// Number of landmarks produced by the MediaPipe Face Mesh model.
///
/// Extractors with a different (but fixed) cardinality also work, as long as the same extractor is
/// used for the reference image and for live frames.
pub const LANDMARK_COUNT: usize = 468;

/// A 2D point in integer pixel coordinates.
pub type Point = [i32; 2];

/// Computes facial landmarks on a cropped face image.
///
/// The index semantics of the returned points must be stable: index *i* refers to the same
/// semantic facial point on every call. The morph pipeline builds triangle correspondences purely
/// from indices, so mixing extractors (or models) between the reference image and live frames
/// silently corrupts the morph.
pub trait LandmarkExtractor {
    /// Computes landmarks in `image`, in `image`'s coordinate system.
    ///
    /// Returns `None` when no face is found. This can happen even for an image that passed face
    /// detection, since detection and landmark extraction may use different models and thresholds.
    fn extract(&mut self, image: &ImageView<'_>) -> Option<Landmarks>;
}

/// An ordered facial landmark point set.
#[derive(Debug, Clone)]
pub struct Landmarks {
    points: Vec<Point>,
}

impl Landmarks {
    /// Creates a landmark set from an ordered list of points.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Returns an iterator over the landmark positions, in index order.
    pub fn positions(&self) -> impl Iterator<Item = Point> + '_ {
        self.points.iter().copied()
    }
}

impl Index<usize> for Landmarks {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl Index<Idx> for Landmarks {
    type Output = Point;

    fn index(&self, index: Idx) -> &Self::Output {
        &self.points[index as usize]
    }
}

/// Assigns a name to certain important Face Mesh landmark indices.
///
/// "Left" and "Right" are relative to the input image, not from the PoV of the depicted person.
/// Only meaningful for extractors following the [`LANDMARK_COUNT`] contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idx {
    NoseTip = 1,
    MouthLeft = 78,
    MouthRight = 308,
    MouthTop = 13,
    MouthBottom = 14,
    LeftEyeLeftCorner = 33,
    LeftEyeRightCorner = 133,
    RightEyeLeftCorner = 362,
    RightEyeRightCorner = 263,
}

impl From<Idx> for usize {
    #[inline]
    fn from(idx: Idx) -> usize {
        idx as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexing() {
        let marks = Landmarks::from_points((0..10).map(|i| [i, i * 2]).collect());
        assert_eq!(marks.len(), 10);
        assert_eq!(marks[3], [3, 6]);
        assert_eq!(marks[Idx::NoseTip], [1, 2]);
        assert_eq!(marks.positions().last(), Some([9, 18]));
    }
}
