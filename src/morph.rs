//! The face morphing core.
//!
//! This module reshapes a *reference* face onto *observed* face geometry: the reference point set
//! is triangulated once, and every triangle of the reference image is affinely warped onto the
//! corresponding triangle of the observed point set.
//!
//! The triangulation topology always comes from the **reference** point set and its index triples
//! are reused on the observed set. Re-triangulating from the moving observed points every frame
//! would make the topology flicker between frames; anchoring it to the static reference keeps
//! triangle correspondences stable. This requires both point sets to have the same cardinality
//! and the same index semantics (see [`crate::landmark::LandmarkExtractor`]).

mod delaunay;
mod warp;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::image::Image;
use crate::landmark::{Landmarks, Point};
use crate::resolution::Resolution;
use crate::timer::Timer;

pub use delaunay::triangulate;
pub use warp::{warp_triangle, AffineMap, FloatImage};

/// Appends the 8 synthetic canvas boundary points to a landmark point set.
///
/// The boundary points (corners and edge midpoints of the canvas) extend the triangulation from
/// the face's convex hull to the full canvas, so background pixels around the face deform
/// smoothly instead of tearing at the hull edge.
///
/// The points are always appended in the same fixed order. Applying this to both the reference
/// and the observed landmark set keeps the two sets index-aligned.
pub fn with_canvas_boundary(points: &[Point], res: Resolution) -> Vec<Point> {
    let (w, h) = (res.width() as i32, res.height() as i32);
    let mut all = points.to_vec();
    all.extend([
        [0, 0],
        [w / 2, 0],
        [w - 1, 0],
        [0, h / 2],
        [w - 1, h / 2],
        [0, h - 1],
        [w / 2, h - 1],
        [w - 1, h - 1],
    ]);
    all
}

static NEXT_VERSION: AtomicU64 = AtomicU64::new(0);

/// The face identity being transferred onto the video feed.
///
/// Holds a canvas-sized image together with its point set (landmarks plus canvas boundary) and a
/// unique version number. The pair is immutable once built: an image combined with a point set
/// extracted from a *different* image corrupts every triangle mapping, so replacing the reference
/// always swaps the whole value (see [`crate::pipeline::ReferenceSlot`]).
pub struct ReferenceIdentity {
    image: Image,
    points: Vec<Point>,
    version: u64,
}

impl ReferenceIdentity {
    /// Pairs a canvas-sized reference image with the landmarks extracted from it.
    pub fn new(image: Image, landmarks: &Landmarks) -> Self {
        let points = with_canvas_boundary(landmarks.points(), image.resolution());
        Self {
            image,
            points,
            version: NEXT_VERSION.fetch_add(1, Ordering::Relaxed),
        }
    }

    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// The reference point set, including the canvas boundary points.
    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// A unique, monotonically increasing identifier for this reference.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.image.resolution()
    }
}

/// Warps a reference identity onto observed face geometry (the "full-face warper").
///
/// The reference triangulation is cached keyed on [`ReferenceIdentity::version`], so it is only
/// recomputed when the reference changes, not per frame.
pub struct Warper {
    topology: Option<(u64, Vec<[usize; 3]>)>,
    t_triangulate: Timer,
    t_warp: Timer,
}

impl Warper {
    pub fn new() -> Self {
        Self {
            topology: None,
            t_triangulate: Timer::new("triangulate"),
            t_warp: Timer::new("warp"),
        }
    }

    /// Reshapes `reference` onto the geometry described by `observed`.
    ///
    /// `observed` are the landmarks extracted from `canvas`; the canvas boundary points are
    /// appended internally. The returned image has the canvas's dimensions and contains the
    /// reference identity deformed into the observed face's shape, with pixel values clamped to
    /// the valid range.
    ///
    /// If the observed point set's cardinality does not match the reference's (the two were
    /// produced by different landmark extractors), no sensible correspondence exists; a warning
    /// is logged and the canvas is returned unmodified.
    pub fn warp(
        &mut self,
        reference: &ReferenceIdentity,
        observed: &Landmarks,
        canvas: &Image,
    ) -> Image {
        let observed = with_canvas_boundary(observed.points(), canvas.resolution());
        if observed.len() != reference.points().len() {
            log::warn!(
                "observed point set has {} points, reference has {}; skipping morph",
                observed.len(),
                reference.points().len(),
            );
            return canvas.clone();
        }

        self.update_topology(reference);
        let (_, triangles) = self.topology.as_ref().unwrap();

        let _guard = self.t_warp.start();
        let reference_points = reference.points();
        let mut out = FloatImage::from_image(canvas);
        for &[a, b, c] in triangles {
            warp_triangle(
                reference.image(),
                &mut out,
                [reference_points[a], reference_points[b], reference_points[c]],
                [observed[a], observed[b], observed[c]],
            );
        }
        out.into_image()
    }

    fn update_topology(&mut self, reference: &ReferenceIdentity) {
        if let Some((version, _)) = &self.topology {
            if *version == reference.version() {
                return;
            }
        }

        let triangles = self.t_triangulate.time(|| triangulate(reference.points()));
        log::debug!(
            "triangulated reference v{}: {} points -> {} triangles",
            reference.version(),
            reference.points().len(),
            triangles.len(),
        );
        self.topology = Some((reference.version(), triangles));
    }

    /// Returns profiling timers for triangulation and triangle warping.
    pub fn timers(&self) -> impl IntoIterator<Item = &Timer> + '_ {
        [&self.t_triangulate, &self.t_warp]
    }
}

impl Default for Warper {
    fn default() -> Self {
        Self::new()
    }
}
