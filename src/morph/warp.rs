//! Per-triangle piecewise-affine warping.
//!
//! The warp works in bounding-rect-local coordinates: both triangles are translated into their
//! axis-aligned bounding rectangles, the affine map between the rect-local triangles is solved,
//! and the source rect is resampled through it into the destination rect. Only pixels covered by
//! the destination triangle are written, so triangles can be warped independently even when their
//! bounding rectangles overlap.

use nalgebra::{Matrix2x3, Matrix3, Vector3};

use crate::image::{Color, Image, Rect};
use crate::landmark::Point;

/// Subdivisions per pixel axis when rasterizing the triangle coverage mask.
const MASK_SUBSAMPLES: u32 = 4;

/// A 2×3 affine transform solved from 3 point correspondences.
pub struct AffineMap {
    m: Matrix2x3<f32>,
}

impl AffineMap {
    /// Solves for the unique affine map taking the 3 `from` points onto the 3 `to` points.
    ///
    /// Returns `None` when the `from` points are collinear, in which case no unique map exists.
    pub fn between(from: &[[f32; 2]; 3], to: &[[f32; 2]; 3]) -> Option<Self> {
        #[rustfmt::skip]
        let a = Matrix3::new(
            from[0][0], from[0][1], 1.0,
            from[1][0], from[1][1], 1.0,
            from[2][0], from[2][1], 1.0,
        );
        let inv = a.try_inverse()?;
        let xs = inv * Vector3::new(to[0][0], to[1][0], to[2][0]);
        let ys = inv * Vector3::new(to[0][1], to[1][1], to[2][1]);
        Some(Self {
            m: Matrix2x3::new(xs.x, xs.y, xs.z, ys.x, ys.y, ys.z),
        })
    }

    /// Applies the transform to a point.
    #[inline]
    pub fn apply(&self, x: f32, y: f32) -> [f32; 2] {
        [
            self.m[(0, 0)] * x + self.m[(0, 1)] * y + self.m[(0, 2)],
            self.m[(1, 0)] * x + self.m[(1, 1)] * y + self.m[(1, 2)],
        ]
    }
}

/// An f32 RGB image used to accumulate warped triangles.
///
/// Compositing many masked triangle writes in u8 would round at every seam; the accumulator keeps
/// full precision and clamps once when converting back to an [`Image`].
pub struct FloatImage {
    width: u32,
    height: u32,
    data: Vec<[f32; 3]>,
}

impl FloatImage {
    /// Creates an accumulator initialized with `image`'s pixel values.
    pub fn from_image(image: &Image) -> Self {
        let (width, height) = (image.width(), image.height());
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let c = image.get(x, y);
                data.push([f32::from(c.r()), f32::from(c.g()), f32::from(c.b())]);
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Converts the accumulator back to an 8-bit image, clamping every channel to `[0, 255]`.
    ///
    /// The result is fully opaque.
    pub fn into_image(self) -> Image {
        let mut image = Image::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let [r, g, b] = self.data[(y * self.width + x) as usize];
                image.set(
                    x,
                    y,
                    Color::from_rgb8(clamp_u8(r), clamp_u8(g), clamp_u8(b)),
                );
            }
        }
        image
    }

    #[inline]
    fn get(&self, x: u32, y: u32) -> [f32; 3] {
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    fn set(&mut self, x: u32, y: u32, value: [f32; 3]) {
        self.data[(y * self.width + x) as usize] = value;
    }
}

#[inline]
fn clamp_u8(v: f32) -> u8 {
    (v + 0.5).clamp(0.0, 255.0) as u8
}

/// Warps the triangle `tri_src` of `src` onto the triangle `tri_dst` of `dst`.
///
/// Source pixels are resampled with bilinear interpolation; samples falling outside the source
/// triangle's bounding rectangle are reflected back at its borders. Writes are restricted to the
/// destination triangle's footprint via an anti-aliased coverage mask
/// (`dst = dst*(1-mask) + warped*mask`).
///
/// Degenerate triangles and triangles whose bounding rectangle is clipped by either image's
/// bounds are silently skipped; losing a sliver of texture at an image edge is visually
/// negligible, while near-collinear landmark configurations occasionally occur at face-mesh
/// extremities and must not abort a frame.
pub fn warp_triangle(src: &Image, dst: &mut FloatImage, tri_src: [Point; 3], tri_dst: [Point; 3]) {
    let r_src = match Rect::bounding(tri_src.iter().map(|p| (p[0], p[1]))) {
        Some(rect) => rect,
        None => return,
    };
    let r_dst = match Rect::bounding(tri_dst.iter().map(|p| (p[0], p[1]))) {
        Some(rect) => rect,
        None => return,
    };

    let dst_bounds = Rect::from_top_left(0, 0, dst.width(), dst.height());
    if !dst_bounds.contains_rect(&r_dst) || !src.rect().contains_rect(&r_src) {
        return;
    }

    let src_local = rect_local(tri_src, &r_src);
    let dst_local = rect_local(tri_dst, &r_dst);

    // Pull map: destination pixel -> source sample position.
    let map = match AffineMap::between(&dst_local, &src_local) {
        Some(map) => map,
        None => return,
    };

    for (dx, dy) in Rect::from_top_left(0, 0, r_dst.width(), r_dst.height()).iter_coords() {
        let coverage = triangle_coverage(&dst_local, dx as f32, dy as f32);
        if coverage <= 0.0 {
            continue;
        }

        let [sx, sy] = map.apply(dx as f32, dy as f32);
        let warped = sample_bilinear(src, &r_src, sx, sy);

        let x = (i64::from(r_dst.x()) + dx) as u32;
        let y = (i64::from(r_dst.y()) + dy) as u32;
        let old = dst.get(x, y);
        dst.set(
            x,
            y,
            [
                old[0] * (1.0 - coverage) + warped[0] * coverage,
                old[1] * (1.0 - coverage) + warped[1] * coverage,
                old[2] * (1.0 - coverage) + warped[2] * coverage,
            ],
        );
    }
}

fn rect_local(tri: [Point; 3], rect: &Rect) -> [[f32; 2]; 3] {
    tri.map(|p| [(p[0] - rect.x()) as f32, (p[1] - rect.y()) as f32])
}

/// Fraction of the pixel at `(x, y)` covered by the triangle, sampled on a
/// `MASK_SUBSAMPLES`²-point subpixel grid.
fn triangle_coverage(tri: &[[f32; 2]; 3], x: f32, y: f32) -> f32 {
    let step = 1.0 / MASK_SUBSAMPLES as f32;
    let mut inside = 0;
    for sy in 0..MASK_SUBSAMPLES {
        for sx in 0..MASK_SUBSAMPLES {
            let px = x + (sx as f32 + 0.5) * step;
            let py = y + (sy as f32 + 0.5) * step;
            if point_in_triangle(tri, px, py) {
                inside += 1;
            }
        }
    }
    inside as f32 / (MASK_SUBSAMPLES * MASK_SUBSAMPLES) as f32
}

fn point_in_triangle(tri: &[[f32; 2]; 3], x: f32, y: f32) -> bool {
    let edge = |a: [f32; 2], b: [f32; 2]| (b[0] - a[0]) * (y - a[1]) - (b[1] - a[1]) * (x - a[0]);
    let d0 = edge(tri[0], tri[1]);
    let d1 = edge(tri[1], tri[2]);
    let d2 = edge(tri[2], tri[0]);

    let has_neg = d0 < 0.0 || d1 < 0.0 || d2 < 0.0;
    let has_pos = d0 > 0.0 || d1 > 0.0 || d2 > 0.0;
    !(has_neg && has_pos)
}

/// Bilinearly samples the source rectangle at rect-local position `(x, y)`.
///
/// Sample positions outside the rectangle are reflected at its borders without repeating the edge
/// row/column (the `gfedcb|abcdefgh|gfedcba` scheme).
fn sample_bilinear(src: &Image, rect: &Rect, x: f32, y: f32) -> [f32; 3] {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);
    let w = i64::from(rect.width());
    let h = i64::from(rect.height());

    let mut acc = [0.0f32; 3];
    for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
        for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
            let weight = wx * wy;
            if weight == 0.0 {
                continue;
            }
            let sx = reflect_101(x0 + dx, w);
            let sy = reflect_101(y0 + dy, h);
            let c = src.get(
                (i64::from(rect.x()) + sx) as u32,
                (i64::from(rect.y()) + sy) as u32,
            );
            acc[0] += f32::from(c.r()) * weight;
            acc[1] += f32::from(c.g()) * weight;
            acc[2] += f32::from(c.b()) * weight;
        }
    }
    acc
}

fn reflect_101(mut i: i64, len: i64) -> i64 {
    if len == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * len - 2 - i;
        } else {
            return i;
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::test::gradient_image;

    #[test]
    fn affine_between_maps_corners() {
        let from = [[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]];
        let to = [[5.0, 5.0], [25.0, 7.0], [3.0, 30.0]];
        let map = AffineMap::between(&from, &to).unwrap();
        for (f, t) in from.iter().zip(&to) {
            let [x, y] = map.apply(f[0], f[1]);
            assert_relative_eq!(x, t[0], epsilon = 1e-3);
            assert_relative_eq!(y, t[1], epsilon = 1e-3);
        }
    }

    #[test]
    fn affine_identity() {
        let tri = [[1.0, 2.0], [14.0, 3.0], [6.0, 12.0]];
        let map = AffineMap::between(&tri, &tri).unwrap();
        let [x, y] = map.apply(7.0, 7.0);
        assert_relative_eq!(x, 7.0, epsilon = 1e-3);
        assert_relative_eq!(y, 7.0, epsilon = 1e-3);
    }

    #[test]
    fn affine_degenerate_is_none() {
        let from = [[0.0, 0.0], [5.0, 5.0], [10.0, 10.0]];
        let to = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert!(AffineMap::between(&from, &to).is_none());
    }

    #[test]
    fn reflect_border() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(0, 5), 0);
        assert_eq!(reflect_101(4, 5), 4);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(3, 1), 0);
    }

    #[test]
    fn float_image_round_trip_and_clamp() {
        let image = gradient_image(4, 3);
        let float = FloatImage::from_image(&image);
        assert_eq!(float.into_image().data(), image.data());

        let mut float = FloatImage::from_image(&image);
        float.set(0, 0, [-20.0, 300.0, 128.0]);
        let clamped = float.into_image();
        assert_eq!(clamped.get(0, 0), Color::from_rgb8(0, 255, 128));
    }

    #[test]
    fn identity_warp_reproduces_source() {
        let src = gradient_image(24, 24);
        let tri = [[3, 4], [20, 6], [10, 19]];

        let mut dst = FloatImage::from_image(&Image::new(24, 24));
        warp_triangle(&src, &mut dst, tri, tri);
        let out = dst.into_image();

        let tri_f = tri.map(|p| [p[0] as f32, p[1] as f32]);
        let mut fully_covered = 0;
        for (x, y) in src.rect().iter_coords() {
            let (x, y) = (x as u32, y as u32);
            if triangle_coverage(&tri_f, x as f32, y as f32) == 1.0 {
                assert_eq!(out.get(x, y), src.get(x, y), "pixel ({x},{y})");
                fully_covered += 1;
            }
        }
        assert!(fully_covered > 50, "test triangle unexpectedly small");
    }

    #[test]
    fn mask_locality() {
        let src = gradient_image(32, 32);
        let tri_src = [[2, 2], [12, 3], [6, 12]];
        let tri_dst = [[16, 16], [28, 18], [20, 29]];

        let mut dst = FloatImage::from_image(&Image::new(32, 32));
        warp_triangle(&src, &mut dst, tri_src, tri_dst);
        let out = dst.into_image();

        let r_dst = Rect::bounding(tri_dst.iter().map(|p| (p[0], p[1]))).unwrap();
        for (x, y) in out.rect().iter_coords() {
            let inside_rect = x >= i64::from(r_dst.x())
                && x < i64::from(r_dst.x()) + i64::from(r_dst.width())
                && y >= i64::from(r_dst.y())
                && y < i64::from(r_dst.y()) + i64::from(r_dst.height());
            if !inside_rect {
                assert_eq!(
                    out.get(x as u32, y as u32),
                    Color::from_rgb8(0, 0, 0),
                    "pixel ({x},{y}) outside the destination rect was modified"
                );
            }
        }
    }

    #[test]
    fn degenerate_triangle_is_skipped() {
        let src = gradient_image(16, 16);
        let tri_src = [[1, 1], [10, 1], [5, 10]];
        let tri_dst = [[2, 2], [6, 6], [10, 10]]; // collinear

        let mut dst = FloatImage::from_image(&Image::new(16, 16));
        warp_triangle(&src, &mut dst, tri_src, tri_dst);
        let out = dst.into_image();
        for (x, y) in out.rect().iter_coords() {
            assert_eq!(out.get(x as u32, y as u32), Color::from_rgb8(0, 0, 0));
        }
    }

    #[test]
    fn clipped_triangle_is_skipped() {
        let src = gradient_image(16, 16);
        let tri_src = [[1, 1], [10, 1], [5, 10]];
        let tri_dst = [[8, 8], [20, 10], [12, 20]]; // pokes past the 16x16 destination

        let mut dst = FloatImage::from_image(&Image::new(16, 16));
        warp_triangle(&src, &mut dst, tri_src, tri_dst);
        let out = dst.into_image();
        for (x, y) in out.rect().iter_coords() {
            assert_eq!(out.get(x as u32, y as u32), Color::from_rgb8(0, 0, 0));
        }
    }
}
