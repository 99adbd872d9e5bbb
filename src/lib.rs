//! Kao — real-time face identity transfer.
//!
//! Given a reference face image and a live video feed, this crate warps the reference face's
//! texture onto the geometry of the face observed in each frame and composites the result back
//! into the frame, producing a live face-swap/morph feed.
//!
//! The crate is the geometric core of such a system: Delaunay triangulation ([`morph`]),
//! per-triangle affine warping ([`morph::warp_triangle`]) and the crop/recompose pipeline
//! ([`pipeline::FaceMorpher`]). Face *detection* and *landmark extraction* are external
//! capabilities consumed through the [`detection::FaceDetector`] and
//! [`landmark::LandmarkExtractor`] traits; video capture, encoding and serving are left to the
//! embedding application.
//!
//! # Coordinates
//!
//! All 2D coordinates are image pixel coordinates: X points right, Y points down, `(0, 0)` is the
//! top-left pixel.
//!
//! # Environment Variables
//!
//! * `KAO_JPEG_BACKEND`: Configures the JPEG image decoder to use. Allowed values are:
//!   * `zune-jpeg` (default): uses the [zune-jpeg] crate.
//!   * `jpeg-decoder`: uses the [jpeg-decoder] crate (via `image`).
//!
//! [zune-jpeg]: https://github.com/etemesi254/zune-jpeg
//! [jpeg-decoder]: https://github.com/image-rs/jpeg-decoder/

use log::LevelFilter;

pub mod detection;
pub mod image;
pub mod landmark;
pub mod morph;
pub mod num;
pub mod pipeline;
pub mod resolution;
pub mod timer;

#[cfg(test)]
mod test;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and Kao will log at *debug* level; `RUST_LOG` overrides still apply.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
