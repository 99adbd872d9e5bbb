//! Shared helpers for unit tests.

use crate::image::{Color, Image};

/// Creates an image with a distinct color gradient, so warping bugs show up as value mismatches.
pub fn gradient_image(width: u32, height: u32) -> Image {
    let mut image = Image::new(width, height);
    for y in 0..height {
        for x in 0..width {
            image.set(
                x,
                y,
                Color::from_rgb8(
                    (x * 255 / width.max(1)) as u8,
                    (y * 255 / height.max(1)) as u8,
                    ((x + y) % 256) as u8,
                ),
            );
        }
    }
    image
}
