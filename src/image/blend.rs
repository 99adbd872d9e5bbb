use super::{Color, ImageView, ImageViewMut};

/// Describes how to blend pixels together in a [`Blend`] operation.
pub enum BlendMode {
    /// All destination pixels will be overwritten with the corresponding source pixel.
    Overwrite,

    /// Mixes source and destination pixels with a constant source weight in `0.0..=1.0`.
    ///
    /// Every channel becomes `src * weight + dest * (1 - weight)`. A weight of `1.0` behaves like
    /// [`BlendMode::Overwrite`], a weight of `0.0` leaves the destination unchanged.
    Weighted(f32),
}

/// A blending operation between two images.
///
/// Returned by [`Image::blend_from`][super::Image::blend_from] or [`ImageViewMut::blend_from`].
/// The operation runs when the [`Blend`] value is dropped.
pub struct Blend<'a> {
    dest: ImageViewMut<'a>,
    src: ImageView<'a>,
    mode: BlendMode,
}

impl<'a> Blend<'a> {
    pub(super) fn new(dest: ImageViewMut<'a>, src: ImageView<'a>) -> Self {
        Self {
            dest,
            src,
            mode: BlendMode::Overwrite,
        }
    }

    /// Sets the blend mode to use.
    pub fn mode(&mut self, mode: BlendMode) -> &mut Self {
        self.mode = mode;
        self
    }
}

impl Drop for Blend<'_> {
    fn drop(&mut self) {
        for dest_y in 0..self.dest.height() {
            for dest_x in 0..self.dest.width() {
                let src_x = ((dest_x as f32 + 0.5) / self.dest.width() as f32
                    * self.src.width() as f32) as u32;
                let src_y = ((dest_y as f32 + 0.5) / self.dest.height() as f32
                    * self.src.height() as f32) as u32;

                let src_pix = self.src.get(src_x, src_y);
                let dest_pix = self.dest.get(dest_x, dest_y);
                let result = match self.mode {
                    BlendMode::Overwrite => src_pix,
                    BlendMode::Weighted(weight) => blend_weighted(dest_pix, src_pix, weight),
                };
                self.dest.set(dest_x, dest_y, result);
            }
        }
    }
}

fn blend_weighted(dest: Color, src: Color, weight: f32) -> Color {
    fn mix(dest: u8, src: u8, weight: f32) -> u8 {
        (f32::from(src) * weight + f32::from(dest) * (1.0 - weight) + 0.5) as u8
    }

    Color([
        mix(dest[0], src[0], weight),
        mix(dest[1], src[1], weight),
        mix(dest[2], src[2], weight),
        mix(dest[3], src[3], weight),
    ])
}
