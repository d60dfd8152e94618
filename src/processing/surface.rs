//! Off-screen raster used to read decoded images back as pixel buffers.

use image::RgbaImage;
use image::imageops;
use tracing::trace;

use crate::error::DecodeError;
use crate::processing::color::PixelBuffer;

/// Pick the raster size for an image: intrinsic size per axis, falling back
/// to the last laid-out size observed for a preview.
pub fn resolve_dimensions(
    intrinsic: (u32, u32),
    observed_layout: Option<(u32, u32)>,
) -> Result<(u32, u32), DecodeError> {
    let (layout_w, layout_h) = observed_layout.unwrap_or((0, 0));
    let pick = |natural: u32, layout: u32| if natural > 0 { natural } else { layout };
    let width = pick(intrinsic.0, layout_w);
    let height = pick(intrinsic.1, layout_h);
    if width == 0 || height == 0 {
        return Err(DecodeError::ZeroSized);
    }
    Ok((width, height))
}

/// Reusable decode surface.
///
/// Every render resizes the backing raster to the requested size and clears
/// it before drawing, so pixels of a previous image never leak into the next
/// read-back.
#[derive(Debug)]
pub struct DecodeSurface {
    canvas: RgbaImage,
}

impl DecodeSurface {
    pub fn new() -> Self {
        Self {
            canvas: RgbaImage::new(0, 0),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    /// Draw `image` at the origin of a `width` x `height` raster and read the
    /// whole raster back.
    pub fn render(&mut self, image: &RgbaImage, width: u32, height: u32) -> PixelBuffer {
        if self.canvas.dimensions() != (width, height) {
            trace!(
                from = ?self.canvas.dimensions(),
                to = ?(width, height),
                "resizing decode surface"
            );
            self.canvas = RgbaImage::new(width, height);
        } else {
            let raw: &mut [u8] = &mut self.canvas;
            raw.fill(0);
        }
        imageops::replace(&mut self.canvas, image, 0, 0);

        PixelBuffer::from(self.canvas.clone())
    }
}

impl Default for DecodeSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn intrinsic_dimensions_win() {
        assert_eq!(resolve_dimensions((4, 3), Some((100, 100))).unwrap(), (4, 3));
    }

    #[test]
    fn falls_back_to_observed_layout_per_axis() {
        assert_eq!(resolve_dimensions((0, 3), Some((40, 50))).unwrap(), (40, 3));
        assert_eq!(resolve_dimensions((0, 0), Some((40, 50))).unwrap(), (40, 50));
    }

    #[test]
    fn zero_everywhere_is_rejected() {
        assert!(matches!(
            resolve_dimensions((0, 0), None),
            Err(DecodeError::ZeroSized)
        ));
        assert!(matches!(
            resolve_dimensions((5, 0), Some((9, 0))),
            Err(DecodeError::ZeroSized)
        ));
    }

    #[test]
    fn render_covers_exact_dimensions_in_scan_order() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([1, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([2, 0, 0, 255]));
        img.put_pixel(0, 1, Rgba([3, 0, 0, 255]));
        img.put_pixel(1, 1, Rgba([4, 0, 0, 255]));

        let mut surface = DecodeSurface::new();
        let pixels = surface.render(&img, 2, 2);
        let reds: Vec<u8> = pixels.as_bytes().chunks_exact(4).map(|p| p[0]).collect();
        assert_eq!(reds, vec![1, 2, 3, 4]);
    }

    #[test]
    fn reuse_with_smaller_image_leaves_no_stale_pixels() {
        let mut surface = DecodeSurface::new();
        let big = RgbaImage::from_pixel(3, 3, Rgba([255, 0, 0, 255]));
        let first = surface.render(&big, 3, 3);
        assert_eq!(first.as_bytes().len(), 36);

        let small = RgbaImage::from_pixel(1, 2, Rgba([0, 0, 255, 255]));
        let second = surface.render(&small, 1, 2);
        assert_eq!(surface.dimensions(), (1, 2));
        assert_eq!(second.as_bytes(), &[0, 0, 255, 255, 0, 0, 255, 255]);
    }

    #[test]
    fn same_size_reuse_clears_previous_contents() {
        let mut surface = DecodeSurface::new();
        let opaque = RgbaImage::from_pixel(2, 1, Rgba([9, 9, 9, 255]));
        surface.render(&opaque, 2, 1);

        let transparent = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        let pixels = surface.render(&transparent, 2, 1);
        assert!(pixels.as_bytes().iter().all(|b| *b == 0));
    }
}
