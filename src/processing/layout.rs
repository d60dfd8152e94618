/// Largest size with the source aspect ratio that fits inside the canvas.
pub fn resize_to_contain(
    canvas_w: u32,
    canvas_h: u32,
    src_w: u32,
    src_h: u32,
    max_dim: u32,
) -> (u32, u32) {
    let iw = src_w.max(1) as f32;
    let ih = src_h.max(1) as f32;
    let cw = canvas_w.max(1) as f32;
    let ch = canvas_h.max(1) as f32;
    let scale = (cw / iw).min(ch / ih).max(0.0);
    let scale = if scale.is_finite() { scale } else { 1.0 };
    let w = (iw * scale).round().clamp(1.0, max_dim.max(1) as f32);
    let h = (ih * scale).round().clamp(1.0, max_dim.max(1) as f32);
    (w as u32, h as u32)
}

pub fn center_offset(inner_w: u32, inner_h: u32, outer_w: u32, outer_h: u32) -> (u32, u32) {
    let ox = outer_w.saturating_sub(inner_w) / 2;
    let oy = outer_h.saturating_sub(inner_h) / 2;
    (ox, oy)
}

/// Preview size bounded by `max_dim` on its longest side. Never upscales.
pub fn preview_size(src_w: u32, src_h: u32, max_dim: u32) -> (u32, u32) {
    if src_w.max(src_h) <= max_dim {
        return (src_w.max(1), src_h.max(1));
    }
    resize_to_contain(max_dim, max_dim, src_w, src_h, max_dim)
}

/// Where a preview is drawn inside the drop target, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PreviewRect {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `[x0, y0, x1, y1]` for shader uniforms.
    pub fn edges(&self) -> [f32; 4] {
        [
            self.x as f32,
            self.y as f32,
            (self.x + self.width) as f32,
            (self.y + self.height) as f32,
        ]
    }
}

/// Center the image in the surface, keeping `margin` (fraction of each
/// surface axis) free on every side. Images smaller than the free area keep
/// their natural size.
pub fn preview_rect(
    image_w: u32,
    image_h: u32,
    surface_w: u32,
    surface_h: u32,
    margin: f32,
) -> PreviewRect {
    let margin = margin.clamp(0.0, 0.49);
    let avail_w = ((surface_w as f32) * (1.0 - 2.0 * margin)).floor().max(1.0) as u32;
    let avail_h = ((surface_h as f32) * (1.0 - 2.0 * margin)).floor().max(1.0) as u32;

    let (width, height) = if image_w <= avail_w && image_h <= avail_h {
        (image_w.max(1), image_h.max(1))
    } else {
        resize_to_contain(avail_w, avail_h, image_w, image_h, avail_w.max(avail_h))
    };
    let (x, y) = center_offset(width, height, surface_w, surface_h);
    PreviewRect {
        x,
        y,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contain_wide_on_16x9() {
        assert_eq!(resize_to_contain(1920, 1080, 4000, 2000, 8192), (1920, 960));
    }

    #[test]
    fn preview_size_keeps_small_images() {
        assert_eq!(preview_size(640, 480, 2048), (640, 480));
    }

    #[test]
    fn preview_size_bounds_longest_side() {
        assert_eq!(preview_size(4096, 1024, 2048), (2048, 512));
        assert_eq!(preview_size(1000, 5000, 500), (100, 500));
    }

    #[test]
    fn small_image_is_centered_at_natural_size() {
        let rect = preview_rect(100, 50, 800, 600, 0.1);
        assert_eq!(
            rect,
            PreviewRect {
                x: 350,
                y: 275,
                width: 100,
                height: 50
            }
        );
    }

    #[test]
    fn large_image_is_fitted_inside_margin() {
        // 1000x1000 on 1000x500 with 10% margin -> 800x400 free area
        let rect = preview_rect(1000, 1000, 1000, 500, 0.1);
        assert_eq!(rect.size(), (400, 400));
        assert_eq!((rect.x, rect.y), (300, 50));
        assert_eq!(rect.edges(), [300.0, 50.0, 700.0, 450.0]);
    }
}
