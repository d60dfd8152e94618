//! Image loading: bytes in, displayable preview plus full-resolution pixel
//! buffer out.

use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use image::{ImageFormat, ImageReader, RgbaImage, imageops};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::Configuration;
use crate::error::{DecodeError, ReductionError};
use crate::processing::color::{ColorRgba, PixelBuffer, average_color};
use crate::processing::layout::preview_size;
use crate::processing::surface::{DecodeSurface, resolve_dimensions};

/// Limits applied while loading dropped files.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorOptions {
    pub max_file_bytes: u64,
    pub preview_max_dimension: u32,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        let cfg = Configuration::default();
        Self::from(&cfg)
    }
}

impl From<&Configuration> for ProcessorOptions {
    fn from(cfg: &Configuration) -> Self {
        Self {
            max_file_bytes: cfg.max_file_bytes,
            preview_max_dimension: cfg.preview_max_dimension,
        }
    }
}

/// A decoded drop: what to show and what to average.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub preview: Arc<RgbaImage>,
    pub pixels: PixelBuffer,
}

/// Owns the decode surface shared by all drops.
///
/// Construct once and hand out behind an `Arc`; the loader decodes through
/// it and the viewer reports preview layout sizes back to it.
#[derive(Debug)]
pub struct ImageProcessor {
    options: ProcessorOptions,
    surface: Mutex<DecodeSurface>,
    observed_layout: Mutex<Option<(u32, u32)>>,
}

impl ImageProcessor {
    pub fn new(options: ProcessorOptions) -> Self {
        Self {
            options,
            surface: Mutex::new(DecodeSurface::new()),
            observed_layout: Mutex::new(None),
        }
    }

    pub fn options(&self) -> ProcessorOptions {
        self.options
    }

    /// Record the size a preview was laid out at. Used as a dimension
    /// fallback for images that report no intrinsic size.
    pub fn observe_layout(&self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        *self
            .observed_layout
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((width, height));
    }

    pub fn observed_layout(&self) -> Option<(u32, u32)> {
        *self
            .observed_layout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Read and decode a dropped file. Blocking; call from the blocking pool.
    pub fn load_path(&self, path: &Path) -> Result<LoadedImage, DecodeError> {
        let io_err = |source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        };
        let len = std::fs::metadata(path).map_err(io_err)?.len();
        self.check_size(len)?;
        let bytes = std::fs::read(path).map_err(io_err)?;
        self.load_bytes(&bytes, Some(path))
    }

    /// Decode an in-memory payload. `name_hint` is consulted for the format
    /// only when the content itself is not recognised.
    pub fn load_bytes(
        &self,
        bytes: &[u8],
        name_hint: Option<&Path>,
    ) -> Result<LoadedImage, DecodeError> {
        self.check_size(bytes.len() as u64)?;

        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(image::ImageError::from)?;
        if reader.format().is_none() {
            let hinted = name_hint.and_then(|p| ImageFormat::from_path(p).ok());
            match hinted {
                Some(format) => reader.set_format(format),
                None => return Err(DecodeError::NotAnImage),
            }
        }
        let decoded = reader.decode()?.to_rgba8();
        let decoded = apply_orientation(decoded, read_orientation(bytes));

        let (width, height) = resolve_dimensions(decoded.dimensions(), self.observed_layout())?;
        let pixels = {
            let mut surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
            surface.render(&decoded, width, height)
        };

        let (pw, ph) = preview_size(
            decoded.width(),
            decoded.height(),
            self.options.preview_max_dimension,
        );
        let preview = if (pw, ph) == decoded.dimensions() {
            decoded
        } else {
            imageops::resize(&decoded, pw, ph, imageops::FilterType::Triangle)
        };

        debug!(width, height, preview = ?(pw, ph), "decoded image");
        Ok(LoadedImage {
            preview: Arc::new(preview),
            pixels,
        })
    }

    /// Average `pixels` on the blocking pool. The returned handle resolves
    /// once the scan is done; the caller's task is never blocked.
    pub fn reduce(&self, pixels: PixelBuffer) -> JoinHandle<Result<ColorRgba, ReductionError>> {
        tokio::task::spawn_blocking(move || average_color(pixels.as_bytes()))
    }

    fn check_size(&self, bytes: u64) -> Result<(), DecodeError> {
        if bytes > self.options.max_file_bytes {
            return Err(DecodeError::TooLarge {
                bytes,
                limit: self.options.max_file_bytes,
            });
        }
        Ok(())
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new(ProcessorOptions::default())
    }
}

fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)?;
    debug!(orientation = value, "exif orientation");
    u16::try_from(value).ok()
}

/// Rotate/flip to the EXIF display orientation. Unknown values leave the
/// image as stored.
fn apply_orientation(img: RgbaImage, orientation: Option<u16>) -> RgbaImage {
    match orientation.unwrap_or(1) {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use image::Rgba;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn checkerboard(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn red_png_yields_red_pixels() {
        let processor = ImageProcessor::default();
        let red = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let loaded = processor.load_bytes(&png_bytes(&red), None).unwrap();

        assert_eq!(loaded.pixels.dimensions(), (2, 2));
        assert_eq!(loaded.pixels.as_bytes().len(), 16);
        for px in loaded.pixels.as_bytes().chunks_exact(4) {
            assert_eq!(px, &[255, 0, 0, 255]);
        }
        assert_eq!(
            average_color(loaded.pixels.as_bytes()).unwrap(),
            ColorRgba::new(255, 0, 0, 255)
        );
    }

    #[test]
    fn checkerboard_averages_with_truncation() {
        let processor = ImageProcessor::default();
        let loaded = processor
            .load_bytes(&png_bytes(&checkerboard(4)), None)
            .unwrap();
        assert_eq!(
            average_color(loaded.pixels.as_bytes()).unwrap(),
            ColorRgba::new(127, 127, 127, 255)
        );
    }

    #[test]
    fn garbage_is_not_an_image() {
        let processor = ImageProcessor::default();
        let err = processor.load_bytes(b"definitely not pixels", None).unwrap_err();
        assert!(matches!(err, DecodeError::NotAnImage), "got {err:?}");
    }

    #[test]
    fn truncated_png_fails_to_decode() {
        let processor = ImageProcessor::default();
        let bytes = png_bytes(&checkerboard(8));
        let err = processor.load_bytes(&bytes[..bytes.len() / 2], None).unwrap_err();
        assert!(matches!(err, DecodeError::Image(_)), "got {err:?}");
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let processor = ImageProcessor::new(ProcessorOptions {
            max_file_bytes: 8,
            preview_max_dimension: 64,
        });
        let bytes = png_bytes(&checkerboard(2));
        assert!(matches!(
            processor.load_bytes(&bytes, None),
            Err(DecodeError::TooLarge { limit: 8, .. })
        ));
    }

    #[test]
    fn preview_is_bounded_but_pixels_are_not() {
        let processor = ImageProcessor::new(ProcessorOptions {
            max_file_bytes: 1 << 20,
            preview_max_dimension: 4,
        });
        let img = RgbaImage::from_pixel(16, 8, Rgba([10, 20, 30, 255]));
        let loaded = processor.load_bytes(&png_bytes(&img), None).unwrap();
        assert_eq!(loaded.preview.dimensions(), (4, 2));
        assert_eq!(loaded.pixels.dimensions(), (16, 8));
    }

    #[test]
    fn consecutive_loads_do_not_share_pixels() {
        let processor = ImageProcessor::default();
        let big = RgbaImage::from_pixel(5, 5, Rgba([255, 255, 255, 255]));
        let small = RgbaImage::from_pixel(1, 2, Rgba([0, 0, 0, 255]));
        processor.load_bytes(&png_bytes(&big), None).unwrap();
        let loaded = processor.load_bytes(&png_bytes(&small), None).unwrap();
        assert_eq!(loaded.pixels.as_bytes(), &[0, 0, 0, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn applies_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let processor = ImageProcessor::default();
        let loaded = processor.load_bytes(&bytes, None).unwrap();
        assert_eq!(loaded.pixels.dimensions(), (1, 2));
        assert_eq!(loaded.preview.dimensions(), (1, 2));
    }

    #[test]
    fn load_path_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        let red = RgbaImage::from_pixel(3, 1, Rgba([255, 0, 0, 255]));
        std::fs::write(&path, png_bytes(&red)).unwrap();

        let processor = ImageProcessor::default();
        let loaded = processor.load_path(&path).unwrap();
        assert_eq!(loaded.pixels.dimensions(), (3, 1));

        let missing = processor.load_path(&dir.path().join("gone.png"));
        assert!(matches!(missing, Err(DecodeError::Io { .. })));
    }

    #[test]
    fn observe_layout_ignores_zero_sizes() {
        let processor = ImageProcessor::default();
        processor.observe_layout(0, 10);
        assert_eq!(processor.observed_layout(), None);
        processor.observe_layout(320, 200);
        assert_eq!(processor.observed_layout(), Some((320, 200)));
    }

    #[tokio::test]
    async fn reduce_resolves_off_the_calling_task() {
        let processor = ImageProcessor::default();
        let pixels = PixelBuffer::from_raw(1, 2, vec![10, 20, 30, 40, 20, 40, 60, 80]).unwrap();
        let color = processor.reduce(pixels).await.unwrap().unwrap();
        assert_eq!(color, ColorRgba::new(15, 30, 45, 60));
    }
}
