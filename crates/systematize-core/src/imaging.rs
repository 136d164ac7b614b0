use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba};

use crate::media::MediaKind;

/// Axis-aligned placement rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Copy of `image` scaled to exactly `width` x `height`.
pub fn scaled_to_size(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    image.resize_exact(width.max(1), height.max(1), FilterType::Triangle)
}

/// Copy of `image` whose larger side is `max_dimension`; the other side scales proportionately.
/// Images already within the bound are returned unscaled.
pub fn scaled_to_max_dimension(image: &DynamicImage, max_dimension: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    if w.max(h) <= max_dimension {
        return image.clone();
    }
    image.resize(max_dimension, max_dimension, FilterType::Triangle)
}

/// Where an image of `size` lands when fitted and centered inside `cell`.
/// Smaller images are centered at their natural size.
pub fn centered_rect(size: (u32, u32), cell: Rect) -> Rect {
    let (w, h) = size;
    if w == 0 || h == 0 || cell.width == 0 || cell.height == 0 {
        return Rect::new(cell.x + cell.width / 2, cell.y + cell.height / 2, 0, 0);
    }

    let scale = f64::min(
        1.0,
        f64::min(cell.width as f64 / w as f64, cell.height as f64 / h as f64),
    );
    let width = ((w as f64 * scale).round() as u32).clamp(1, cell.width);
    let height = ((h as f64 * scale).round() as u32).clamp(1, cell.height);

    Rect::new(
        cell.x + (cell.width - width) / 2,
        cell.y + (cell.height - height) / 2,
        width,
        height,
    )
}

/// Apply an EXIF orientation code so the result is upright.
pub fn oriented(image: &DynamicImage, orientation: Option<u8>) -> DynamicImage {
    match orientation {
        Some(2) => image.fliph(),
        Some(3) => image.rotate180(),
        Some(4) => image.flipv(),
        Some(5) => image.rotate90().fliph(),
        Some(6) => image.rotate90(),
        Some(7) => image.rotate270().fliph(),
        Some(8) => image.rotate270(),
        _ => image.clone(),
    }
}

/// Rotated 90 degrees counter-clockwise.
pub fn rotate_left(image: &DynamicImage) -> DynamicImage {
    image.rotate270()
}

/// Rotated 90 degrees clockwise.
pub fn rotate_right(image: &DynamicImage) -> DynamicImage {
    image.rotate90()
}

/// Placeholder raster shown for items without a thumbnail.
pub fn type_badge(kind: MediaKind, size: u32) -> DynamicImage {
    let size = size.max(8);
    let (background, mark) = match kind {
        MediaKind::Image => (Rgba([210u8, 210, 210, 255]), Rgba([150u8, 150, 150, 255])),
        MediaKind::Movie => (Rgba([60u8, 60, 60, 255]), Rgba([235u8, 235, 235, 255])),
    };
    let mut badge = ImageBuffer::from_pixel(size, size, background);

    let quarter = size / 4;
    let span = size - 2 * quarter;
    match kind {
        // Horizon line across the lower third
        MediaKind::Image => {
            let y0 = size * 2 / 3;
            for y in y0..(y0 + (size / 16).max(1)).min(size) {
                for x in quarter..size - quarter {
                    badge.put_pixel(x, y, mark);
                }
            }
        }
        // Play triangle pointing right
        MediaKind::Movie => {
            for dx in 0..span {
                let half = (span - dx) / 2;
                let mid = size / 2;
                for y in mid.saturating_sub(half)..=(mid + half).min(size - 1) {
                    badge.put_pixel(quarter + dx, y, mark);
                }
            }
        }
    }

    DynamicImage::ImageRgba8(badge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn marked(width: u32, height: u32) -> DynamicImage {
        // Top-left pixel red, everything else black
        let mut img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_scaled_to_max_dimension() {
        let img = marked(400, 200);
        assert_eq!(scaled_to_max_dimension(&img, 100).dimensions(), (100, 50));
        assert_eq!(scaled_to_max_dimension(&img, 1000).dimensions(), (400, 200));
        let tall = marked(30, 90);
        assert_eq!(scaled_to_max_dimension(&tall, 45).dimensions(), (15, 45));
    }

    #[test]
    fn test_scaled_to_size_ignores_aspect() {
        assert_eq!(scaled_to_size(&marked(10, 10), 20, 5).dimensions(), (20, 5));
    }

    #[test]
    fn test_centered_rect() {
        let cell = Rect::new(10, 10, 100, 100);
        assert_eq!(centered_rect((200, 100), cell), Rect::new(10, 35, 100, 50));
        assert_eq!(centered_rect((20, 40), cell), Rect::new(50, 40, 20, 40));
    }

    #[test]
    fn test_orientation_codes() {
        let img = marked(4, 2);
        let red = Rgba([255, 0, 0, 255]);

        let upright = oriented(&img, Some(6));
        assert_eq!(upright.dimensions(), (2, 4));
        assert_eq!(upright.get_pixel(1, 0), red);

        let flipped = oriented(&img, Some(2));
        assert_eq!(flipped.get_pixel(3, 0), red);

        let transposed = oriented(&img, Some(5));
        assert_eq!(transposed.dimensions(), (2, 4));
        assert_eq!(transposed.get_pixel(0, 0), red);

        assert_eq!(oriented(&img, None).get_pixel(0, 0), red);
    }

    #[test]
    fn test_rotations_do_not_mutate_source() {
        let img = marked(4, 2);
        let left = rotate_left(&img);
        let right = rotate_right(&img);
        assert_eq!(left.dimensions(), (2, 4));
        assert_eq!(left.get_pixel(0, 3), Rgba([255, 0, 0, 255]));
        assert_eq!(right.get_pixel(1, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(img.dimensions(), (4, 2));
    }

    #[test]
    fn test_type_badges_differ() {
        let image = type_badge(MediaKind::Image, 64);
        let movie = type_badge(MediaKind::Movie, 64);
        assert_eq!(image.dimensions(), (64, 64));
        assert_ne!(image.get_pixel(1, 1), movie.get_pixel(1, 1));
    }
}
