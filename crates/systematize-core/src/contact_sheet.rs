//! Thumbnail grid rendered to a single image.

use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba};

use crate::collection::MediaCollection;
use crate::imaging::{self, Rect};

#[derive(Debug, Clone, Copy)]
pub struct ContactSheet {
    pub columns: u32,
    pub cell_size: u32,
    pub padding: u32,
    pub background: Rgba<u8>,
}

impl Default for ContactSheet {
    fn default() -> Self {
        Self {
            columns: 6,
            cell_size: 160,
            padding: 8,
            background: Rgba([255, 255, 255, 255]),
        }
    }
}

impl ContactSheet {
    fn grid(&self, count: usize) -> (u32, u32) {
        let columns = self.columns.max(1).min(count.max(1) as u32);
        let rows = (count as u32).div_ceil(columns).max(1);
        (columns, rows)
    }

    /// Pixel size of a sheet holding `count` cells.
    pub fn dimensions(&self, count: usize) -> (u32, u32) {
        let (columns, rows) = self.grid(count);
        (
            columns * self.cell_size + (columns + 1) * self.padding,
            rows * self.cell_size + (rows + 1) * self.padding,
        )
    }

    fn cell(&self, index: usize, columns: u32) -> Rect {
        let col = index as u32 % columns;
        let row = index as u32 / columns;
        Rect::new(
            self.padding + col * (self.cell_size + self.padding),
            self.padding + row * (self.cell_size + self.padding),
            self.cell_size,
            self.cell_size,
        )
    }

    /// Render every item's display image in collection order.
    pub fn render(&self, collection: &MediaCollection) -> DynamicImage {
        let images: Vec<Arc<DynamicImage>> = collection.iter().map(|item| item.display_image()).collect();
        self.render_images(&images)
    }

    pub fn render_images(&self, images: &[Arc<DynamicImage>]) -> DynamicImage {
        let (width, height) = self.dimensions(images.len());
        let (columns, _) = self.grid(images.len());
        let mut sheet = ImageBuffer::from_pixel(width, height, self.background);

        for (i, img) in images.iter().enumerate() {
            let rect = imaging::centered_rect(img.dimensions(), self.cell(i, columns));
            if rect.width == 0 || rect.height == 0 {
                continue;
            }
            let fitted = if (rect.width, rect.height) == img.dimensions() {
                img.to_rgba8()
            } else {
                imaging::scaled_to_size(img, rect.width, rect.height).to_rgba8()
            };
            image::imageops::overlay(&mut sheet, &fitted, rect.x as i64, rect.y as i64);
        }

        DynamicImage::ImageRgba8(sheet)
    }
}
