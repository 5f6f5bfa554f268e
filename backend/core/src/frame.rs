//! Decoded still frames.

use chrono::{DateTime, Local};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};

use crate::error::{OcrDeckError, Result};
use crate::geometry::Rect;
use crate::mapper::CoordinateMapper;

/// A decoded RGB8 bitmap plus the moment it was captured.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self::with_timestamp(image, Local::now())
    }

    pub fn with_timestamp(image: RgbImage, captured_at: DateTime<Local>) -> Self {
        Self { image, captured_at }
    }

    /// Wrap tightly packed RGB8 bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let len = data.len();
        RgbImage::from_raw(width, height, data)
            .map(Self::new)
            .ok_or_else(|| {
                OcrDeckError::Other(anyhow::anyhow!(
                    "pixel buffer of {len} bytes does not hold a {width}x{height} RGB frame"
                ))
            })
    }

    /// Convert any decoded image to the fixed RGB8 layout.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.into_rgb8())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    /// Copy out the pixels under `rect`. The rectangle must lie inside the frame.
    pub fn crop(&self, rect: &Rect) -> Result<RgbImage> {
        if !rect.fits_within(self.width(), self.height()) {
            return Err(OcrDeckError::InvalidRegion(format!(
                "{rect} exceeds the {}x{} frame",
                self.width(),
                self.height()
            )));
        }
        Ok(imageops::crop_imm(
            &self.image,
            rect.left() as u32,
            rect.top() as u32,
            rect.width(),
            rect.height(),
        )
        .to_image())
    }

    /// Scaled copy for the preview, sized by `mapper`.
    pub fn preview(&self, mapper: &CoordinateMapper) -> RgbImage {
        let (w, h) = mapper.display_size();
        if (w, h) == self.size() {
            return self.image.clone();
        }
        imageops::resize(&self.image, w, h, FilterType::Triangle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> Frame {
        Frame::new(RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 7])))
    }

    #[test]
    fn from_raw_checks_length() {
        assert!(Frame::from_raw(2, 2, vec![0; 12]).is_ok());
        assert!(Frame::from_raw(2, 2, vec![0; 11]).is_err());
    }

    #[test]
    fn crop_copies_region_pixels() {
        let frame = gradient(64, 32);
        let rect = Rect::from_corners(10, 5, 20, 25).unwrap();
        let crop = frame.crop(&rect).unwrap();
        assert_eq!(crop.dimensions(), (10, 20));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([10, 5, 7]));
        assert_eq!(crop.get_pixel(9, 19), &Rgb([19, 24, 7]));
    }

    #[test]
    fn crop_out_of_bounds_is_an_error() {
        let frame = gradient(64, 32);
        let rect = Rect::from_corners(50, 5, 70, 25).unwrap();
        assert!(matches!(
            frame.crop(&rect),
            Err(OcrDeckError::InvalidRegion(_))
        ));
    }

    #[test]
    fn preview_uses_mapper_size() {
        let frame = gradient(200, 100);
        let m = CoordinateMapper::fit(frame.size(), (100, 100)).unwrap();
        assert_eq!(frame.preview(&m).dimensions(), (100, 50));
    }
}
