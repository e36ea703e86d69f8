//! Raster toolkit seam used by the crop pipeline.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, imageops::FilterType};

use crate::error::RasterError;
use crate::geometry::ImageBounds;

/// An image handle the pipeline can crop and resize in place.
pub trait RasterImage {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn source_path(&self) -> &str;
    fn mime_type(&self) -> &str;
    fn toolkit_id(&self) -> &str;

    /// Crops to the `width` x `height` region whose top-left corner is `(x, y)`.
    fn crop(&mut self, x: i64, y: i64, width: u32, height: u32) -> Result<(), RasterError>;

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RasterError>;

    fn bounds(&self) -> ImageBounds {
        ImageBounds::new(self.width(), self.height())
    }
}

/// [`RasterImage`] backed by the `image` crate.
pub struct ImageHandle {
    image: DynamicImage,
    source: String,
    format: Option<ImageFormat>,
}

impl ImageHandle {
    pub const TOOLKIT: &'static str = "image-rs";

    pub fn open(path: impl AsRef<Path>) -> Result<Self, RasterError> {
        let path = path.as_ref();
        let format = ImageFormat::from_path(path).ok();
        let image = image::open(path)?;
        Ok(Self {
            image,
            source: path.to_string_lossy().into_owned(),
            format,
        })
    }

    pub fn from_image(image: DynamicImage, source: impl Into<String>) -> Self {
        let source = source.into();
        let format = ImageFormat::from_path(PathBuf::from(&source)).ok();
        Self {
            image,
            source,
            format,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RasterError> {
        self.image.save(path)?;
        Ok(())
    }
}

impl RasterImage for ImageHandle {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn source_path(&self) -> &str {
        &self.source
    }

    fn mime_type(&self) -> &str {
        self.format
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream")
    }

    fn toolkit_id(&self) -> &str {
        Self::TOOLKIT
    }

    fn crop(&mut self, x: i64, y: i64, width: u32, height: u32) -> Result<(), RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::EmptyRegion { width, height });
        }
        let bounds = self.bounds();
        let out_of_bounds = || RasterError::OutOfBounds {
            x,
            y,
            width,
            height,
            bounds,
        };
        let (Ok(left), Ok(top)) = (u32::try_from(x), u32::try_from(y)) else {
            return Err(out_of_bounds());
        };
        let fits = |start: u32, extent: u32, limit: u32| {
            start.checked_add(extent).is_some_and(|end| end <= limit)
        };
        if !fits(left, width, bounds.width) || !fits(top, height, bounds.height) {
            return Err(out_of_bounds());
        }

        self.image = self.image.crop_imm(left, top, width, height);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::EmptyRegion { width, height });
        }
        self.image = self.image.resize_exact(width, height, FilterType::Triangle);
        Ok(())
    }
}
