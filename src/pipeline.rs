//! Focus-aware scale and crop.
//!
//! The pipeline resolves the crop entity stored for an image, optionally
//! pre-crops to the editor's manual rectangle, rebases the focal offset onto
//! the pre-cropped image and hands over to a [`ScaleAndCrop`] step that only
//! ever sees the already pre-cropped image.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::EffectConfig;
use crate::error::{PipelineError, PipelineFailure, RasterError, StoreResult};
use crate::geometry::{ImageBounds, Rectangle};
use crate::raster::RasterImage;

/// Crop record kept by the persistence layer for one image and crop type.
///
/// `(x, y)` is the focal offset in pixels of the image it was stored against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropEntity {
    pub crop_type: String,
    x: i64,
    y: i64,
    width: u32,
    height: u32,
    #[serde(default)]
    focus_rect: Option<Rectangle>,
}

impl CropEntity {
    pub fn new(crop_type: impl Into<String>, x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            crop_type: crop_type.into(),
            x,
            y,
            width,
            height,
            focus_rect: None,
        }
    }

    pub fn offset(&self) -> (i64, i64) {
        (self.x, self.y)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_offset(&mut self, x: i64, y: i64) {
        self.x = x;
        self.y = y;
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// The manual crop rectangle, `None` when the editor left it empty.
    pub fn rectangle(&self) -> Option<Rectangle> {
        self.focus_rect
    }

    pub fn set_rectangle(&mut self, rectangle: Option<Rectangle>) {
        self.focus_rect = rectangle;
    }

    pub fn with_rectangle(mut self, rectangle: Option<Rectangle>) -> Self {
        self.focus_rect = rectangle;
        self
    }
}

/// Persistence collaborator for crop entities.
pub trait CropStore {
    fn find_crop(&self, source_path: &str, crop_type: &str) -> Option<CropEntity>;

    /// Builds a new, unsaved entity.
    fn create_crop(&self, crop_type: &str, x: i64, y: i64, width: u32, height: u32) -> CropEntity {
        CropEntity::new(crop_type, x, y, width, height)
    }

    fn save_crop(&mut self, source_path: &str, crop: CropEntity) -> StoreResult<()>;
}

/// Raster step a failure happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropStage {
    PreCrop,
    Resize,
    FinalCrop,
}

impl fmt::Display for CropStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CropStage::PreCrop => "focal point focus pre-crop",
            CropStage::Resize => "focal point scale",
            CropStage::FinalCrop => "focal point scale and crop",
        })
    }
}

/// Top-left corner of the final crop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: i64,
    pub y: i64,
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    CropEntityResolved,
    PreCropped,
    NoPreCrop,
    OffsetAdjusted,
    FinalCropped,
    Done,
    Failed,
}

fn raster_failure(
    stage: CropStage,
    image: &dyn RasterImage,
    anchor: Option<Anchor>,
    source: RasterError,
) -> PipelineError {
    let dimensions = image.bounds();
    error!(
        stage = %stage,
        toolkit = image.toolkit_id(),
        path = image.source_path(),
        mime_type = image.mime_type(),
        dimensions = %dimensions,
        anchor = ?anchor,
        error = %source,
        "raster primitive failed"
    );
    PipelineError::RasterPrimitive {
        stage,
        toolkit: image.toolkit_id().to_string(),
        path: image.source_path().to_string(),
        mime_type: image.mime_type().to_string(),
        dimensions,
        anchor,
        source,
    }
}

/// Proportional scale-and-crop around a crop entity's focal offset.
pub trait ScaleAndCrop {
    fn apply(&self, image: &mut dyn RasterImage, crop: &CropEntity) -> Result<Anchor, PipelineError>;
}

/// Scales the image to cover the target size, then crops exactly the target
/// size, keeping the focal offset as close to the centre as the image allows.
#[derive(Clone, Copy, Debug)]
pub struct FocalPointScaleAndCrop {
    pub target: ImageBounds,
}

impl FocalPointScaleAndCrop {
    /// Smallest size keeping the aspect ratio that covers `target`.
    pub fn calculate_resize(image: ImageBounds, target: ImageBounds) -> ImageBounds {
        if image.width == 0 || image.height == 0 {
            return target;
        }
        let (w, h) = (u64::from(image.width), u64::from(image.height));
        let (tw, th) = (u64::from(target.width), u64::from(target.height));
        // compare tw/w against th/h without going through floats
        let scaled = |extent: u64, numerator: u64, denominator: u64| {
            u32::try_from((extent * numerator).div_ceil(denominator)).unwrap_or(u32::MAX)
        };
        if tw * h > th * w {
            ImageBounds::new(target.width, scaled(h, tw, w))
        } else {
            ImageBounds::new(scaled(w, th, h), target.height)
        }
    }

    /// Anchor for a `target` crop of an `image_size` image, given a crop whose
    /// offset was recorded against an image of `original_size`.
    pub fn calculate_anchor(
        image_size: ImageBounds,
        crop: &CropEntity,
        original_size: ImageBounds,
        target: ImageBounds,
    ) -> Anchor {
        let (x, y) = crop.offset();
        let scale = |value: i64, from: u32, to: u32| -> f64 {
            if from == 0 {
                value as f64
            } else {
                (value as f64 / f64::from(from) * f64::from(to)).round()
            }
        };
        let focal_x = scale(x, original_size.width, image_size.width);
        let focal_y = scale(y, original_size.height, image_size.height);

        let constrain = |focal: f64, extent: u32, size: u32| -> i64 {
            let anchor = (focal - f64::from(size) / 2.0).round() as i64;
            let max = i64::from(extent) - i64::from(size);
            anchor.min(max).max(0)
        };
        Anchor {
            x: constrain(focal_x, image_size.width, target.width),
            y: constrain(focal_y, image_size.height, target.height),
        }
    }
}

impl ScaleAndCrop for FocalPointScaleAndCrop {
    fn apply(&self, image: &mut dyn RasterImage, crop: &CropEntity) -> Result<Anchor, PipelineError> {
        let original_size = image.bounds();
        let resized = Self::calculate_resize(original_size, self.target);
        if resized != original_size {
            if let Err(e) = image.resize(resized.width, resized.height) {
                return Err(raster_failure(CropStage::Resize, image, None, e));
            }
        }

        let anchor = Self::calculate_anchor(image.bounds(), crop, original_size, self.target);
        if let Err(e) = image.crop(anchor.x, anchor.y, self.target.width, self.target.height) {
            return Err(raster_failure(CropStage::FinalCrop, image, Some(anchor), e));
        }
        Ok(anchor)
    }
}

fn transition(history: &mut Vec<PipelineState>, state: PipelineState) {
    debug!(?state, "crop pipeline transition");
    history.push(state);
}

/// Result of a successful pipeline invocation.
#[derive(Debug)]
pub struct CropOutcome {
    pub crop: CropEntity,
    pub anchor: Anchor,
    pub history: Vec<PipelineState>,
}

/// Pre-crops to the stored manual rectangle before delegating to a
/// [`ScaleAndCrop`] step.
pub struct FocusAwarePipeline<'a, S, P = FocalPointScaleAndCrop> {
    store: &'a S,
    config: EffectConfig,
    scale_and_crop: P,
}

impl<'a, S: CropStore> FocusAwarePipeline<'a, S> {
    pub fn new(store: &'a S, config: EffectConfig) -> Self {
        let scale_and_crop = FocalPointScaleAndCrop {
            target: config.target(),
        };
        Self {
            store,
            config,
            scale_and_crop,
        }
    }
}

impl<'a, S: CropStore, P: ScaleAndCrop> FocusAwarePipeline<'a, S, P> {
    pub fn with_scale_and_crop(store: &'a S, config: EffectConfig, scale_and_crop: P) -> Self {
        Self {
            store,
            config,
            scale_and_crop,
        }
    }

    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    /// Finds the stored crop for `image`, or creates a centred one sized to
    /// the target.
    pub fn resolve_crop(&self, image: &dyn RasterImage) -> CropEntity {
        let (width, height) = (self.config.width, self.config.height);
        let crop_type = self.config.crop_type.as_str();
        match self.store.find_crop(image.source_path(), crop_type) {
            Some(mut crop) => {
                crop.set_size(width, height);
                crop
            }
            None => {
                let x = (f64::from(image.width()) / 2.0).round() as i64;
                let y = (f64::from(image.height()) / 2.0).round() as i64;
                self.store.create_crop(crop_type, x, y, width, height)
            }
        }
    }

    /// Crops to the entity's manual rectangle, if it has one.
    pub fn pre_crop(
        &self,
        image: &mut dyn RasterImage,
        crop: &CropEntity,
    ) -> Result<Option<Rectangle>, PipelineError> {
        let Some(rect) = crop.rectangle() else {
            return Ok(None);
        };
        let (x, y) = (i64::from(rect.x1), i64::from(rect.y1));
        match image.crop(x, y, rect.width(), rect.height()) {
            Ok(()) => Ok(Some(rect)),
            Err(e) => Err(raster_failure(CropStage::PreCrop, image, None, e)),
        }
    }

    /// Moves the focal offset into the coordinate space of the pre-cropped
    /// image.
    pub fn adjust_offset(mut crop: CropEntity, pre_crop: Rectangle) -> CropEntity {
        let (x, y) = crop.offset();
        crop.set_offset(x - i64::from(pre_crop.x1), y - i64::from(pre_crop.y1));
        crop
    }

    pub fn apply_effect(
        &self,
        image: &mut dyn RasterImage,
    ) -> Result<CropOutcome, PipelineFailure> {
        let mut history = vec![PipelineState::Start];

        let crop = self.resolve_crop(image);
        transition(&mut history, PipelineState::CropEntityResolved);

        let crop = match self.pre_crop(image, &crop) {
            Ok(Some(rect)) => {
                transition(&mut history, PipelineState::PreCropped);
                Self::adjust_offset(crop, rect)
            }
            Ok(None) => {
                transition(&mut history, PipelineState::NoPreCrop);
                crop
            }
            Err(error) => {
                transition(&mut history, PipelineState::Failed);
                return Err(PipelineFailure {
                    error,
                    crop,
                    history,
                });
            }
        };
        transition(&mut history, PipelineState::OffsetAdjusted);

        match self.scale_and_crop.apply(image, &crop) {
            Ok(anchor) => {
                transition(&mut history, PipelineState::FinalCropped);
                transition(&mut history, PipelineState::Done);
                info!(
                    path = image.source_path(),
                    crop_type = %self.config.crop_type,
                    anchor = %anchor,
                    dimensions = %image.bounds(),
                    "focal point focus scale and crop applied"
                );
                Ok(CropOutcome {
                    crop,
                    anchor,
                    history,
                })
            }
            Err(error) => {
                transition(&mut history, PipelineState::Failed);
                Err(PipelineFailure {
                    error,
                    crop,
                    history,
                })
            }
        }
    }
}
