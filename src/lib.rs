//! Focal point aware cropping.
//!
//! An editor draws a crop rectangle around the subject of an image and picks a
//! focal point inside it. Both are stored on a crop entity and applied later
//! by [`FocusAwarePipeline`]: first a manual pre-crop to the rectangle, then a
//! proportional scale-and-crop around the focal point.

pub mod config;
pub mod constraint;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod raster;
pub mod session;
pub mod store;

pub use config::{EffectConfig, SessionConfig};
pub use constraint::{normalize_drag, parse_and_validate, validate_fields};
pub use error::{
    ConfigError, PipelineError, PipelineFailure, RasterError, SaveError, StoreError,
    ValidationError, ValidationErrors,
};
pub use geometry::{
    CoordinateMapper, DisplayedRect, FocalPoint, ImageBounds, Point, Rectangle, Size,
    rectangle_to_field,
};
pub use pipeline::{
    Anchor, CropEntity, CropOutcome, CropStage, CropStore, FocalPointScaleAndCrop,
    FocusAwarePipeline, PipelineState, ScaleAndCrop,
};
pub use raster::{ImageHandle, RasterImage};
pub use session::{CropEventHandler, InteractiveCropSession, RectangleView};
pub use store::JsonCropStore;

/// Fills the editor fields for `source_path` from its stored crop entity:
/// the rectangle joined by commas and the focal offset as percentages.
///
/// Returns `None` when nothing is stored for the image.
pub fn load_fields(
    store: &impl CropStore,
    source_path: &str,
    crop_type: &str,
    bounds: ImageBounds,
) -> Option<(String, String)> {
    let crop = store.find_crop(source_path, crop_type)?;
    let (x, y) = crop.offset();
    let focal = FocalPoint::from_logical(Point::new(x as f64, y as f64), bounds);
    Some((rectangle_to_field(crop.rectangle()), focal.to_field()))
}

/// Validates the editor fields and, if they pass, stores the focal point and
/// rectangle on the crop entity for `source_path`.
pub fn save_fields(
    store: &mut impl CropStore,
    source_path: &str,
    config: &EffectConfig,
    bounds: ImageBounds,
    rect_field: &str,
    focal_field: &str,
) -> Result<CropEntity, SaveError> {
    let (rectangle, focal) = validate_fields(rect_field, focal_field, bounds)?;
    let real = focal.to_logical(bounds);
    let (x, y) = (real.x.round() as i64, real.y.round() as i64);

    let mut crop = match store.find_crop(source_path, &config.crop_type) {
        Some(crop) => crop,
        None => store.create_crop(&config.crop_type, x, y, config.width, config.height),
    };
    crop.set_offset(x, y);
    crop.set_rectangle(rectangle);
    store.save_crop(source_path, crop.clone())?;
    Ok(crop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_fields_load_back() {
        let mut store = JsonCropStore::in_memory();
        let bounds = ImageBounds::new(800, 600);
        let config = EffectConfig::default();

        let crop = save_fields(
            &mut store,
            "photo.jpg",
            &config,
            bounds,
            "100,100,500,500",
            "50,50",
        )
        .unwrap();
        assert_eq!(crop.offset(), (400, 300));
        assert_eq!(crop.rectangle(), Some(Rectangle::new(100, 100, 500, 500)));

        let (rect, focal) = load_fields(&store, "photo.jpg", "focal_point", bounds).unwrap();
        assert_eq!(rect, "100,100,500,500");
        assert_eq!(focal, "50,50");
    }

    #[test]
    fn invalid_fields_are_not_saved() {
        let mut store = JsonCropStore::in_memory();
        let result = save_fields(
            &mut store,
            "photo.jpg",
            &EffectConfig::default(),
            ImageBounds::new(100, 100),
            "10,10,5,5",
            "50,50",
        );
        let Err(SaveError::Invalid(errors)) = result else {
            panic!("expected validation errors");
        };
        assert!(errors.contains(&ValidationError::Ordering));
        assert!(errors.contains(&ValidationError::FocalPointOutside));
        assert!(store.is_empty());
    }

    #[test]
    fn unreadable_focal_point_is_not_saved() {
        let mut store = JsonCropStore::in_memory();
        let bounds = ImageBounds::new(800, 600);
        let config = EffectConfig::default();

        for focal in ["garbage", "150,-20", ""] {
            let result = save_fields(
                &mut store,
                "photo.jpg",
                &config,
                bounds,
                "100,100,500,500",
                focal,
            );
            let Err(SaveError::Invalid(errors)) = result else {
                panic!("expected {focal:?} to be rejected");
            };
            assert_eq!(errors.errors(), &[ValidationError::FocalPointFormat]);
        }

        let result = save_fields(&mut store, "photo.jpg", &config, bounds, "", "150,-20");
        assert!(matches!(result, Err(SaveError::Invalid(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn empty_rectangle_clears_stored_one() {
        let mut store = JsonCropStore::in_memory();
        let bounds = ImageBounds::new(100, 100);
        let config = EffectConfig::default();
        save_fields(&mut store, "a.png", &config, bounds, "0,0,60,60", "50,50").unwrap();
        let crop = save_fields(&mut store, "a.png", &config, bounds, "", "50,50").unwrap();
        assert_eq!(crop.rectangle(), None);
        assert_eq!(
            load_fields(&store, "a.png", "focal_point", bounds),
            Some((String::new(), "50,50".to_string()))
        );
    }
}
