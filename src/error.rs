//! Error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::geometry::ImageBounds;
use crate::pipeline::{Anchor, CropEntity, CropStage, PipelineState};

/// A rule violated by a submitted crop rectangle.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("crop rectangle needs to be either empty or four non-negative integers separated by comma")]
    Format,

    #[error("the first two values need to describe the upper left corner of the crop rectangle")]
    Ordering,

    #[error("the crop rectangle needs to be within the image boundaries")]
    Bounds,

    #[error("the focal point needs to be inside the crop rectangle")]
    FocalPointOutside,

    #[error("focal point needs to be two percentages between 0 and 100 separated by comma")]
    FocalPointFormat,
}

/// Every rule a submitted rectangle violated, in check order. Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub(crate) fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        (!errors.is_empty()).then_some(Self(errors))
    }

    pub(crate) fn single(error: ValidationError) -> Self {
        Self(vec![error])
    }

    pub(crate) fn with(mut self, error: ValidationError) -> Self {
        self.0.push(error);
        self
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn contains(&self, error: &ValidationError) -> bool {
        self.0.contains(error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Failure reported by the raster primitive.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("region {x},{y} {width}x{height} lies outside the {bounds} image")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        bounds: ImageBounds,
    },

    #[error("zero-sized region {width}x{height}")]
    EmptyRegion { width: u32, height: u32 },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(
        "{stage} failed using the {toolkit} toolkit on {path} ({mime_type}, {dimensions}{})",
        anchor_suffix(.anchor)
    )]
    RasterPrimitive {
        stage: CropStage,
        toolkit: String,
        path: String,
        mime_type: String,
        dimensions: ImageBounds,
        anchor: Option<Anchor>,
        #[source]
        source: RasterError,
    },
}

fn anchor_suffix(anchor: &Option<Anchor>) -> String {
    anchor.map(|a| format!(", anchor: {a}")).unwrap_or_default()
}

/// A pipeline invocation that stopped in the `Failed` state.
///
/// `crop` is the entity as it was when the failing step started; it is never
/// persisted.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PipelineFailure {
    #[source]
    pub error: PipelineError,
    pub crop: CropEntity,
    pub history: Vec<PipelineState>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access crop store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("crop store {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Why an edit could not be saved.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid target size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("crop type must not be empty")]
    EmptyCropType,

    #[error("invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },
}

pub type StoreResult<T> = Result<T, StoreError>;
