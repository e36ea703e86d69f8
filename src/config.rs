//! Effect and session configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry::ImageBounds;

/// Target of the final scale-and-crop plus the crop type used to look up
/// the stored crop entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_crop_type")]
    pub crop_type: String,
}

fn default_crop_type() -> String {
    "focal_point".to_string()
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            width: 200,
            height: 200,
            crop_type: default_crop_type(),
        }
    }
}

impl EffectConfig {
    pub fn new(width: u32, height: u32, crop_type: impl Into<String>) -> Self {
        Self {
            width,
            height,
            crop_type: crop_type.into(),
        }
    }

    /// Create config from environment variables, falling back to defaults for
    /// unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let dimension = |name: &'static str, default: u32| match lookup(name) {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidEnv { name, value }),
            None => Ok(default),
        };
        let config = Self {
            width: dimension("FOCAL_CROP_WIDTH", defaults.width)?,
            height: dimension("FOCAL_CROP_HEIGHT", defaults.height)?,
            crop_type: lookup("FOCAL_CROP_TYPE").unwrap_or(defaults.crop_type),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidSize {
                width: self.width,
                height: self.height,
            });
        }
        if self.crop_type.trim().is_empty() {
            return Err(ConfigError::EmptyCropType);
        }
        Ok(())
    }

    pub fn target(&self) -> ImageBounds {
        ImageBounds::new(self.width, self.height)
    }
}

/// Logical bounds of the image being edited, injected when a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub width: u32,
    pub height: u32,
}

impl SessionConfig {
    pub fn from_image(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn bounds(&self) -> ImageBounds {
        ImageBounds::new(self.width, self.height)
    }
}
