//! Configuration parsing and management for Neckline

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};
use crate::pose::PoseParams;
use crate::transform::GestureLimits;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pose: PoseParams,
    pub gesture: GestureLimits,
    pub assets: AssetConfig,
}

/// Where jewelry assets live and what they are called
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory the catalog paths are relative to
    pub root: PathBuf,
    /// Mesh id -> OBJ path
    pub meshes: BTreeMap<String, PathBuf>,
    /// Image id -> PNG/JPEG path
    pub images: BTreeMap<String, PathBuf>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        let meshes = [
            ("necklace", "models/necklace/11777_necklace_v1_l3.obj"),
            ("necklace1", "models/necklace1/necklace1.obj"),
            ("necklace2", "models/necklace2/necklace2.obj"),
            ("chain", "models/chain/11779_blueheart_v1_L3.obj"),
            ("simplechain", "models/simplechain/simple_chain_new.obj"),
            ("ring", "models/ring/sample_ring.obj"),
        ];
        let images = [
            ("necklace", "images/necklace/11777_necklace_v1_l3.png"),
            ("chain", "images/chain/11779_blueheart_diffuse.png"),
            ("pendant", "images/necklace/11777_necklace_v1_l3.png"),
        ];

        Self {
            root: PathBuf::from("assets"),
            meshes: meshes
                .iter()
                .map(|(id, path)| (id.to_string(), PathBuf::from(path)))
                .collect(),
            images: images
                .iter()
                .map(|(id, path)| (id.to_string(), PathBuf::from(path)))
                .collect(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self> {
        let paths = [
            PathBuf::from("neckline.toml"),
            PathBuf::from("config/neckline.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let pose = &self.pose;
        let positive = [
            ("pose.reference_face_px", pose.reference_face_px),
            ("pose.scale_multiplier", pose.scale_multiplier),
            ("pose.image_width_ratio", pose.image_width_ratio),
            ("gesture.min_scale", self.gesture.min_scale),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, "must be a positive number"));
            }
        }

        let non_negative = [
            ("pose.neck_drop_ratio", pose.neck_drop_ratio),
            ("pose.box_neck_offset_px", pose.box_neck_offset_px),
            ("pose.box_neck_length_px", pose.box_neck_length_px),
            ("pose.min_face_area", pose.min_face_area),
            ("pose.image_overlap_ratio", pose.image_overlap_ratio),
            ("pose.outline_width_ratio", pose.outline_width_ratio),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, "must be zero or greater"));
            }
        }

        if pose.outline_points < 3 {
            return Err(invalid("pose.outline_points", "needs at least 3 points"));
        }

        if !(self.gesture.max_scale.is_finite() && self.gesture.max_scale > self.gesture.min_scale) {
            return Err(invalid(
                "gesture.max_scale",
                "must be greater than gesture.min_scale",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> Error {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}
