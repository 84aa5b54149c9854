use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use worldcell_common::PerceptionMask;
use worldcell_perception::ScanConfig;
use worldcell_stream::{Grid, GridError};

/// Errors from loading or validating a [`PresenceConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("invalid grid: {0}")]
    Grid(#[from] GridError),
    #[error("scan interval must be positive and finite, got {0}s")]
    InvalidInterval(f64),
    #[error("max distance must be positive, got {0}")]
    InvalidMaxDistance(f32),
    #[error("at least one perception category is required")]
    NoCategories,
    #[error("perception category {0} has an empty mask")]
    EmptyCategory(usize),
    #[error("perception category {0} is listed twice")]
    DuplicateCategory(PerceptionMask),
}

/// Grid dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    pub cell_size: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 8,
            height: 8,
            cell_size: 10.0,
        }
    }
}

/// Vision scan scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Seconds between scans (0.25 = 4 Hz).
    pub interval_secs: f64,
    pub max_distance: f32,
    pub use_cell_based_scanning: bool,
    /// Category bitmasks, one spatial query each per scan.
    pub categories: Vec<PerceptionMask>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            interval_secs: 0.25,
            max_distance: 100.0,
            use_cell_based_scanning: true,
            categories: PerceptionMask::DEFAULT_CATEGORIES.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Per-axis key for marker position encoding.
    pub key: Vec3,
}

/// Top-level presence configuration. Every section and field is optional
/// in the file; missing values take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub grid: GridConfig,
    pub vision: VisionConfig,
    pub markers: MarkerConfig,
}

impl PresenceConfig {
    /// Load from a `.yaml`, `.yml` or `.json` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path)?;
        let config = match format {
            Format::Yaml => Self::from_yaml_str(&content)?,
            Format::Json => Self::from_json_str(&content)?,
        };
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Write to a `.yaml`, `.yml` or `.json` file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = match Format::of(path)? {
            Format::Yaml => serde_yaml::to_string(self)?,
            Format::Json => serde_json::to_string_pretty(self)?,
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn grid(&self) -> Result<Grid, ConfigError> {
        Ok(Grid::new(
            self.grid.width,
            self.grid.height,
            self.grid.cell_size,
        )?)
    }

    pub fn scan_config(&self) -> Result<ScanConfig, ConfigError> {
        let v = &self.vision;
        if !v.interval_secs.is_finite() || v.interval_secs <= 0.0 {
            return Err(ConfigError::InvalidInterval(v.interval_secs));
        }
        let interval = Duration::try_from_secs_f64(v.interval_secs)
            .map_err(|_| ConfigError::InvalidInterval(v.interval_secs))?;
        if v.max_distance.is_nan() || v.max_distance <= 0.0 {
            return Err(ConfigError::InvalidMaxDistance(v.max_distance));
        }
        if v.categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        let mut seen = BTreeSet::new();
        for (i, &category) in v.categories.iter().enumerate() {
            if category.is_empty() {
                return Err(ConfigError::EmptyCategory(i));
            }
            if !seen.insert(category) {
                return Err(ConfigError::DuplicateCategory(category));
            }
        }
        Ok(ScanConfig {
            interval,
            max_distance: v.max_distance,
            use_cell_based_scanning: v.use_cell_based_scanning,
            categories: v.categories.clone(),
        })
    }

    pub fn marker_key(&self) -> Vec3 {
        self.markers.key
    }

    /// Check every section without building anything else.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid()?;
        self.scan_config()?;
        Ok(())
    }
}

enum Format {
    Yaml,
    Json,
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}
