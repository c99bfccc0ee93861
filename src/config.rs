use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Raw dataset location and time sampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub root: PathBuf,
    pub time_steps: usize,
    pub delta_t: f64, // Time between snapshots
}

impl DatasetConfig {
    fn validate(&self) -> Result<()> {
        if self.time_steps == 0 {
            return Err(anyhow!("time_steps must be positive"));
        }
        if !(self.delta_t.is_finite() && self.delta_t > 0.0) {
            return Err(anyhow!("delta_t must be positive, got {}", self.delta_t));
        }
        Ok(())
    }
}

/// Crop and pool stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownsampleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for DownsampleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

/// Train / validation / test proportions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default = "default_proportions")]
    pub proportions: [f64; 3],
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            proportions: default_proportions(),
        }
    }
}

fn default_proportions() -> [f64; 3] {
    [0.7, 0.15, 0.15]
}

impl SplitConfig {
    fn validate(&self) -> Result<()> {
        if self.proportions.iter().any(|p| !p.is_finite()) {
            return Err(anyhow!(
                "split proportions must be finite, got {:?}",
                self.proportions
            ));
        }
        let total: f64 = self.proportions.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            // Allowed, but some splits may come out empty or cases unused
            log::warn!(
                "Split proportions {:?} sum to {}, not 1",
                self.proportions,
                total
            );
        }
        Ok(())
    }
}

/// Where prepared artefacts go
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constants_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_dir: Option<PathBuf>,
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
}

fn default_image_width() -> u32 {
    900
}

fn default_image_height() -> u32 {
    800
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.image_width == 0 || self.image_height == 0 {
            return Err(anyhow!(
                "Image dimensions must be positive (width={}, height={})",
                self.image_width,
                self.image_height
            ));
        }
        Ok(())
    }
}

/// Complete preparation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub downsample: DownsampleConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let mut config = Self::from_toml(&content)?;

        // Relative paths resolve against the config file
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.dataset.root);
        if let Some(p) = self.output.constants_path.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.output.preview_dir.as_mut() {
            resolve(p);
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.dataset.validate()?;
        self.split.validate()?;
        self.output.validate()?;
        Ok(())
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        log::info!("=== Preparation Configuration ===");
        log::info!(
            "Dataset: {} ({} time steps, delta_t={})",
            self.dataset.root.display(),
            self.dataset.time_steps,
            self.dataset.delta_t
        );
        log::info!(
            "Downsample: {}",
            if self.downsample.enabled { "on" } else { "off" }
        );
        log::info!("Split: {:?}", self.split.proportions);
        if let Some(path) = &self.output.constants_path {
            log::info!("Constants: {}", path.display());
        }
        if let Some(dir) = &self.output.preview_dir {
            log::info!(
                "Previews: {} at {}x{}",
                dir.display(),
                self.output.image_width,
                self.output.image_height
            );
        }
    }
}
