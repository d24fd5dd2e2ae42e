use anyhow::{anyhow, Result};
use image::Rgb;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::annotate::{BoxStyle, DEFAULT_THICKNESS};
use crate::cascade::ScanParams;
use crate::detect::Profile;

const DEFAULT_WAIT_MS: u64 = 1;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct WatchConfigFile {
    video: Option<String>,
    profile: Option<Profile>,
    cascade: Option<PathBuf>,
    wait_ms: Option<u64>,
    scan: Option<ScanConfigFile>,
    style: Option<StyleConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ScanConfigFile {
    scale_factor: Option<f64>,
    min_neighbors: Option<u32>,
    min_size: Option<[u32; 2]>,
    max_size: Option<[u32; 2]>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct StyleConfigFile {
    thickness: Option<u32>,
    color: Option<[u8; 3]>,
}

/// Resolved settings for a detection run: file, then environment, then CLI flags.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub video: Option<String>,
    pub profile: Profile,
    /// Explicit cascade path; the profile's default is used when unset.
    pub cascade: Option<PathBuf>,
    pub scan: ScanParams,
    pub thickness: u32,
    /// Explicit box color; the profile's color is used when unset.
    pub color: Option<Rgb<u8>>,
    pub wait: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            video: None,
            profile: Profile::default(),
            cascade: None,
            scan: ScanParams::default(),
            thickness: DEFAULT_THICKNESS,
            color: None,
            wait: Duration::from_millis(DEFAULT_WAIT_MS),
        }
    }
}

impl WatchConfig {
    /// Load from `$HAARWATCH_CONFIG` (if set) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HAARWATCH_CONFIG").ok();
        let config_path = config_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .map(Path::new);
        Self::load_from(config_path)
    }

    /// Load from an explicit config file (if any) and apply environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatchConfigFile) -> Self {
        let defaults = Self::default();
        let scan = file.scan.unwrap_or_default();
        let style = file.style.unwrap_or_default();
        Self {
            video: file.video,
            profile: file.profile.unwrap_or(defaults.profile),
            cascade: file.cascade,
            scan: ScanParams {
                scale_factor: scan.scale_factor.unwrap_or(defaults.scan.scale_factor),
                min_neighbors: scan.min_neighbors.unwrap_or(defaults.scan.min_neighbors),
                min_size: scan.min_size.map(|[w, h]| (w, h)),
                max_size: scan.max_size.map(|[w, h]| (w, h)),
            },
            thickness: style.thickness.unwrap_or(defaults.thickness),
            color: style.color.map(Rgb),
            wait: file
                .wait_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.wait),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(video) = std::env::var("HAARWATCH_VIDEO") {
            if !video.trim().is_empty() {
                self.video = Some(video);
            }
        }
        if let Ok(cascade) = std::env::var("HAARWATCH_CASCADE") {
            if !cascade.trim().is_empty() {
                self.cascade = Some(PathBuf::from(cascade));
            }
        }
        if let Ok(profile) = std::env::var("HAARWATCH_PROFILE") {
            if !profile.trim().is_empty() {
                self.profile = profile.parse()?;
            }
        }
        if let Ok(factor) = std::env::var("HAARWATCH_SCALE_FACTOR") {
            self.scan.scale_factor = factor
                .trim()
                .parse()
                .map_err(|_| anyhow!("HAARWATCH_SCALE_FACTOR must be a number"))?;
        }
        if let Ok(neighbors) = std::env::var("HAARWATCH_MIN_NEIGHBORS") {
            self.scan.min_neighbors = neighbors
                .trim()
                .parse()
                .map_err(|_| anyhow!("HAARWATCH_MIN_NEIGHBORS must be a non-negative integer"))?;
        }
        if let Ok(wait) = std::env::var("HAARWATCH_WAIT_MS") {
            let ms: u64 = wait
                .trim()
                .parse()
                .map_err(|_| anyhow!("HAARWATCH_WAIT_MS must be an integer number of milliseconds"))?;
            self.wait = Duration::from_millis(ms);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.scan.validate()?;
        if self.thickness == 0 {
            return Err(anyhow!("thickness must be at least 1"));
        }
        if self.wait < Duration::from_millis(1) {
            return Err(anyhow!("wait must be at least 1 ms"));
        }
        Ok(())
    }

    /// Cascade file to load: the explicit path, or the profile's default.
    pub fn cascade_path(&self) -> PathBuf {
        self.cascade
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.profile.default_cascade()))
    }

    pub fn style(&self) -> BoxStyle {
        BoxStyle::new(
            self.color.unwrap_or_else(|| self.profile.color()),
            self.thickness,
        )
    }
}

fn read_config_file(path: &Path) -> Result<WatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
