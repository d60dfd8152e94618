use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Title shown on the drop window; the current color is appended.
    pub window_title: String,
    /// Initial logical window width.
    pub window_width: u32,
    /// Initial logical window height.
    pub window_height: u32,
    /// Files created in (or moved into) this directory count as drops.
    pub drop_directory: Option<PathBuf>,
    /// Quiet time before a file in the drop directory is treated as complete.
    #[serde(with = "humantime_serde")]
    pub drop_settle: Duration,
    /// Dropped files larger than this are rejected before decoding.
    pub max_file_bytes: u64,
    /// Maximum number of decodes running at once.
    pub max_concurrent_decodes: usize,
    /// Longest side of the displayed preview; the reduction always uses full
    /// resolution.
    pub preview_max_dimension: u32,
    /// Fraction of the window kept free around the preview.
    pub preview_margin: f32,
    /// How much the background darkens while a drag hovers the window.
    pub drag_over_dim: f32,
    /// One revolution of the loading spinner.
    #[serde(with = "humantime_serde")]
    pub spinner_period: Duration,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.window_width > 0 && self.window_height > 0,
            "window-width and window-height must be greater than zero"
        );
        ensure!(
            self.max_file_bytes > 0,
            "max-file-bytes must be greater than zero"
        );
        ensure!(
            self.max_concurrent_decodes > 0,
            "max-concurrent-decodes must be greater than zero"
        );
        ensure!(
            self.preview_max_dimension > 0,
            "preview-max-dimension must be greater than zero"
        );
        ensure!(
            (0.0..0.5).contains(&self.preview_margin),
            "preview-margin must be within [0, 0.5)"
        );
        ensure!(
            (0.0..=1.0).contains(&self.drag_over_dim),
            "drag-over-dim must be within [0, 1]"
        );
        ensure!(
            !self.spinner_period.is_zero(),
            "spinner-period must be greater than zero"
        );
        if let Some(dir) = &self.drop_directory {
            ensure!(
                dir.is_dir(),
                "drop-directory {} is not a directory",
                dir.display()
            );
        }
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            window_title: "drop-tint".to_string(),
            window_width: 800,
            window_height: 600,
            drop_directory: None,
            drop_settle: Duration::from_millis(250),
            max_file_bytes: 64 * 1024 * 1024,
            max_concurrent_decodes: 2,
            preview_max_dimension: 2048,
            preview_margin: 0.1,
            drag_over_dim: 0.2,
            spinner_period: Duration::from_millis(900),
        }
    }
}
