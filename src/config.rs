// src/config.rs

use crate::lane_geometry::DEFAULT_HORIZON_RATIO;
use crate::selection::MissingDetection;
use crate::types::Bgr;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Overrides layered on top of the selected preset. `hough` and `style`
    /// merge key by key; every other key replaces the preset value.
    pub circle: Option<Mapping>,
    pub lanes: LaneConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.circle.is_some() {
            for preset in CirclePreset::ALL {
                self.circle_for(preset).context("circle")?;
            }
        }
        self.lanes.validate().context("lanes")?;
        Ok(())
    }

    /// Circle settings for a run: the preset with the file's `circle`
    /// overrides applied.
    pub fn circle_for(&self, preset: CirclePreset) -> Result<CircleConfig> {
        let base = preset.config();
        let Some(overrides) = &self.circle else {
            return Ok(base);
        };

        let mut merged = serde_yaml::to_value(&base)?;
        if let Value::Mapping(target) = &mut merged {
            for (key, value) in overrides {
                if matches!(key.as_str(), Some("hough") | Some("style")) {
                    if let (Some(Value::Mapping(inner)), Value::Mapping(patch)) =
                        (target.get_mut(key), value)
                    {
                        for (k, v) in patch {
                            inner.insert(k.clone(), v.clone());
                        }
                        continue;
                    }
                }
                target.insert(key.clone(), value.clone());
            }
        }

        let config: CircleConfig = serde_yaml::from_value(merged)
            .with_context(|| format!("circle overrides for preset {:?}", preset))?;
        config
            .validate()
            .with_context(|| format!("circle overrides for preset {:?}", preset))?;
        Ok(config)
    }
}

// ============================================================================
// CIRCLES
// ============================================================================

/// A distance either fixed in pixels or relative to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extent {
    Pixels(i32),
    HeightFraction(f64),
    LongestSideFraction(f64),
}

impl Extent {
    pub fn resolve(self, width: i32, height: i32) -> i32 {
        match self {
            Extent::Pixels(px) => px,
            Extent::HeightFraction(f) => (height as f64 * f) as i32,
            Extent::LongestSideFraction(f) => (width.max(height) as f64 * f) as i32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlurConfig {
    Gaussian { kernel: i32, sigma: f64 },
    Median { kernel: i32 },
}

impl BlurConfig {
    fn kernel(&self) -> i32 {
        match *self {
            BlurConfig::Gaussian { kernel, .. } | BlurConfig::Median { kernel } => kernel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HoughCircleParams {
    /// Inverse accumulator resolution.
    pub dp: f64,
    pub min_dist: Extent,
    /// Upper Canny threshold.
    pub param1: f64,
    /// Accumulator threshold.
    pub param2: f64,
    pub min_radius: Extent,
    pub max_radius: Extent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircleStyle {
    pub ring_color: Bgr,
    pub ring_thickness: i32,
    pub center_color: Bgr,
    pub center_radius: i32,
    /// Negative fills the dot.
    pub center_thickness: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircleConfig {
    /// Scale so the longest side matches this before detecting.
    pub resize_max_dim: Option<i32>,
    pub blur: BlurConfig,
    pub hough: HoughCircleParams,
    /// Process every n-th frame of a stream.
    pub frame_stride: u32,
    pub on_missing: MissingDetection,
    pub style: CircleStyle,
    pub window_title: String,
    /// Key poll delay for streams; still images always wait for a key.
    pub key_delay_ms: i32,
    /// Logged when nothing is found under the skip policy.
    pub missing_hint: String,
}

impl CircleConfig {
    /// Top of a can in a still photo.
    pub fn can_top() -> Self {
        Self {
            resize_max_dim: Some(800),
            blur: BlurConfig::Median { kernel: 11 },
            hough: HoughCircleParams {
                dp: 1.2,
                min_dist: Extent::LongestSideFraction(0.5),
                param1: 50.0,
                param2: 40.0,
                min_radius: Extent::LongestSideFraction(0.25),
                max_radius: Extent::LongestSideFraction(0.5),
            },
            frame_stride: 1,
            on_missing: MissingDetection::Skip,
            style: CircleStyle {
                ring_color: Bgr::GREEN,
                ring_thickness: 4,
                center_color: Bgr::RED,
                center_radius: 5,
                center_thickness: -1,
            },
            window_title: "Corrected Detection".to_string(),
            key_delay_ms: 1,
            missing_hint: "No circle found. Try lowering param2 to 30.".to_string(),
        }
    }

    /// Bottom of a can in a still photo; a miss is fatal.
    pub fn can_bottom() -> Self {
        Self {
            resize_max_dim: None,
            blur: BlurConfig::Gaussian {
                kernel: 9,
                sigma: 2.0,
            },
            hough: HoughCircleParams {
                dp: 1.0,
                min_dist: Extent::HeightFraction(1.0),
                param1: 120.0,
                param2: 40.0,
                min_radius: Extent::HeightFraction(0.25),
                max_radius: Extent::HeightFraction(0.60),
            },
            frame_stride: 1,
            on_missing: MissingDetection::Fail,
            style: CircleStyle {
                ring_color: Bgr::CAN_GREEN,
                ring_thickness: 7,
                center_color: Bgr::CAN_GREEN,
                center_radius: 4,
                center_thickness: 5,
            },
            window_title: "Detected Soda Can Bottom".to_string(),
            key_delay_ms: 1,
            missing_hint: "No circles detected.".to_string(),
        }
    }

    /// A can rolling through a video, sampled every fifth frame.
    pub fn rolling_can() -> Self {
        Self {
            resize_max_dim: None,
            blur: BlurConfig::Gaussian {
                kernel: 9,
                sigma: 2.0,
            },
            hough: HoughCircleParams {
                dp: 1.2,
                min_dist: Extent::HeightFraction(0.5),
                param1: 120.0,
                param2: 80.0,
                min_radius: Extent::Pixels(90),
                max_radius: Extent::Pixels(105),
            },
            frame_stride: 5,
            on_missing: MissingDetection::Skip,
            style: CircleStyle {
                ring_color: Bgr::CAN_GREEN,
                ring_thickness: 4,
                center_color: Bgr::CAN_GREEN,
                center_radius: 4,
                center_thickness: -1,
            },
            window_title: "Rolling Soda Can Detection (HoughCircles)".to_string(),
            key_delay_ms: 24,
            missing_hint: "No circle in frame".to_string(),
        }
    }

    /// Frame size after the optional longest-side resize.
    pub fn target_size(&self, width: i32, height: i32) -> Option<(i32, i32)> {
        let max_dim = self.resize_max_dim?;
        let longest = width.max(height);
        if longest <= 0 {
            return None;
        }
        let scale = max_dim as f64 / longest as f64;
        Some(((width as f64 * scale) as i32, (height as f64 * scale) as i32))
    }

    pub fn validate(&self) -> Result<()> {
        let kernel = self.blur.kernel();
        if kernel <= 0 || kernel % 2 == 0 {
            anyhow::bail!("blur kernel must be a positive odd number, got {}", kernel);
        }
        if self.frame_stride == 0 {
            anyhow::bail!("frame_stride must be at least 1");
        }
        if self.hough.dp <= 0.0 {
            anyhow::bail!("hough.dp must be positive, got {}", self.hough.dp);
        }
        if let (Extent::Pixels(min), Extent::Pixels(max)) =
            (self.hough.min_radius, self.hough.max_radius)
        {
            if min > max {
                anyhow::bail!("min_radius {} exceeds max_radius {}", min, max);
            }
        }
        if matches!(self.resize_max_dim, Some(d) if d <= 0) {
            anyhow::bail!("resize_max_dim must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CirclePreset {
    CanTop,
    CanBottom,
    #[default]
    RollingCan,
}

impl CirclePreset {
    pub const ALL: [CirclePreset; 3] = [
        CirclePreset::CanTop,
        CirclePreset::CanBottom,
        CirclePreset::RollingCan,
    ];

    pub fn config(self) -> CircleConfig {
        match self {
            CirclePreset::CanTop => CircleConfig::can_top(),
            CirclePreset::CanBottom => CircleConfig::can_bottom(),
            CirclePreset::RollingCan => CircleConfig::rolling_can(),
        }
    }
}

// ============================================================================
// LANES
// ============================================================================

/// Trapezoid corners as fractions of frame width; the bottom edge sits on
/// the last row and the top edge at `top_y` of the height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoiConfig {
    pub bottom_left_x: f64,
    pub top_left_x: f64,
    pub top_right_x: f64,
    pub bottom_right_x: f64,
    pub top_y: f64,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            bottom_left_x: 0.1,
            top_left_x: 0.4,
            top_right_x: 0.6,
            bottom_right_x: 0.9,
            top_y: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HoughLineParams {
    pub rho: f64,
    pub theta_degrees: f64,
    pub threshold: i32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
}

impl Default for HoughLineParams {
    fn default() -> Self {
        Self {
            rho: 1.0,
            theta_degrees: 1.0,
            threshold: 50,
            min_line_length: 10.0,
            max_line_gap: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaneOverlayStyle {
    pub lane_color: Bgr,
    pub lane_thickness: i32,
    pub center_color: Bgr,
    pub center_thickness: i32,
    pub frame_weight: f64,
    pub overlay_weight: f64,
    pub gamma: f64,
}

impl Default for LaneOverlayStyle {
    fn default() -> Self {
        Self {
            lane_color: Bgr::GREEN,
            lane_thickness: 5,
            center_color: Bgr::RED,
            center_thickness: 3,
            frame_weight: 0.8,
            overlay_weight: 1.0,
            gamma: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaneConfig {
    pub canny_low: f64,
    pub canny_high: f64,
    pub roi: RoiConfig,
    pub hough: HoughLineParams,
    pub horizon_ratio: f64,
    pub style: LaneOverlayStyle,
    pub window_title: String,
    pub edges_window_title: String,
    pub key_delay_ms: i32,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            roi: RoiConfig::default(),
            hough: HoughLineParams::default(),
            horizon_ratio: DEFAULT_HORIZON_RATIO,
            style: LaneOverlayStyle::default(),
            window_title: "Lane and Center Line Detection".to_string(),
            edges_window_title: "Masked Edges (Processing View)".to_string(),
            key_delay_ms: 1,
        }
    }
}

impl LaneConfig {
    pub fn validate(&self) -> Result<()> {
        if self.canny_low > self.canny_high {
            anyhow::bail!(
                "canny_low {} exceeds canny_high {}",
                self.canny_low,
                self.canny_high
            );
        }
        let fractions = [
            ("roi.bottom_left_x", self.roi.bottom_left_x),
            ("roi.top_left_x", self.roi.top_left_x),
            ("roi.top_right_x", self.roi.top_right_x),
            ("roi.bottom_right_x", self.roi.bottom_right_x),
            ("roi.top_y", self.roi.top_y),
            ("horizon_ratio", self.horizon_ratio),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within [0, 1], got {}", name, value);
            }
        }
        if self.hough.theta_degrees <= 0.0 || self.hough.rho <= 0.0 {
            anyhow::bail!("hough rho and theta must be positive");
        }
        Ok(())
    }
}

// ============================================================================
// DISPLAY / LOGGING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// No windows; annotated output goes to `output_dir`.
    pub headless: bool,
    pub output_dir: PathBuf,
    pub quit_key: char,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            headless: false,
            output_dir: PathBuf::from("output"),
            quit_key: 'q',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "pwp_vision=info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert!(config.circle.is_none());
        assert_eq!(config.lanes, LaneConfig::default());
        assert_eq!(config.display.quit_key, 'q');
        assert_eq!(config.logging.level, "pwp_vision=info");
    }

    #[test]
    fn test_presets_validate() {
        for preset in [
            CirclePreset::CanTop,
            CirclePreset::CanBottom,
            CirclePreset::RollingCan,
        ] {
            assert!(preset.config().validate().is_ok(), "{:?}", preset);
        }
        assert_eq!(CircleConfig::can_bottom().on_missing, MissingDetection::Fail);
        assert_eq!(CircleConfig::rolling_can().frame_stride, 5);
    }

    #[test]
    fn test_extent_resolution_truncates() {
        assert_eq!(Extent::Pixels(90).resolve(640, 480), 90);
        assert_eq!(Extent::HeightFraction(0.25).resolve(640, 481), 120);
        assert_eq!(Extent::HeightFraction(0.5).resolve(640, 481), 240);
        assert_eq!(Extent::LongestSideFraction(0.5).resolve(800, 600), 400);
        assert_eq!(Extent::LongestSideFraction(0.25).resolve(450, 800), 200);
    }

    #[test]
    fn test_target_size_scales_longest_side() {
        let circle = CircleConfig::can_top();
        assert_eq!(circle.target_size(1000, 750), Some((800, 600)));
        assert_eq!(circle.target_size(400, 1600), Some((200, 800)));
        assert_eq!(CircleConfig::rolling_can().target_size(1000, 750), None);
    }

    #[test]
    fn test_circle_section_parses_and_overrides_preset() {
        let yaml = r#"
circle:
  resize_max_dim: 640
  blur:
    kind: median
    kernel: 7
  hough:
    dp: 1.5
    min_dist: { height_fraction: 0.5 }
    param1: 100
    param2: 30
    min_radius: { pixels: 20 }
    max_radius: { longest_side_fraction: 0.4 }
  on_missing: fail
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        let circle = config.circle_for(CirclePreset::CanTop).unwrap();
        assert_eq!(circle.resize_max_dim, Some(640));
        assert_eq!(circle.blur, BlurConfig::Median { kernel: 7 });
        assert_eq!(circle.hough.min_radius, Extent::Pixels(20));
        assert_eq!(circle.on_missing, MissingDetection::Fail);
        // unspecified fields come from the chosen preset
        assert_eq!(circle.frame_stride, 1);
        assert_eq!(circle.window_title, "Corrected Detection");
    }

    #[test]
    fn test_partial_circle_section_keeps_chosen_preset() {
        let yaml = "circle:\n  on_missing: fail\n  hough:\n    param2: 30\n";
        let config = Config::from_yaml_str(yaml).unwrap();

        let top = config.circle_for(CirclePreset::CanTop).unwrap();
        let mut expected = CircleConfig::can_top();
        expected.on_missing = MissingDetection::Fail;
        expected.hough.param2 = 30.0;
        assert_eq!(top, expected);

        let rolling = config.circle_for(CirclePreset::RollingCan).unwrap();
        assert_eq!(rolling.hough.min_radius, Extent::Pixels(90));
        assert_eq!(rolling.hough.param2, 30.0);
        assert_eq!(rolling.frame_stride, 5);
    }

    #[test]
    fn test_circle_override_with_bad_values_rejected() {
        assert!(Config::from_yaml_str("circle:\n  frame_stride: 0\n").is_err());
        assert!(Config::from_yaml_str("circle:\n  stride: 2\n").is_err());
        assert!(Config::from_yaml_str("circle:\n  hough:\n    dpp: 1.0\n").is_err());
    }

    #[test]
    fn test_preset_used_without_circle_section() {
        let config = Config::default();
        assert_eq!(
            config.circle_for(CirclePreset::CanTop).unwrap(),
            CircleConfig::can_top()
        );
    }

    #[test]
    fn test_even_kernel_rejected() {
        let mut circle = CircleConfig::rolling_can();
        circle.blur = BlurConfig::Gaussian {
            kernel: 8,
            sigma: 2.0,
        };
        assert!(circle.validate().is_err());
    }

    #[test]
    fn test_zero_stride_rejected() {
        let mut circle = CircleConfig::rolling_can();
        circle.frame_stride = 0;
        assert!(circle.validate().is_err());
    }

    #[test]
    fn test_inverted_radius_rejected() {
        let mut circle = CircleConfig::rolling_can();
        circle.hough.min_radius = Extent::Pixels(200);
        assert!(circle.validate().is_err());
    }

    #[test]
    fn test_lane_validation() {
        let mut lanes = LaneConfig::default();
        assert!(lanes.validate().is_ok());

        lanes.canny_low = 200.0;
        assert!(lanes.validate().is_err());

        let mut lanes = LaneConfig::default();
        lanes.roi.top_y = 1.5;
        assert!(lanes.validate().is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(Config::from_yaml_str("lanes:\n  canny_lo: 10\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "lanes:\n  canny_low: 30\n  canny_high: 90\ndisplay:\n  headless: true"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.lanes.canny_low, 30.0);
        assert_eq!(config.lanes.canny_high, 90.0);
        assert!(config.display.headless);
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.yaml")).unwrap();
        assert_eq!(config.lanes, LaneConfig::default());
        assert_eq!(config.display, DisplayConfig::default());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Config::load("/nonexistent/pwp.yaml").unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/pwp.yaml"));
    }
}
