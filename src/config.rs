use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PhotoboothConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub stylize: StylizeConfig,
    #[serde(default)]
    pub strip: StripConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Which capture backend to open
    #[serde(default = "default_camera_backend")]
    pub backend: CameraBackendKind,

    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Preferred camera direction
    #[serde(default = "default_camera_facing")]
    pub facing: FacingMode,

    /// Ideal resolution for the preferred request (width, height)
    #[serde(default = "default_camera_resolution")]
    pub ideal_resolution: (u32, u32),

    /// Frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// How long to wait for the first frame before giving up on readiness
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Number of photos in a complete set
    #[serde(default = "default_max_photos")]
    pub max_photos: usize,

    /// First countdown value shown after a trigger
    #[serde(default = "default_countdown_from")]
    pub countdown_from: u8,

    /// Time between countdown ticks
    #[serde(default = "default_countdown_interval_ms")]
    pub countdown_interval_ms: u64,

    /// Edge length of captured square frames
    #[serde(default = "default_frame_size")]
    pub frame_size: u32,

    /// Delay before the placeholder set is printed in test mode
    #[serde(default = "default_test_mode_delay_ms")]
    pub test_mode_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StylizeConfig {
    /// Fraction of each linear dimension kept by the downsample
    #[serde(default = "default_pixel_factor")]
    pub pixel_factor: f32,

    /// Processing delay shown before the transform starts
    #[serde(default = "default_processing_delay_ms")]
    pub processing_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StripConfig {
    /// TrueType font used for labels
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Monospace TrueType font used for captions and timestamps
    #[serde(default = "default_mono_font_path")]
    pub mono_font_path: String,

    /// Rotated caption under the sidebar
    #[serde(default = "default_caption")]
    pub caption: String,

    /// Text of the tag near the top-right photo
    #[serde(default = "default_tag_text")]
    pub tag_text: String,

    /// Lines of the badge near the lower-left photo
    #[serde(default = "default_badge_lines")]
    pub badge_lines: Vec<String>,

    /// Upper bound on frame decoding; 0 waits forever
    #[serde(default = "default_decode_timeout_ms")]
    pub decode_timeout_ms: u64,

    /// Pause between strip generation and the printing animation
    #[serde(default = "default_print_start_delay_ms")]
    pub print_start_delay_ms: u64,

    /// Length of the printing animation
    #[serde(default = "default_print_duration_ms")]
    pub print_duration_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnimationConfig {
    /// Delay between animation frames
    #[serde(default = "default_frame_delay_ms")]
    pub frame_delay_ms: u64,

    /// Caption burned into the lower-left corner of every frame
    #[serde(default = "default_watermark")]
    pub watermark: String,

    /// Palette quantizer speed (1 = best quality, 30 = fastest)
    #[serde(default = "default_quantizer_sample_factor")]
    pub quantizer_sample_factor: i32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExportConfig {
    /// Directory downloads are written into
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Prefix of every downloaded filename
    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,

    /// Filename used by the automatic test-mode download
    #[serde(default = "default_test_strip_filename")]
    pub test_strip_filename: String,

    /// How long a staged artifact handle stays alive after a download starts
    #[serde(default = "default_revoke_after_ms")]
    pub revoke_after_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// IANA timezone for burned-in timestamps; local time when unset
    #[serde(default)]
    pub timestamp_timezone: Option<String>,

    /// Interval between preview frame advances
    #[serde(default = "default_preview_interval_ms")]
    pub preview_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendKind {
    /// V4L2 capture through GStreamer (requires the `camera` feature)
    Gstreamer,
    /// Generated moving test pattern
    Synthetic,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Towards the person using the booth
    User,
    /// Away from the person using the booth
    Environment,
}

impl PhotoboothConfig {
    /// Render as a TOML document, the format `load_from_file` reads
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Parse a TOML document; missing fields take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("photobooth.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("capture.max_photos", default_max_photos() as i64)?
            .set_default("capture.countdown_from", default_countdown_from() as i64)?
            .set_default("capture.frame_size", default_frame_size() as i64)?
            .set_default("stylize.pixel_factor", default_pixel_factor() as f64)?
            .set_default("animation.frame_delay_ms", default_frame_delay_ms())?
            .set_default("export.output_dir", default_output_dir())?
            .set_default("export.filename_prefix", default_filename_prefix())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables, e.g. PHOTOBOOTH__EXPORT__OUTPUT_DIR
            .add_source(Environment::with_prefix("PHOTOBOOTH").separator("__"))
            .build()?;

        let config: PhotoboothConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.ideal_resolution.0 == 0 || self.camera.ideal_resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.capture.max_photos == 0 {
            return Err(ConfigError::Message(
                "Capture max_photos must be greater than 0".to_string(),
            ));
        }

        if self.capture.countdown_from == 0 {
            return Err(ConfigError::Message(
                "Capture countdown_from must be greater than 0".to_string(),
            ));
        }

        if self.capture.frame_size == 0 {
            return Err(ConfigError::Message(
                "Capture frame_size must be greater than 0".to_string(),
            ));
        }

        if !(self.stylize.pixel_factor > 0.0 && self.stylize.pixel_factor <= 1.0) {
            return Err(ConfigError::Message(
                "Stylize pixel_factor must be in (0, 1]".to_string(),
            ));
        }

        if !(1..=30).contains(&self.animation.quantizer_sample_factor) {
            return Err(ConfigError::Message(
                "Animation quantizer_sample_factor must be between 1 and 30".to_string(),
            ));
        }

        if self.export.filename_prefix.trim().is_empty() {
            return Err(ConfigError::Message(
                "Export filename_prefix must not be empty".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl CameraConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

impl CaptureConfig {
    pub fn countdown_interval(&self) -> Duration {
        Duration::from_millis(self.countdown_interval_ms)
    }

    pub fn test_mode_delay(&self) -> Duration {
        Duration::from_millis(self.test_mode_delay_ms)
    }
}

impl StylizeConfig {
    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }
}

impl StripConfig {
    /// `None` means decoding may wait forever
    pub fn decode_timeout(&self) -> Option<Duration> {
        (self.decode_timeout_ms > 0).then(|| Duration::from_millis(self.decode_timeout_ms))
    }

    pub fn print_start_delay(&self) -> Duration {
        Duration::from_millis(self.print_start_delay_ms)
    }

    pub fn print_duration(&self) -> Duration {
        Duration::from_millis(self.print_duration_ms)
    }
}

impl AnimationConfig {
    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }
}

impl ExportConfig {
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }

    pub fn revoke_after(&self) -> Duration {
        Duration::from_millis(self.revoke_after_ms)
    }
}

impl SystemConfig {
    pub fn preview_interval(&self) -> Duration {
        Duration::from_millis(self.preview_interval_ms)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: default_camera_backend(),
            index: default_camera_index(),
            facing: default_camera_facing(),
            ideal_resolution: default_camera_resolution(),
            fps: default_camera_fps(),
            ready_timeout_ms: default_ready_timeout_ms(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_photos: default_max_photos(),
            countdown_from: default_countdown_from(),
            countdown_interval_ms: default_countdown_interval_ms(),
            frame_size: default_frame_size(),
            test_mode_delay_ms: default_test_mode_delay_ms(),
        }
    }
}

impl Default for StylizeConfig {
    fn default() -> Self {
        Self {
            pixel_factor: default_pixel_factor(),
            processing_delay_ms: default_processing_delay_ms(),
        }
    }
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            font_path: default_font_path(),
            mono_font_path: default_mono_font_path(),
            caption: default_caption(),
            tag_text: default_tag_text(),
            badge_lines: default_badge_lines(),
            decode_timeout_ms: default_decode_timeout_ms(),
            print_start_delay_ms: default_print_start_delay_ms(),
            print_duration_ms: default_print_duration_ms(),
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frame_delay_ms: default_frame_delay_ms(),
            watermark: default_watermark(),
            quantizer_sample_factor: default_quantizer_sample_factor(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            filename_prefix: default_filename_prefix(),
            test_strip_filename: default_test_strip_filename(),
            revoke_after_ms: default_revoke_after_ms(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: default_event_bus_capacity(),
            timestamp_timezone: None,
            preview_interval_ms: default_preview_interval_ms(),
        }
    }
}

// Default value functions
fn default_camera_backend() -> CameraBackendKind {
    CameraBackendKind::Gstreamer
}
fn default_camera_index() -> u32 {
    0
}
fn default_camera_facing() -> FacingMode {
    FacingMode::User
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 640)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_ready_timeout_ms() -> u64 {
    10_000
}

fn default_max_photos() -> usize {
    crate::frame::MAX_PHOTOS
}
fn default_countdown_from() -> u8 {
    3
}
fn default_countdown_interval_ms() -> u64 {
    1000
}
fn default_frame_size() -> u32 {
    crate::frame::CANONICAL_SIZE
}
fn default_test_mode_delay_ms() -> u64 {
    500
}

fn default_pixel_factor() -> f32 {
    0.12
}
fn default_processing_delay_ms() -> u64 {
    3000
}

fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf".to_string()
}
fn default_mono_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono-Bold.ttf".to_string()
}
fn default_caption() -> String {
    "Champ & Oui.".to_string()
}
fn default_tag_text() -> String {
    "Valentine Day".to_string()
}
fn default_badge_lines() -> Vec<String> {
    vec!["For".to_string(), "You".to_string()]
}
fn default_decode_timeout_ms() -> u64 {
    10_000
}
fn default_print_start_delay_ms() -> u64 {
    500
}
fn default_print_duration_ms() -> u64 {
    4000
}

fn default_frame_delay_ms() -> u64 {
    350
}
fn default_watermark() -> String {
    "VALENTINE 2026 - Champ & Oui".to_string()
}
fn default_quantizer_sample_factor() -> i32 {
    10
}

fn default_output_dir() -> String {
    "./memories".to_string()
}
fn default_filename_prefix() -> String {
    "valentine-2026".to_string()
}
fn default_test_strip_filename() -> String {
    "test-strip-layout.png".to_string()
}
fn default_revoke_after_ms() -> u64 {
    1000
}

fn default_event_bus_capacity() -> usize {
    100
}
fn default_preview_interval_ms() -> u64 {
    350
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PhotoboothConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.capture.max_photos, 6);
        assert_eq!(config.capture.countdown_from, 3);
        assert_eq!(config.capture.frame_size, 480);
        assert_eq!(config.camera.ideal_resolution, (640, 640));
        assert_eq!(config.camera.facing, FacingMode::User);
        assert_eq!(config.animation.frame_delay(), Duration::from_millis(350));
        assert_eq!(config.export.filename_prefix, "valentine-2026");
        assert_eq!(config.export.test_strip_filename, "test-strip-layout.png");
    }

    #[test]
    fn test_config_validation() {
        let mut config = PhotoboothConfig::default();

        config.camera.ideal_resolution = (0, 0);
        assert!(config.validate().is_err());

        config.camera.ideal_resolution = (640, 640);
        config.stylize.pixel_factor = 0.0;
        assert!(config.validate().is_err());

        config.stylize.pixel_factor = 0.12;
        config.animation.quantizer_sample_factor = 31;
        assert!(config.validate().is_err());

        config.animation.quantizer_sample_factor = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_decode_timeout_zero_disables_bound() {
        let mut strip = StripConfig::default();
        assert_eq!(strip.decode_timeout(), Some(Duration::from_secs(10)));

        strip.decode_timeout_ms = 0;
        assert_eq!(strip.decode_timeout(), None);
    }

    #[test]
    fn test_load_from_file_overrides() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[camera]\nbackend = \"synthetic\"\n\n[capture]\ncountdown_from = 5\n\n[export]\nfilename_prefix = \"party\""
        )
        .unwrap();

        let config = PhotoboothConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.camera.backend, CameraBackendKind::Synthetic);
        assert_eq!(config.capture.countdown_from, 5);
        assert_eq!(config.capture.max_photos, 6);
        assert_eq!(config.export.filename_prefix, "party");
        assert_eq!(config.animation.watermark, "VALENTINE 2026 - Champ & Oui");
    }

    #[test]
    fn test_default_config_renders_as_loadable_toml() {
        let rendered = PhotoboothConfig::default().to_toml_string().unwrap();
        assert!(rendered.contains("[capture]"));
        assert!(rendered.contains("max_photos = 6"));
        assert!(rendered.contains("backend = \"gstreamer\""));
        assert!(!rendered.contains("timestamp_timezone"));

        let parsed = PhotoboothConfig::from_toml_str(&rendered).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.camera.ideal_resolution, (640, 640));
        assert_eq!(parsed.strip.badge_lines, vec!["For".to_string(), "You".to_string()]);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let parsed = PhotoboothConfig::from_toml_str("[stylize]\npixel_factor = 0.2\n").unwrap();
        assert_eq!(parsed.stylize.pixel_factor, 0.2);
        assert_eq!(parsed.capture.max_photos, 6);

        let err = PhotoboothConfig::from_toml_str("[capture]\nmax_photos = \"six\"\n").unwrap_err();
        let wrapped: crate::error::PhotoboothError = err.into();
        assert!(wrapped.to_string().starts_with("Deserialization error"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = PhotoboothConfig::load_from_file("/nonexistent/photobooth.toml").unwrap();
        assert_eq!(config.capture.max_photos, 6);
        assert!(config.validate().is_ok());
    }
}
