use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::engine::{Facing, InputOptions};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LensCamConfig {
    pub props: WidgetProps,
    pub preview: PreviewConfig,
    pub capture: CaptureConfig,
    pub events: EventConfig,
}

/// Component properties set by the host
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct WidgetProps {
    #[serde(default, alias = "apiToken")]
    pub api_token: String,

    /// Required only in single-lens mode
    #[serde(default, alias = "lensId")]
    pub lens_id: String,

    #[serde(default, alias = "groupId")]
    pub group_id: String,

    #[serde(default = "default_single_lens", alias = "singleLens")]
    pub single_lens: bool,

    /// Show the built-in preview after a capture
    #[serde(default = "default_show_preview", alias = "showPreview")]
    pub show_preview: bool,

    #[serde(default = "default_show_front_camera", alias = "showFrontCamera")]
    pub show_front_camera: bool,
}

/// Lens mode derived from `single_lens`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LensMode {
    Single,
    Group,
}

/// Properties whose change forces a full session rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub api_token: String,
    pub group_id: String,
    pub lens_id: Option<String>,
    pub mode: LensMode,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PreviewConfig {
    /// Whether the platform already mirrors front camera frames
    #[serde(default = "default_platform_mirrors_front")]
    pub platform_mirrors_front: bool,

    /// Desired mirroring of front camera output
    #[serde(default = "default_mirror_front")]
    pub mirror_front: bool,

    /// Desired mirroring of back camera output
    #[serde(default = "default_mirror_back")]
    pub mirror_back: bool,

    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Directory captured images are written to
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_file_extension")]
    pub file_extension: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EventConfig {
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    #[serde(default)]
    pub debug_logging: bool,
}

impl WidgetProps {
    pub fn mode(&self) -> LensMode {
        if self.single_lens {
            LensMode::Single
        } else {
            LensMode::Group
        }
    }

    pub fn facing(&self) -> Facing {
        if self.show_front_camera {
            Facing::Front
        } else {
            Facing::Back
        }
    }

    /// Check that every field required by the current mode is non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.api_token.trim().is_empty() {
            missing.push("api_token");
        }
        if self.group_id.trim().is_empty() {
            missing.push("group_id");
        }
        if self.single_lens && self.lens_id.trim().is_empty() {
            missing.push("lens_id");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(format!(
                "Missing required properties for {:?} mode: {}",
                self.mode(),
                missing.join(", ")
            )))
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            api_token: self.api_token.clone(),
            group_id: self.group_id.clone(),
            lens_id: match self.mode() {
                LensMode::Single => Some(self.lens_id.clone()),
                LensMode::Group => None,
            },
            mode: self.mode(),
        }
    }

    /// Parse host props as delivered by the component layer
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for WidgetProps {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            lens_id: String::new(),
            group_id: String::new(),
            single_lens: default_single_lens(),
            show_preview: default_show_preview(),
            show_front_camera: default_show_front_camera(),
        }
    }
}

impl PreviewConfig {
    /// Input options for the given facing.
    ///
    /// Front frames come out mirrored when the platform mirrors them; a
    /// counter-mirror is added whenever the desired output differs from
    /// what the platform produces on its own.
    pub fn input_options(&self, facing: Facing) -> InputOptions {
        let (platform_default, desired) = match facing {
            Facing::Front => (self.platform_mirrors_front, self.mirror_front),
            Facing::Back => (false, self.mirror_back),
        };

        InputOptions {
            mirror_horizontally: platform_default != desired,
            aspect_ratio: self.aspect_ratio.clone(),
        }
    }
}

impl LensCamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("lenscam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("props.api_token", "")?
            .set_default("props.lens_id", "")?
            .set_default("props.group_id", "")?
            .set_default("props.single_lens", default_single_lens())?
            .set_default("props.show_preview", default_show_preview())?
            .set_default("props.show_front_camera", default_show_front_camera())?
            .set_default(
                "preview.platform_mirrors_front",
                default_platform_mirrors_front(),
            )?
            .set_default("preview.mirror_front", default_mirror_front())?
            .set_default("preview.mirror_back", default_mirror_back())?
            .set_default("preview.aspect_ratio", default_aspect_ratio())?
            .set_default(
                "capture.cache_dir",
                default_cache_dir().to_string_lossy().to_string(),
            )?
            .set_default("capture.file_extension", default_file_extension())?
            .set_default("events.bus_capacity", default_bus_capacity() as i64)?
            .set_default("events.debug_logging", false)?
            .add_source(File::with_name(&path_str).required(false))
            // LENSCAM_PROPS__API_TOKEN=... style overrides
            .add_source(
                Environment::with_prefix("LENSCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: LensCamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Widget props are not checked here: an incomplete prop set is a valid
    /// state that keeps the widget inert until the host completes it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.events.bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        if self.capture.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::Message(
                "Capture cache_dir must not be empty".to_string(),
            ));
        }

        if self.capture.file_extension.trim().is_empty() {
            return Err(ConfigError::Message(
                "Capture file_extension must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parse a complete TOML document, without file or environment layering
    pub fn from_toml(content: &str) -> crate::error::Result<Self> {
        let config: LensCamConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for LensCamConfig {
    fn default() -> Self {
        Self {
            props: WidgetProps::default(),
            preview: PreviewConfig::default(),
            capture: CaptureConfig::default(),
            events: EventConfig::default(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            platform_mirrors_front: default_platform_mirrors_front(),
            mirror_front: default_mirror_front(),
            mirror_back: default_mirror_back(),
            aspect_ratio: default_aspect_ratio(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            file_extension: default_file_extension(),
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            bus_capacity: default_bus_capacity(),
            debug_logging: false,
        }
    }
}

// Default value functions
fn default_single_lens() -> bool {
    true
}
fn default_show_preview() -> bool {
    true
}
fn default_show_front_camera() -> bool {
    false
}

fn default_platform_mirrors_front() -> bool {
    false
}
fn default_mirror_front() -> bool {
    true
}
fn default_mirror_back() -> bool {
    false
}
fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("lenscam")
}
fn default_file_extension() -> String {
    "jpg".to_string()
}

fn default_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn single_props() -> WidgetProps {
        WidgetProps {
            api_token: "t1".to_string(),
            lens_id: "l1".to_string(),
            group_id: "g1".to_string(),
            ..WidgetProps::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = LensCamConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.props.single_lens);
        assert!(config.props.show_preview);
        assert!(!config.props.show_front_camera);
    }

    #[test]
    fn test_single_lens_requires_lens_id() {
        let mut props = single_props();
        assert!(props.validate().is_ok());

        props.lens_id.clear();
        let err = props.validate().unwrap_err().to_string();
        assert!(err.contains("lens_id"));

        props.single_lens = false;
        assert!(props.validate().is_ok());
    }

    #[test]
    fn test_group_id_always_required() {
        let mut props = single_props();
        props.group_id = "".to_string();
        assert!(!props.is_valid());

        props.single_lens = false;
        assert!(!props.is_valid());
    }

    #[test]
    fn test_identity_ignores_lens_in_group_mode() {
        let mut a = single_props();
        a.single_lens = false;
        let mut b = a.clone();
        b.lens_id = "other".to_string();
        b.show_front_camera = true;

        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), single_props().identity());
    }

    #[test]
    fn test_props_from_host_json() {
        let props = WidgetProps::from_json(
            r#"{"apiToken":"t1","groupId":"g1","singleLens":false,"showFrontCamera":true}"#,
        )
        .unwrap();

        assert_eq!(props.api_token, "t1");
        assert_eq!(props.mode(), LensMode::Group);
        assert_eq!(props.facing(), Facing::Front);
        assert!(props.show_preview);
        assert!(props.is_valid());
    }

    #[test]
    fn test_front_camera_mirroring_policy() {
        let preview = PreviewConfig::default();
        // Raw frames are unmirrored, so the front camera asks for a mirror
        assert!(preview.input_options(Facing::Front).mirror_horizontally);
        assert!(!preview.input_options(Facing::Back).mirror_horizontally);

        let unmirrored = PreviewConfig {
            mirror_front: false,
            ..PreviewConfig::default()
        };
        assert!(!unmirrored.input_options(Facing::Front).mirror_horizontally);

        // Platform mirrors on its own; asking for unmirrored output counter-mirrors
        let mirroring_platform = PreviewConfig {
            platform_mirrors_front: true,
            ..PreviewConfig::default()
        };
        assert!(!mirroring_platform.input_options(Facing::Front).mirror_horizontally);
        let counter_mirrored = PreviewConfig {
            platform_mirrors_front: true,
            mirror_front: false,
            ..PreviewConfig::default()
        };
        assert!(counter_mirrored.input_options(Facing::Front).mirror_horizontally);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lenscam.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[props]\napi_token = \"t1\"\ngroup_id = \"g1\"\nsingle_lens = false\n\n[events]\nbus_capacity = 8"
        )
        .unwrap();

        let config = LensCamConfig::load_from_file(&path).unwrap();
        assert_eq!(config.props.api_token, "t1");
        assert!(!config.props.single_lens);
        assert_eq!(config.events.bus_capacity, 8);
        assert_eq!(config.capture.file_extension, "jpg");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LensCamConfig::default();
        config.events.bus_capacity = 0;
        assert!(config.validate().is_err());

        config.events.bus_capacity = 10;
        config.capture.file_extension = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_document_roundtrip_and_parse_errors() {
        let config = LensCamConfig {
            props: single_props(),
            ..LensCamConfig::default()
        };
        let parsed = LensCamConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);

        let err = LensCamConfig::from_toml("[props\napi_token = ").unwrap_err();
        assert!(matches!(err, crate::error::LensCamError::Deserialization(_)));
    }
}
