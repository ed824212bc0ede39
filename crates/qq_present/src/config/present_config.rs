//! Configuration for the presentation controller and its Vulkan backend

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Config, ConfigError};

/// Upper bound on frames in flight; more than this only adds latency
pub const MAX_FRAMES_IN_FLIGHT_LIMIT: usize = 8;

/// Which present mode the swapchain builder should look for first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    /// Mailbox when available, FIFO otherwise
    #[default]
    LowLatency,
    /// Always FIFO (vsync, guaranteed to exist)
    Vsync,
}

/// Initial window parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "qq".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

/// # Shader Configuration
///
/// SPIR-V paths for the fixed pipeline. The build script drops compiled
/// shaders into `target/shaders`, so the default resolves against the usual
/// working directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Tries the common shader locations so the binary works from the
    /// workspace root and from a crate directory alike.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        Self {
            vertex_shader_path: Self::resolve_shader_path(base_vertex),
            fragment_shader_path: Self::resolve_shader_path(base_fragment),
        }
    }

    fn resolve_shader_path(file_name: &str) -> String {
        const SHADER_DIRS: [&str; 4] = [
            "target/shaders/",
            "../target/shaders/",
            "../../target/shaders/",
            "shaders/",
        ];

        SHADER_DIRS
            .iter()
            .map(|dir| format!("{dir}{file_name}"))
            .find(|candidate| Path::new(candidate).exists())
            .unwrap_or_else(|| format!("target/shaders/{file_name}"))
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        for path in [&self.vertex_shader_path, &self.fragment_shader_path] {
            if !Path::new(path).exists() {
                return Err(ConfigError::Invalid(format!("shader not found: {path}")));
            }
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("spin_vert.spv", "spin_frag.spv")
    }
}

/// # Presentation Configuration
///
/// Everything the frame driver and the Vulkan backend read at startup.
/// Missing keys fall back to [`Default`], so a config file only needs the
/// values it changes:
///
/// ```toml
/// max_frames_in_flight = 3
/// present_mode = "vsync"
///
/// [window]
/// width = 800
/// height = 600
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Initial window parameters
    pub window: WindowConfig,
    /// Number of frame slots (N)
    pub max_frames_in_flight: usize,
    /// Timeout for every CPU fence wait, in nanoseconds
    pub fence_timeout_ns: u64,
    /// Present mode preference for the swapchain builder
    pub present_mode: PresentModePreference,
    /// Whether to enable Vulkan validation layers (`None` = debug builds only)
    pub enable_validation: Option<bool>,
    /// RGBA clear color of the color attachment
    pub clear_color: [f32; 4],
    /// Shader configuration
    pub shaders: ShaderConfig,
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            application_name: "qq".to_string(),
            window: WindowConfig::default(),
            max_frames_in_flight: 2,
            fence_timeout_ns: u64::MAX,
            present_mode: PresentModePreference::default(),
            enable_validation: None,
            clear_color: [0.05, 0.05, 0.06, 1.0],
            shaders: ShaderConfig::default(),
        }
    }
}

impl Config for PresentConfig {}

impl PresentConfig {
    /// Resolve the validation setting against the build type
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    ///
    /// Shader paths are not checked here; the pipeline factory reports
    /// missing files when it loads them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("application name cannot be empty".to_string()));
        }

        if self.max_frames_in_flight == 0 {
            return Err(ConfigError::Invalid("max frames in flight must be at least 1".to_string()));
        }

        if self.max_frames_in_flight > MAX_FRAMES_IN_FLIGHT_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max frames in flight must not exceed {MAX_FRAMES_IN_FLIGHT_LIMIT}"
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid("window size must be non-zero".to_string()));
        }

        if self.fence_timeout_ns == 0 {
            return Err(ConfigError::Invalid("fence timeout must be non-zero".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PresentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_frames_in_flight, 2);
        assert_eq!(config.fence_timeout_ns, u64::MAX);
        assert_eq!(config.present_mode, PresentModePreference::LowLatency);
    }

    #[test]
    fn test_frames_in_flight_bounds() {
        let mut config = PresentConfig::default();
        config.max_frames_in_flight = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.max_frames_in_flight = MAX_FRAMES_IN_FLIGHT_LIMIT + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.max_frames_in_flight = MAX_FRAMES_IN_FLIGHT_LIMIT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = PresentConfig::default();
        config.window.height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = r#"
            max_frames_in_flight = 3
            present_mode = "vsync"

            [window]
            width = 800
        "#;
        let config: PresentConfig = toml::from_str(text).unwrap();
        assert_eq!(config.max_frames_in_flight, 3);
        assert_eq!(config.present_mode, PresentModePreference::Vsync);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.application_name, "qq");
    }

    #[test]
    fn test_ron_round_trip_through_files() {
        let dir = std::env::temp_dir().join(format!("qq_config_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("present.ron");
        let path = path.to_str().unwrap();

        let mut config = PresentConfig::default();
        config.max_frames_in_flight = 4;
        config.enable_validation = Some(false);
        config.save_to_file(path).unwrap();

        let loaded = PresentConfig::load_from_file(path).unwrap();
        assert_eq!(loaded.max_frames_in_flight, 4);
        assert_eq!(loaded.enable_validation, Some(false));
        assert!(!loaded.validation_enabled());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unsupported_extension() {
        let result = PresentConfig::load_from_file("present.yaml");
        assert!(result.is_err());
        assert!(matches!(
            PresentConfig::default().save_to_file("present.yaml"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = PresentConfig::load_or_default("definitely/not/here/qq.toml").unwrap();
        assert_eq!(config.max_frames_in_flight, 2);
    }
}
