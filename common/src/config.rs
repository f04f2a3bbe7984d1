//! Settings loaded from `config.toml` and the process command line.
//!
//! A missing file yields the defaults. A malformed file is reported and the
//! defaults are used instead, so the window always comes up.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Context, Result};
use log::LevelFilter;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: i32,
    pub height: i32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "EngineDev".to_string(),
            width: 800,
            height: 600,
            fullscreen: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphicsConfig {
    pub vsync: bool,
    pub clear_color: [f32; 4],
    pub feature_level: FeatureLevel,
    pub use_warp: bool,
    /// Far plane distance, reserved for projection setup.
    pub screen_depth: f32,
    /// Near plane distance, reserved for projection setup.
    pub screen_near: f32,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            clear_color: [0.5, 0.5, 0.5, 1.0],
            feature_level: FeatureLevel::default(),
            use_warp: false,
            screen_depth: 1000.0,
            screen_near: 0.1,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Only honoured in debug builds.
    pub debug_layer: bool,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            debug_layer: true,
            log_level: "info".to_string(),
        }
    }
}

/// Minimum Direct3D feature level the device must support.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum FeatureLevel {
    #[serde(rename = "11_0")]
    Level11_0,
    #[serde(rename = "11_1")]
    Level11_1,
    #[serde(rename = "12_0")]
    Level12_0,
    #[default]
    #[serde(rename = "12_1")]
    Level12_1,
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeatureLevel::Level11_0 => "11.0",
            FeatureLevel::Level11_1 => "11.1",
            FeatureLevel::Level12_0 => "12.0",
            FeatureLevel::Level12_1 => "12.1",
        };
        f.write_str(s)
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults on any error.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load_from_path(path).unwrap_or_else(|e| {
            log::warn!("failed to load {path:?}: {e:#}. Using defaults.");
            Config::default()
        })
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("config file not found at {path:?}, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("failed to parse config file {path:?}"))?;

        log::info!("loaded configuration from {path:?}");
        log::debug!("config: {config:?}");

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings Win32 or DXGI cannot create a window or swapchain from.
    pub fn validate(&self) -> Result<()> {
        let (width, height) = (self.window.width, self.window.height);
        if width <= 0 || height <= 0 {
            bail!("window size must be positive, got {width}x{height}");
        }
        Ok(())
    }

    /// Settings for this run: the file named on the command line, then its overrides.
    pub fn startup(command_line: &CommandLine) -> Self {
        let mut config = Config::load(command_line.config_path());
        config.apply(command_line);
        config
    }

    /// Apply command line overrides on top of the file settings.
    pub fn apply(&mut self, command_line: &CommandLine) {
        if command_line.use_warp_device {
            self.graphics.use_warp = true;
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        LevelFilter::from_str(&self.debug.log_level).unwrap_or_else(|_| {
            log::warn!(
                "unknown log level '{}', defaulting to info",
                self.debug.log_level
            );
            LevelFilter::Info
        })
    }

    /// Window title, marked when rendering on the software adapter.
    pub fn title(&self) -> String {
        let mut title = self.window.title.clone();
        if self.graphics.use_warp {
            title.push_str(" (WARP)");
        }
        title
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandLine {
    pub use_warp_device: bool,
    pub config_path: Option<PathBuf>,
}

impl CommandLine {
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut command_line = CommandLine::default();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            if is_switch(&arg, "warp") {
                command_line.use_warp_device = true;
            } else if is_switch(&arg, "config") {
                match args.next() {
                    Some(path) => command_line.config_path = Some(PathBuf::from(path)),
                    None => log::warn!("{arg} expects a path"),
                }
            }
        }

        command_line
    }

    pub fn config_path(&self) -> &Path {
        self.config_path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH))
    }
}

fn is_switch(arg: &str, name: &str) -> bool {
    arg.strip_prefix('-')
        .or_else(|| arg.strip_prefix('/'))
        .is_some_and(|s| s.eq_ignore_ascii_case(name))
}

pub fn build_command_line() -> CommandLine {
    CommandLine::from_args(std::env::args().skip(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_window() {
        let config = Config::default();
        assert_eq!(config.window.title, "EngineDev");
        assert_eq!((config.window.width, config.window.height), (800, 600));
        assert!(!config.window.fullscreen);
        assert!(config.graphics.vsync);
        assert_eq!(config.graphics.clear_color, [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(config.graphics.feature_level, FeatureLevel::Level12_1);
        assert_eq!(config.graphics.screen_depth, 1000.0);
        assert_eq!(config.graphics.screen_near, 0.1);
        assert_eq!(config.log_level(), LevelFilter::Info);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_toml(
            r#"
            [window]
            width = 1024
            fullscreen = true

            [graphics]
            vsync = false
            feature_level = "11_0"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert!(config.window.fullscreen);
        assert_eq!(config.window.title, "EngineDev");
        assert!(!config.graphics.vsync);
        assert_eq!(config.graphics.feature_level, FeatureLevel::Level11_0);
        assert_eq!(config.graphics.clear_color, [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn negative_width_is_rejected() {
        let err = Config::from_toml("[window]\nwidth = -800").unwrap_err();
        assert!(err.to_string().contains("-800x600"));
    }

    #[test]
    fn zero_height_is_rejected() {
        assert!(Config::from_toml("[window]\nheight = 0").is_err());
    }

    #[test]
    fn invalid_size_in_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("engine_dev_size_{}.toml", std::process::id()));
        std::fs::write(&path, "[window]\nwidth = -800\nheight = 0\n").unwrap();

        assert!(Config::load_from_path(&path).is_err());
        let config = Config::load(&path);
        assert_eq!((config.window.width, config.window.height), (800, 600));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unknown_feature_level_is_rejected() {
        assert!(Config::from_toml("[graphics]\nfeature_level = \"9_3\"").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load_from_path("definitely/not/here/config.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("engine_dev_bad_{}.toml", std::process::id()));
        std::fs::write(&path, "[window\nwidth = ").unwrap();

        assert!(Config::load_from_path(&path).is_err());
        assert_eq!(Config::load(&path), Config::default());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn file_is_read_from_disk() {
        let path = std::env::temp_dir().join(format!("engine_dev_ok_{}.toml", std::process::id()));
        std::fs::write(&path, "[debug]\nlog_level = \"trace\"\n").unwrap();

        let config = Config::load(&path);
        assert_eq!(config.log_level(), LevelFilter::Trace);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn invalid_log_level_falls_back_to_info() {
        let mut config = Config::default();
        config.debug.log_level = "loud".to_string();
        assert_eq!(config.log_level(), LevelFilter::Info);
    }

    #[test]
    fn feature_level_display() {
        assert_eq!(FeatureLevel::Level12_1.to_string(), "12.1");
        assert_eq!(FeatureLevel::Level11_0.to_string(), "11.0");
    }

    #[test]
    fn warp_switch_in_either_form() {
        assert!(CommandLine::from_args(["-warp"]).use_warp_device);
        assert!(CommandLine::from_args(["/WARP"]).use_warp_device);
        assert!(!CommandLine::from_args(["warp"]).use_warp_device);
        assert!(!CommandLine::from_args(Vec::<String>::new()).use_warp_device);
    }

    #[test]
    fn config_switch_takes_a_path() {
        let command_line = CommandLine::from_args(["-config", "settings/engine.toml", "-warp"]);
        assert_eq!(command_line.config_path(), Path::new("settings/engine.toml"));
        assert!(command_line.use_warp_device);

        let dangling = CommandLine::from_args(["/config"]);
        assert_eq!(dangling.config_path(), Path::new(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn warp_override_marks_the_title() {
        let mut config = Config::default();
        assert_eq!(config.title(), "EngineDev");

        config.apply(&CommandLine::from_args(["-warp"]));
        assert!(config.graphics.use_warp);
        assert_eq!(config.title(), "EngineDev (WARP)");
    }
}
