//! Settings file discovery, loading and environment overlay.

use crate::feature::FeatureValue;
use crate::session::{StreamConfig, DEFAULT_BUFFER_DEPTH};
use crate::sink::DEFAULT_LIVE_VIEW;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;



pub const LOCAL_FILE: &str = "vimba-helpers.toml";
pub const OUTPUT_ENV: &str = "VIMBA_HELPERS_OUTPUT";



#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub output_path: PathBuf,
    pub buffer_depth: usize,
    pub live_view: LiveView,
    /// Feature overrides applied before every acquisition.
    pub features: BTreeMap<String, SettingValue>
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("."),
            buffer_depth: DEFAULT_BUFFER_DEPTH,
            live_view: LiveView::default(),
            features: BTreeMap::new()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveView {
    pub width: u32,
    pub height: u32
}

impl Default for LiveView {
    fn default() -> Self {
        Self { width: DEFAULT_LIVE_VIEW.0, height: DEFAULT_LIVE_VIEW.1 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String)
}

impl From<SettingValue> for FeatureValue {
    fn from(v: SettingValue) -> Self {
        match v {
            SettingValue::Bool(v) => FeatureValue::Bool(v),
            SettingValue::Int(v) => FeatureValue::Int(v),
            SettingValue::Float(v) => FeatureValue::Float(v),
            // Enum entries are written as plain strings; the camera's
            // declared type decides
            SettingValue::Text(v) => FeatureValue::String(v)
        }
    }
}



impl Settings {
    pub fn parse(contents: &str, path: &Path) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Settings {
            path: path.to_path_buf(),
            message: e.to_string()
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Settings {
            path: path.to_path_buf(),
            message: e.to_string()
        })?;

        Self::parse(&contents, path)
    }

    /// Load the explicitly given file, else `./vimba-helpers.toml` if it
    /// exists, else defaults. The environment overlay is applied on top.
    pub fn discover(cli_path: Option<&Path>) -> Result<Self> {
        let local = PathBuf::from(LOCAL_FILE);

        let mut settings = match cli_path {
            Some(path) => Self::load(path)?,
            None if local.is_file() => Self::load(&local)?,
            None => Self::default()
        };

        settings.apply_env_with(|key| env::var(key).ok());

        Ok(settings)
    }

    /// Overlay values from environment variables looked up with `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where F: Fn(&str) -> Option<String> {
        if let Some(v) = lookup(OUTPUT_ENV) {
            debug!("{OUTPUT_ENV} overrides output path with {v}");
            self.output_path = PathBuf::from(v);
        }
    }

    pub fn feature_overrides(&self) -> Vec<(String, FeatureValue)> {
        self.features.iter()
            .map(|(name, v)| (name.clone(), v.clone().into()))
            .collect()
    }

    /// Stream settings without a stop condition; the caller picks one.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            buffer_depth: self.buffer_depth,
            output_path: self.output_path.clone(),
            feature_overrides: self.feature_overrides(),
            ..StreamConfig::default()
        }
    }
}



#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::parse("", Path::new("x.toml")).unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.live_view, LiveView { width: 520, height: 400 });
    }

    #[test]
    fn features_keep_their_types() {
        let settings = Settings::parse(r#"
            output_path = "/tmp/frames"
            buffer_depth = 4

            [live_view]
            width = 640

            [features]
            ExposureTime = 2000.0
            Height = 480
            ReverseX = true
            PixelFormat = "BayerRG8"
        "#, Path::new("x.toml")).unwrap();

        assert_eq!(settings.output_path, PathBuf::from("/tmp/frames"));
        assert_eq!(settings.buffer_depth, 4);
        assert_eq!(settings.live_view, LiveView { width: 640, height: 400 });
        assert_eq!(settings.feature_overrides(), vec![
            ("ExposureTime".to_string(), FeatureValue::Float(2000.0)),
            ("Height".to_string(), FeatureValue::Int(480)),
            ("PixelFormat".to_string(), FeatureValue::String("BayerRG8".into())),
            ("ReverseX".to_string(), FeatureValue::Bool(true)),
        ]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Settings::parse("buffer = 3", Path::new("bad.toml")).unwrap_err();

        assert!(matches!(err, Error::Settings { ref path, .. } if path == Path::new("bad.toml")));
    }

    #[test]
    fn explicit_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "buffer_depth = 7").unwrap();

        let settings = Settings::discover(Some(file.path())).unwrap();

        assert_eq!(settings.buffer_depth, 7);
        assert_eq!(settings.stream_config().buffer_depth, 7);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Settings::discover(Some(Path::new("/no/such/settings.toml"))).unwrap_err();

        assert!(matches!(err, Error::Settings { .. }));
    }

    #[test]
    fn environment_overrides_output_path() {
        let mut settings = Settings::default();

        settings.apply_env_with(|key| (key == OUTPUT_ENV).then(|| "/data/out".to_string()));

        assert_eq!(settings.output_path, PathBuf::from("/data/out"));
    }
}
