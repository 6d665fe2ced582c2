use crate::cli::{Args, CameraSource, OverlapChoice, PayloadChoice};
use crate::predictor::DEFAULT_ENDPOINT;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Represents the leafscan config file format
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub name: Option<String>,
    pub last_modified: Option<String>,
    pub config: ClientConfigJson,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfigJson {
    pub endpoint: Option<String>,
    pub payload: Option<String>,
    pub overlap: Option<String>,
    pub camera: Option<String>,
    pub device: Option<String>,
    pub json: Option<bool>,
    pub verbose: Option<bool>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", path))
    }
}

/// Per-user config location, e.g. `~/.config/leafscan/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("leafscan").join("config.json"))
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments
    /// Command-line arguments take precedence over config file values.
    /// Without --config, the per-user config file is used when it exists.
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        if let Some(config_path) = self.config_path(default_config_path()) {
            let config = ConfigFile::load(&config_path)?;

            let args_from_cli = std::env::args().collect::<Vec<_>>();
            self.merge_from_config(config.config, &args_from_cli)?;

            if self.verbose {
                eprintln!("Loaded configuration from: {:?}", config_path);
            }
        }
        Ok(())
    }

    fn config_path(&self, user_default: Option<PathBuf>) -> Option<PathBuf> {
        match &self.config_file {
            Some(path) => Some(path.clone()),
            None => user_default.filter(|path| path.is_file()),
        }
    }

    fn merge_from_config(&mut self, config: ClientConfigJson, args_from_cli: &[String]) -> Result<()> {
        let given = |flag: &str| {
            args_from_cli
                .iter()
                .any(|a| a == flag || a.starts_with(&format!("{}=", flag)))
        };

        if !given("--endpoint") {
            if let Some(endpoint) = config.endpoint {
                self.endpoint = endpoint;
            }
        }

        if !given("--payload") {
            if let Some(payload) = config.payload {
                self.payload = match payload.as_str() {
                    "auto" => PayloadChoice::Auto,
                    "blob" => PayloadChoice::Blob,
                    "uri" => PayloadChoice::Uri,
                    other => anyhow::bail!("Invalid payload '{}' in config file", other),
                };
            }
        }

        if !given("--overlap") {
            if let Some(overlap) = config.overlap {
                self.overlap = match overlap.as_str() {
                    "race" => OverlapChoice::Race,
                    "supersede" => OverlapChoice::Supersede,
                    other => anyhow::bail!("Invalid overlap policy '{}' in config file", other),
                };
            }
        }

        if !given("--camera") {
            if let Some(camera) = config.camera {
                self.camera = match camera.as_str() {
                    "file" => CameraSource::File,
                    "v4l2" => CameraSource::V4l2,
                    other => anyhow::bail!("Invalid camera '{}' in config file", other),
                };
            }
        }

        if !given("--device") {
            if let Some(device) = config.device {
                self.device = device;
            }
        }

        // Boolean flags - only apply if currently false (default)
        if !self.json {
            self.json = config.json.unwrap_or(false);
        }

        if !self.verbose {
            self.verbose = config.verbose.unwrap_or(false);
        }

        Ok(())
    }
}

impl ClientConfigJson {
    /// Endpoint to use when nothing else says otherwise
    pub fn endpoint_or_default(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }
}
