//! Configuration loading and defaults for doubao-mcp.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::modules::poll::PollConfig;

pub const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com";
pub const DEFAULT_IMAGE_MODEL: &str = "doubao-seedream-4-5-251128";
pub const DEFAULT_VIDEO_MODEL: &str = "doubao-seedance-1-5-pro-251215";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

// === Types ===

/// Raw polling configuration loaded from config files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollSettings {
    pub max_attempts: Option<u32>,
    pub interval_ms: Option<u64>,
}

/// Resolved configuration, including defaults and environment overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_image_model: Option<String>,
    pub default_video_model: Option<String>,
    pub output_dir: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout: Option<u64>,
    pub poll: Option<PollSettings>,
    pub verbose: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(flatten)]
    base: Config,
    profiles: Option<HashMap<String, Config>>,
}

// === Config Loading ===

impl Config {
    /// Load configuration from disk and merge with environment overrides.
    ///
    /// A missing file is not an error; the defaults apply.
    pub fn load(path: Option<PathBuf>, profile: Option<&str>) -> Result<Self> {
        let path = path.or_else(default_config_path);
        let mut config = match path.as_ref() {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                let parsed: ConfigFile = toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
                apply_profile(parsed, profile)?
            }
            _ => {
                if let Some(profile_name) = profile {
                    anyhow::bail!(
                        "Profile '{profile_name}' not found. Available profiles: none"
                    );
                }
                Config::default()
            }
        };

        apply_env_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Validate that configured fields are usable.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref key) = self.api_key
            && key.trim().is_empty()
        {
            anyhow::bail!("api_key cannot be empty string");
        }
        if let Some(poll) = &self.poll
            && poll.interval_ms == Some(0)
        {
            anyhow::bail!("poll.interval_ms must be greater than zero");
        }
        Ok(())
    }

    /// Read the Ark API key. Absence is fatal for every command that talks to the service.
    pub fn ark_api_key(&self) -> Result<String> {
        self.api_key.clone().context(
            "ARK_API_KEY environment variable is not set. Please set it (or api_key in config.toml) before running the MCP server.",
        )
    }

    /// Return the Ark base URL (normalized).
    #[must_use]
    pub fn ark_base_url(&self) -> String {
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        normalize_base_url(&base)
    }

    #[must_use]
    pub fn image_model(&self) -> String {
        self.default_image_model
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string())
    }

    #[must_use]
    pub fn video_model(&self) -> String {
        self.default_video_model
            .clone()
            .unwrap_or_else(|| DEFAULT_VIDEO_MODEL.to_string())
    }

    /// Directory generated files and relative download paths resolve against.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| PathBuf::from("./outputs"))
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
                .max(1),
        )
    }

    /// Resolve the default polling policy for video tasks.
    #[must_use]
    pub fn poll_config(&self) -> PollConfig {
        let defaults = PollConfig::default();
        let Some(poll) = &self.poll else {
            return defaults;
        };
        PollConfig::new(
            poll.max_attempts.unwrap_or(defaults.max_attempts),
            poll.interval_ms
                .map_or(defaults.interval, Duration::from_millis),
        )
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }
}

// === Defaults ===

fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("DOUBAO_MCP_CONFIG_PATH")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".doubao-mcp").join("config.toml"))
}

fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

// === Environment Overrides ===

fn apply_env_overrides(config: &mut Config) {
    if let Ok(value) = std::env::var("ARK_API_KEY") {
        config.api_key = Some(value);
    }
    if let Ok(value) = std::env::var("ARK_BASE_URL") {
        config.base_url = Some(value);
    }
    if let Ok(value) = std::env::var("DOUBAO_MCP_IMAGE_MODEL") {
        config.default_image_model = Some(value);
    }
    if let Ok(value) = std::env::var("DOUBAO_MCP_VIDEO_MODEL") {
        config.default_video_model = Some(value);
    }
    if let Ok(value) = std::env::var("DOUBAO_MCP_OUTPUT_DIR") {
        config.output_dir = Some(value);
    }
    if let Ok(value) = std::env::var("DOUBAO_MCP_REQUEST_TIMEOUT")
        && let Ok(parsed) = value.trim().parse::<u64>()
    {
        config.request_timeout = Some(parsed);
    }
    if let Ok(value) = std::env::var("DOUBAO_MCP_POLL_MAX_ATTEMPTS")
        && let Ok(parsed) = value.trim().parse::<u32>()
    {
        config.poll.get_or_insert_with(PollSettings::default).max_attempts = Some(parsed);
    }
    if let Ok(value) = std::env::var("DOUBAO_MCP_POLL_INTERVAL_MS")
        && let Ok(parsed) = value.trim().parse::<u64>()
    {
        config.poll.get_or_insert_with(PollSettings::default).interval_ms = Some(parsed);
    }
    if let Ok(value) = std::env::var("DOUBAO_MCP_VERBOSE") {
        config.verbose = Some(value == "1" || value.eq_ignore_ascii_case("true"));
    }
}

fn normalize_base_url(base: &str) -> String {
    base.trim()
        .trim_end_matches('/')
        .trim_end_matches("/api/v3")
        .trim_end_matches('/')
        .to_string()
}

fn apply_profile(config: ConfigFile, profile: Option<&str>) -> Result<Config> {
    let Some(profile_name) = profile else {
        return Ok(config.base);
    };
    let profiles = config.profiles.as_ref();
    match profiles.and_then(|profiles| profiles.get(profile_name)) {
        Some(override_cfg) => Ok(merge_config(config.base, override_cfg.clone())),
        None => {
            let available = profiles
                .map(|profiles| {
                    let mut keys = profiles.keys().cloned().collect::<Vec<_>>();
                    keys.sort();
                    if keys.is_empty() {
                        "none".to_string()
                    } else {
                        keys.join(", ")
                    }
                })
                .unwrap_or_else(|| "none".to_string());
            anyhow::bail!(
                "Profile '{}' not found. Available profiles: {}",
                profile_name,
                available
            )
        }
    }
}

fn merge_config(base: Config, override_cfg: Config) -> Config {
    let poll = match (override_cfg.poll, base.poll) {
        (Some(over), Some(base)) => Some(PollSettings {
            max_attempts: over.max_attempts.or(base.max_attempts),
            interval_ms: over.interval_ms.or(base.interval_ms),
        }),
        (over, base) => over.or(base),
    };

    Config {
        api_key: override_cfg.api_key.or(base.api_key),
        base_url: override_cfg.base_url.or(base.base_url),
        default_image_model: override_cfg
            .default_image_model
            .or(base.default_image_model),
        default_video_model: override_cfg
            .default_video_model
            .or(base.default_video_model),
        output_dir: override_cfg.output_dir.or(base.output_dir),
        request_timeout: override_cfg.request_timeout.or(base.request_timeout),
        poll,
        verbose: override_cfg.verbose.or(base.verbose),
    }
}
