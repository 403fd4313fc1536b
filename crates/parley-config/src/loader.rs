use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::ParleyConfig;
use parley_core::{ParleyError, Result};

/// Loads and holds the Parley configuration.
pub struct ConfigLoader {
    config: ParleyConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > PARLEY_CONFIG env > ~/.parley/parley.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("PARLEY_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".parley")
            .join("parley.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Same as [`ConfigLoader::load`] with an injectable environment lookup.
    pub fn load_with_env(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            Self::read_file(&config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            ParleyConfig::default()
        };

        let config = apply_env_overrides(config, env);

        // Log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => return Err(ParleyError::Config(e)),
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn read_file(path: &Path) -> Result<ParleyConfig> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str::<ParleyConfig>(&raw).map_err(|e| {
            ParleyError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get a copy of the loaded config.
    pub fn get(&self) -> ParleyConfig {
        self.config.clone()
    }

    /// Path the config was resolved to (it may not exist).
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

/// Apply env var overrides (PARLEY_AGENT_MODEL, PORT, API keys, ...).
pub fn apply_env_overrides(
    mut config: ParleyConfig,
    env: impl Fn(&str) -> Option<String>,
) -> ParleyConfig {
    if let Some(v) = env("PARLEY_AGENT_MODEL") {
        config.agent.model = v;
    }
    if let Some(v) = env("PARLEY_MAX_TOOL_ROUNDS") {
        if let Ok(rounds) = v.parse::<u32>() {
            config.agent.max_tool_rounds = rounds;
        }
    }
    if let Some(port) = env("PORT").and_then(|v| v.parse::<u16>().ok()) {
        config.server.listen = format!("0.0.0.0:{port}");
    }
    // An explicit listen address beats the bare PORT convention.
    if let Some(v) = env("PARLEY_SERVER_LISTEN") {
        config.server.listen = v;
    }
    if let Some(v) = env("PARLEY_LOG_LEVEL") {
        config.logging.level = v;
    }

    // API keys: env var fills in when the config file doesn't have the key set.
    fill(&mut config.services.gemini_api_key, &env, "GEMINI_API_KEY");
    fill(&mut config.telegram.token, &env, "TELEGRAM_BOT_TOKEN");
    fill(&mut config.services.google_search_api_key, &env, "GOOGLE_SEARCH_API_KEY");
    fill(&mut config.services.google_cse_id, &env, "GOOGLE_CSE_ID");
    fill(&mut config.services.cloudinary_cloud_name, &env, "CLOUDINARY_CLOUD_NAME");
    fill(&mut config.services.cloudinary_api_key, &env, "CLOUDINARY_API_KEY");
    fill(&mut config.services.cloudinary_api_secret, &env, "CLOUDINARY_API_SECRET");
    config
}

fn fill(slot: &mut Option<String>, env: &impl Fn(&str) -> Option<String>, key: &str) {
    if slot.is_none() {
        *slot = env(key).filter(|v| !v.is_empty());
    }
}
