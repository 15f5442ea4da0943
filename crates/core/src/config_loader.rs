use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

/// Default location of the console's own settings file.
pub const DEFAULT_CONFIG_PATH: &str = "config/Console.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads console configuration from the default TOML file and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads console configuration by layering built-in defaults, the TOML file
    /// at `path` (if present) and `NUBOT_`-prefixed environment variables.
    ///
    /// Nested keys use a double underscore, e.g. `NUBOT_SERVER__BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let config: AppConfig = Self::figment(path)
            .extract()
            .with_context(|| format!("Failed to load console config from {}", path.display()))?;

        tracing::debug!(
            path = %path.display(),
            base_url = %config.server.base_url,
            "Console config loaded"
        );
        Ok(config)
    }

    /// Loads configuration with a profile overlay (`Console.<profile>.toml`
    /// next to `path`).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed.
    pub fn load_with_profile(path: impl AsRef<Path>, profile: &str) -> Result<AppConfig> {
        let path = path.as_ref();
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Toml::file(profile_path(path, profile)))
            .merge(Env::prefixed("NUBOT_").split("__"))
            .extract()
            .with_context(|| {
                format!(
                    "Failed to load console config from {} (profile {profile})",
                    path.display()
                )
            })?;

        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("NUBOT_").split("__"))
    }
}

fn profile_path(path: &Path, profile: &str) -> PathBuf {
    path.with_file_name(format!("Console.{profile}.toml"))
}

/// Everything needed to rebuild the console config: the file, an optional
/// profile overlay and command-line overrides applied last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    path: PathBuf,
    profile: Option<String>,
    base_url: Option<String>,
}

impl ConfigSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            profile: None,
            base_url: None,
        }
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    /// Server URL that wins over whatever the files say.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Files whose edits should trigger a reload.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.path.clone()];
        if let Some(profile) = &self.profile {
            files.push(profile_path(&self.path, profile));
        }
        files
    }

    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed.
    pub fn load(&self) -> Result<AppConfig> {
        let mut config = match &self.profile {
            Some(profile) => ConfigLoader::load_with_profile(&self.path, profile)?,
            None => ConfigLoader::load_from(&self.path)?,
        };
        if let Some(url) = &self.base_url {
            config.server.base_url.clone_from(url);
        }
        Ok(config)
    }
}
