// ABOUTME: Configuration types and parsing for kbox.yml.
// ABOUTME: Every key has a default; a missing file is the all-defaults config.

mod provider;

pub use provider::ProviderConfig;

use crate::engine::ManagerSettings;
use crate::error::{Error, Result};
use crate::image::ImageSettings;
use crate::provider::{DriverSettings, Platform, ProviderSettings};
use crate::types::ImageDefaults;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "kbox.yml";
pub const CONFIG_FILENAME_ALT: &str = "kbox.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".kbox/config.yml";

pub const ENV_PROVIDER_ROOT: &str = "KBOX_PROVIDER_ROOT";
pub const ENV_SRC_ROOT: &str = "KBOX_SRC_ROOT";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Tool root, `$HOME/.kalabox` when unset.
    pub sys_conf_root: Option<PathBuf>,

    /// Provider root, `<sys_conf_root>/.provider` when unset.
    pub sys_provider_root: Option<PathBuf>,

    /// Root for default build-definition lookup, the working directory when unset.
    pub src_root: Option<PathBuf>,

    pub build_local: bool,

    pub images: ImageDefaults,

    #[serde(with = "humantime_serde")]
    pub list_timeout: Duration,

    pub provider: ProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sys_conf_root: None,
            sys_provider_root: None,
            src_root: None,
            build_local: false,
            images: ImageDefaults::default(),
            list_timeout: Duration::from_secs(30),
            provider: ProviderConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document is null to serde_yaml.
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let parsed = std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|content| Self::from_yaml(&content));
        match parsed {
            Ok(config) => Ok(config.with_env_overrides()),
            Err(e) => Err(Error::ConfigFile {
                path: path.to_path_buf(),
                source: Box::new(e),
            }),
        }
    }

    /// Load the first config file found in `dir`, or the defaults when
    /// there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::load(path);
            }
        }

        tracing::debug!(dir = %dir.display(), "no configuration file, using defaults");
        Ok(Self::default().with_env_overrides())
    }

    /// Apply `KBOX_PROVIDER_ROOT` and `KBOX_SRC_ROOT` on top of the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(root) = env_path(ENV_PROVIDER_ROOT) {
            self.sys_provider_root = Some(root);
        }
        if let Some(root) = env_path(ENV_SRC_ROOT) {
            self.src_root = Some(root);
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.list_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "list_timeout must be positive".to_string(),
            ));
        }
        if self.images.namespace.is_empty() || self.images.tag.is_empty() {
            return Err(Error::InvalidConfig(
                "images.namespace and images.tag cannot be empty".to_string(),
            ));
        }
        self.provider.validate().map_err(Error::InvalidConfig)
    }

    pub fn conf_root(&self) -> Result<PathBuf> {
        match &self.sys_conf_root {
            Some(root) => Ok(root.clone()),
            None => home_dir()
                .map(|home| home.join(".kalabox"))
                .ok_or(Error::HomeDirUnknown),
        }
    }

    pub fn provider_root(&self) -> Result<PathBuf> {
        match &self.sys_provider_root {
            Some(root) => Ok(root.clone()),
            None => Ok(self.conf_root()?.join(".provider")),
        }
    }

    pub fn source_root(&self) -> Result<PathBuf> {
        match &self.src_root {
            Some(root) => Ok(root.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    pub fn driver_settings(&self) -> Result<DriverSettings> {
        let executable = match &self.provider.executable {
            Some(path) => path.clone(),
            None => Platform::current().default_executable(&self.conf_root()?),
        };
        Ok(DriverSettings {
            executable,
            vm_name: self.provider.vm_name.clone(),
            root: self.provider_root()?,
        })
    }

    pub fn provider_settings(&self) -> Result<ProviderSettings> {
        Ok(ProviderSettings {
            root: self.provider_root()?,
            up_attempts: self.provider.up_attempts,
            down_attempts: self.provider.down_attempts,
            ip_repairs: self.provider.ip_repairs,
            disk_size: self.provider.disk_size,
        })
    }

    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            list_timeout: self.list_timeout,
            images: self.images.clone(),
        }
    }

    pub fn image_settings(&self) -> Result<ImageSettings> {
        Ok(ImageSettings {
            images: self.images.clone(),
            src_root: self.source_root()?,
            build_local: self.build_local,
        })
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn home_dir() -> Option<PathBuf> {
    env_path("HOME").or_else(|| env_path("USERPROFILE"))
}
