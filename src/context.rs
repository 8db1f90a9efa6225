// ABOUTME: Wires configuration, the provider and the lazily connected runtime together.
// ABOUTME: Container and image managers are built on demand against the provider's endpoint.

use crate::config::Config;
use crate::engine::ContainerManager;
use crate::error::Result;
use crate::image::ImageManager;
use crate::provider::{self, Provider, SystemShell};
use crate::runtime::{BollardRuntime, RuntimeClient};
use std::sync::Arc;

/// One engine per process.
pub struct Engine {
    config: Config,
    provider: Provider,
    client: RuntimeClient,
}

impl Engine {
    pub fn new(config: Config, provider: Provider) -> Self {
        Self {
            config,
            provider,
            client: RuntimeClient::new(),
        }
    }

    /// Provider driver for this platform, invoked through the system shell.
    pub fn from_config(config: Config) -> Result<Self> {
        let driver = provider::driver::for_platform(Arc::new(SystemShell), &config.driver_settings()?);
        let provider = Provider::new(driver, config.provider_settings()?);
        Ok(Self::new(config, provider))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Runtime connected to the provider VM; connects on first use.
    pub async fn runtime(&self) -> Result<Arc<BollardRuntime>> {
        let runtime = self.client.get(|| self.provider.engine_config()).await?;
        Ok(runtime)
    }

    pub async fn containers(&self) -> Result<ContainerManager<BollardRuntime>> {
        let runtime = self.runtime().await?;
        Ok(ContainerManager::new(runtime, self.config.manager_settings()))
    }

    pub async fn images(&self) -> Result<ImageManager<BollardRuntime>> {
        let runtime = self.runtime().await?;
        Ok(ImageManager::new(runtime, self.config.image_settings()?))
    }
}
