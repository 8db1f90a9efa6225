// ABOUTME: macOS provider driver.
// ABOUTME: boot2docker handles shares and networking itself, so no pre-start repair.

use super::{Boot2Docker, DriverSettings, Platform, ProviderDriver};
use crate::provider::shell::{Shell, ShellError};
use async_trait::async_trait;
use std::sync::Arc;

pub struct MacDriver {
    b2d: Boot2Docker,
}

impl MacDriver {
    pub fn new(shell: Arc<dyn Shell>, settings: &DriverSettings) -> Self {
        Self {
            b2d: Boot2Docker::new(shell, settings),
        }
    }
}

#[async_trait]
impl ProviderDriver for MacDriver {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    async fn run(&self, args: &[&str]) -> Result<String, ShellError> {
        self.b2d.run(args).await
    }

    async fn prepare_start(&self) -> Result<(), ShellError> {
        Ok(())
    }

    async fn binary_installed(&self) -> bool {
        self.b2d.installed().await
    }
}
