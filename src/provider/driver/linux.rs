// ABOUTME: Linux provider driver.
// ABOUTME: Maps /home into the VM as the "Users" shared folder before first start.

use super::{Boot2Docker, DriverSettings, Platform, ProviderDriver};
use crate::provider::shell::{CommandLine, Shell, ShellError};
use async_trait::async_trait;
use std::sync::Arc;

const VBOX_MANAGE: &str = "VBoxManage";
const SHARE_NAME: &str = "Users";
const SHARE_HOST_PATH: &str = "/home";

pub struct LinuxDriver {
    b2d: Boot2Docker,
    shell: Arc<dyn Shell>,
    vm_name: String,
}

impl LinuxDriver {
    pub fn new(shell: Arc<dyn Shell>, settings: &DriverSettings) -> Self {
        Self {
            b2d: Boot2Docker::new(shell.clone(), settings),
            shell,
            vm_name: settings.vm_name.clone(),
        }
    }
}

#[async_trait]
impl ProviderDriver for LinuxDriver {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    async fn run(&self, args: &[&str]) -> Result<String, ShellError> {
        self.b2d.run(args).await
    }

    async fn prepare_start(&self) -> Result<(), ShellError> {
        let info = CommandLine::new(VBOX_MANAGE).args([
            "showvminfo",
            self.vm_name.as_str(),
            "--machinereadable",
        ]);
        let vm_info = self.shell.exec(&info).await?;
        if has_shared_folder(&vm_info, SHARE_NAME) {
            tracing::debug!(vm = %self.vm_name, "shared folder already mapped");
            return Ok(());
        }

        tracing::info!(vm = %self.vm_name, "sharing {SHARE_HOST_PATH} as {SHARE_NAME}");
        let share = CommandLine::new(VBOX_MANAGE).args([
            "sharedfolder",
            "add",
            self.vm_name.as_str(),
            "--name",
            SHARE_NAME,
            "--hostpath",
            SHARE_HOST_PATH,
        ]);
        self.shell.exec(&share).await.map(|_| ())
    }

    async fn binary_installed(&self) -> bool {
        self.b2d.installed().await
    }
}

/// Whether `showvminfo --machinereadable` output lists a shared folder `name`.
pub fn has_shared_folder(vm_info: &str, name: &str) -> bool {
    vm_info
        .lines()
        .filter(|line| line.starts_with("SharedFolderName"))
        .filter_map(|line| line.split_once('='))
        .any(|(_, value)| value.trim().trim_matches('"') == name)
}
