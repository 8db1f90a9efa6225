// ABOUTME: Per-platform provider drivers behind one ProviderDriver capability trait.
// ABOUTME: Linux, macOS and Windows differ only in pre-start repair and install probes.

mod linux;
mod macos;
mod windows;

pub use linux::{LinuxDriver, has_shared_folder};
pub use macos::MacDriver;
pub use windows::{WindowsDriver, host_only_address_set, parse_host_only_adapter};

use super::network::{BROADCAST, NETMASK};
use super::shell::{CommandLine, Shell, ShellError};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Where the provider binary is installed when not configured.
    pub fn default_executable(self, sys_conf_root: &Path) -> PathBuf {
        match self {
            Platform::Windows => {
                PathBuf::from(r"C:\Program Files\Boot2Docker for Windows\boot2docker.exe")
            }
            Platform::MacOs => PathBuf::from("/usr/local/bin/boot2docker"),
            Platform::Linux => sys_conf_root.join("bin").join("boot2docker"),
        }
    }

    /// Map a host path to where the VM sees it through the shared folder.
    pub fn bind_path(self, path: &str) -> String {
        match self {
            Platform::Windows => {
                let path = path.replace('\\', "/");
                match path.get(..3) {
                    Some(drive) if drive.eq_ignore_ascii_case("c:/") => format!("/c/{}", &path[3..]),
                    _ => path,
                }
            }
            Platform::Linux => path.replacen("/home", "/Users", 1),
            Platform::MacOs => path.to_string(),
        }
    }
}

/// Platform-specific control of the provider VM.
#[async_trait]
pub trait ProviderDriver: Send + Sync {
    fn platform(&self) -> Platform;

    /// Run a provider subcommand (`init`, `up`, `status`...) and return its
    /// trimmed standard output.
    async fn run(&self, args: &[&str]) -> Result<String, ShellError>;

    /// Repair host-side state that must be in place before the VM starts.
    async fn prepare_start(&self) -> Result<(), ShellError>;

    /// Whether the provider binary is present on this machine.
    async fn binary_installed(&self) -> bool;

    async fn vm_exists(&self) -> bool {
        self.run(&["info"]).await.is_ok()
    }

    /// Force the VM's host-only interface to `ip` over the management
    /// connection.
    async fn assign_ip(&self, ip: Ipv4Addr) -> Result<(), ShellError> {
        let ifconfig =
            format!("sudo ifconfig eth1 {ip} netmask {NETMASK} broadcast {BROADCAST} up");
        self.run(&["ssh", ifconfig.as_str()]).await.map(|_| ())
    }
}

/// Settings every driver needs to invoke the provider binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    pub executable: PathBuf,
    pub vm_name: String,
    /// Provider root, exported to the provider as BOOT2DOCKER_DIR.
    pub root: PathBuf,
}

/// Invokes the boot2docker binary with the provider root in its environment.
#[derive(Clone)]
pub struct Boot2Docker {
    shell: Arc<dyn Shell>,
    executable: PathBuf,
    global_args: Vec<String>,
    root: PathBuf,
}

impl Boot2Docker {
    pub fn new(shell: Arc<dyn Shell>, settings: &DriverSettings) -> Self {
        Self {
            shell,
            executable: settings.executable.clone(),
            global_args: Vec::new(),
            root: settings.root.clone(),
        }
    }

    pub fn with_global_arg(mut self, arg: impl Into<String>) -> Self {
        self.global_args.push(arg.into());
        self
    }

    pub fn command(&self, args: &[&str]) -> CommandLine {
        CommandLine::new(self.executable.display().to_string())
            .args(self.global_args.iter().cloned())
            .args(args.iter().copied())
            .env("BOOT2DOCKER_DIR", self.root.display().to_string())
    }

    pub async fn run(&self, args: &[&str]) -> Result<String, ShellError> {
        let out = self.shell.exec(&self.command(args)).await?;
        Ok(out.trim().to_string())
    }

    /// An absolute executable must exist as a file; a bare name must
    /// resolve through `which`.
    pub async fn installed(&self) -> bool {
        if self.executable.is_absolute() {
            return tokio::fs::metadata(&self.executable)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
        }
        let which = CommandLine::new("which").arg(self.executable.display().to_string());
        match self.shell.exec(&which).await {
            Ok(out) => !out.trim().is_empty(),
            Err(_) => false,
        }
    }
}

/// Pick the driver for the machine we are running on.
pub fn for_platform(shell: Arc<dyn Shell>, settings: &DriverSettings) -> Box<dyn ProviderDriver> {
    let platform = Platform::current();
    tracing::debug!(?platform, "selecting provider driver");
    match platform {
        Platform::Linux => Box::new(LinuxDriver::new(shell, settings)),
        Platform::MacOs => Box::new(MacDriver::new(shell, settings)),
        Platform::Windows => Box::new(WindowsDriver::new(shell, settings)),
    }
}
