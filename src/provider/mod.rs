// ABOUTME: Provider lifecycle state machine for the VM hosting the container runtime.
// ABOUTME: Bounded-retry up/down, IP self-healing and the memoized engine endpoint.

pub mod driver;
mod error;
pub mod events;
pub mod network;
pub mod profile;
pub mod shell;
mod state;

pub use driver::{DriverSettings, Platform, ProviderDriver};
pub use error::ProviderError;
pub use events::{EventBus, LifecycleEvent};
pub use profile::{ProfileError, ProviderProfile};
pub use shell::{CommandLine, Shell, ShellError, SystemShell};
pub use state::ProviderState;

use crate::retry::{RetryPolicy, retry};
use error::{
    AssignIpSnafu, DownSnafu, InitSnafu, InstallSnafu, InvalidIpSnafu, IpSnafu, NoIpSnafu,
    PrepareSnafu, ProfileSnafu, StatusSnafu, UpSnafu, WrongIpSnafu,
};
use snafu::ResultExt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tokio::sync::OnceCell;

/// Connection parameters for the runtime API inside the VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEndpoint {
    pub protocol: String,
    pub host: Ipv4Addr,
    pub port: u16,
}

impl EngineEndpoint {
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Tunables for the provider state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Directory holding the provider profile.
    pub root: PathBuf,
    pub up_attempts: u32,
    pub down_attempts: u32,
    /// Upper bound on manual-IP repair rounds in `up` and `get_ip`.
    pub ip_repairs: u32,
    pub disk_size: Option<u64>,
}

impl ProviderSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            up_attempts: 3,
            down_attempts: 3,
            ip_repairs: 1,
            disk_size: None,
        }
    }

    pub fn profile_path(&self) -> PathBuf {
        self.root.join("profile")
    }
}

#[derive(Debug, Clone)]
pub struct UpOptions {
    pub retry: RetryPolicy,
    /// Passed to `init` on the first round only.
    pub disk_size: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct DownOptions {
    pub retry: RetryPolicy,
}

/// Drives the provider VM through its driver.
pub struct Provider {
    driver: Box<dyn ProviderDriver>,
    settings: ProviderSettings,
    events: EventBus,
    probe: RetryPolicy,
    profile: OnceCell<ProviderProfile>,
    endpoint: OnceCell<EngineEndpoint>,
}

impl Provider {
    pub fn new(driver: Box<dyn ProviderDriver>, settings: ProviderSettings) -> Self {
        Self {
            driver,
            settings,
            events: EventBus::new(),
            probe: RetryPolicy::new(3),
            profile: OnceCell::new(),
            endpoint: OnceCell::new(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn platform(&self) -> Platform {
        self.driver.platform()
    }

    pub fn up_options(&self) -> UpOptions {
        UpOptions {
            retry: RetryPolicy::new(self.settings.up_attempts),
            disk_size: self.settings.disk_size,
        }
    }

    pub fn down_options(&self) -> DownOptions {
        DownOptions {
            retry: RetryPolicy::new(self.settings.down_attempts),
        }
    }

    /// Bring the VM up.
    ///
    /// init -> status -> (pre-start repair) -> up. When the provider reports
    /// it could not get an address, the reserved IP is assigned by hand and
    /// the sequence runs again, at most `ip_repairs` times.
    pub async fn up(&self, opts: &UpOptions) -> Result<(), ProviderError> {
        tracing::info!(?opts, "starting provider");
        self.events.emit(LifecycleEvent::PreUp);

        let mut repairs = 0;
        loop {
            let disk_size = if repairs == 0 { opts.disk_size } else { None };
            let init = init_args(disk_size);
            retry(&opts.retry, |attempt| {
                tracing::info!("initializing provider VM [{attempt}]");
                let args: Vec<&str> = init.iter().map(String::as_str).collect();
                async move { self.driver.run(&args).await }
            })
            .await
            .context(InitSnafu)?;

            if self.state().await != ProviderState::Running {
                retry(&opts.retry, |attempt| {
                    tracing::info!("preparing provider VM [{attempt}]");
                    self.driver.prepare_start()
                })
                .await
                .context(PrepareSnafu)?;
            }

            let outcome = retry(&opts.retry, |attempt| {
                tracing::info!("bringing provider VM up [{attempt}]");
                self.driver.run(&["up"])
            })
            .await;
            let missing_ip = match &outcome {
                Ok(output) => network::reports_missing_ip(output),
                Err(e) => network::reports_missing_ip(&e.to_string()),
            };
            if !missing_ip {
                outcome.context(UpSnafu)?;
                break;
            }

            if repairs >= self.settings.ip_repairs {
                return NoIpSnafu { repairs }.fail();
            }
            repairs += 1;
            tracing::warn!("provider VM has no IP address, assigning {}", network::DEFAULT_IP);
            self.assign_default_ip(&opts.retry).await?;
        }

        tracing::info!("provider VM is up");
        self.events.emit(LifecycleEvent::PostUp);
        Ok(())
    }

    /// Shut the VM down.
    pub async fn down(&self, opts: &DownOptions) -> Result<(), ProviderError> {
        self.events.emit(LifecycleEvent::PreDown);
        retry(&opts.retry, |attempt| {
            tracing::info!("shutting down [{attempt}]");
            self.driver.run(&["down"])
        })
        .await
        .context(DownSnafu)?;
        tracing::info!("shut down successful");
        self.events.emit(LifecycleEvent::PostDown);
        Ok(())
    }

    /// Raw status string from the provider, trimmed.
    pub async fn status(&self) -> Result<String, ProviderError> {
        let status = retry(&self.probe, |attempt| {
            tracing::debug!("checking status [{attempt}]");
            self.driver.run(&["status"])
        })
        .await
        .context(StatusSnafu)?;
        Ok(status.trim().to_string())
    }

    /// Status mapped onto the three logical states. A failed probe is
    /// `Unknown`, not an error.
    pub async fn state(&self) -> ProviderState {
        match self.status().await {
            Ok(status) => ProviderState::from_status(&status),
            Err(e) => {
                tracing::debug!("status probe failed: {e}");
                ProviderState::Unknown
            }
        }
    }

    pub async fn is_up(&self) -> Result<bool, ProviderError> {
        Ok(self.status().await? == "running")
    }

    pub async fn is_down(&self) -> Result<bool, ProviderError> {
        self.is_up().await.map(|up| !up)
    }

    /// The VM's address, repaired to the reserved address when needed.
    pub async fn get_ip(&self) -> Result<Ipv4Addr, ProviderError> {
        let mut repairs = 0;
        loop {
            let raw = retry(&self.probe, |_| self.driver.run(&["ip"]))
                .await
                .context(IpSnafu)?;
            let raw = raw.trim();
            let ip: Ipv4Addr = raw.parse().context(InvalidIpSnafu { value: raw })?;
            if network::is_expected_ip(ip) {
                return Ok(ip);
            }

            if repairs >= self.settings.ip_repairs {
                return WrongIpSnafu {
                    found: ip,
                    expected: network::DEFAULT_IP,
                    repairs,
                }
                .fail();
            }
            repairs += 1;
            tracing::warn!(%ip, "provider VM has the wrong address, repairing");
            let opts = self.up_options();
            self.assign_default_ip(&opts.retry).await?;
            self.up(&opts).await?;
        }
    }

    /// Runtime endpoint, computed once per provider.
    ///
    /// A failed lookup is not cached; the next call probes again.
    pub async fn engine_config(&self) -> Result<EngineEndpoint, ProviderError> {
        self.endpoint
            .get_or_try_init(|| async {
                let host = self.get_ip().await?;
                Ok::<_, ProviderError>(EngineEndpoint {
                    protocol: network::ENGINE_PROTOCOL.to_string(),
                    host,
                    port: network::ENGINE_PORT,
                })
            })
            .await
            .cloned()
    }

    pub async fn profile(&self) -> Result<&ProviderProfile, ProviderError> {
        let path = self.settings.profile_path();
        self.profile
            .get_or_try_init(|| ProviderProfile::load(&path))
            .await
            .context(ProfileSnafu)
    }

    pub async fn has_profile(&self) -> Result<bool, ProviderError> {
        tokio::fs::try_exists(self.settings.profile_path())
            .await
            .context(InstallSnafu)
    }

    /// Binary present, profile present and VM registered.
    pub async fn is_installed(&self) -> Result<bool, ProviderError> {
        if !self.driver.binary_installed().await {
            tracing::debug!("provider binary not found");
            return Ok(false);
        }
        if !self.has_profile().await? {
            tracing::debug!("provider profile not found");
            return Ok(false);
        }
        Ok(self.driver.vm_exists().await)
    }

    /// Every address the VM may be given, per the profile.
    pub async fn server_ips(&self) -> Result<Vec<Ipv4Addr>, ProviderError> {
        self.profile()
            .await?
            .server_ips()
            .context(ProfileSnafu)
    }

    /// Host path as seen from inside the VM.
    pub fn bind_path(&self, path: &str) -> String {
        self.platform().bind_path(path)
    }

    async fn assign_default_ip(&self, policy: &RetryPolicy) -> Result<(), ProviderError> {
        let ip = network::DEFAULT_IP;
        retry(policy, |_| self.driver.assign_ip(ip))
            .await
            .context(AssignIpSnafu { ip })
    }
}

fn init_args(disk_size: Option<u64>) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(size) = disk_size {
        args.push(format!("--disksize={size}"));
    }
    args.push("init".to_string());
    args
}
