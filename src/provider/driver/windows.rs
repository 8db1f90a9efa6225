// ABOUTME: Windows provider driver.
// ABOUTME: Keeps the VirtualBox host-only adapter on its static address before start.

use super::{Boot2Docker, DriverSettings, Platform, ProviderDriver};
use crate::provider::network::HOST_ONLY_IP;
use crate::provider::shell::{CommandLine, Shell, ShellError};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;

const VBOX_MANAGE: &str = r"C:\Program Files\Oracle\VirtualBox\VBoxManage.exe";

pub struct WindowsDriver {
    b2d: Boot2Docker,
    shell: Arc<dyn Shell>,
    vm_name: String,
}

impl WindowsDriver {
    pub fn new(shell: Arc<dyn Shell>, settings: &DriverSettings) -> Self {
        Self {
            b2d: Boot2Docker::new(shell.clone(), settings)
                .with_global_arg(format!("--hostip={HOST_ONLY_IP}")),
            shell,
            vm_name: settings.vm_name.clone(),
        }
    }

    async fn host_only_adapter(&self) -> Result<Option<String>, ShellError> {
        let info = CommandLine::new(VBOX_MANAGE).args(["showvminfo", self.vm_name.as_str()]);
        let output = self.shell.exec(&info).await?;
        let adapter = parse_host_only_adapter(&output);
        tracing::debug!(?adapter, "windows host-only adapter");
        Ok(adapter)
    }
}

#[async_trait]
impl ProviderDriver for WindowsDriver {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    async fn run(&self, args: &[&str]) -> Result<String, ShellError> {
        self.b2d.run(args).await
    }

    async fn prepare_start(&self) -> Result<(), ShellError> {
        let Some(adapter) = self.host_only_adapter().await? else {
            tracing::warn!(vm = %self.vm_name, "no host-only adapter found, skipping repair");
            return Ok(());
        };

        let show = CommandLine::new("netsh").args(["interface", "ipv4", "show", "addresses"]);
        // netsh exits non-zero on some hosts while still printing the table.
        let addresses = match self.shell.exec(&show).await {
            Ok(out) => out,
            Err(ShellError::Failed { stderr, .. }) => stderr,
            Err(e) => return Err(e),
        };
        if host_only_address_set(&addresses, &adapter, HOST_ONLY_IP) {
            tracing::debug!(%adapter, "host-only adapter already configured");
            return Ok(());
        }

        tracing::info!(%adapter, "setting host-only adapter to {HOST_ONLY_IP}");
        let set = CommandLine::new("netsh").args([
            "interface".to_string(),
            "ipv4".to_string(),
            "set".to_string(),
            "address".to_string(),
            format!("name={adapter}"),
            "static".to_string(),
            HOST_ONLY_IP.to_string(),
            "store=persistent".to_string(),
        ]);
        self.shell.exec_elevated(&set).await.map(|_| ())
    }

    async fn binary_installed(&self) -> bool {
        self.b2d.installed().await
    }
}

/// Extract the host-only network name from `VBoxManage showvminfo` output.
///
/// VirtualBox reports the adapter as `'... Ethernet Adapter #2'` while netsh
/// knows the same interface as `... Network #2`.
pub fn parse_host_only_adapter(vm_info: &str) -> Option<String> {
    let line = vm_info.lines().find(|l| l.contains("Host-only"))?;
    let start = line.find('\'')?;
    let end = line.rfind('\'')?;
    if end <= start {
        return None;
    }
    Some(line[start + 1..end].replace("Ethernet Adapter", "Network"))
}

/// Whether the netsh address table shows `ip` on `adapter`.
pub fn host_only_address_set(netsh_output: &str, adapter: &str, ip: Ipv4Addr) -> bool {
    let header = format!("Configuration for interface \"{adapter}\"");
    let Some(start) = netsh_output.find(&header) else {
        return false;
    };
    let section = &netsh_output[start..];
    let section = match section.find("Subnet Prefix") {
        Some(end) => &section[..end],
        None => section,
    };
    section.contains(&ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VM_INFO: &str = "NIC 1: MAC: 080027, Attachment: NAT, Cable connected: on\n\
NIC 2: MAC: 080028, Attachment: Host-only Interface 'VirtualBox Host-Only Ethernet Adapter #2', Cable connected: on\n";

    const NETSH: &str = "Configuration for interface \"Ethernet\"\n    DHCP enabled: Yes\n    IP Address: 10.13.37.1\n    Subnet Prefix: 10.0.0.0/24\n\n\
Configuration for interface \"VirtualBox Host-Only Network #2\"\n    DHCP enabled: No\n    IP Address: 192.168.56.1\n    Subnet Prefix: 192.168.56.0/24\n";

    #[test]
    fn parses_adapter_name() {
        assert_eq!(
            parse_host_only_adapter(VM_INFO).as_deref(),
            Some("VirtualBox Host-Only Network #2")
        );
        assert_eq!(parse_host_only_adapter("NIC 1: NAT"), None);
    }

    #[test]
    fn address_check_is_scoped_to_adapter() {
        let adapter = "VirtualBox Host-Only Network #2";
        // 10.13.37.1 belongs to another interface and must not count.
        assert!(!host_only_address_set(NETSH, adapter, HOST_ONLY_IP));
        assert!(host_only_address_set(
            NETSH,
            adapter,
            Ipv4Addr::new(192, 168, 56, 1)
        ));
        assert!(!host_only_address_set(NETSH, "Missing", HOST_ONLY_IP));
    }
}
