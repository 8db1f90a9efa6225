// ABOUTME: Fixed network layout of the provider VM and the engine endpoint.
// ABOUTME: Host-only addresses, the reserved VM address and engine port.

use std::net::Ipv4Addr;

/// Address of the host side of the host-only network.
pub const HOST_ONLY_IP: Ipv4Addr = Ipv4Addr::new(10, 13, 37, 1);
/// Address the VM must end up with.
pub const DEFAULT_IP: Ipv4Addr = Ipv4Addr::new(10, 13, 37, 42);
pub const NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);
pub const BROADCAST: Ipv4Addr = Ipv4Addr::new(10, 13, 37, 255);

pub const ENGINE_PROTOCOL: &str = "http";
pub const ENGINE_PORT: u16 = 2375;

/// Whether `ip` carries the reserved final octet.
pub fn is_expected_ip(ip: Ipv4Addr) -> bool {
    ip.octets()[3] == DEFAULT_IP.octets()[3]
}

/// Whether provider output says the VM came up without an address.
pub fn reports_missing_ip(output: &str) -> bool {
    const MARKERS: [&str; 4] = [
        "could not get ip",
        "failed to get machine ip",
        "error requesting ip",
        "no ip address",
    ];
    let output = output.to_ascii_lowercase();
    MARKERS.iter().any(|m| output.contains(m))
}
