// ABOUTME: Provider error types with SNAFU context selectors.
// ABOUTME: Each variant names the provider step that failed and keeps the cause.

use super::profile::ProfileError;
use super::shell::ShellError;
use crate::error::ErrorKind;
use snafu::Snafu;
use std::net::{AddrParseError, Ipv4Addr};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("error initializing the provider VM: {source}"))]
    Init { source: ShellError },

    #[snafu(display("error preparing the provider VM to start: {source}"))]
    Prepare { source: ShellError },

    #[snafu(display("error bringing the provider VM up: {source}"))]
    Up { source: ShellError },

    #[snafu(display("error while shutting down: {source}"))]
    Down { source: ShellError },

    #[snafu(display("error checking provider status: {source}"))]
    Status { source: ShellError },

    #[snafu(display("error reading provider IP address: {source}"))]
    Ip { source: ShellError },

    #[snafu(display("error assigning {ip} to the provider VM: {source}"))]
    AssignIp { ip: Ipv4Addr, source: ShellError },

    #[snafu(display("provider VM still has no IP address after {repairs} repair attempt(s)"))]
    NoIp { repairs: u32 },

    #[snafu(display(
        "provider VM has address {found}, expected {expected} after {repairs} repair attempt(s)"
    ))]
    WrongIp {
        found: Ipv4Addr,
        expected: Ipv4Addr,
        repairs: u32,
    },

    #[snafu(display("provider reported an invalid IP address {value:?}: {source}"))]
    InvalidIp {
        value: String,
        source: AddrParseError,
    },

    #[snafu(display("error checking provider installation: {source}"))]
    Install { source: std::io::Error },

    #[snafu(display("{source}"))]
    Profile { source: ProfileError },
}

impl ProviderError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Init { .. }
            | ProviderError::Prepare { .. }
            | ProviderError::Up { .. }
            | ProviderError::Down { .. }
            | ProviderError::Status { .. }
            | ProviderError::Ip { .. }
            | ProviderError::AssignIp { .. }
            | ProviderError::NoIp { .. }
            | ProviderError::WrongIp { .. } => ErrorKind::Transient,
            ProviderError::InvalidIp { .. } => ErrorKind::InternalInvariant,
            ProviderError::Install { .. } => ErrorKind::ConfigurationFatal,
            ProviderError::Profile { source } => match source {
                ProfileError::RangeMismatch { .. } => ErrorKind::InternalInvariant,
                _ => ErrorKind::ConfigurationFatal,
            },
        }
    }
}
