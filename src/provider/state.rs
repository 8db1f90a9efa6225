// ABOUTME: Live state of the provider VM as reported by its status probe.
// ABOUTME: Never cached; derived from the status string on every query.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Down,
    Running,
    /// Probe failed or printed something unrecognized.
    Unknown,
}

impl ProviderState {
    pub fn from_status(status: &str) -> Self {
        match status.trim() {
            "running" => ProviderState::Running,
            "poweroff" | "aborted" | "saved" | "stopped" => ProviderState::Down,
            _ => ProviderState::Unknown,
        }
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderState::Down => "down",
            ProviderState::Running => "running",
            ProviderState::Unknown => "unknown",
        })
    }
}
