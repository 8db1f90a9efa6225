// ABOUTME: Reader for the provider VM profile file (KEY=VALUE lines).
// ABOUTME: Exposes the LowerIP/UpperIP range the VM may take an address from.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

pub const UPPER_IP_KEY: &str = "UpperIP";
pub const LOWER_IP_KEY: &str = "LowerIP";

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("error reading provider profile \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("provider profile has no {0} entry")]
    MissingKey(&'static str),

    #[error("provider profile {key} is not an IPv4 address: {value:?}")]
    InvalidAddress { key: &'static str, value: String },

    #[error("provider profile range {lower}..{upper} spans more than one /24 network")]
    RangeMismatch { lower: Ipv4Addr, upper: Ipv4Addr },
}

/// Immutable key/value view of the provider profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderProfile {
    values: BTreeMap<String, String>,
}

impl ProviderProfile {
    /// Parse profile text. Blank lines, `#` comments and lines without `=`
    /// are skipped; surrounding quotes on values are removed.
    pub fn parse(content: &str) -> Self {
        let values = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), unquote(value.trim()).to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { values }
    }

    pub async fn load(path: &Path) -> Result<Self, ProfileError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ProfileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::parse(&content))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn upper_ip(&self) -> Result<Ipv4Addr, ProfileError> {
        self.address(UPPER_IP_KEY)
    }

    pub fn lower_ip(&self) -> Result<Ipv4Addr, ProfileError> {
        self.address(LOWER_IP_KEY)
    }

    fn address(&self, key: &'static str) -> Result<Ipv4Addr, ProfileError> {
        let value = self.get(key).ok_or(ProfileError::MissingKey(key))?;
        value.parse().map_err(|_| ProfileError::InvalidAddress {
            key,
            value: value.to_string(),
        })
    }

    /// Every address from LowerIP to UpperIP, both included.
    ///
    /// Both bounds must share their first three octets.
    pub fn server_ips(&self) -> Result<Vec<Ipv4Addr>, ProfileError> {
        let lower = self.lower_ip()?;
        let upper = self.upper_ip()?;
        let [a, b, c, first] = lower.octets();
        let [ua, ub, uc, last] = upper.octets();
        if [a, b, c] != [ua, ub, uc] {
            return Err(ProfileError::RangeMismatch { lower, upper });
        }
        Ok((first..=last).map(|d| Ipv4Addr::new(a, b, c, d)).collect())
    }
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value)
}
