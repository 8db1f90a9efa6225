// ABOUTME: Codec for the container naming scheme that marks containers as ours.
// ABOUTME: kalabox_<name> for tool containers, kb_<app>_<name> for app containers.

use std::fmt;
use thiserror::Error;

/// Prefix of containers owned by the tool itself.
pub const MANAGER_PREFIX: &str = "kalabox";
/// Prefix of containers owned by an application.
pub const APP_PREFIX: &str = "kb";
/// Reserved separator between name segments. Never valid inside a segment.
pub const SEPARATOR: char = '_';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerNameError {
    #[error("container name segment cannot be empty")]
    Empty,

    #[error("invalid character {1:?} in container name segment: {0}")]
    InvalidChar(String, char),
}

/// Which of the two naming shapes a container uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Manager,
    App,
}

impl Scheme {
    pub fn prefix(self) -> &'static str {
        match self {
            Scheme::Manager => MANAGER_PREFIX,
            Scheme::App => APP_PREFIX,
        }
    }
}

/// Decoded parts of a container name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerName {
    Manager { name: String },
    App { app: String, name: String },
}

impl ContainerName {
    pub fn manager(name: &str) -> Result<Self, ContainerNameError> {
        validate_segment(name)?;
        Ok(Self::Manager {
            name: name.to_string(),
        })
    }

    pub fn app(app: &str, name: &str) -> Result<Self, ContainerNameError> {
        validate_segment(app)?;
        validate_segment(name)?;
        Ok(Self::App {
            app: app.to_string(),
            name: name.to_string(),
        })
    }

    /// Fresh single-use name for a throwaway container.
    ///
    /// Collisions against live containers are checked by the caller, see
    /// `ContainerManager::create_temp_name`.
    pub fn temp() -> Self {
        Self::Manager {
            name: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    /// Decode a runtime container name. Returns `None` for names that are
    /// not in either of our shapes; such containers are ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split(SEPARATOR).collect();
        let parsed = match parts.as_slice() {
            [prefix, name] if *prefix == MANAGER_PREFIX => Self::Manager {
                name: (*name).to_string(),
            },
            [prefix, app, name] if *prefix == APP_PREFIX => Self::App {
                app: (*app).to_string(),
                name: (*name).to_string(),
            },
            _ => return None,
        };
        let valid = match &parsed {
            Self::Manager { name } => validate_segment(name).is_ok(),
            Self::App { app, name } => {
                validate_segment(app).is_ok() && validate_segment(name).is_ok()
            }
        };
        valid.then_some(parsed)
    }

    pub fn scheme(&self) -> Scheme {
        match self {
            Self::Manager { .. } => Scheme::Manager,
            Self::App { .. } => Scheme::App,
        }
    }

    pub fn app_name(&self) -> Option<&str> {
        match self {
            Self::Manager { .. } => None,
            Self::App { app, .. } => Some(app),
        }
    }

    pub fn simple_name(&self) -> &str {
        match self {
            Self::Manager { name } | Self::App { name, .. } => name,
        }
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manager { name } => write!(f, "{MANAGER_PREFIX}{SEPARATOR}{name}"),
            Self::App { app, name } => {
                write!(f, "{APP_PREFIX}{SEPARATOR}{app}{SEPARATOR}{name}")
            }
        }
    }
}

/// Remove the single leading character the runtime adds to names (`/web`).
pub fn strip_decoration(raw: &str) -> &str {
    raw.strip_prefix(['/', ' ']).unwrap_or(raw)
}

fn validate_segment(segment: &str) -> Result<(), ContainerNameError> {
    if segment.is_empty() {
        return Err(ContainerNameError::Empty);
    }
    match segment
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
    {
        Some(c) => Err(ContainerNameError::InvalidChar(segment.to_string(), c)),
        None => Ok(()),
    }
}
