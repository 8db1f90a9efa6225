// ABOUTME: Container image reference parsing and expansion.
// ABOUTME: Handles web, web:tag, namespace/web:tag and registry/namespace/web@digest.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// Defaults applied when a short image name is expanded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageDefaults {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_tag")]
    pub tag: String,
}

fn default_namespace() -> String {
    "kalabox".to_string()
}

fn default_tag() -> String {
    "stable".to_string()
}

impl Default for ImageDefaults {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            tag: default_tag(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    registry: Option<String>,
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !"/:.-_@".contains(*c))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        let (without_digest, digest) = match input.split_once('@') {
            Some((before, after)) => (before, Some(after.to_string())),
            None => (input, None),
        };

        // A colon followed by a slash belongs to a registry port, not a tag.
        let (without_tag, tag) = match without_digest.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => (before, Some(after.to_string())),
            _ => (without_digest, None),
        };

        let (registry, name) = Self::split_registry(without_tag)?;

        Ok(Self {
            registry,
            name,
            tag,
            digest,
        })
    }

    fn split_registry(input: &str) -> Result<(Option<String>, String), ParseImageRefError> {
        match input.split_once('/') {
            None if input.is_empty() => Err(ParseImageRefError::InvalidFormat(input.to_string())),
            None => Ok((None, input.to_string())),
            Some((first, rest)) if rest.is_empty() || first.is_empty() => {
                Err(ParseImageRefError::InvalidFormat(input.to_string()))
            }
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                Ok((Some(first.to_string()), rest.to_string()))
            }
            Some(_) => Ok((None, input.to_string())),
        }
    }

    /// Fill in the default namespace and tag.
    ///
    /// A bare name (`web`) gains the namespace (`kalabox/web`); a reference
    /// without tag or digest gains the default tag. Everything else is kept.
    pub fn expand(&self, defaults: &ImageDefaults) -> ImageRef {
        let mut expanded = self.clone();
        if expanded.registry.is_none() && !expanded.name.contains('/') {
            expanded.name = format!("{}/{}", defaults.namespace, expanded.name);
        }
        if expanded.tag.is_none() && expanded.digest.is_none() {
            expanded.tag = Some(defaults.tag.clone());
        }
        expanded
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last path segment of the name (`myapp/web` -> `web`).
    pub fn repository(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref registry) = self.registry {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}
