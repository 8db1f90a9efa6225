// ABOUTME: Raw image specifications and their decoration into build-or-pull descriptors.
// ABOUTME: Unknown keys are rejected; a build needs an existing build-definition file.

use crate::engine::EngineError;
use crate::types::{ImageDefaults, ImageRef};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// An image as written by callers, before validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RawImage {
    pub name: String,
    #[serde(default)]
    pub build: bool,
    #[serde(default)]
    pub force_pull: bool,
    pub src: Option<PathBuf>,
    pub src_root: Option<PathBuf>,
    pub create_opts: Option<Value>,
    pub start_opts: Option<Value>,
    pub post_provider_opts: Option<Value>,
}

impl RawImage {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a loosely typed specification, e.g. from an app's config.
    pub fn from_value(value: Value) -> Result<Self, EngineError> {
        let shown = value.to_string();
        serde_json::from_value(value)
            .map_err(|e| EngineError::InvalidSpec(format!("invalid image {shown}: {e}")))
    }
}

/// A validated image with the build-or-pull decision made.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    /// Fully qualified name, e.g. `kalabox/web:stable`.
    pub name: String,
    pub build: bool,
    /// Build-definition file; set exactly when `build` is.
    pub src: Option<PathBuf>,
    // The option blobs below are carried through untouched. Acquisition never
    // reads them; the application that owns the image applies them when it
    // creates and starts containers from it.
    /// Container create options, in engine API shape.
    pub create_opts: Option<Value>,
    /// Container start options, in engine API shape.
    pub start_opts: Option<Value>,
    /// Options for the step that runs once the provider is up.
    pub post_provider_opts: Option<Value>,
}

impl ImageDescriptor {
    /// Directory holding the build-definition file. A bare file name
    /// lives in `.`.
    pub fn context_dir(&self) -> Option<&Path> {
        self.src.as_deref().and_then(Path::parent).map(|dir| {
            if dir.as_os_str().is_empty() {
                Path::new(".")
            } else {
                dir
            }
        })
    }
}

/// Inputs to the build-or-pull decision that come from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSettings {
    pub images: ImageDefaults,
    /// Default root holding `dockerfiles/<repo>/Dockerfile`.
    pub src_root: PathBuf,
    /// Build images locally unless a pull is forced.
    pub build_local: bool,
}

impl ImageSettings {
    pub fn new(src_root: impl Into<PathBuf>) -> Self {
        Self {
            images: ImageDefaults::default(),
            src_root: src_root.into(),
            build_local: false,
        }
    }
}

/// Validate `raw` and decide whether it is built or pulled.
pub fn decorate(raw: &RawImage, settings: &ImageSettings) -> Result<ImageDescriptor, EngineError> {
    if raw.name.trim().is_empty() {
        return Err(EngineError::InvalidSpec(
            "image name cannot be empty".to_string(),
        ));
    }
    if raw.force_pull && raw.build {
        return Err(EngineError::InvalidSpec(format!(
            "image {} sets both forcePull and build",
            raw.name
        )));
    }

    let image = ImageRef::parse(&raw.name)
        .map_err(|e| EngineError::InvalidSpec(format!("image {:?}: {e}", raw.name)))?;
    let build = !raw.force_pull && (raw.build || settings.build_local);

    let src = if build {
        let src = match (&raw.src, &raw.src_root) {
            (Some(src), _) => src.clone(),
            (None, root) => root
                .as_deref()
                .unwrap_or(&settings.src_root)
                .join("dockerfiles")
                .join(image.repository())
                .join("Dockerfile"),
        };
        if !src.is_file() {
            return Err(EngineError::ConfigurationFatal(format!(
                "could not find image file: {}",
                src.display()
            )));
        }
        Some(src)
    } else {
        None
    };

    Ok(ImageDescriptor {
        name: image.expand(&settings.images).to_string(),
        build,
        src,
        create_opts: raw.create_opts.clone(),
        start_opts: raw.start_opts.clone(),
        post_provider_opts: raw.post_provider_opts.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn settings(root: &Path) -> ImageSettings {
        ImageSettings::new(root)
    }

    #[test]
    fn pull_is_the_default() {
        let dir = TempDir::new().unwrap();
        let image = decorate(&RawImage::named("debian"), &settings(dir.path())).unwrap();

        assert!(!image.build);
        assert_eq!(image.name, "kalabox/debian:stable");
        assert_eq!(image.src, None);
    }

    #[test]
    fn build_uses_default_dockerfile_path() {
        let dir = TempDir::new().unwrap();
        let dockerfile = dir.path().join("dockerfiles/web/Dockerfile");
        std::fs::create_dir_all(dockerfile.parent().unwrap()).unwrap();
        std::fs::write(&dockerfile, "FROM debian\n").unwrap();

        let raw = RawImage {
            build: true,
            ..RawImage::named("myapp/web")
        };
        let image = decorate(&raw, &settings(dir.path())).unwrap();

        assert!(image.build);
        assert_eq!(image.name, "myapp/web:stable");
        assert_eq!(image.src.as_deref(), Some(dockerfile.as_path()));
        assert_eq!(image.context_dir(), dockerfile.parent());
    }

    #[test]
    fn bare_file_name_builds_from_the_current_directory() {
        let image = ImageDescriptor {
            name: "kalabox/web:stable".to_string(),
            build: true,
            src: Some(PathBuf::from("Dockerfile")),
            create_opts: None,
            start_opts: None,
            post_provider_opts: None,
        };
        assert_eq!(image.context_dir(), Some(Path::new(".")));
    }

    #[test]
    fn missing_dockerfile_is_configuration_fatal() {
        let dir = TempDir::new().unwrap();
        let raw = RawImage {
            build: true,
            ..RawImage::named("myapp/web")
        };

        let err = decorate(&raw, &settings(dir.path())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationFatal);
        assert!(err.to_string().contains("dockerfiles/web/Dockerfile"));
    }

    #[test]
    fn build_local_setting_builds_unless_pull_is_forced() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("Dockerfile");
        std::fs::write(&src, "FROM debian\n").unwrap();
        let mut settings = settings(dir.path());
        settings.build_local = true;

        let raw = RawImage {
            src: Some(src.clone()),
            ..RawImage::named("web")
        };
        assert!(decorate(&raw, &settings).unwrap().build);

        let forced = RawImage {
            force_pull: true,
            ..raw
        };
        assert!(!decorate(&forced, &settings).unwrap().build);
    }

    #[test]
    fn build_and_force_pull_conflict() {
        let dir = TempDir::new().unwrap();
        let raw = RawImage {
            build: true,
            force_pull: true,
            ..RawImage::named("web")
        };
        let err = decorate(&raw, &settings(dir.path())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RawImage::from_value(json!({ "name": "web", "biuld": true })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);
        assert!(err.to_string().contains("biuld"));
    }

    #[test]
    fn force_pull_must_be_boolean() {
        let err = RawImage::from_value(json!({ "name": "web", "forcePull": "yes" })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);
    }

    #[test]
    fn options_pass_through() {
        let dir = TempDir::new().unwrap();
        let raw = RawImage::from_value(json!({
            "name": "kalabox/dns:v0.10",
            "createOpts": { "HostConfig": { "Privileged": true } },
            "postProviderOpts": { "start": false },
        }))
        .unwrap();

        let image = decorate(&raw, &settings(dir.path())).unwrap();
        assert_eq!(image.name, "kalabox/dns:v0.10");
        assert_eq!(
            image.create_opts,
            Some(json!({ "HostConfig": { "Privileged": true } }))
        );
        assert_eq!(image.post_provider_opts, Some(json!({ "start": false })));
        assert_eq!(image.start_opts, None);
    }
}
