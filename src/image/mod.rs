// ABOUTME: Image acquisition: decide between building and pulling, then do it.
// ABOUTME: Builds stream a packaged context to the runtime; both paths consume a progress stream.

mod archive;
mod descriptor;
mod progress;

pub use descriptor::{ImageDescriptor, ImageSettings, RawImage, decorate};
pub use progress::consume_progress;

use crate::engine::{EngineError, WrapErr};
use crate::runtime::ImageOps;
use archive::{ScopedWorkdir, package_context};
use bytes::Bytes;
use std::sync::Arc;
use tracing::info;

pub struct ImageManager<R> {
    runtime: Arc<R>,
    settings: ImageSettings,
}

impl<R: ImageOps> ImageManager<R> {
    pub fn new(runtime: Arc<R>, settings: ImageSettings) -> Self {
        Self { runtime, settings }
    }

    pub fn settings(&self) -> &ImageSettings {
        &self.settings
    }

    pub fn decorate(&self, raw: &RawImage) -> Result<ImageDescriptor, EngineError> {
        decorate(raw, &self.settings)
    }

    /// Build or pull `raw`, whichever its decorated form calls for.
    pub async fn build(&self, raw: &RawImage) -> Result<ImageDescriptor, EngineError> {
        let image = self.decorate(raw)?;
        if image.build {
            self.build_from_source(&image).await?;
        } else {
            self.pull(&image).await?;
        }
        Ok(image)
    }

    /// Package the build-definition directory and build it on the runtime.
    pub async fn build_from_source(&self, image: &ImageDescriptor) -> Result<(), EngineError> {
        info!(image = %image.name, "building image");
        let Some(dir) = image.context_dir() else {
            return Err(EngineError::ConfigurationFatal(format!(
                "image {} has no build-definition file",
                image.name
            )));
        };

        let result = async {
            let context = packaged(dir)?;
            let stream = self.runtime.build_image(&image.name, context);
            consume_progress(stream, &image.name).await
        }
        .await
        .wrap_err(|| format!("error while building image {}", image.name));

        if result.is_ok() {
            info!(image = %image.name, "building image complete");
        }
        result
    }

    pub async fn pull(&self, image: &ImageDescriptor) -> Result<(), EngineError> {
        info!(image = %image.name, "pulling image");
        let stream = self.runtime.pull_image(&image.name);
        consume_progress(stream, &image.name)
            .await
            .wrap_err(|| format!("error pulling image {}", image.name))?;
        info!(image = %image.name, "pulling image complete");
        Ok(())
    }
}

/// Archive `dir` from inside it. The archive file is gone once this returns.
fn packaged(dir: &std::path::Path) -> Result<Bytes, EngineError> {
    let workdir = ScopedWorkdir::enter(dir)?;
    let archive = package_context(workdir.dir())?;
    Ok(Bytes::from(std::fs::read(archive.path())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::ProgressEvent;
    use crate::runtime::testing::{Call, FakeRuntime};
    use tempfile::TempDir;

    fn manager(root: &std::path::Path) -> (Arc<FakeRuntime>, ImageManager<FakeRuntime>) {
        let runtime = Arc::new(FakeRuntime::new());
        let manager = ImageManager::new(runtime.clone(), ImageSettings::new(root));
        (runtime, manager)
    }

    #[tokio::test]
    async fn pulls_when_not_building() {
        let dir = TempDir::new().unwrap();
        let (runtime, manager) = manager(dir.path());

        let image = manager.build(&RawImage::named("debian")).await.unwrap();
        assert_eq!(image.name, "kalabox/debian:stable");
        assert_eq!(runtime.calls(), vec![Call::Pull("kalabox/debian:stable".into())]);
    }

    #[tokio::test]
    async fn builds_from_packaged_context() {
        let dir = TempDir::new().unwrap();
        let dockerfile = dir.path().join("dockerfiles/web/Dockerfile");
        std::fs::create_dir_all(dockerfile.parent().unwrap()).unwrap();
        std::fs::write(&dockerfile, "FROM debian\n").unwrap();
        let (runtime, manager) = manager(dir.path());

        let raw = RawImage {
            build: true,
            ..RawImage::named("web")
        };
        manager.build(&raw).await.unwrap();

        match runtime.calls().as_slice() {
            [Call::Build { tag, context_len }] => {
                assert_eq!(tag, "kalabox/web:stable");
                assert!(*context_len > 0);
            }
            other => panic!("unexpected calls: {other:?}"),
        }
    }

    #[tokio::test]
    async fn builds_from_a_relative_context() {
        let root = TempDir::new_in(env!("CARGO_MANIFEST_DIR")).unwrap();
        std::fs::create_dir_all(root.path().join("docker/web")).unwrap();
        std::fs::write(root.path().join("docker/web/Dockerfile"), "FROM debian\n").unwrap();
        // Tests run from the manifest directory.
        let relative =
            std::path::Path::new(root.path().file_name().unwrap()).join("docker/web/Dockerfile");
        let (runtime, manager) = manager(root.path());

        let image = ImageDescriptor {
            name: "kalabox/web:stable".to_string(),
            build: true,
            src: Some(relative),
            create_opts: None,
            start_opts: None,
            post_provider_opts: None,
        };
        manager.build_from_source(&image).await.unwrap();

        match runtime.calls().as_slice() {
            [Call::Build { tag, context_len }] => {
                assert_eq!(tag, "kalabox/web:stable");
                assert!(*context_len > 0);
            }
            other => panic!("unexpected calls: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_dockerfile_fails_before_any_build() {
        let dir = TempDir::new().unwrap();
        let (runtime, manager) = manager(dir.path());

        let raw = RawImage {
            build: true,
            ..RawImage::named("myapp/web")
        };
        let err = manager.build(&raw).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationFatal);
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn embedded_pull_error_is_wrapped_with_the_image() {
        let dir = TempDir::new().unwrap();
        let (runtime, manager) = manager(dir.path());
        runtime.set_progress(vec![ProgressEvent::parse(br#"{"error":"not found"}"#)]);

        let err = manager.build(&RawImage::named("nope")).await.unwrap_err();
        assert!(err.to_string().starts_with("error pulling image kalabox/nope:stable"));
        assert!(matches!(err.root(), EngineError::Progress { .. }));
    }

    #[tokio::test]
    async fn transport_failure_during_build_is_reported() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("Dockerfile");
        std::fs::write(&src, "FROM debian\n").unwrap();
        let (runtime, manager) = manager(dir.path());
        runtime.fail_progress("daemon went away");

        let raw = RawImage {
            build: true,
            src: Some(src),
            ..RawImage::named("web")
        };
        let err = manager.build(&raw).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
    }
}
