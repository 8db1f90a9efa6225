// ABOUTME: Build context packaging into a temporary tar archive.
// ABOUTME: The working directory is switched to the context root and restored on every path.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

// The working directory is process-wide; one guard at a time.
static WORKDIR: Mutex<()> = Mutex::new(());

/// Switches the process working directory and switches it back on drop.
pub(crate) struct ScopedWorkdir {
    previous: PathBuf,
    dir: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl ScopedWorkdir {
    /// A relative `dir` is taken from the working directory at entry.
    pub(crate) fn enter(dir: &Path) -> io::Result<Self> {
        let lock = WORKDIR.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = std::env::current_dir()?;
        let dir = previous.join(dir);
        std::env::set_current_dir(&dir)?;
        Ok(Self {
            previous,
            dir,
            _lock: lock,
        })
    }

    /// The absolute directory entered.
    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for ScopedWorkdir {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            tracing::warn!(dir = %self.previous.display(), error = %e, "could not restore working directory");
        }
    }
}

/// Archive everything under `dir` into a temporary file that is deleted
/// when the returned handle is dropped.
pub(crate) fn package_context(dir: &Path) -> io::Result<NamedTempFile> {
    let archive = tempfile::Builder::new()
        .prefix("kbox-context-")
        .suffix(".tar")
        .tempfile()?;

    let mut builder = tar::Builder::new(archive.reopen()?);
    builder.mode(tar::HeaderMode::Deterministic);
    builder.append_dir_all(".", dir)?;
    builder.into_inner()?.sync_all()?;

    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    #[test]
    fn archive_holds_the_whole_context() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM debian\nCOPY conf /etc/conf\n").unwrap();
        std::fs::create_dir(dir.path().join("conf")).unwrap();
        std::fs::write(dir.path().join("conf/app.ini"), "debug=1\n").unwrap();

        let archive = package_context(dir.path()).unwrap();
        let mut reader = tar::Archive::new(std::fs::File::open(archive.path()).unwrap());
        let entries: BTreeSet<String> = reader
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .filter(|p| p != "./" && p != ".")
            .collect();

        assert!(entries.contains("./Dockerfile") || entries.contains("Dockerfile"));
        assert!(entries.iter().any(|p| p.ends_with("conf/app.ini")));
    }

    #[test]
    fn workdir_is_switched_while_scoped() {
        let dir = TempDir::new().unwrap();
        let expected = dir.path().canonicalize().unwrap();

        let guard = ScopedWorkdir::enter(dir.path()).unwrap();
        assert_eq!(std::env::current_dir().unwrap().canonicalize().unwrap(), expected);
        let previous = guard.previous.clone();
        drop(guard);
        assert_ne!(previous.canonicalize().ok(), Some(expected));
    }

    #[test]
    fn relative_dir_resolves_against_the_previous_workdir() {
        let root = TempDir::new_in(env!("CARGO_MANIFEST_DIR")).unwrap();
        std::fs::create_dir_all(root.path().join("docker/web")).unwrap();
        let relative = Path::new(root.path().file_name().unwrap()).join("docker/web");

        let guard = ScopedWorkdir::enter(&relative).unwrap();
        assert!(guard.dir().is_absolute());
        assert!(guard.dir().ends_with("docker/web"));
        assert_eq!(
            std::env::current_dir().unwrap().canonicalize().unwrap(),
            root.path().join("docker/web").canonicalize().unwrap()
        );
    }

    #[test]
    fn archive_is_deleted_on_drop() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM debian\n").unwrap();

        let archive = package_context(dir.path()).unwrap();
        let path = archive.path().to_path_buf();
        assert!(path.exists());
        drop(archive);
        assert!(!path.exists());
    }
}
