//! Bring the diagram into the output directory.
//!
//! Three states are reconciled, in order:
//! 1. a file with the same name already sits in the output directory: use it, never overwrite;
//! 2. the file exists at the path the agent reported: copy it in (at most one copy per call);
//! 3. neither: no diagram.
//!
//! Failures here never abort the run; they are logged as warnings and degrade the result.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// Filesystem operations the materializer needs.
pub trait Filesystem {
    fn exists(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    /// Copy contents, permissions and modification time.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFilesystem;

impl Filesystem for StdFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        let modified = std::fs::metadata(from)?.modified()?;
        std::fs::copy(from, to)?;

        // Content is in place; a lost timestamp is not worth failing over.
        let preserved = std::fs::OpenOptions::new()
            .write(true)
            .open(to)
            .and_then(|file| file.set_modified(modified));
        if let Err(e) = preserved {
            debug!("Could not preserve modification time on {}: {}", to.display(), e);
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// Which reconciliation branch was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// The agent reply named no diagram.
    NoCandidate,
    /// A file with the same name was already in the output directory.
    AlreadyPresent(PathBuf),
    /// The diagram was copied into the output directory.
    Copied { from: PathBuf, to: PathBuf },
    /// The copy failed; the original location is used instead.
    CopyFailed { original: PathBuf, error: String },
    /// The reported path does not point at a file.
    Missing(PathBuf),
}

impl MaterializeOutcome {
    /// Path of the usable diagram, if any.
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            Self::NoCandidate | Self::Missing(_) => None,
            Self::AlreadyPresent(path) => Some(path),
            Self::Copied { to, .. } => Some(to),
            Self::CopyFailed { original, .. } => Some(original),
        }
    }

    pub fn into_artifact(self) -> Option<PathBuf> {
        match self {
            Self::NoCandidate | Self::Missing(_) => None,
            Self::AlreadyPresent(path) => Some(path),
            Self::Copied { to, .. } => Some(to),
            Self::CopyFailed { original, .. } => Some(original),
        }
    }

    /// Whether this outcome was reported as a warning.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::CopyFailed { .. } | Self::Missing(_))
    }
}

pub struct ArtifactMaterializer<F = StdFilesystem> {
    fs: F,
}

impl ArtifactMaterializer<StdFilesystem> {
    pub fn new() -> Self {
        Self { fs: StdFilesystem }
    }
}

impl Default for ArtifactMaterializer<StdFilesystem> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Filesystem> ArtifactMaterializer<F> {
    pub fn with_filesystem(fs: F) -> Self {
        Self { fs }
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    /// Reconcile `candidate` against `target_dir`.
    pub fn materialize(&self, candidate: Option<&str>, target_dir: &Path) -> MaterializeOutcome {
        let Some(candidate) = candidate else {
            return MaterializeOutcome::NoCandidate;
        };
        let original = PathBuf::from(candidate);

        let Some(file_name) = original.file_name() else {
            warn!("Diagram path has no file name: {}", original.display());
            return MaterializeOutcome::Missing(original);
        };
        let local_path = target_dir.join(file_name);

        if self.fs.exists(&local_path) {
            info!("Diagram already exists at: {}", local_path.display());
            return MaterializeOutcome::AlreadyPresent(local_path);
        }

        if self.fs.is_file(&original) {
            return match self.fs.copy(&original, &local_path) {
                Ok(()) => {
                    info!(
                        "Copied diagram from {} to {}",
                        original.display(),
                        local_path.display()
                    );
                    MaterializeOutcome::Copied {
                        from: original,
                        to: local_path,
                    }
                }
                Err(e) => {
                    self.discard_partial_copy(&local_path);
                    warn!(
                        "Could not copy diagram {} into {}: {}; using original location",
                        original.display(),
                        target_dir.display(),
                        e
                    );
                    MaterializeOutcome::CopyFailed {
                        original,
                        error: e.to_string(),
                    }
                }
            };
        }

        warn!("Diagram file not found at {}", original.display());
        MaterializeOutcome::Missing(original)
    }

    /// `local_path` did not exist before the failed copy, so anything there
    /// now is a truncated leftover that would otherwise be reused next run.
    fn discard_partial_copy(&self, local_path: &Path) {
        match self.fs.remove_file(local_path) {
            Ok(()) => debug!("Removed partial diagram copy at {}", local_path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => debug!("Could not remove partial diagram copy at {}: {}", local_path.display(), e),
        }
    }
}
