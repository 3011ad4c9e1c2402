//! Compiling whole directory trees.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use recast_common::block_on;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::HostError;
use crate::host::CompilerHost;

/// One file that failed during a bulk pass.
#[derive(Debug)]
pub struct CompileFailure {
    /// The file.
    pub path: PathBuf,
    /// Why it failed.
    pub error: HostError,
}

/// Outcome of [`CompilerHost::compile_all`].
#[derive(Debug, Default)]
pub struct CompileAllReport {
    /// Files compiled successfully, in completion order.
    pub compiled: Vec<PathBuf>,
    /// Files that failed; the pass continued past each of them.
    pub failures: Vec<CompileFailure>,
}

impl CompileAllReport {
    /// Returns `true` if no file failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the number of files visited.
    pub fn total(&self) -> usize {
        self.compiled.len() + self.failures.len()
    }
}

impl CompilerHost {
    /// Compiles every regular file under `root` accepted by `predicate`.
    ///
    /// Files are compiled concurrently, at most
    /// [`DispatchPolicy::concurrency`](crate::DispatchPolicy::concurrency) at
    /// a time. A failing file is recorded in the report and the pass goes on.
    /// Only an unreadable `root` fails the whole call.
    pub async fn compile_all<P>(
        &self,
        root: &Path,
        predicate: P,
    ) -> Result<CompileAllReport, HostError>
    where
        P: Fn(&Path) -> bool,
    {
        let mut report = CompileAllReport::default();
        let files = collect_files(root, self.cache_root(), &predicate, &mut report)?;
        let concurrency = self.settings().dispatch.concurrency.max(1);

        let mut results = stream::iter(files)
            .map(|path| async move {
                let outcome = self.compile(&path).await;
                (path, outcome)
            })
            .buffer_unordered(concurrency);

        while let Some((path, outcome)) = results.next().await {
            match outcome {
                Ok(_) => report.compiled.push(path),
                Err(error) => {
                    warn!(path = %path.display(), %error, "failed to compile");
                    report.failures.push(CompileFailure { path, error });
                }
            }
        }

        info!(
            root = %root.display(),
            compiled = report.compiled.len(),
            failed = report.failures.len(),
            "compiled directory"
        );
        Ok(report)
    }

    /// Compiles every regular file under `root`.
    pub async fn compile_all_files(&self, root: &Path) -> Result<CompileAllReport, HostError> {
        self.compile_all(root, |_| true).await
    }

    /// Blocking form of [`CompilerHost::compile_all`].
    pub fn compile_all_blocking<P>(
        &self,
        root: &Path,
        predicate: P,
    ) -> Result<CompileAllReport, HostError>
    where
        P: Fn(&Path) -> bool,
    {
        block_on(self.compile_all(root, predicate)).map_err(HostError::io(root))?
    }
}

/// Lists regular files under `root`, skipping the cache directory.
fn collect_files<P>(
    root: &Path,
    cache_root: &Path,
    predicate: &P,
    report: &mut CompileAllReport,
) -> Result<Vec<PathBuf>, HostError>
where
    P: Fn(&Path) -> bool,
{
    let root = recast_common::path::resolve(root).map_err(HostError::io(root))?;
    let cache_root = recast_common::path::resolve(cache_root).map_err(HostError::io(cache_root))?;
    let root_meta = std::fs::metadata(&root).map_err(HostError::io(&root))?;
    if !root_meta.is_dir() {
        return Err(HostError::Io {
            path: root,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        });
    }

    let mut files = Vec::new();
    let walk = WalkDir::new(&root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !e.path().starts_with(&cache_root));
    for entry in walk {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if predicate(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Ok(_) => {}
            Err(err) => {
                let path = err.path().unwrap_or(&root).to_path_buf();
                warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                report.failures.push(CompileFailure {
                    error: HostError::Io {
                        path: path.clone(),
                        source: err.into(),
                    },
                    path,
                });
            }
        }
    }
    Ok(files)
}
