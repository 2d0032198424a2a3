use super::{ProjectTable, write_atomically};
use crate::Result;
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "     store";

const PROJECTS_FILE: &str = "projects.json";
const LOCK_FILE: &str = "projects.lock";

/// Exclusive claim on a store; released when dropped.
#[derive(Debug)]
pub struct StoreLock(File);

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.0.unlock() {
            log::warn!(target: LOG_TARGET, "Could not unlock project store: {e:#}");
        }
    }
}

/// The on-disk project table.
///
/// Reading and committing both require a [`StoreLock`], so only one cycle at a time can
/// go through load, apply, and commit.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    dir: PathBuf,
}

impl ProjectStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn projects_path(&self) -> PathBuf {
        self.dir.join(PROJECTS_FILE)
    }

    /// Wait for exclusive access to the store, creating its directory if needed.
    pub async fn lock(&self) -> Result<StoreLock> {
        fs::create_dir_all(&self.dir).into_app_err_with(|| format!("creating data directory '{}'", self.dir.display()))?;

        let lock_path = self.dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .into_app_err_with(|| format!("opening lock file '{}'", lock_path.display()))?;

        let file = tokio::task::spawn_blocking(move || {
            file.lock_exclusive()
                .into_app_err_with(|| format!("acquiring exclusive lock on '{}'", lock_path.display()))?;
            log::debug!(target: LOG_TARGET, "Acquired store lock at '{}'", lock_path.display());
            Ok::<_, ohno::AppError>(file)
        })
        .await
        .into_app_err("lock task panicked")??;

        Ok(StoreLock(file))
    }

    /// Read the last committed table; a store that was never committed is empty.
    pub fn load(&self, _lock: &StoreLock) -> Result<ProjectTable> {
        let path = self.projects_path();

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!(target: LOG_TARGET, "No project table at '{}', starting empty", path.display());
                return Ok(ProjectTable::default());
            }
            Err(e) => return Err(e).into_app_err_with(|| format!("reading project table '{}'", path.display())),
        };

        let table: ProjectTable =
            serde_json::from_str(&text).into_app_err_with(|| format!("parsing project table '{}'", path.display()))?;

        log::debug!(target: LOG_TARGET, "Loaded {} project(s) from '{}'", table.len(), path.display());
        Ok(table)
    }

    /// Durably replace the committed table. On failure the previous table is left intact.
    pub fn commit(&self, _lock: &StoreLock, table: &ProjectTable) -> Result<()> {
        let path = self.projects_path();

        write_atomically(&path, |w| {
            serde_json::to_writer_pretty(&mut *w, table).into_app_err("serializing project table")?;
            w.write_all(b"\n").into_app_err("serializing project table")
        })?;

        log::info!(target: LOG_TARGET, "Committed {} project(s) to '{}'", table.len(), path.display());
        Ok(())
    }
}
