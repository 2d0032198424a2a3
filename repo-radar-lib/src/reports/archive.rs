use crate::Result;
use crate::history::write_atomically;
use chrono::NaiveDate;
use ohno::IntoAppError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "   reports";

/// The directory of date-named daily reports.
#[derive(Debug, Clone)]
pub struct ReportArchive {
    dir: PathBuf,
}

impl ReportArchive {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.md", date.format("%Y-%m-%d")))
    }

    /// Atomically write the report for `date`, replacing any earlier one for the same date.
    pub fn write(&self, date: NaiveDate, contents: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).into_app_err_with(|| format!("creating report directory '{}'", self.dir.display()))?;

        let path = self.path_for(date);
        write_atomically(&path, |w| {
            w.write_all(contents.as_bytes())
                .into_app_err_with(|| format!("writing report '{}'", path.display()))
        })?;

        log::info!(target: LOG_TARGET, "Wrote report '{}'", path.display());
        Ok(path)
    }

    /// Delete the oldest reports so that at most `retention` remain.
    ///
    /// Only files named `YYYY-MM-DD.md` are considered. Returns the removed paths.
    pub fn prune(&self, retention: usize) -> Result<Vec<PathBuf>> {
        let mut reports = self.dated_reports()?;
        if reports.len() <= retention {
            return Ok(Vec::new());
        }

        reports.sort_by_key(|(date, _)| *date);
        let excess = reports.len() - retention;

        let mut removed = Vec::with_capacity(excess);
        for (_, path) in reports.into_iter().take(excess) {
            fs::remove_file(&path).into_app_err_with(|| format!("removing old report '{}'", path.display()))?;
            log::debug!(target: LOG_TARGET, "Pruned report '{}'", path.display());
            removed.push(path);
        }

        Ok(removed)
    }

    fn dated_reports(&self) -> Result<Vec<(NaiveDate, PathBuf)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).into_app_err_with(|| format!("listing reports in '{}'", self.dir.display()))?;

        let mut reports = Vec::new();
        for entry in entries {
            let path = entry.into_app_err("reading report directory entry")?.path();
            if path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }

            let date = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok());

            if let Some(date) = date {
                reports.push((date, path));
            }
        }

        Ok(reports)
    }
}
