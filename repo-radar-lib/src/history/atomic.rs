use crate::Result;
use ohno::IntoAppError;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with whatever `write` produces, all or nothing.
///
/// The content goes to a temporary file in the same directory, which is flushed, synced, and
/// then renamed over `path`. If any step fails, `path` is left untouched and the temporary
/// file is removed.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir).into_app_err_with(|| format!("creating temporary file in '{}'", dir.display()))?;

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer)?;
        writer
            .flush()
            .into_app_err_with(|| format!("flushing temporary file for '{}'", path.display()))?;
    }

    temp.as_file()
        .sync_all()
        .into_app_err_with(|| format!("syncing temporary file for '{}'", path.display()))?;

    let _ = temp
        .persist(path)
        .map_err(|e| e.error)
        .into_app_err_with(|| format!("replacing '{}'", path.display()))?;

    Ok(())
}
