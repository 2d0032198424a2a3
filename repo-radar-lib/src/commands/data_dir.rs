use crate::Result;
use camino::Utf8PathBuf;
use directories::BaseDirs;
use ohno::IntoAppError;

/// Directory name under the platform data directory.
const APP_DIR_NAME: &str = "repo-radar";

/// Use the explicit directory, or `repo-radar` under the platform's data directory.
pub fn resolve_data_dir(explicit: Option<&Utf8PathBuf>) -> Result<Utf8PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.clone());
    }

    let base = BaseDirs::new().into_app_err("could not determine the data directory")?;
    let dir = base.data_dir().join(APP_DIR_NAME);

    Utf8PathBuf::from_path_buf(dir)
        .ok()
        .into_app_err("the data directory path is not valid UTF-8")
}
