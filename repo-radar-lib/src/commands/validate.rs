use super::Host;
use super::config::{CONFIG_FILE_NAME, Config};
use super::data_dir::resolve_data_dir;
use crate::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file (default is `repo-radar.toml` in the data directory)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory holding the project history, reports, and default configuration
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<Utf8PathBuf>,
}

/// Load the configuration and report the location it came from.
fn validate_config_inner(args: &ValidateArgs) -> Result<String> {
    let data_dir = resolve_data_dir(args.data_dir.as_ref())?;
    let _ = Config::load(&data_dir, args.config.as_ref())?;

    let default_path = data_dir.join(CONFIG_FILE_NAME);
    Ok(match &args.config {
        Some(path) => format!("Config file: {path}"),
        None if default_path.exists() => format!("Config file: {default_path}"),
        None => "Using default configuration (no config file found)".to_string(),
    })
}

pub fn validate_config<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    match validate_config_inner(args) {
        Ok(source) => {
            let _ = writeln!(host.output(), "Configuration file is valid");
            let _ = writeln!(host.output(), "{source}");
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Configuration validation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}
