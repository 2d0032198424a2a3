use super::Host;
use super::config::{CONFIG_FILE_NAME, Config};
use super::data_dir::resolve_data_dir;
use crate::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output configuration file path (default is `repo-radar.toml` in the data directory)
    #[arg(value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    /// Directory holding the project history, reports, and default configuration
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<Utf8PathBuf>,
}

pub fn init_config<H: Host>(host: &mut H, args: &InitArgs) -> Result<()> {
    let output = if let Some(path) = &args.output {
        path.clone()
    } else {
        resolve_data_dir(args.data_dir.as_ref())?.join(CONFIG_FILE_NAME)
    };

    Config::save_default(&output)?;
    let _ = writeln!(host.output(), "Generated default configuration file: {output}");
    Ok(())
}
