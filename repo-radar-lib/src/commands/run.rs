//! Command dispatch logic for repo-radar

use super::{InitArgs, TrackArgs, ValidateArgs, init_config, track, validate_config};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "repo-radar", version, author, long_about = None)]
#[command(about = "Track trending, searched, and watched repositories day over day")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: RadarSubcommand,
}

#[derive(Subcommand, Debug)]
enum RadarSubcommand {
    /// Run one fetch cycle, update the project history, and write the daily report
    Track(Box<TrackArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// This function parses the command-line arguments and executes the corresponding
/// subcommand. It's designed to be called from main.rs with the program arguments.
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        RadarSubcommand::Track(track_args) => track(host, track_args).await,
        RadarSubcommand::Init(init_args) => init_config(host, init_args),
        RadarSubcommand::Validate(validate_args) => validate_config(host, validate_args),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_track_arguments() {
        let cli = Cli::try_parse_from(["repo-radar", "track", "--date", "2024-04-02", "--data-dir", "/tmp/radar", "-v"]).unwrap();
        let RadarSubcommand::Track(args) = cli.command else {
            panic!("expected track");
        };

        assert_eq!(args.date, chrono::NaiveDate::from_ymd_opt(2024, 4, 2));
        assert_eq!(args.data_dir.as_deref().map(camino::Utf8Path::as_str), Some("/tmp/radar"));
        assert!(args.verbose);
    }

    #[test]
    fn test_rejects_bad_date() {
        let _ = Cli::try_parse_from(["repo-radar", "track", "--date", "April 2nd"]).unwrap_err();
    }
}
