//! Command-line interface handling for the signal host.
//!
//! This module provides command-line argument parsing using the `clap` crate.

use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
///
/// Every option except the config path overrides a value from the
/// configuration file.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the number of frames to run
    pub frames: Option<u64>,
    /// Optional override for the frame interval in milliseconds
    pub frame_interval_ms: Option<u64>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

impl CliArgs {
    /// Parses the process arguments.
    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    /// Parses an explicit argument list, as used by tests.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        Ok(Self::from_matches(&matches))
    }

    fn command() -> Command {
        Command::new("Signal Host")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Frame-driven host running a scene wired through signal proxies")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("signal_host.toml"),
            )
            .arg(
                Arg::new("frames")
                    .short('f')
                    .long("frames")
                    .value_name("COUNT")
                    .help("Frames to run before exiting (0 = until Ctrl+C)")
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                Arg::new("frame-interval")
                    .short('i')
                    .long("frame-interval")
                    .value_name("MS")
                    .help("Milliseconds between frames")
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("signal_host.toml")),
            frames: matches.get_one::<u64>("frames").copied(),
            frame_interval_ms: matches.get_one::<u64>("frame-interval").copied(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["signal_host"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from("signal_host.toml"));
        assert_eq!(args.frames, None);
        assert_eq!(args.frame_interval_ms, None);
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
    }

    #[test]
    fn test_overrides() {
        let args = CliArgs::try_parse_from([
            "signal_host",
            "--config",
            "scene.toml",
            "--frames",
            "120",
            "-i",
            "8",
            "--log-level",
            "debug",
            "--json-logs",
        ])
        .unwrap();

        assert_eq!(args.config_path, PathBuf::from("scene.toml"));
        assert_eq!(args.frames, Some(120));
        assert_eq!(args.frame_interval_ms, Some(8));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
    }

    #[test]
    fn test_rejects_non_numeric_frames() {
        assert!(CliArgs::try_parse_from(["signal_host", "--frames", "many"]).is_err());
    }
}
