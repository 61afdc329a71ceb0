//! Program logging.
//!
//! Ordinary messages are printed to stdout and warnings or errors to stderr, coloured when the
//! stream is a terminal. When a run has an output folder, the same messages are also saved to
//! plain-text log files there.
use anyhow::{Context, Result, bail, ensure};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::Arguments;
use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// Set once the global logger has been installed
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// The log level used when neither the environment nor `settings.toml` chooses one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable which takes precedence over the `log_level` setting
const LOG_LEVEL_ENV_VAR: &str = "WEATHERGEN_LOG_LEVEL";

/// Log file for messages below warning level
const LOG_INFO_FILE_NAME: &str = "weathergen_info.log";

/// Log file for warnings and errors
const LOG_ERROR_FILE_NAME: &str = "weathergen_error.log";

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Install the global logger.
///
/// The level comes from `WEATHERGEN_LOG_LEVEL` if set, then `log_level_from_settings`, then
/// [`DEFAULT_LOG_LEVEL`]. Accepted names are those of [`LevelFilter`], in any case.
///
/// # Arguments
///
/// * `log_level_from_settings` - The `log_level` entry of `settings.toml`
/// * `log_file_path` - Folder for log files; no files are written if `None`
pub fn init(log_level_from_settings: Option<&str>, log_file_path: Option<&Path>) -> Result<()> {
    ensure!(!is_logger_initialised(), "Logger already initialised");

    let log_level = select_log_level(env::var(LOG_LEVEL_ENV_VAR).ok(), log_level_from_settings)?;
    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let stdout_colours = std::io::stdout().is_terminal().then_some(colours);
    let stderr_colours = std::io::stderr().is_terminal().then_some(colours);

    let mut dispatch = Dispatch::new()
        .chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(move |out, message, record| {
                    format_record(out, message, record, stdout_colours.as_ref());
                })
                .level(log_level)
                .chain(std::io::stdout()),
        )
        .chain(
            Dispatch::new()
                .format(move |out, message, record| {
                    format_record(out, message, record, stderr_colours.as_ref());
                })
                .level(log_level.min(LevelFilter::Warn))
                .chain(std::io::stderr()),
        );

    if let Some(dir) = log_file_path {
        // Files always record at least info, whatever the console shows
        dispatch = dispatch
            .chain(
                Dispatch::new()
                    .filter(|metadata| metadata.level() > LevelFilter::Warn)
                    .format(|out, message, record| format_record(out, message, record, None))
                    .level(log_level.max(LevelFilter::Info))
                    .chain(create_log_file(&dir.join(LOG_INFO_FILE_NAME))?),
            )
            .chain(
                Dispatch::new()
                    .format(|out, message, record| format_record(out, message, record, None))
                    .level(LevelFilter::Warn)
                    .chain(create_log_file(&dir.join(LOG_ERROR_FILE_NAME))?),
            );
    }

    dispatch.apply()?;
    ensure!(LOGGER_INIT.set(()).is_ok(), "Logger already initialised");

    Ok(())
}

/// Pick the log level from the environment variable's value, falling back to the settings file
/// and then the default
fn select_log_level(from_env: Option<String>, from_settings: Option<&str>) -> Result<LevelFilter> {
    let name = from_env.unwrap_or_else(|| from_settings.unwrap_or(DEFAULT_LOG_LEVEL).to_string());
    parse_log_level(&name)
}

/// Convert a log level string (case insensitive) to a [`LevelFilter`]
fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    let level = match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    };

    Ok(level)
}

/// Create (or truncate) a log file
fn create_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Could not create log file {}", path.display()))
}

/// Format a record as `[time level target] message`, colouring the level if `colours` is given
fn format_record(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    colours: Option<&ColoredLevelConfig>,
) {
    let timestamp = Local::now().format("%H:%M:%S");
    let target = record.target();
    match colours {
        Some(colours) => out.finish(format_args!(
            "[{timestamp} {} {target}] {message}",
            colours.color(record.level())
        )),
        None => out.finish(format_args!(
            "[{timestamp} {} {target}] {message}",
            record.level()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    #[case("off", LevelFilter::Off)]
    #[case("WARN", LevelFilter::Warn)]
    #[case("Debug", LevelFilter::Debug)]
    fn test_parse_log_level(#[case] raw: &str, #[case] expected: LevelFilter) {
        assert_eq!(parse_log_level(raw).unwrap(), expected);
    }

    #[test]
    fn test_parse_log_level_unknown() {
        assert_error!(parse_log_level("loud"), "Unknown log level: loud");
    }

    #[rstest]
    #[case(Some("trace"), Some("error"), LevelFilter::Trace)]
    #[case(None, Some("error"), LevelFilter::Error)]
    #[case(None, None, LevelFilter::Info)]
    fn test_select_log_level(
        #[case] from_env: Option<&str>,
        #[case] from_settings: Option<&str>,
        #[case] expected: LevelFilter,
    ) {
        let level = select_log_level(from_env.map(String::from), from_settings).unwrap();
        assert_eq!(level, expected);
    }

    #[test]
    fn test_create_log_file_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOG_INFO_FILE_NAME);
        std::fs::write(&path, "old run").unwrap();
        create_log_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        assert!(create_log_file(&dir.path().join("missing").join("x.log")).is_err());
    }
}
