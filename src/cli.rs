use crate::request::FilenamePattern;
use std::env;
use std::path::PathBuf;

/// Prints usage instructions for the program.
///
/// Uses `PROGRAM_NAME` constant from `crate` for the executable name.
pub fn print_usage() {
    println!(
        "Usage: {} -c config_file [-d days] [-p pattern] [-r routing_key] [-n] [-o] [-l logfile] [-h] [-v]",
        crate::PROGRAM_NAME
    );
    println!();
    println!("  -c, --config <path>        configuration file (required)");
    println!("  -d, --days <n>             fetch files modified in the last n days");
    println!("  -p, --pattern <regex>      only fetch files whose whole name matches");
    println!("  -r, --routing-key <key>    routing key for announcements");
    println!("  -n, --noop                 report what would be processed, change nothing");
    println!("  -o, --overwrite            process files even if already stored");
    println!("  -l, --log-file <path>      write diagnostics to a file instead of stderr");
    println!("  -h, --help                 show this help");
    println!("  -v, --version              show version");
}

/// Options for a fetch run
#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub config_file: PathBuf,
    pub days: Option<u32>,
    pub pattern: Option<FilenamePattern>,
    pub routing_key: Option<String>,
    pub noop: bool,
    pub overwrite: bool,
    pub log_file: Option<PathBuf>,
}

/// What the invocation asks for
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Run(CliOptions),
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CliError {
    #[error("missing required option {0}")]
    MissingRequired(&'static str),

    #[error("missing value for option {0}")]
    MissingValue(String),

    #[error("invalid value '{value}' for option {option}: {reason}")]
    InvalidValue {
        option: String,
        value: String,
        reason: String,
    },

    #[error("unrecognized option '{0}'")]
    Unrecognized(String),

    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),
}

impl CliError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::MissingRequired(_) | CliError::MissingValue(_) | CliError::InvalidValue { .. } => 1,
            CliError::Unrecognized(_) | CliError::UnexpectedArgument(_) => 10,
        }
    }
}

/// Parses the process arguments
pub fn parse_args() -> Result<CliCommand, CliError> {
    parse_args_from(env::args().skip(1))
}

/// Parses command line arguments, program name excluded
///
/// Long options take their value either as the next argument or inline as
/// `--name=value`. `-h` and `-v` win as soon as they are seen.
///
/// # Example
/// ```text
/// // let command = parse_args_from(["-c", "fetch.json", "--days=2"])?;
/// ```
pub fn parse_args_from<I, S>(args: I) -> Result<CliCommand, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut config_file = None;
    let mut days = None;
    let mut pattern = None;
    let mut routing_key = None;
    let mut noop = false;
    let mut overwrite = false;
    let mut log_file = None;

    let mut args = args.into_iter().map(Into::into);

    while let Some(arg) = args.next() {
        let (name, inline_value) = match arg.split_once('=') {
            Some((name, value)) if name.starts_with("--") => (name.to_string(), Some(value.to_string())),
            _ => (arg.clone(), None),
        };

        let mut value_for = |option: &str| -> Result<String, CliError> {
            match inline_value.clone() {
                Some(value) => Ok(value),
                None => args.next().ok_or_else(|| CliError::MissingValue(option.to_string())),
            }
        };

        match name.as_str() {
            "-h" | "--help" if inline_value.is_none() => return Ok(CliCommand::Help),
            "-v" | "--version" if inline_value.is_none() => return Ok(CliCommand::Version),
            "-n" | "--noop" if inline_value.is_none() => noop = true,
            "-o" | "--overwrite" if inline_value.is_none() => overwrite = true,
            "-c" | "--config" => config_file = Some(PathBuf::from(value_for("--config")?)),
            "-l" | "--log-file" => log_file = Some(PathBuf::from(value_for("--log-file")?)),
            "-r" | "--routing-key" => routing_key = Some(value_for("--routing-key")?),
            "-d" | "--days" => {
                let value = value_for("--days")?;
                days = Some(value.parse::<u32>().map_err(|e| CliError::InvalidValue {
                    option: "--days".to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                })?);
            }
            "-p" | "--pattern" => {
                let value = value_for("--pattern")?;
                pattern = Some(FilenamePattern::new(&value).map_err(|e| CliError::InvalidValue {
                    option: "--pattern".to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                })?);
            }
            _ if arg.starts_with('-') && arg.len() > 1 => return Err(CliError::Unrecognized(arg)),
            _ => return Err(CliError::UnexpectedArgument(arg)),
        }
    }

    let config_file = config_file.ok_or(CliError::MissingRequired("--config"))?;

    Ok(CliCommand::Run(CliOptions {
        config_file,
        days,
        pattern,
        routing_key,
        noop,
        overwrite,
        log_file,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_options(args: &[&str]) -> CliOptions {
        match parse_args_from(args.iter().copied()) {
            Ok(CliCommand::Run(options)) => options,
            other => panic!("expected run options, got {:?}", other),
        }
    }

    #[test]
    fn test_minimal_invocation() {
        let options = run_options(&["-c", "fetch.json"]);
        assert_eq!(options.config_file, PathBuf::from("fetch.json"));
        assert_eq!(options.days, None);
        assert_eq!(options.pattern, None);
        assert_eq!(options.routing_key, None);
        assert!(!options.noop);
        assert!(!options.overwrite);
        assert_eq!(options.log_file, None);
    }

    #[test]
    fn test_all_short_options() {
        let options = run_options(&[
            "-c", "fetch.json", "-d", "3", "-p", r".*\.gpg", "-r", "reports", "-n", "-o", "-l",
            "/var/log/fetch.log",
        ]);
        assert_eq!(options.days, Some(3));
        assert_eq!(options.pattern.as_ref().map(|p| p.as_str()), Some(r".*\.gpg"));
        assert_eq!(options.routing_key.as_deref(), Some("reports"));
        assert!(options.noop);
        assert!(options.overwrite);
        assert_eq!(options.log_file, Some(PathBuf::from("/var/log/fetch.log")));
    }

    #[test]
    fn test_long_options_with_inline_values() {
        let options = run_options(&[
            "--config=fetch.json",
            "--days=7",
            "--pattern=report-[0-9]+\\.csv",
            "--routing-key",
            "daily",
            "--overwrite",
        ]);
        assert_eq!(options.config_file, PathBuf::from("fetch.json"));
        assert_eq!(options.days, Some(7));
        assert!(options.pattern.unwrap().matches("report-42.csv"));
        assert_eq!(options.routing_key.as_deref(), Some("daily"));
        assert!(options.overwrite);
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse_args_from(["-h"]), Ok(CliCommand::Help));
        assert_eq!(parse_args_from(["--version"]), Ok(CliCommand::Version));
        // Help wins even without the required config option
        assert_eq!(parse_args_from(["-d", "1", "--help"]), Ok(CliCommand::Help));
    }

    #[test]
    fn test_missing_config_exits_1() {
        let err = parse_args_from(["-d", "2"]).unwrap_err();
        assert_eq!(err, CliError::MissingRequired("--config"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_value_exits_1() {
        let err = parse_args_from(["-c"]).unwrap_err();
        assert!(matches!(err, CliError::MissingValue(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_non_numeric_days_exits_1() {
        let err = parse_args_from(["-c", "fetch.json", "-d", "two"]).unwrap_err();
        assert!(matches!(err, CliError::InvalidValue { ref option, .. } if option == "--days"));
        assert_eq!(err.exit_code(), 1);

        let err = parse_args_from(["-c", "fetch.json", "-d", "-1"]).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_invalid_pattern_exits_1() {
        let err = parse_args_from(["-c", "fetch.json", "-p", "(unclosed"]).unwrap_err();
        assert!(matches!(err, CliError::InvalidValue { ref option, .. } if option == "--pattern"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_unrecognized_option_exits_10() {
        let err = parse_args_from(["-c", "fetch.json", "--parallel", "4"]).unwrap_err();
        assert_eq!(err, CliError::Unrecognized("--parallel".to_string()));
        assert_eq!(err.exit_code(), 10);

        let err = parse_args_from(["-c", "fetch.json", "--noop=yes"]).unwrap_err();
        assert_eq!(err.exit_code(), 10);
    }

    #[test]
    fn test_positional_argument_exits_10() {
        let err = parse_args_from(["-c", "fetch.json", "extra"]).unwrap_err();
        assert_eq!(err, CliError::UnexpectedArgument("extra".to_string()));
        assert_eq!(err.exit_code(), 10);
    }
}
