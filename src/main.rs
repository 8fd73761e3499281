use sftp_fetch::cli::print_usage;
use sftp_fetch::error::ConfigError;
use sftp_fetch::{app, log, parse_args, parse_config, set_log_file, CliCommand, PROGRAM_NAME, PROGRAM_VERSION};
use std::io;
use std::process;

/// Exit status when the configuration cannot be used
const EXIT_CONFIG: i32 = 2;
/// Exit status when the run started but failed
const EXIT_RUN_FAILED: i32 = 3;

/// Logs a fatal error, echoing it to stderr when the log goes to a file
fn report_error(message: &str, logging_to_file: bool) {
    let _ = log(message);
    if logging_to_file {
        eprintln!("{}", message);
    }
}

fn main() {
    let options = match parse_args() {
        Ok(CliCommand::Run(options)) => options,
        Ok(CliCommand::Help) => {
            print_usage();
            process::exit(0);
        }
        Ok(CliCommand::Version) => {
            println!("{} version {}", PROGRAM_NAME, PROGRAM_VERSION);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            process::exit(e.exit_code());
        }
    };

    if let Some(log_file) = &options.log_file {
        set_log_file(log_file);
    }

    let _ = log(&format!("{} {} started", PROGRAM_NAME, PROGRAM_VERSION));

    let config = match parse_config(&options.config_file) {
        Ok(config) => config,
        Err(e) => {
            report_error(&format!("Error loading config: {}", e), options.log_file.is_some());
            process::exit(EXIT_CONFIG);
        }
    };

    let request = match app::build_request(&options, &config) {
        Ok(request) => request,
        Err(e) => {
            let hint = match &e {
                ConfigError::Missing("fetch.days") => " (use --days or set fetch.days)",
                _ => "",
            };
            report_error(&format!("Error: {}{}", e, hint), options.log_file.is_some());
            process::exit(EXIT_CONFIG);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = app::run(&config, &request, &mut out) {
        report_error(&format!("Run failed: {}", e), options.log_file.is_some());
        process::exit(EXIT_RUN_FAILED);
    }

    let _ = log(&format!("{} finished", PROGRAM_NAME));
}
