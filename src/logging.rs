use chrono::Local;
use once_cell::sync::Lazy;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Global log file path protected by Mutex
///
/// When None, diagnostics go to stderr so they never mix with the
/// per-file status lines printed on stdout.
pub static LOG_FILE: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

/// Logs a message with timestamp to configured output
///
/// # Arguments
/// * `message` - The message to log
///
/// # Returns
/// * `io::Result<()>` - Ok on success, Err if writing fails
///
/// # Example
/// ```text
/// // log("Listing remote folder").unwrap();
/// ```
pub fn log(message: &str) -> io::Result<()> {
    write_line(None, message)
}

/// Logs a message about one remote file
///
/// The filename is added in brackets so every line of a file's
/// processing can be grepped out of a busy log.
///
/// # Example
/// ```text
/// // log_for_file("report.csv", "Uploading 512 bytes").unwrap();
/// ```
pub fn log_for_file(filename: &str, message: &str) -> io::Result<()> {
    write_line(Some(filename), message)
}

fn write_line(filename: Option<&str>, message: &str) -> io::Result<()> {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let log_message = match filename {
        Some(name) => format!("{} [{}] {}\n", timestamp, name, message),
        None => format!("{} {}\n", timestamp, message),
    };

    let guard = LOG_FILE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    match &*guard {
        Some(log_file) => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            file.write_all(log_message.as_bytes())?;
        }
        None => {
            io::stderr().write_all(log_message.as_bytes())?;
        }
    }

    Ok(())
}

/// Sets the path for the log file
///
/// Subsequent calls to the log functions append to this file.
pub fn set_log_file<P: AsRef<Path>>(path: P) {
    let mut guard = LOG_FILE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Some(path.as_ref().to_path_buf());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn test_log_to_file() {
        *LOG_FILE.lock().unwrap() = None;

        let dir = tempdir().unwrap();
        let log_file_path = dir.path().join("test.log");

        set_log_file(&log_file_path);
        log("test message 1").unwrap();
        log_for_file("report.csv", "test message 2").unwrap();

        let log_contents = fs::read_to_string(&log_file_path).unwrap();
        assert!(log_contents.contains("test message 1"));
        assert!(log_contents.contains("[report.csv] test message 2"));

        *LOG_FILE.lock().unwrap() = None;
    }

    #[test]
    #[serial]
    fn test_log_to_stderr() {
        *LOG_FILE.lock().unwrap() = None;

        // Nothing to capture here; just make sure the stderr path doesn't fail.
        log("test stderr message 1").unwrap();
        log_for_file("data.bin", "test stderr message 2").unwrap();
    }
}
