use crate::error::ConfigError;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SFTP_PORT: u16 = 22;
const DEFAULT_RABBIT_PORT: u16 = 5672;
const DEFAULT_TIMEOUT_MS: u64 = 5000;

fn default_sftp_port() -> u16 {
    DEFAULT_SFTP_PORT
}

fn default_rabbit_port() -> u16 {
    DEFAULT_RABBIT_PORT
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

fn default_vhost() -> String {
    "/".to_string()
}

fn default_exchange_type() -> String {
    "direct".to_string()
}

/// SFTP source connection parameters
#[derive(Debug, Deserialize)]
pub struct SftpSettings {
    /// Server hostname or IP (JSON field: sftp.hostname)
    #[serde(rename = "sftp.hostname")]
    pub hostname: String,
    /// Server port, 22 unless given (JSON field: sftp.port)
    #[serde(rename = "sftp.port", default = "default_sftp_port")]
    pub port: u16,
    /// Login name (JSON field: sftp.username)
    #[serde(rename = "sftp.username")]
    pub username: String,
    /// Password; either this or a keyfile is required (JSON field: sftp.password)
    #[serde(rename = "sftp.password", default)]
    pub password: Option<SecretString>,
    /// Path to an SSH private key (JSON field: sftp.keyfile)
    #[serde(rename = "sftp.keyfile", default)]
    pub keyfile: Option<PathBuf>,
    /// Passphrase for the private key (JSON field: sftp.keyfile.passphrase)
    #[serde(rename = "sftp.keyfile.passphrase", default)]
    pub keyfile_passphrase: Option<SecretString>,
    /// Remote directory to fetch from, empty for the login directory (JSON field: sftp.folder)
    #[serde(rename = "sftp.folder", default)]
    pub folder: String,
    /// Connect and I/O timeout in milliseconds (JSON field: sftp.timeout)
    #[serde(rename = "sftp.timeout", default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// OpenSSH known_hosts file (JSON field: sftp.known_hosts)
    #[serde(rename = "sftp.known_hosts", default)]
    pub known_hosts: Option<PathBuf>,
    /// Refuse hosts missing from known_hosts (JSON field: sftp.strict_host_key_checking)
    #[serde(rename = "sftp.strict_host_key_checking", default = "default_true")]
    pub strict_host_key_checking: bool,
}

impl SftpSettings {
    /// known_hosts file to verify against, falling back to `$HOME/.ssh/known_hosts`
    pub fn known_hosts_path(&self) -> Option<PathBuf> {
        self.known_hosts.clone().or_else(|| {
            std::env::var_os("HOME").map(|home| Path::new(&home).join(".ssh").join("known_hosts"))
        })
    }
}

/// S3 content store parameters
#[derive(Debug, Deserialize)]
pub struct S3Settings {
    /// Bucket holding processed files (JSON field: s3.bucket)
    #[serde(rename = "s3.bucket")]
    pub bucket: String,
    /// Static access key; default credential chain when absent (JSON field: s3.access.key)
    #[serde(rename = "s3.access.key", default)]
    pub access_key: Option<String>,
    /// Static secret key (JSON field: s3.secret.key)
    #[serde(rename = "s3.secret.key", default)]
    pub secret_key: Option<SecretString>,
    /// Region override (JSON field: s3.region)
    #[serde(rename = "s3.region", default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (JSON field: s3.endpoint)
    #[serde(rename = "s3.endpoint", default)]
    pub endpoint: Option<String>,
}

/// RabbitMQ publisher parameters
#[derive(Debug, Deserialize)]
pub struct RabbitSettings {
    /// Broker hostname (JSON field: rabbit.hostname)
    #[serde(rename = "rabbit.hostname")]
    pub hostname: String,
    /// Broker port, 5672 unless given (JSON field: rabbit.port)
    #[serde(rename = "rabbit.port", default = "default_rabbit_port")]
    pub port: u16,
    /// Virtual host (JSON field: rabbit.vhost)
    #[serde(rename = "rabbit.vhost", default = "default_vhost")]
    pub vhost: String,
    /// Exchange to publish to, declared durable (JSON field: rabbit.exchange)
    #[serde(rename = "rabbit.exchange")]
    pub exchange: String,
    /// Exchange type: direct, fanout, topic or headers (JSON field: rabbit.exchange.type)
    #[serde(rename = "rabbit.exchange.type", default = "default_exchange_type")]
    pub exchange_type: String,
    /// Connection timeout in milliseconds (JSON field: rabbit.connection.timeout)
    #[serde(rename = "rabbit.connection.timeout", default = "default_timeout_ms")]
    pub connection_timeout_ms: u64,
    /// Login name (JSON field: rabbit.username)
    #[serde(rename = "rabbit.username")]
    pub username: String,
    /// Password (JSON field: rabbit.password)
    #[serde(rename = "rabbit.password")]
    pub password: SecretString,
    /// Routing key used when none is given on the command line (JSON field: rabbit.routingkey)
    #[serde(rename = "rabbit.routingkey", default)]
    pub routing_key: Option<String>,
}

/// Complete configuration file contents
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub sftp: SftpSettings,
    #[serde(flatten)]
    pub s3: S3Settings,
    #[serde(flatten)]
    pub rabbit: RabbitSettings,
    /// Private key bundle; files are passed through untouched when absent (JSON field: decryption.key.path)
    #[serde(rename = "decryption.key.path", default)]
    pub decryption_key_path: Option<PathBuf>,
    /// Default fetch window in days (JSON field: fetch.days)
    #[serde(rename = "fetch.days", default)]
    pub fetch_days: Option<u32>,
}

/// Parses the configuration file
///
/// # Arguments
/// * `path` - Path to the configuration file
///
/// # Errors
/// - `ConfigError::Unreadable` if the file cannot be read
/// - `ConfigError::Invalid` for malformed JSON, missing required keys, an SFTP
///   section with neither password nor keyfile, or an unknown exchange type
///
/// # File Format
/// One JSON object with dotted keys (`sftp.hostname`, `s3.bucket`, ...).
/// Lines starting with `#` are comments and are ignored.
///
/// # Example
/// ```text
/// // let config = parse_config("sftp-fetch.json")?;
/// ```
pub fn parse_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |message: String| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    };

    // Blank out comment lines rather than dropping them so serde_json line numbers stay accurate
    let json: String = contents
        .lines()
        .map(|line| if line.trim_start().starts_with('#') { "" } else { line })
        .collect::<Vec<_>>()
        .join("\n");

    let config: Config = serde_json::from_str(&json).map_err(|e| invalid(e.to_string()))?;

    if config.sftp.password.is_none() && config.sftp.keyfile.is_none() {
        return Err(invalid(
            "SFTP requires either sftp.password or sftp.keyfile".to_string(),
        ));
    }

    if crate::publish::rabbit::exchange_type_from_name(&config.rabbit.exchange_type).is_none() {
        return Err(invalid(format!(
            "unknown rabbit.exchange.type '{}'",
            config.rabbit.exchange_type
        )));
    }

    Ok(config)
}
