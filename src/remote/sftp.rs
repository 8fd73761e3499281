//! SFTP (SSH File Transfer Protocol) source
//!
//! This module provides `SftpSource`, which implements `RemoteSource`
//! over an ssh2 session.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use ssh2::{CheckResult, KnownHostFileKind, Session, Sftp};

use crate::artifact::Artifact;
use crate::config::SftpSettings;
use crate::error::TransportError;
use crate::logging::log;
use crate::remote::{cutoff_timestamp, remote_path, select_candidates, RemoteFile, RemoteSource};
use crate::request::FilenamePattern;

/// An authenticated SFTP session rooted at the configured folder
pub struct SftpSource {
    session: Session,
    sftp: Sftp,
    folder: String,
}

impl SftpSource {
    /// Connects, verifies the host key and authenticates
    ///
    /// Each resolved address is tried in turn; the last connect error is
    /// returned if none accepts the connection.
    ///
    /// # Errors
    /// - `TransportError::Connect` if no address accepts a TCP connection
    /// - `TransportError::Session` if the SSH handshake or SFTP channel fails
    /// - `TransportError::HostKey` if the host is unknown or its key changed
    /// - `TransportError::Auth` if the credentials are rejected
    pub fn connect(settings: &SftpSettings) -> Result<Self, TransportError> {
        let timeout = Duration::from_millis(settings.timeout_ms);
        let stream = connect_tcp(&settings.hostname, settings.port, timeout)?;

        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut session = Session::new().map_err(TransportError::Session)?;
        session.set_tcp_stream(stream);
        session.handshake().map_err(TransportError::Session)?;
        // Blocks SSH operations for at most this long when no data arrives
        session.set_timeout(settings.timeout_ms.min(u64::from(u32::MAX)) as u32);

        if settings.strict_host_key_checking {
            verify_host_key(&session, settings)?;
        }

        authenticate(&session, settings)?;

        let sftp = session.sftp().map_err(TransportError::Session)?;

        let _ = log(&format!(
            "Connected to sftp://{}@{}:{}/{}",
            settings.username,
            settings.hostname,
            settings.port,
            settings.folder.trim_start_matches('/')
        ));

        Ok(SftpSource {
            session,
            sftp,
            folder: settings.folder.clone(),
        })
    }

    /// Lists regular entries of the configured folder with their modification times
    pub fn list_entries(&self) -> Result<Vec<RemoteFile>, TransportError> {
        let dir = if self.folder.is_empty() { "." } else { self.folder.as_str() };

        let entries = self
            .sftp
            .readdir(Path::new(dir))
            .map_err(|source| TransportError::Listing {
                dir: dir.to_string(),
                source,
            })?;

        let mut files = Vec::with_capacity(entries.len());
        for (path, stat) in entries {
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            if stat.is_dir() || name == "." || name == ".." {
                continue;
            }
            let modified_at = match stat.mtime.and_then(modified_at_from_mtime) {
                Some(ts) => ts,
                None => {
                    let _ = log(&format!("Remote file '{}' has no usable modification time, skipping", name));
                    continue;
                }
            };
            files.push(RemoteFile {
                filename: name,
                modified_at,
            });
        }

        Ok(files)
    }

    /// Disconnects the SSH session
    pub fn close(self) {
        let _ = self.session.disconnect(None, "sftp-fetch done", None);
    }
}

impl RemoteSource for SftpSource {
    fn list_candidates(
        &self,
        max_age_days: u32,
        pattern: &FilenamePattern,
    ) -> Result<std::collections::HashSet<String>, TransportError> {
        let cutoff = cutoff_timestamp(Utc::now(), max_age_days);
        let entries = self.list_entries()?;
        let listed = entries.len();
        let candidates = select_candidates(entries, cutoff, pattern);

        let _ = log(&format!(
            "Listed {} files in '{}', {} modified within {} days and matching '{}'",
            listed,
            self.folder,
            candidates.len(),
            max_age_days,
            pattern
        ));

        Ok(candidates)
    }

    fn download(&self, filename: &str) -> Result<Artifact, TransportError> {
        let path = remote_path(&self.folder, filename);

        let mut remote = self
            .sftp
            .open(Path::new(&path))
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        let mut artifact = Artifact::create("sftp", ".download")?;
        let download_err = |source: io::Error| TransportError::Download {
            path: path.clone(),
            source,
        };
        io::copy(&mut remote, artifact.writer()).map_err(download_err)?;
        artifact.writer().flush().map_err(download_err)?;

        Ok(artifact)
    }
}

/// Converts an SFTP mtime to a timestamp, `None` if it is out of range
fn modified_at_from_mtime(secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    DateTime::<Utc>::from_timestamp(secs, 0)
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, TransportError> {
    let connect_err = |source: io::Error| TransportError::Connect {
        host: host.to_string(),
        port,
        source,
    };

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(connect_err)?
        .collect();

    let mut last_error = io::Error::new(io::ErrorKind::NotFound, "no addresses found");
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = e,
        }
    }

    Err(connect_err(last_error))
}

fn verify_host_key(session: &Session, settings: &SftpSettings) -> Result<(), TransportError> {
    let host_key_err = |reason: String| TransportError::HostKey {
        host: settings.hostname.clone(),
        reason,
    };

    let known_hosts_path = settings
        .known_hosts_path()
        .ok_or_else(|| host_key_err("no known_hosts file configured and HOME is not set".to_string()))?;

    let mut known_hosts = session.known_hosts().map_err(TransportError::Session)?;
    known_hosts
        .read_file(&known_hosts_path, KnownHostFileKind::OpenSSH)
        .map_err(|e| host_key_err(format!("cannot read {}: {}", known_hosts_path.display(), e)))?;

    let (key, _) = session
        .host_key()
        .ok_or_else(|| host_key_err("server presented no host key".to_string()))?;

    match known_hosts.check_port(&settings.hostname, settings.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(host_key_err(format!(
            "host is not listed in {}",
            known_hosts_path.display()
        ))),
        CheckResult::Mismatch => Err(host_key_err(
            "host key does not match known_hosts entry".to_string(),
        )),
        CheckResult::Failure => Err(host_key_err("host key check failed".to_string())),
    }
}

fn authenticate(session: &Session, settings: &SftpSettings) -> Result<(), TransportError> {
    let user = settings.username.as_str();
    let result = match (&settings.password, &settings.keyfile) {
        (Some(password), _) => session.userauth_password(user, password.expose_secret()),
        (None, Some(keyfile)) => session.userauth_pubkey_file(
            user,
            None,
            keyfile,
            settings
                .keyfile_passphrase
                .as_ref()
                .map(|p| p.expose_secret().as_str()),
        ),
        (None, None) => {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "SFTP requires either password or keyfile",
            )))
        }
    };

    result.map_err(|source| TransportError::Auth {
        user: user.to_string(),
        source,
    })
}
