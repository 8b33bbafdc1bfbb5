use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use ssh2::{Channel, OpenFlags, OpenType, Session};

use crate::error::BuildError;
use crate::tlog;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const CONNECT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Session timeout while pumping build output; reads return periodically so
/// the worker can check cancellation and idle deadlines.
pub const READ_SLICE_MILLIS: u32 = 1000;
/// Session timeout for best-effort remote cleanup.
pub const CLEANUP_TIMEOUT_MILLIS: u32 = 5000;

const SSH_PORT: u16 = 22;

/// One authenticated SSH session to `user@host`. Credential discovery
/// delegates to the ssh-agent first, then the usual key files.
pub struct SshConnection {
    host_key: String,
    session: Session,
}

impl SshConnection {
    /// Connect with one retry on transient TCP failures (refused/reset).
    pub fn connect(user: &str, host: &str, timeout: Duration) -> Result<Self, BuildError> {
        let host_key = format!("{}@{}", user, host);
        match Self::connect_once(user, host, &host_key, timeout) {
            Ok(conn) => Ok(conn),
            Err((err, transient)) if transient => {
                tlog!(
                    info,
                    "{}: transient connect failure ({}), retrying",
                    host_key,
                    err
                );
                std::thread::sleep(CONNECT_RETRY_BACKOFF);
                Self::connect_once(user, host, &host_key, timeout).map_err(|(e, _)| e)
            }
            Err((err, _)) => Err(err),
        }
    }

    fn connect_once(
        user: &str,
        host: &str,
        host_key: &str,
        timeout: Duration,
    ) -> Result<Self, (BuildError, bool)> {
        let connect_err = |message: String, transient: bool| {
            (
                BuildError::Connect {
                    host: host_key.to_string(),
                    message,
                },
                transient,
            )
        };

        let addr = (host, SSH_PORT)
            .to_socket_addrs()
            .map_err(|e| connect_err(format!("cannot resolve: {}", e), false))?
            .next()
            .ok_or_else(|| connect_err("no address for host".to_string(), false))?;

        let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(|e| {
            let transient = matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset
            );
            connect_err(e.to_string(), transient)
        })?;

        let mut session =
            Session::new().map_err(|e| connect_err(e.to_string(), false))?;
        session.set_timeout(timeout.as_millis() as u32);
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| connect_err(format!("handshake failed: {}", e), false))?;

        authenticate(&session, user)
            .map_err(|msg| connect_err(msg, false))?;

        tlog!(debug, "{}: SSH session established", host_key);
        Ok(Self {
            host_key: host_key.to_string(),
            session,
        })
    }

    pub fn host_key(&self) -> &str {
        &self.host_key
    }

    /// Blocking-read slice for the output pump, in milliseconds.
    pub fn set_timeout(&self, millis: u32) {
        self.session.set_timeout(millis);
    }

    /// Run a short command to completion, returning (exit status, stdout).
    pub fn exec_capture(&self, command: &str) -> Result<(i32, String), BuildError> {
        let exec_err = |message: String| BuildError::Execute {
            host: self.host_key.clone(),
            message,
        };
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| exec_err(e.to_string()))?;
        channel.exec(command).map_err(|e| exec_err(e.to_string()))?;
        let mut output = String::new();
        channel
            .read_to_string(&mut output)
            .map_err(|e| exec_err(e.to_string()))?;
        channel.wait_close().map_err(|e| exec_err(e.to_string()))?;
        let status = channel.exit_status().map_err(|e| exec_err(e.to_string()))?;
        Ok((status, output))
    }

    /// Start a long-running command; the caller owns the channel and pumps
    /// its combined output.
    pub fn start_command(&self, command: &str) -> Result<Channel, BuildError> {
        let mut channel = self.session.channel_session().map_err(|e| BuildError::Execute {
            host: self.host_key.clone(),
            message: e.to_string(),
        })?;
        channel.exec(command).map_err(|e| BuildError::Execute {
            host: self.host_key.clone(),
            message: e.to_string(),
        })?;
        Ok(channel)
    }

    /// Upload a local file via SFTP.
    pub fn upload_file(&self, local: &Path, remote: &str, mode: i32) -> Result<(), BuildError> {
        let mut file = std::fs::File::open(local).map_err(|e| self.transfer_err(remote, e))?;
        let mut remote_file = self.create_remote(remote, mode)?;
        std::io::copy(&mut file, &mut remote_file)
            .map_err(|e| self.transfer_err(remote, e))?;
        Ok(())
    }

    /// Upload in-memory bytes via SFTP (the embedded agent script).
    pub fn upload_bytes(&self, data: &[u8], remote: &str, mode: i32) -> Result<(), BuildError> {
        let mut remote_file = self.create_remote(remote, mode)?;
        remote_file
            .write_all(data)
            .map_err(|e| self.transfer_err(remote, e))?;
        Ok(())
    }

    fn create_remote(&self, remote: &str, mode: i32) -> Result<ssh2::File, BuildError> {
        let sftp = self.session.sftp().map_err(|e| BuildError::Transfer {
            host: self.host_key.clone(),
            message: e.to_string(),
        })?;
        sftp.open_mode(
            Path::new(remote),
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            mode,
            OpenType::File,
        )
        .map_err(|e| self.transfer_err(remote, e))
    }

    fn transfer_err(&self, remote: &str, err: impl std::fmt::Display) -> BuildError {
        BuildError::Transfer {
            host: self.host_key.clone(),
            message: format!("{}: {}", remote, err),
        }
    }
}

fn authenticate(session: &Session, user: &str) -> Result<(), String> {
    if session.userauth_agent(user).is_ok() && session.authenticated() {
        return Ok(());
    }

    let home = dirs::home_dir().ok_or_else(|| "no home directory for key lookup".to_string())?;
    for name in ["id_ed25519", "id_rsa"] {
        let key = home.join(".ssh").join(name);
        if !key.exists() {
            continue;
        }
        if session
            .userauth_pubkey_file(user, None, &key, None)
            .is_ok()
            && session.authenticated()
        {
            return Ok(());
        }
    }
    Err("authentication failed (agent and default keys exhausted)".to_string())
}

/// Whether a pump read error is just the periodic read slice elapsing.
pub fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    ) || err.to_string().to_lowercase().contains("timeout")
        || err.to_string().to_lowercase().contains("timed out")
}
