use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use super::ExecutorConfig;
use crate::error::BuildError;
use crate::event::{BuildEvent, ChannelSink, EventSink};
use crate::ssh::{self, SshConnection};
use crate::tlog;

const AGENT_NAME: &str = "build-agent.sh";

/// Worker entry point: drives one host from connect to a terminal event.
/// Errors never escape; every exit path ends in exactly one `Exited` or
/// `Failed` event and releases the SSH session.
pub fn run(
    host_key: String,
    config: Arc<ExecutorConfig>,
    cancel: Arc<AtomicBool>,
    sink: ChannelSink,
) {
    match build(&host_key, &config, &cancel, &sink) {
        Ok(exit_code) => sink.send(BuildEvent::Exited {
            host: host_key,
            exit_code,
        }),
        Err(err) => {
            tlog!(debug, "{}: worker failed: {}", host_key, err);
            sink.send(BuildEvent::Failed {
                host: host_key,
                kind: err.kind(),
                message: err.to_string(),
            });
        }
    }
}

fn build(
    host_key: &str,
    config: &ExecutorConfig,
    cancel: &AtomicBool,
    sink: &ChannelSink,
) -> Result<i32, BuildError> {
    // Validated at startup; the split cannot fail here.
    let (user, host) = host_key
        .split_once('@')
        .ok_or_else(|| BuildError::Resolve(host_key.to_string()))?;

    check_cancelled(host_key, cancel)?;
    sink.send(BuildEvent::Connecting {
        host: host_key.to_string(),
    });

    let conn = SshConnection::connect(user, host, config.connect_timeout)?;
    check_cancelled(host_key, cancel)?;

    sink.send(BuildEvent::Preparing {
        host: host_key.to_string(),
    });

    if let Ok((0, out)) = conn.exec_capture("uname -a") {
        emit_line(sink, host_key, format!("System: {}", out.trim()));
    }
    if let Ok((0, out)) = conn.exec_capture("nproc") {
        emit_line(sink, host_key, format!("CPUs: {}", out.trim()));
    }

    let remote_dir = format!("/tmp/build-{}", Uuid::new_v4());
    let (status, _) = conn.exec_capture(&format!("mkdir -p '{}'", remote_dir))?;
    if status != 0 {
        return Err(BuildError::Transfer {
            host: host_key.to_string(),
            message: format!("cannot create {}", remote_dir),
        });
    }
    emit_line(sink, host_key, format!("Using build directory: {}", remote_dir));

    // From here on the remote directory exists; clean it up on every path.
    let result = build_in_dir(host_key, &remote_dir, &conn, config, cancel, sink);
    cleanup_remote(&conn, &remote_dir);
    result
}

fn build_in_dir(
    host_key: &str,
    remote_dir: &str,
    conn: &SshConnection,
    config: &ExecutorConfig,
    cancel: &AtomicBool,
    sink: &ChannelSink,
) -> Result<i32, BuildError> {
    let tarball_name = config
        .tarball
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| BuildError::Transfer {
            host: host_key.to_string(),
            message: format!("tarball path {} has no file name", config.tarball.display()),
        })?;

    emit_line(sink, host_key, format!("Uploading {}", tarball_name));
    conn.upload_file(
        &config.tarball,
        &format!("{}/{}", remote_dir, tarball_name),
        0o644,
    )?;
    conn.upload_bytes(
        config.agent_script.as_bytes(),
        &format!("{}/{}", remote_dir, AGENT_NAME),
        0o755,
    )?;
    check_cancelled(host_key, cancel)?;

    sink.send(BuildEvent::Started {
        host: host_key.to_string(),
    });
    let command = format!(
        "cd '{}' && sh {} '{}' 2>&1",
        remote_dir, AGENT_NAME, tarball_name
    );
    let mut channel = conn.start_command(&command)?;

    conn.set_timeout(ssh::READ_SLICE_MILLIS);
    pump_output(host_key, &mut channel, config, cancel, sink)?;

    conn.set_timeout(ssh::CLEANUP_TIMEOUT_MILLIS);
    let execute_err = |message: String| BuildError::Execute {
        host: host_key.to_string(),
        message,
    };
    channel
        .wait_close()
        .map_err(|e| execute_err(format!("wait_close failed: {}", e)))?;
    channel
        .exit_status()
        .map_err(|e| execute_err(format!("no exit status: {}", e)))
}

/// Read the combined output stream in bounded slices, emitting one `Line`
/// event per line. Honors cancellation, the idle deadline, and the overall
/// wall-clock ceiling between reads.
fn pump_output(
    host_key: &str,
    channel: &mut ssh2::Channel,
    config: &ExecutorConfig,
    cancel: &AtomicBool,
    sink: &ChannelSink,
) -> Result<(), BuildError> {
    let started = Instant::now();
    let mut last_data = Instant::now();
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; 8192];

    loop {
        check_cancelled(host_key, cancel)?;
        if started.elapsed() > config.build_timeout {
            return Err(BuildError::Execute {
                host: host_key.to_string(),
                message: format!(
                    "timed out after {}h",
                    config.build_timeout.as_secs() / 3600
                ),
            });
        }

        match channel.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                last_data = Instant::now();
                for &byte in &buf[..n] {
                    if byte == b'\n' {
                        flush_line(sink, host_key, &mut pending);
                    } else {
                        pending.push(byte);
                    }
                }
            }
            Err(e) if ssh::is_timeout(&e) => {
                if last_data.elapsed() > config.idle_timeout {
                    return Err(BuildError::Stalled {
                        host: host_key.to_string(),
                        idle_secs: config.idle_timeout.as_secs(),
                    });
                }
            }
            Err(e) => {
                return Err(BuildError::Execute {
                    host: host_key.to_string(),
                    message: format!("read failed: {}", e),
                });
            }
        }
    }

    if !pending.is_empty() {
        flush_line(sink, host_key, &mut pending);
    }
    Ok(())
}

fn flush_line(sink: &ChannelSink, host_key: &str, pending: &mut Vec<u8>) {
    let line = String::from_utf8_lossy(pending)
        .trim_end_matches('\r')
        .to_string();
    pending.clear();
    emit_line(sink, host_key, line);
}

fn emit_line(sink: &ChannelSink, host_key: &str, line: String) {
    sink.send(BuildEvent::Line {
        host: host_key.to_string(),
        line,
    });
}

/// Best-effort removal of the remote working directory, bounded by the
/// cleanup timeout so a dead session cannot hold the worker.
fn cleanup_remote(conn: &SshConnection, remote_dir: &str) {
    conn.set_timeout(ssh::CLEANUP_TIMEOUT_MILLIS);
    if let Err(e) = conn.exec_capture(&format!("rm -rf '{}'", remote_dir)) {
        tlog!(debug, "{}: cleanup of {} failed: {}", conn.host_key(), remote_dir, e);
    }
}

fn check_cancelled(host_key: &str, cancel: &AtomicBool) -> Result<(), BuildError> {
    if cancel.load(Ordering::SeqCst) {
        Err(BuildError::Cancelled {
            host: host_key.to_string(),
        })
    } else {
        Ok(())
    }
}
