use crate::cancel::CancelToken;
use crate::config::{SshConfig, SshIdentity};
use crate::{CommandOutput, RemoteChannel, RemoteError};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runs commands through the system `ssh` client.
///
/// Every command opens its own session in its own process group. The
/// identity is validated once in [`SshChannel::open`] and reused read-only
/// afterwards.
pub struct SshChannel {
    config: SshConfig,
    identity: SshIdentity,
    binary: String,
}

impl SshChannel {
    pub fn open(config: SshConfig) -> Result<Self, RemoteError> {
        let identity = SshIdentity::load(&config.identity, &config.known_hosts)?;
        debug!(
            "ssh identity loaded for {} ({} trusted host keys)",
            config.destination(),
            identity.trusted_hosts
        );
        Ok(Self {
            config,
            identity,
            binary: "ssh".to_owned(),
        })
    }

    #[must_use]
    pub fn with_binary(mut self, binary: &str) -> Self {
        binary.clone_into(&mut self.binary);
        self
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    pub fn command_args(&self, command: &str) -> Vec<String> {
        vec![
            "-i".to_owned(),
            self.identity.key.display().to_string(),
            "-p".to_owned(),
            self.config.port.to_string(),
            "-o".to_owned(),
            format!("UserKnownHostsFile={}", self.identity.known_hosts.display()),
            "-o".to_owned(),
            "StrictHostKeyChecking=yes".to_owned(),
            "-o".to_owned(),
            "BatchMode=yes".to_owned(),
            "-o".to_owned(),
            "IdentitiesOnly=yes".to_owned(),
            "-T".to_owned(),
            self.config.destination(),
            command.to_owned(),
        ]
    }

    fn spawn(&self, command: &str) -> Result<Child, RemoteError> {
        let mut cmd = Command::new(&self.binary);
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);
        cmd.args(self.command_args(command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RemoteError::Spawn {
                program: self.binary.clone(),
                reason: e.to_string(),
            })
    }

    /// Kill the whole process group so helpers spawned by the client
    /// (proxy commands, wrappers) release the output pipes too.
    fn stop(child: &mut Child) {
        #[cfg(unix)]
        {
            let group = format!("-{}", child.id());
            let killed = Command::new("kill")
                .args(["-KILL", "--", &group])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if !killed.is_ok_and(|s| s.success()) {
                debug!("could not signal process group {group}");
            }
        }
        if let Err(e) = child.kill() {
            debug!("ssh process {} already gone: {e}", child.id());
        }
        let _ = child.wait();
    }
}

fn pump<R: Read + Send + 'static>(mut source: R, sink: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut buf = [0u8; 1024];
        loop {
            match source.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut out) = sink.lock() {
                        out.extend_from_slice(&buf[..n]);
                    }
                }
            }
        }
    })
}

fn snapshot(sink: &Mutex<Vec<u8>>) -> String {
    sink.lock()
        .map(|out| String::from_utf8_lossy(&out).into_owned())
        .unwrap_or_default()
}

fn drain(readers: Vec<JoinHandle<()>>, sink: &Mutex<Vec<u8>>) -> String {
    for reader in readers {
        let _ = reader.join();
    }
    snapshot(sink)
}

/// Give the readers until `grace` to reach end of file, then leave them
/// behind. A surviving descendant holding the pipes must not extend an
/// aborted command.
fn abandon(readers: Vec<JoinHandle<()>>, sink: &Mutex<Vec<u8>>, grace: Duration) -> String {
    let until = Instant::now() + grace;
    while Instant::now() < until && !readers.iter().all(JoinHandle::is_finished) {
        std::thread::sleep(Duration::from_millis(5));
    }
    let pending = readers.iter().filter(|r| !r.is_finished()).count();
    if pending > 0 {
        warn!("detaching {pending} output reader(s) still blocked on the remote pipes");
    }
    snapshot(sink)
}

const ABORT_GRACE: Duration = Duration::from_millis(100);

impl RemoteChannel for SshChannel {
    fn execute_with(
        &self,
        command: &str,
        cancel: &CancelToken,
    ) -> Result<CommandOutput, RemoteError> {
        debug!("ssh {}: {command}", self.config.destination());
        let started = Instant::now();
        let deadline = self.config.timeout.map(|t| started + t);

        let mut child = self.spawn(command)?;
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(pump(stdout, Arc::clone(&sink)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(pump(stderr, Arc::clone(&sink)));
        }

        let status = loop {
            if cancel.is_cancelled() {
                Self::stop(&mut child);
                let partial = abandon(readers, &sink, ABORT_GRACE);
                debug!("cancelled after output:\n{partial}");
                return Err(RemoteError::Cancelled {
                    command: command.to_owned(),
                });
            }
            if let Some(status) = child.try_wait()? {
                break status;
            }
            let mut pause = self.config.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    let elapsed = started.elapsed();
                    Self::stop(&mut child);
                    let partial = abandon(readers, &sink, ABORT_GRACE);
                    debug!("timed out after output:\n{partial}");
                    return Err(RemoteError::Timeout {
                        command: command.to_owned(),
                        elapsed,
                    });
                }
                pause = pause.min(deadline - now);
            }
            std::thread::sleep(pause.max(Duration::from_millis(1)));
        };

        // a backgrounded helper may still hold the pipes; the deadline covers it
        let output = match deadline {
            Some(deadline) => abandon(
                readers,
                &sink,
                deadline
                    .saturating_duration_since(Instant::now())
                    .max(ABORT_GRACE),
            ),
            None => drain(readers, &sink),
        };
        let status = status.code().unwrap_or(-1);
        debug!(
            "ssh command finished with status {status} in {}ms",
            started.elapsed().as_millis()
        );
        Ok(CommandOutput { status, output })
    }

    fn destination(&self) -> String {
        self.config.destination()
    }
}
