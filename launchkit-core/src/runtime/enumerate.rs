use crate::{Error, Result};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct EnumerateOptions {
    /// Explicit `dotnet` executable; looked up on `PATH` when unset.
    pub dotnet: Option<PathBuf>,
    /// Upper bound on how long `dotnet --list-runtimes` may run.
    pub timeout: Duration,
}

impl Default for EnumerateOptions {
    fn default() -> Self {
        Self {
            dotnet: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub fn locate_dotnet(options: &EnumerateOptions) -> Result<PathBuf> {
    match &options.dotnet {
        Some(path) => Ok(path.clone()),
        None => which::which("dotnet").map_err(|_| Error::DotnetNotFound),
    }
}

/// Runs `dotnet --list-runtimes` and returns its stdout.
///
/// The child is killed once `options.timeout` elapses. The deadline also
/// covers draining stdout, which stays open while any process the child
/// left behind still holds the pipe.
pub fn list_runtimes(options: &EnumerateOptions) -> Result<String> {
    let dotnet = locate_dotnet(options)?;
    log::debug!("Running {} --list-runtimes", dotnet.display());

    let mut child = Command::new(&dotnet)
        .arg("--list-runtimes")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::DotnetNotFound,
            _ => Error::Io(e),
        })?;

    // Drain stdout while polling so a chatty child cannot block on a full pipe.
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Enumeration("stdout was not captured".into()))?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = stdout.read_to_end(&mut buf).map(|_| buf);
        let _ = tx.send(result);
    });

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() > options.timeout {
            let _ = child.kill();
            let _ = child.wait();
            log::warn!(
                "{} --list-runtimes did not finish within {:?}",
                dotnet.display(),
                options.timeout
            );
            return Err(Error::Timeout {
                after: options.timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    // the reader thread is left detached if the pipe never closes
    let output = match rx.recv_timeout(options.timeout.saturating_sub(start.elapsed())) {
        Ok(result) => result?,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            log::warn!(
                "{} --list-runtimes exited but its stdout stayed open past {:?}",
                dotnet.display(),
                options.timeout
            );
            return Err(Error::Timeout {
                after: options.timeout,
            });
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            return Err(Error::Enumeration("stdout reader panicked".into()));
        }
    };

    if !status.success() {
        log::warn!("{} --list-runtimes failed: {}", dotnet.display(), status);
        return Err(Error::Enumeration(format!(
            "{} exited with {}",
            dotnet.display(),
            status
        )));
    }

    Ok(String::from_utf8_lossy(&output).into_owned())
}
