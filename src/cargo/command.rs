//! Subprocess execution with a deadline and captured output

use crate::core::error::{CommandError, RailResult, ResultExt};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How often a running child is checked for exit
const WAIT_SLICE: Duration = Duration::from_millis(25);

/// Render a command line for logs and errors
pub fn describe(cmd: &Command) -> String {
  let mut parts = vec![cmd.get_program().to_string_lossy().to_string()];
  parts.extend(cmd.get_args().map(|a| a.to_string_lossy().to_string()));
  parts.join(" ")
}

/// Run `cmd` to completion and return its trimmed stdout
///
/// The child runs in its own process group, and the whole group is killed
/// once `timeout` elapses, so tools it spawned (rustc under `cargo publish`)
/// go with it. On failure the error carries stderr, or stdout when stderr is
/// empty, or the exit status when both are.
pub fn run(mut cmd: Command, timeout: Duration, action: &str) -> RailResult<String> {
  let command = describe(&cmd);
  tracing::debug!(%command, "running");

  #[cfg(unix)]
  std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

  let mut child = cmd
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .with_context(|| format!("{}: failed to spawn `{}`", action, command))?;

  // Drain pipes on their own threads so a chatty child can't block on a full pipe
  let stdout = child.stdout.take().map(drain);
  let stderr = child.stderr.take().map(drain);

  let deadline = Instant::now() + timeout;
  let status = loop {
    if let Some(status) = child.try_wait()? {
      break Some(status);
    }
    if Instant::now() >= deadline {
      kill_group(&mut child);
      let _ = child.wait();
      break None;
    }
    thread::sleep(WAIT_SLICE);
  };

  let Some(status) = status else {
    // Readers are left detached: a process that escaped the group may still hold the pipes
    tracing::warn!(%command, "killed after {}ms", timeout.as_millis());
    return Err(
      CommandError {
        action: action.to_string(),
        command,
        output: format!("timed out after {}ms", timeout.as_millis()),
      }
      .into(),
    );
  };

  let stdout = stdout.map(join).unwrap_or_default();
  let stderr = stderr.map(join).unwrap_or_default();

  if !status.success() {
    let output = [stderr.trim(), stdout.trim()]
      .into_iter()
      .find(|s| !s.is_empty())
      .map(String::from)
      .unwrap_or_else(|| match status.code() {
        Some(code) => format!("Returned {}", code),
        None => "Terminated by signal".to_string(),
      });
    return Err(
      CommandError {
        action: action.to_string(),
        command,
        output,
      }
      .into(),
    );
  }

  Ok(stdout.trim().to_string())
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
  // Negative pid targets the group; the child leads it after `process_group(0)`
  if let Ok(pid) = libc::pid_t::try_from(child.id()) {
    // SAFETY: kill(2) has no memory-safety preconditions
    unsafe {
      libc::kill(-pid, libc::SIGKILL);
    }
  }
  let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
  let _ = child.kill();
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
  thread::spawn(move || {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).to_string()
  })
}

fn join(handle: thread::JoinHandle<String>) -> String {
  handle.join().unwrap_or_default()
}
