use crate::error::{self, Result};
use crate::token::CancelToken;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use snafu::ResultExt;
use std::process::Output;
use std::thread;
use std::time::{Duration, Instant};

/// Grace period between SIGTERM and SIGKILL for an external process killed because its
/// build was cancelled, per §5's "killed with a grace period of 2 seconds then SIGKILL".
pub const GRACE_PERIOD: Duration = Duration::from_secs(2);

/// How often [`run_killable`] polls the child's exit status and the cancellation token
/// while the external process is in flight.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs `expr` to completion, watching `cancel` while it's in flight.
///
/// If cancellation is observed before the process exits on its own, it is sent `SIGTERM`;
/// if it has not exited within [`GRACE_PERIOD`], it is sent `SIGKILL`. `name` is used only
/// for error messages. Returns the process's output on normal completion, or
/// [`error::Error::Cancelled`] if the build was cancelled out from under it.
pub fn run_killable(expr: duct::Expression, name: &str) -> RunHandle {
    RunHandle {
        expr,
        name: name.to_string(),
    }
}

/// A not-yet-started external process, built by [`run_killable`]. Split from the actual
/// run so call sites can hold onto `name` without re-threading a borrow through `wait`.
pub struct RunHandle {
    expr: duct::Expression,
    name: String,
}

impl RunHandle {
    /// Spawns the process and blocks until it exits, is killed by [`GRACE_PERIOD`] timeout,
    /// or `cancel` is observed.
    pub fn wait(self, cancel: &CancelToken) -> Result<Output> {
        let handle = self.expr.start().context(error::SpawnSnafu {
            name: self.name.clone(),
        })?;

        loop {
            if let Some(output) = handle.try_wait().context(error::WaitSnafu {
                name: self.name.clone(),
            })? {
                return Ok(output.clone());
            }
            if cancel.is_cancelled() {
                return self.kill_with_grace(&handle);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn kill_with_grace(&self, handle: &duct::Handle) -> Result<Output> {
        log::warn!(
            "cancellation observed, sending SIGTERM to '{}' (grace period {:?})",
            self.name,
            GRACE_PERIOD
        );
        for pid in handle.pids() {
            // Best-effort: the process may have exited between try_wait and here.
            let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }

        let deadline = Instant::now() + GRACE_PERIOD;
        let mut exited = false;
        while Instant::now() < deadline {
            if handle
                .try_wait()
                .context(error::WaitSnafu {
                    name: self.name.clone(),
                })?
                .is_some()
            {
                exited = true;
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        if !exited {
            log::warn!(
                "'{}' did not exit within the grace period, sending SIGKILL",
                self.name
            );
            handle.kill().context(error::KillSnafu {
                name: self.name.clone(),
            })?;
        }
        error::CancelledSnafu.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::CancelToken;

    #[test]
    fn uncancelled_process_runs_to_completion() {
        let expr = duct::cmd("true", Vec::<String>::new()).stdout_capture().stderr_capture();
        let cancel = CancelToken::new();
        let output = run_killable(expr, "true").wait(&cancel).unwrap();
        assert!(output.status.success());
    }

    #[test]
    fn already_cancelled_token_kills_a_long_running_process() {
        let expr = duct::cmd("sleep", ["5"]).stdout_capture().stderr_capture();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = run_killable(expr, "sleep").wait(&cancel);
        assert!(matches!(result, Err(error::Error::Cancelled)));
    }
}
