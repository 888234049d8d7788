/*!
A process-wide cancellation signal shared by the engine's worker pools and
external-process invocations, per the concurrency model's cancellation-and-timeouts
guarantee: on cancel, in-flight workers finish their current item and exit, pending queues
drain to no-op, and external helpers are given a grace period before being killed outright.

[`CancelToken`] is the flag itself; [`run_killable`] wraps a [`duct::Expression`] so that
observing cancellation while the external process is in flight sends `SIGTERM`, waits
[`GRACE_PERIOD`], and falls back to `SIGKILL`.
*/

pub mod error;
mod process;
mod token;

pub use error::{Error, Result};
pub use process::{run_killable, RunHandle, GRACE_PERIOD};
pub use token::CancelToken;
