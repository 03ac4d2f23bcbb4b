use log::error;
use std::fmt::Display;

use crate::utils::error::{CaptureError, WorkerError};

/// How the process ends once a capture run has failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Log the error and exit with status 1
    Exit,

    /// Abort the process through `abort_process`
    Abort,
}

/// Map a capture run failure to its termination policy.
///
/// Decode faults abort; every other capture failure exits.
pub fn termination_for(err: &CaptureError) -> Termination {
    match err {
        CaptureError::Handler(WorkerError::Decode(_)) => Termination::Abort,
        _ => Termination::Exit,
    }
}

/// Abort the process after logging `err`.
///
/// Used for construction failures and decode errors. No unwinding, no
/// retry: a decode fault means the stream cannot be processed safely.
/// Capture resources must be released before calling this.
pub fn abort_process(context: &str, err: &dyn Display) -> ! {
    error!("{}: {}", context, err);
    log::logger().flush();
    eprintln!("fatal: {}: {}", context, err);
    std::process::abort()
}
