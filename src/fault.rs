//! Engine contract violations.
//!
//! These are programmer errors, not application failures: a mismatched
//! enter/leave, a rethrow outside any handler, a guard evaluated outside
//! any region, a runaway throw/catch loop. Continuing after any of them
//! would corrupt the context stack, so each one prints a diagnostic and
//! terminates the process with a distinctive exit code. They are kept
//! strictly separate from the recoverable failure taxonomy in
//! [`trace`](crate::trace) and are never surfaced as a `Result`.

use thiserror::Error;

/// Base exit code for an unhandled failure. The process exits with this
/// value plus the failure's code, capped at [`EXIT_CODE_CAP`].
pub const EXIT_UNCAUGHT: i32 = 200;

/// Highest exit code the engine ever uses.
pub const EXIT_CODE_CAP: i32 = 254;

/// Exit code: too many simultaneously active try regions.
pub const EXIT_CONTEXTS_EXHAUSTED: i32 = 254;

/// Exit code: a region was left without a matching enter.
pub const EXIT_LEAVE_WITHOUT_ENTER: i32 = 253;

/// Exit code: rethrow used outside of a catch/catchall clause.
pub const EXIT_RETHROW_OUTSIDE_HANDLER: i32 = 252;

/// Exit code: a clause guard was evaluated outside of any region.
pub const EXIT_HANDLER_OUTSIDE_BLOCK: i32 = 251;

/// Exit code: a region kept dispatching past the runaway threshold.
pub const EXIT_RUNAWAY_LOOP: i32 = 250;

/// The ways the dispatch protocol can be violated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    #[error("too many nested try blocks")]
    ContextsExhausted,
    #[error("try block left without a matching enter")]
    LeaveWithoutEnter,
    #[error("rethrow used outside of a catch or catchall clause")]
    RethrowOutsideHandler,
    #[error("catch/catchall/finally guard evaluated outside of a try block")]
    HandlerOutsideBlock,
    #[error("runaway throw/catch loop in one try region")]
    RunawayLoop,
}

impl Fault {
    pub(crate) fn exit_code(self) -> i32 {
        match self {
            Fault::ContextsExhausted => EXIT_CONTEXTS_EXHAUSTED,
            Fault::LeaveWithoutEnter => EXIT_LEAVE_WITHOUT_ENTER,
            Fault::RethrowOutsideHandler => EXIT_RETHROW_OUTSIDE_HANDLER,
            Fault::HandlerOutsideBlock => EXIT_HANDLER_OUTSIDE_BLOCK,
            Fault::RunawayLoop => EXIT_RUNAWAY_LOOP,
        }
    }
}

/// Prints the violation and terminates the process.
#[cold]
pub(crate) fn die(fault: Fault) -> ! {
    eprintln!("exstack contract violation: {fault}");
    std::process::exit(fault.exit_code())
}
