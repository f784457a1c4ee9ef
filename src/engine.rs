//! Per-thread engine state and the dispatch/propagation operations.
//!
//! This module owns everything a thread needs to run structured
//! try/catch/catchall/finally regions: the stack of active region
//! [`Context`](crate::context::Context)s, the diagnostic
//! [`TraceStack`](crate::trace::TraceStack), the code most recently
//! delivered to a resume point (`last_code`, 0 meaning "no pending
//! failure") and the sticky uncatchable latch.
//!
//! # State Transitions
//!
//! Each region moves through the following states, tracked implicitly by
//! (`last_code`, handled counter):
//!
//! 1. **Trying** - region entered, counter 0, last code 0; the body runs
//! 2. **Dispatching** - the body failed; control returned to the resume
//!    point with a nonzero code, counter still 0
//! 3. **Caught** - a catch/catchall guard matched for the first time;
//!    counter becomes 1 and last code resets to 0 for the clause body
//! 4. **Finalizing** - the finally guard fired; the counter jumps to a
//!    sentinel that blocks every later catch/catchall in this region
//! 5. **Left** - region exit; if the latch is set or a failure is still
//!    pending, the exit itself re-raises to the next-outer region
//!
//! The resume point is not stored here. Raising unwinds the Rust stack
//! (`resume_unwind` with a crate-private [`Signal`]) and the innermost
//! [`TryBlock::run`](crate::TryBlock::run) catches it, which is exactly
//! the innermost context by construction.
//!
//! # Thread Safety
//!
//! The engine state lives in a `thread_local!`; every OS thread gets an
//! independent instance and no operation here locks or shares anything.
//! The only process-global is the diagnostic [`tag`].

use std::cell::RefCell;
use std::panic;
use std::process;

use parking_lot::RwLock;

use crate::{
    context::{ContextStack, FINALLY_SENTINEL, RUNAWAY_LIMIT},
    fault::{self, Fault, EXIT_CODE_CAP, EXIT_UNCAUGHT},
    trace::{TraceEntry, TraceStack},
};

/// Unwind payload carrying the normalized code to the innermost resume
/// point. Anything else crossing a region is a foreign panic and passes
/// through untouched.
pub(crate) struct Signal {
    pub code: i32,
}

struct Engine {
    contexts: ContextStack,
    trace: TraceStack,
    /// Code most recently delivered to the innermost resume point;
    /// 0 = no pending failure. Only meaningful for the top context.
    last_code: i32,
    /// Set once any uncatchable failure is raised in the current session;
    /// cleared only when a fresh throw starts a new one.
    has_uncatchable: bool,
}

impl Engine {
    fn new() -> Self {
        Engine {
            contexts: ContextStack::new(),
            trace: TraceStack::new(),
            last_code: 0,
            has_uncatchable: false,
        }
    }
}

thread_local! {
    static ENGINE: RefCell<Engine> = RefCell::new(Engine::new());
}

static TAG: RwLock<Option<String>> = RwLock::new(None);

macro_rules! dispatch_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "dispatch-log")]
        eprintln!($($arg)*);
    };
}

// ---- Dispatch controller ----------------------------------------------
//
// Called only from TryBlock::run, at well-defined points of the construct.
// Misuse cannot be expressed through the public API; the checks stay
// anyway because a desynchronized context stack must never limp on.

/// Enters a region: pushes a fresh context. Fatal when the stack is full.
pub(crate) fn enter() {
    ENGINE.with(|e| {
        let mut e = e.borrow_mut();
        if !e.contexts.push() {
            fault::die(Fault::ContextsExhausted);
        }
        dispatch_log!("exstack enter:  depth={}", e.contexts.depth());
    });
}

/// Called each time control reaches the region's resume point: with 0 on
/// first entry, with the delivered code after a failure. Returns true iff
/// the try body should run (as opposed to evaluating clause guards).
pub(crate) fn resume(code: i32) -> bool {
    ENGINE.with(|e| {
        let mut e = e.borrow_mut();
        let Some(cx) = e.contexts.top() else {
            fault::die(Fault::HandlerOutsideBlock);
        };
        if cx.handled >= RUNAWAY_LIMIT {
            fault::die(Fault::RunawayLoop);
        }
        dispatch_log!(
            "exstack resume: depth={} code={} handled={}",
            e.contexts.depth(),
            code,
            cx.handled
        );
        e.last_code = code;
        code == 0
    })
}

/// Guard of a `catch(code)` clause. The handled counter is only consumed
/// when the code actually matches, so a non-matching clause never blocks a
/// later one.
pub(crate) fn guard_catch(code: i32) -> bool {
    ENGINE.with(|e| e.borrow().last_code) == code && mark_handled(false)
}

/// Guard of a `catchall` clause.
pub(crate) fn guard_catchall() -> bool {
    mark_handled(false)
}

/// Guard of a `finally` clause.
pub(crate) fn guard_finally() -> bool {
    mark_handled(true)
}

/// The single-shot dispatch rule. Increments the innermost region's
/// counter; the first catch increment wins and resets `last_code` so that
/// an unqualified rethrow inside the clause means "re-raise what I am
/// handling". A finally forces the counter to [`FINALLY_SENTINEL`],
/// blocking any catch/catchall that has not yet been reached.
fn mark_handled(is_finally: bool) -> bool {
    ENGINE.with(|e| {
        let engine = &mut *e.borrow_mut();
        let Some(cx) = engine.contexts.top_mut() else {
            fault::die(Fault::HandlerOutsideBlock);
        };
        cx.handled += 1;
        if !is_finally {
            if cx.handled == 1 {
                cx.handled_code = engine.last_code;
                engine.last_code = 0;
                return true;
            }
            false
        } else if cx.handled < FINALLY_SENTINEL {
            cx.handled = FINALLY_SENTINEL;
            true
        } else {
            false
        }
    })
}

/// Leaves a region: pops its context. If the uncatchable latch is set or a
/// failure is still pending (the body failed unhandled, or a clause itself
/// failed), the exit re-raises against the next-outer region with a
/// synthesized trace record naming the exit site.
pub(crate) fn leave(file: &str, line: u32) {
    let pending = ENGINE.with(|e| {
        let mut e = e.borrow_mut();
        if e.contexts.pop().is_none() {
            fault::die(Fault::LeaveWithoutEnter);
        }
        dispatch_log!(
            "exstack leave:  depth={} code={} at {}:{}",
            e.contexts.depth(),
            e.last_code,
            file,
            line
        );
        if e.has_uncatchable || e.last_code != 0 {
            let mut entry = TraceEntry::new(e.last_code)
                .at(file, line)
                .message("rethrown at end of try block");
            if e.has_uncatchable {
                entry = entry.uncatchable();
            }
            Some(entry)
        } else {
            None
        }
    });
    if let Some(entry) = pending {
        propagate(entry);
    }
}

/// Pops the innermost context without the rethrow-at-exit step. Used when
/// a foreign (non-engine) panic crosses a region.
pub(crate) fn abandon() {
    ENGINE.with(|e| {
        let _ = e.borrow_mut().contexts.pop();
    });
}

// ---- Failure propagation ----------------------------------------------

/// Shared propagation step of throw and rethrow: record the entry, latch
/// the uncatchable flag, then either transfer control to the innermost
/// resume point (delivering `max(code, 1)`) or, with no enclosing region,
/// print the trace and terminate the process.
fn propagate(entry: TraceEntry) -> ! {
    let raw_code = entry.code;
    let delivered = ENGINE.with(|e| {
        let mut e = e.borrow_mut();
        e.has_uncatchable |= entry.uncatchable;
        e.trace.record(entry);
        if e.contexts.is_empty() {
            None
        } else {
            Some(raw_code.max(1))
        }
    });
    match delivered {
        Some(code) => panic::resume_unwind(Box::new(Signal { code })),
        None => unhandled_exit(raw_code),
    }
}

/// No enclosing region: print the full trace and terminate. The verbatim
/// (pre-normalization) code feeds the exit value, as it does the display.
#[cold]
fn unhandled_exit(code: i32) -> ! {
    eprintln!(
        "Uncaught exception (code {code}) - terminating. Tag: {}",
        tag()
    );
    print_trace();
    process::exit(EXIT_UNCAUGHT.saturating_add(code).min(EXIT_CODE_CAP))
}

/// Raises a failure, beginning a new failure session: the previous trace
/// (and its payloads) and the uncatchable latch are discarded first.
///
/// Control transfers to the innermost enclosing
/// [`TryBlock`](crate::TryBlock) region; with none active the process
/// terminates with
/// [`EXIT_UNCAUGHT`] plus the failure's code. This function never returns.
///
/// Usually invoked through the [`throw!`](crate::throw!) macro, which
/// fills in the call site.
pub fn throw(entry: TraceEntry) -> ! {
    ENGINE.with(|e| {
        let mut e = e.borrow_mut();
        e.trace.clear();
        e.has_uncatchable = false;
    });
    propagate(entry)
}

/// Re-raises from inside a catch or catchall clause, preserving and
/// extending the current trace instead of starting a new session.
///
/// If `entry.code` is below 1, the code currently being handled is
/// substituted, so `rethrow!()` re-raises exactly what the clause caught.
/// Calling this anywhere but a catch/catchall clause body (including from
/// a finally clause) is a contract violation and terminates the process.
pub fn rethrow(mut entry: TraceEntry) -> ! {
    let handled_code = ENGINE.with(|e| {
        let e = e.borrow();
        let cx = match e.contexts.top() {
            Some(cx) if e.last_code == 0 && cx.handled < FINALLY_SENTINEL => cx,
            _ => fault::die(Fault::RethrowOutsideHandler),
        };
        cx.handled_code
    });
    if entry.code < 1 {
        entry.code = handled_code;
    }
    propagate(entry)
}

// ---- Introspection ----------------------------------------------------

/// Payload-less copy of the record that originated the failure currently
/// being handled, or a sentinel with `code == -1` when the trace is empty.
///
/// The trace survives until the next fresh [`throw`], so this also answers
/// "what did I just handle" right after a region completes.
pub fn current() -> TraceEntry {
    ENGINE.with(|e| e.borrow().trace.top())
}

/// Invokes `visitor` once per trace record in propagation order (index 0 =
/// origin) and returns the number of records visited.
///
/// The visitor must not throw or rethrow; the trace is borrowed while it
/// runs.
pub fn walk_trace(mut visitor: impl FnMut(&TraceEntry)) -> usize {
    ENGINE.with(|e| e.borrow().trace.walk(&mut visitor))
}

/// Prints the current trace to stderr, one record per [`walk_trace`] step.
pub fn print_trace() {
    walk_trace(|entry| eprintln!("{entry}"));
}

/// Sets the process-wide tag included in unhandled-failure output.
/// Typically a program version or build label.
pub fn set_tag(tag: impl Into<String>) {
    *TAG.write() = Some(tag.into());
}

/// The process-wide diagnostic tag. Defaults to the crate name and
/// version until [`set_tag`] overrides it.
pub fn tag() -> String {
    TAG.read()
        .clone()
        .unwrap_or_else(|| concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each #[test] runs on its own thread, so every test sees a fresh
    // thread-local engine.

    #[test]
    fn resume_reports_whether_body_runs() {
        enter();
        assert!(resume(0));
        assert!(!resume(7));
        assert!(resume(0));
        leave("engine.rs", 0);
    }

    #[test]
    fn first_catch_wins_and_resets_last_code() {
        enter();
        resume(4);
        assert!(!guard_catch(3)); // wrong code, counter untouched
        assert!(guard_catch(4));
        // Clause body runs with no pending failure.
        assert!(!guard_catch(4));
        assert!(!guard_catchall());
        leave("engine.rs", 0); // last_code back to 0, normal exit
    }

    #[test]
    fn non_matching_catch_leaves_catchall_armed() {
        enter();
        resume(9);
        assert!(!guard_catch(1));
        assert!(!guard_catch(2));
        assert!(guard_catchall());
        leave("engine.rs", 0);
    }

    #[test]
    fn finally_fires_once_and_blocks_later_catches() {
        enter();
        resume(0);
        assert!(guard_finally());
        // A failure inside the finally clause re-arms nothing.
        resume(5);
        assert!(!guard_catch(5));
        assert!(!guard_catchall());
        assert!(!guard_finally());
        // Exit would rethrow (last_code != 0); clear it the way a real
        // delivery loop would before leaving.
        resume(0);
        leave("engine.rs", 0);
    }

    #[test]
    fn finally_runs_after_catch_in_same_region() {
        enter();
        resume(2);
        assert!(guard_catch(2));
        assert!(guard_finally());
        assert!(!guard_finally());
        leave("engine.rs", 0);
    }

    #[test]
    fn handled_code_is_saved_for_rethrow() {
        enter();
        resume(42);
        assert!(guard_catchall());
        let saved = ENGINE.with(|e| e.borrow().contexts.top().unwrap().handled_code);
        assert_eq!(saved, 42);
        leave("engine.rs", 0);
    }

    #[test]
    fn current_is_sentinel_on_fresh_thread() {
        std::thread::spawn(|| {
            assert_eq!(current().code, -1);
            assert_eq!(walk_trace(|_| {}), 0);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn default_tag_names_the_crate() {
        assert!(tag().starts_with("exstack"));
    }
}
