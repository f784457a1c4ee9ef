#![deny(missing_docs)]

//! # exstack
//!
//! Structured exception handling - `try` / `catch` / `catchall` /
//! `finally` / `rethrow` - as an explicit, inspectable state machine, with
//! a diagnostic trace of every failure's path and an "uncatchable"
//! escalation channel for failures that must terminate the process no
//! matter who observes them on the way out.
//!
//! The crate exists for code that needs exception *semantics* rather than
//! `Result` plumbing: interpreters, emulators and runtime layers that
//! guarantee cleanup ordering across deeply nested dynamic regions, where
//! "which handler fires, exactly once, and what happens when the handler
//! itself fails" is the whole problem.
//!
//! ## Features
//!
//! - **Nested try regions** - a bounded per-thread stack of activation
//!   records with strict LIFO enter/leave pairing
//! - **Single-shot dispatch** - at most one catch/catchall per region and
//!   failure, a finally that runs exactly once on every path
//! - **Propagation traces** - every throw and every region boundary that
//!   re-raised it, bounded, with owned payloads released exactly once
//! - **Uncatchable escalation** - observable by every enclosing handler,
//!   absorbed by none
//! - **Contract enforcement** - mismatched enter/leave, rethrow outside a
//!   handler and runaway throw loops are fatal, with distinct exit codes
//!
//! ## Quick Start
//!
//! ```
//! use std::cell::RefCell;
//! use exstack::prelude::*;
//!
//! const BAD_INPUT: i32 = 2;
//!
//! let log = RefCell::new(Vec::new());
//! TryBlock::new(|| {
//!     log.borrow_mut().push("parsing");
//!     exstack::throw!(BAD_INPUT, "name field is empty");
//! })
//! .catch(BAD_INPUT, || {
//!     log.borrow_mut().push("recovered");
//!     assert_eq!(current().code, BAD_INPUT);
//! })
//! .finally(|| log.borrow_mut().push("cleaned up"))
//! .run();
//!
//! assert_eq!(*log.borrow(), ["parsing", "recovered", "cleaned up"]);
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - re-exports of the commonly used surface
//! - [`TryBlock`] - the region construct; the only way to enter a region,
//!   so enter/leave pairing holds by construction
//! - [`TraceEntry`] / [`walk_trace`] / [`current`] - the diagnostic trace
//! - [`throw`] / [`rethrow`] - failure propagation (plus the [`throw!`],
//!   [`rethrow!`] and [`entry!`] call-site macros)
//!
//! ## Concurrency model
//!
//! Each OS thread owns an independent engine instance (context stack,
//! trace, pending-failure state); nothing is shared and nothing locks.
//! Using the crate from many threads at once is fine - failures never
//! cross threads. The one process-global is the diagnostic [`tag`]
//! printed with an unhandled failure.
//!
//! ## Panics and unwinding
//!
//! Propagation rides Rust's unwinder: [`throw`] never returns, and a
//! failure crossing a region that does not absorb it looks like an
//! ordinary unwind to the code in between. Ordinary Rust panics pass
//! through a [`TryBlock`] untouched - they do not fire clauses and they
//! leave the engine balanced. Building with `panic = "abort"` is not
//! supported.

mod block;
mod context;
mod engine;
mod fault;
mod macros;
pub mod prelude;
mod trace;

pub use block::TryBlock;
pub use engine::{current, print_trace, rethrow, set_tag, tag, throw, walk_trace};
pub use fault::{
    EXIT_CODE_CAP, EXIT_CONTEXTS_EXHAUSTED, EXIT_HANDLER_OUTSIDE_BLOCK, EXIT_LEAVE_WITHOUT_ENTER,
    EXIT_RETHROW_OUTSIDE_HANDLER, EXIT_RUNAWAY_LOOP, EXIT_UNCAUGHT,
};
pub use trace::{TraceEntry, MAX_TRACE_ENTRIES, MAX_TRACE_STRING};
