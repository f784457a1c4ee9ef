//! The structured try construct.
//!
//! [`TryBlock`] is the only way to open a region: it owns the body and
//! clause closures and its [`run`](TryBlock::run) drives the whole
//! enter / dispatch / leave protocol. Because clauses are plain `FnOnce()`
//! closures, there is no way to `return` or `?` across a region boundary -
//! the one structural rule the engine cannot check at runtime is instead
//! impossible to break.
//!
//! Clause order is declaration order. Per region and failure, at most one
//! catch/catchall clause runs (first textual match wins; a second clause
//! with the same code is dead), and a finally clause runs exactly once no
//! matter how the region ends.
//!
//! Failures raised inside a clause propagate to the next-outer region when
//! the block is left; they never re-enter the region's own clauses.

use std::panic::{self, AssertUnwindSafe, Location};

use crate::engine::{self, Signal};

enum Filter {
    Code(i32),
    Any,
}

struct Clause<'a> {
    filter: Filter,
    handler: Option<Box<dyn FnOnce() + 'a>>,
}

/// A try region under construction: a body plus catch/catchall/finally
/// clauses, executed by [`run`](TryBlock::run).
///
/// Clauses communicate results through captured state (a `Cell`/`RefCell`
/// shared with the surrounding scope); the block itself returns nothing.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use exstack::TryBlock;
///
/// let log = RefCell::new(String::new());
/// TryBlock::new(|| {
///     log.borrow_mut().push('T');
///     exstack::throw!(7, "boom");
/// })
/// .catch(7, || log.borrow_mut().push('C'))
/// .finally(|| log.borrow_mut().push('F'))
/// .run();
/// assert_eq!(log.into_inner(), "TCF");
/// ```
#[must_use = "a TryBlock does nothing until run()"]
pub struct TryBlock<'a> {
    body: Option<Box<dyn FnOnce() + 'a>>,
    clauses: Vec<Clause<'a>>,
    finalizer: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a> TryBlock<'a> {
    /// Starts a region around `body`.
    pub fn new(body: impl FnOnce() + 'a) -> Self {
        TryBlock {
            body: Some(Box::new(body)),
            clauses: Vec::new(),
            finalizer: None,
        }
    }

    /// Adds a clause handling exactly `code`. Codes below 1 never match
    /// (delivery normalizes them to 1).
    pub fn catch(mut self, code: i32, handler: impl FnOnce() + 'a) -> Self {
        self.clauses.push(Clause {
            filter: Filter::Code(code),
            handler: Some(Box::new(handler)),
        });
        self
    }

    /// Adds a clause handling any code not taken by an earlier clause.
    pub fn catch_all(mut self, handler: impl FnOnce() + 'a) -> Self {
        self.clauses.push(Clause {
            filter: Filter::Any,
            handler: Some(Box::new(handler)),
        });
        self
    }

    /// Adds the clause that runs exactly once when the region ends, on the
    /// normal and the failure path alike. A region has at most one; later
    /// calls replace the closure.
    pub fn finally(mut self, finalizer: impl FnOnce() + 'a) -> Self {
        self.finalizer = Some(Box::new(finalizer));
        self
    }

    /// Runs the region to completion.
    ///
    /// Returns normally when the body succeeded, or when a clause absorbed
    /// the failure. Unwinds onward when a failure is left pending at exit
    /// (no matching clause, a clause that itself failed, or an uncatchable
    /// failure); the next-outer region observes it as its own delivery.
    /// With no outer region the process terminates.
    #[track_caller]
    pub fn run(mut self) {
        let location = Location::caller();
        engine::enter();
        let mut delivered = 0;
        loop {
            let run_body = engine::resume(delivered);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.pass(run_body)));
            match outcome {
                Ok(()) => break,
                Err(payload) => match payload.downcast::<Signal>() {
                    Ok(signal) => delivered = signal.code,
                    Err(foreign) => {
                        // Not ours (an ordinary Rust panic). Keep the
                        // context stack balanced and let it keep going.
                        engine::abandon();
                        panic::resume_unwind(foreign);
                    }
                },
            }
        }
        engine::leave(location.file(), location.line());
    }

    /// One arrival at the resume point: the body on first entry, otherwise
    /// the textual guard scan, then the finally guard.
    fn pass(&mut self, run_body: bool) {
        if run_body {
            if let Some(body) = self.body.take() {
                body();
            }
        } else {
            for clause in &mut self.clauses {
                let fires = match clause.filter {
                    Filter::Code(code) => engine::guard_catch(code),
                    Filter::Any => engine::guard_catchall(),
                };
                if fires {
                    if let Some(handler) = clause.handler.take() {
                        handler();
                    }
                    break;
                }
            }
        }
        if self.finalizer.is_some() && engine::guard_finally() {
            if let Some(finalizer) = self.finalizer.take() {
                finalizer();
            }
        }
    }
}
