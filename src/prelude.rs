//! # exstack Prelude
//!
//! Convenient re-exports of the types, functions and constants most
//! programs need. Import this module to get the whole try/throw surface in
//! one line:
//!
//! ```
//! use exstack::prelude::*;
//!
//! TryBlock::new(|| {}).run();
//! assert_eq!(current().code, -1);
//! ```

// ================================================================================================
// The try construct and the failure record
// ================================================================================================

/// The structured try/catch/catchall/finally construct
pub use crate::TryBlock;

/// One step of a failure's propagation trace
pub use crate::TraceEntry;

// ================================================================================================
// Raising and inspecting failures
// ================================================================================================

/// Raise a new failure / re-raise the one being handled
pub use crate::{rethrow, throw};

/// Inspect the failure currently being handled
pub use crate::{current, print_trace, walk_trace};

/// The process-wide diagnostic tag
pub use crate::{set_tag, tag};

// ================================================================================================
// Bounds and exit codes
// ================================================================================================

/// Capacity bounds of the diagnostic trace
pub use crate::{MAX_TRACE_ENTRIES, MAX_TRACE_STRING};

/// Process exit codes used when the engine terminates the process
pub use crate::{
    EXIT_CONTEXTS_EXHAUSTED, EXIT_HANDLER_OUTSIDE_BLOCK, EXIT_LEAVE_WITHOUT_ENTER,
    EXIT_RETHROW_OUTSIDE_HANDLER, EXIT_RUNAWAY_LOOP, EXIT_UNCAUGHT,
};
