//! Trace records and the bounded propagation trace.
//!
//! Every failure that travels through the engine leaves a trail of
//! [`TraceEntry`] records: one for the original throw, plus one for every
//! region boundary that re-raised it. The trail is held in a [`TraceStack`]
//! owned by the per-thread engine state; index 0 is always the entry that
//! originated the current failure.
//!
//! # Bounds
//!
//! The trace is a best-effort diagnostic aid, never a correctness
//! requirement. It holds at most [`MAX_TRACE_ENTRIES`] records; anything
//! beyond that is silently dropped while the failure itself keeps
//! propagating. Embedded strings are truncated to [`MAX_TRACE_STRING`]
//! bytes on insertion, always on a UTF-8 character boundary.
//!
//! # Payload ownership
//!
//! A record may carry an opaque payload (`Box<dyn Any>`). Ownership moves
//! into the trace on append and the payload is dropped exactly once: either
//! when a fresh failure session clears the trace, or immediately if the
//! record was refused (blank or over capacity).
//!
//! # Thread Safety
//!
//! Entries and the stack are thread-owned; nothing here is shared or
//! synchronized.

use std::any::Any;
use std::fmt;

/// Maximum byte length of the `file` and `message` strings of a recorded
/// [`TraceEntry`]. Longer strings are truncated on a character boundary.
pub const MAX_TRACE_STRING: usize = 128;

/// Maximum number of records one failure's trace can hold. Records past
/// this bound are dropped; the failure still propagates.
pub const MAX_TRACE_ENTRIES: usize = 20;

/// One step of a failure's propagation path.
///
/// Built at the throw site (usually via the [`entry!`](crate::entry) macro,
/// which fills in `file` and `line`) and appended to the thread's trace by
/// [`throw`](crate::throw) / [`rethrow`](crate::rethrow).
///
/// Codes below 1 are delivered to handlers as 1 but kept verbatim here for
/// display.
pub struct TraceEntry {
    /// Classification code of the failure. Handlers match on this value.
    pub code: i32,
    /// Marks a failure that must ultimately terminate the process even if
    /// handlers observe it along the way.
    pub uncatchable: bool,
    /// Source file of the throw site, empty when unknown.
    pub file: String,
    /// Source line of the throw site, 0 when unknown.
    pub line: u32,
    /// Human-readable description, may be empty.
    pub message: String,
    /// Opaque payload owned by this record, dropped when the record is
    /// evicted from the trace.
    pub payload: Option<Box<dyn Any>>,
}

impl TraceEntry {
    /// Creates an entry with the given code and no other information.
    ///
    /// An entry that never receives a file, message or payload is refused
    /// by the trace (a failure must carry at least one piece of information
    /// besides its code), though throwing it still works.
    pub fn new(code: i32) -> Self {
        TraceEntry {
            code,
            uncatchable: false,
            file: String::new(),
            line: 0,
            message: String::new(),
            payload: None,
        }
    }

    /// Sets the throw-site origin.
    #[must_use]
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Marks the entry uncatchable. Such a failure may still be observed by
    /// every enclosing catch/catchall clause, but each region re-raises it
    /// on exit until it reaches the top and terminates the process.
    #[must_use]
    pub fn uncatchable(mut self) -> Self {
        self.uncatchable = true;
        self
    }

    /// Attaches an opaque payload. The trace takes ownership and drops the
    /// value when the record is evicted.
    #[must_use]
    pub fn payload(mut self, payload: impl Any) -> Self {
        self.payload = Some(Box::new(payload));
        self
    }

    /// Whether the entry carries no origin, no message and no payload.
    pub(crate) fn is_blank(&self) -> bool {
        self.file.is_empty() && self.message.is_empty() && self.payload.is_none()
    }

    /// Copy of this entry without the payload. The payload has exactly one
    /// owner (the trace), so lookups hand out payload-less copies.
    pub(crate) fn without_payload(&self) -> TraceEntry {
        TraceEntry {
            code: self.code,
            uncatchable: self.uncatchable,
            file: self.file.clone(),
            line: self.line,
            message: self.message.clone(),
            payload: None,
        }
    }

    /// The "no failure is being handled" sentinel, `code == -1`.
    pub(crate) fn sentinel() -> TraceEntry {
        TraceEntry::new(-1)
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            writeln!(f, "{}", self.message)?;
        }
        write!(
            f,
            "    ...{}at {}:{}, code {}",
            if self.uncatchable { "UNCATCHABLE " } else { "" },
            self.file,
            self.line,
            self.code
        )?;
        if self.payload.is_some() {
            write!(f, " (payload)")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceEntry")
            .field("code", &self.code)
            .field("uncatchable", &self.uncatchable)
            .field("file", &self.file)
            .field("line", &self.line)
            .field("message", &self.message)
            .field("payload", &self.payload.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Truncates `s` to at most `max` bytes, backing up to a char boundary.
fn truncate_to_boundary(s: &mut String, max: usize) {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
}

/// Ordered sequence of [`TraceEntry`] records for the failure currently
/// propagating on this thread. Insertion order is propagation order.
pub(crate) struct TraceStack {
    entries: Vec<TraceEntry>,
}

impl TraceStack {
    pub(crate) fn new() -> Self {
        TraceStack {
            entries: Vec::with_capacity(MAX_TRACE_ENTRIES),
        }
    }

    /// Appends `entry` unless the trace is full or the entry is blank.
    /// Strings are truncated to [`MAX_TRACE_STRING`] bytes. Overflow is not
    /// an error; the trace is diagnostic only.
    pub(crate) fn record(&mut self, mut entry: TraceEntry) {
        if self.entries.len() >= MAX_TRACE_ENTRIES || entry.is_blank() {
            return;
        }
        truncate_to_boundary(&mut entry.file, MAX_TRACE_STRING);
        truncate_to_boundary(&mut entry.message, MAX_TRACE_STRING);
        self.entries.push(entry);
    }

    /// Empties the trace, dropping every owned payload. Called exactly once
    /// per failure session, when a fresh throw begins.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Invokes `visitor` once per record in propagation order and returns
    /// the number of records visited.
    pub(crate) fn walk(&self, visitor: &mut dyn FnMut(&TraceEntry)) -> usize {
        for entry in &self.entries {
            visitor(entry);
        }
        self.entries.len()
    }

    /// Payload-less copy of the record that originated the current failure,
    /// or the `code == -1` sentinel when no failure has been recorded.
    pub(crate) fn top(&self) -> TraceEntry {
        match self.entries.first() {
            Some(entry) => entry.without_payload(),
            None => TraceEntry::sentinel(),
        }
    }
}
