//! Try-region activation records.
//!
//! Each dynamic activation of a try region pushes one [`Context`] here and
//! pops it when the region is left, normally or on the failure path. The
//! stack is strictly LIFO and thread-owned; the top entry is the innermost
//! active region and the only one the dispatch operations touch.
//!
//! The resume point of a region is not stored in the context: it is the
//! `catch_unwind` that drives the region inside
//! [`TryBlock::run`](crate::TryBlock::run), and unwinding always lands on
//! the innermost one.

/// Maximum number of simultaneously active try regions per thread.
/// Exceeding it indicates a structural bug (usually unbounded recursion
/// under a try construct) and is fatal.
pub(crate) const MAX_CONTEXTS: usize = 100;

/// Value the handled counter is forced to once a finally clause fires.
/// High enough that no catch/catchall guard in the same region can succeed
/// afterwards, even if the finally body itself fails.
pub(crate) const FINALLY_SENTINEL: u32 = 50;

/// Dispatch-attempt ceiling per region. A counter this high means a body
/// whose handlers keep throwing in a loop; the engine terminates rather
/// than spin forever.
pub(crate) const RUNAWAY_LIMIT: u32 = 1000;

/// One activation of a try region.
#[derive(Debug, Default)]
pub(crate) struct Context {
    /// Dispatch attempts within this region. 0 while the body runs, 1 once
    /// a catch/catchall fired, [`FINALLY_SENTINEL`] once the finally fired.
    pub handled: u32,
    /// Code of the failure a catch/catchall clause in this region is
    /// handling; 0 until one fires. Restored by an unqualified rethrow.
    pub handled_code: i32,
}

/// LIFO stack of active regions, bounded by [`MAX_CONTEXTS`].
pub(crate) struct ContextStack {
    entries: Vec<Context>,
}

impl ContextStack {
    pub(crate) fn new() -> Self {
        ContextStack {
            entries: Vec::with_capacity(MAX_CONTEXTS),
        }
    }

    /// Pushes a fresh context; returns false when the stack is full.
    #[must_use]
    pub(crate) fn push(&mut self) -> bool {
        if self.entries.len() >= MAX_CONTEXTS {
            return false;
        }
        self.entries.push(Context::default());
        true
    }

    pub(crate) fn pop(&mut self) -> Option<Context> {
        self.entries.pop()
    }

    /// Innermost active region, if any.
    pub(crate) fn top(&self) -> Option<&Context> {
        self.entries.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut Context> {
        self.entries.last_mut()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(feature = "dispatch-log")]
    pub(crate) fn depth(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifo_order() {
        let mut stack = ContextStack::new();
        assert!(stack.push());
        stack.top_mut().unwrap().handled = 1;
        assert!(stack.push());
        assert_eq!(stack.top().unwrap().handled, 0);
        assert_eq!(stack.pop().unwrap().handled, 0);
        assert_eq!(stack.pop().unwrap().handled, 1);
        assert!(stack.pop().is_none());
        assert!(stack.is_empty());
    }

    #[test]
    fn push_refuses_past_capacity() {
        let mut stack = ContextStack::new();
        for _ in 0..MAX_CONTEXTS {
            assert!(stack.push());
        }
        assert!(!stack.push());
    }
}
