//! Call-site capture and throw sugar.
//!
//! A [`TraceEntry`](crate::TraceEntry) is only useful when it names where
//! it came from; these macros fill in `file!()`/`line!()` so throw sites
//! stay one-liners.

/// Builds a [`TraceEntry`](crate::TraceEntry) carrying the current file
/// and line, optionally with a formatted message.
///
/// ```
/// let entry = exstack::entry!(3, "offset {} out of range", 17);
/// assert_eq!(entry.code, 3);
/// assert!(!entry.file.is_empty());
/// ```
#[macro_export]
macro_rules! entry {
    ($code:expr) => {
        $crate::TraceEntry::new($code).at(file!(), line!())
    };
    ($code:expr, $($fmt:tt)+) => {
        $crate::TraceEntry::new($code)
            .at(file!(), line!())
            .message(format!($($fmt)+))
    };
}

/// Raises a failure from the current call site; never returns.
/// Shorthand for [`throw`](crate::throw) over [`entry!`].
#[macro_export]
macro_rules! throw {
    ($code:expr) => {
        $crate::throw($crate::entry!($code))
    };
    ($code:expr, $($fmt:tt)+) => {
        $crate::throw($crate::entry!($code, $($fmt)+))
    };
}

/// Re-raises from inside a catch/catchall clause; never returns.
///
/// With no arguments the code currently being handled is preserved and the
/// new trace record only marks the re-raise site. Shorthand for
/// [`rethrow`](crate::rethrow) over [`entry!`].
#[macro_export]
macro_rules! rethrow {
    () => {
        $crate::rethrow($crate::entry!(0))
    };
    ($code:expr) => {
        $crate::rethrow($crate::entry!($code))
    };
    ($code:expr, $($fmt:tt)+) => {
        $crate::rethrow($crate::entry!($code, $($fmt)+))
    };
}

/// Raises `code` when the condition holds; the condition's text becomes
/// part of the message.
///
/// ```no_run
/// # let len = 9;
/// exstack::throw_if!(len > 8, 2, "name too long: {} bytes", len);
/// ```
#[macro_export]
macro_rules! throw_if {
    ($cond:expr, $code:expr) => {
        if $cond {
            $crate::throw!($code, "condition failed: {}", stringify!($cond));
        }
    };
    ($cond:expr, $code:expr, $($fmt:tt)+) => {
        if $cond {
            $crate::throw!(
                $code,
                "condition failed: {}; {}",
                stringify!($cond),
                format!($($fmt)+)
            );
        }
    };
}
