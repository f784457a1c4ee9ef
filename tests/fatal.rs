//! Process-terminating paths: unhandled failures and uncatchable
//! escalation.
//!
//! These cannot run in-process (the engine calls `exit`), so each test
//! re-executes this test binary with an env marker set; the child half
//! performs the fatal action and the parent asserts on its exit code and
//! stderr.

use std::cell::Cell;
use std::process::Command;

use exstack::{set_tag, TryBlock};

/// Re-runs exactly one test of this binary with `marker` set, returning
/// (exit code, stderr).
fn run_child(test_name: &str, marker: &str) -> (Option<i32>, String) {
    let exe = std::env::current_exe().expect("test binary path");
    let output = Command::new(exe)
        .args([test_name, "--exact", "--nocapture"])
        .env(marker, "1")
        .output()
        .expect("spawning child test");
    (output.status.code(), String::from_utf8_lossy(&output.stderr).into_owned())
}

#[test]
fn unhandled_failure_exits_with_offset_code() {
    if std::env::var_os("EXSTACK_CHILD_UNHANDLED").is_some() {
        set_tag("fatal-test build");
        exstack::throw!(3, "nobody is listening");
    }

    let (code, stderr) = run_child(
        "unhandled_failure_exits_with_offset_code",
        "EXSTACK_CHILD_UNHANDLED",
    );
    assert_eq!(code, Some(exstack::EXIT_UNCAUGHT + 3));
    assert!(stderr.contains("Uncaught exception (code 3)"), "stderr: {stderr}");
    assert!(stderr.contains("fatal-test build"), "stderr: {stderr}");
    assert!(stderr.contains("nobody is listening"), "stderr: {stderr}");
}

#[test]
fn huge_codes_cap_the_exit_value() {
    if std::env::var_os("EXSTACK_CHILD_HUGE").is_some() {
        exstack::throw!(9000, "way past the cap");
    }

    let (code, _) = run_child("huge_codes_cap_the_exit_value", "EXSTACK_CHILD_HUGE");
    assert_eq!(code, Some(exstack::EXIT_CODE_CAP));
}

#[test]
fn rethrow_from_a_finally_clause_is_a_contract_violation() {
    if std::env::var_os("EXSTACK_CHILD_RETHROW_FINALLY").is_some() {
        TryBlock::new(|| exstack::throw!(7, "handled below"))
            .catch(7, || eprintln!("clause handled the failure"))
            .finally(|| exstack::rethrow!())
            .run();
        unreachable!("a finally-clause rethrow must terminate the process");
    }

    let (code, stderr) = run_child(
        "rethrow_from_a_finally_clause_is_a_contract_violation",
        "EXSTACK_CHILD_RETHROW_FINALLY",
    );
    assert!(stderr.contains("clause handled the failure"), "stderr: {stderr}");
    assert!(stderr.contains("contract violation"), "stderr: {stderr}");
    assert_eq!(code, Some(exstack::EXIT_RETHROW_OUTSIDE_HANDLER));
}

#[test]
fn rethrow_outside_any_region_is_a_contract_violation() {
    if std::env::var_os("EXSTACK_CHILD_RETHROW_BARE").is_some() {
        exstack::rethrow!();
    }

    let (code, stderr) = run_child(
        "rethrow_outside_any_region_is_a_contract_violation",
        "EXSTACK_CHILD_RETHROW_BARE",
    );
    assert!(stderr.contains("contract violation"), "stderr: {stderr}");
    assert_eq!(code, Some(exstack::EXIT_RETHROW_OUTSIDE_HANDLER));
}

#[test]
fn exhausting_the_context_stack_is_a_contract_violation() {
    if std::env::var_os("EXSTACK_CHILD_EXHAUST").is_some() {
        // Recurse well past the region cap; entering the region one past
        // the cap terminates the process before the body ever runs.
        fn nest(depth: u32) {
            if depth == 0 {
                return;
            }
            TryBlock::new(|| nest(depth - 1)).run();
        }
        nest(128);
        unreachable!("the context stack must refuse the region past the cap");
    }

    let (code, stderr) = run_child(
        "exhausting_the_context_stack_is_a_contract_violation",
        "EXSTACK_CHILD_EXHAUST",
    );
    assert!(stderr.contains("contract violation"), "stderr: {stderr}");
    assert_eq!(code, Some(exstack::EXIT_CONTEXTS_EXHAUSTED));
}

#[test]
fn uncatchable_is_observed_at_every_level_then_terminates() {
    if std::env::var_os("EXSTACK_CHILD_UNCATCHABLE").is_some() {
        let observed = Cell::new(0);
        TryBlock::new(|| {
            TryBlock::new(|| {
                exstack::throw(
                    exstack::entry!(5, "pull the plug").uncatchable(),
                )
            })
            .catch(5, || {
                observed.set(observed.get() + 1);
                eprintln!("inner handler observed the failure");
            })
            .finally(|| eprintln!("inner finally ran"))
            .run();
        })
        .catch_all(|| {
            observed.set(observed.get() + 1);
            eprintln!("outer handler observed the failure");
        })
        .run();
        unreachable!("an uncatchable failure must not survive the last region");
    }

    let (code, stderr) = run_child(
        "uncatchable_is_observed_at_every_level_then_terminates",
        "EXSTACK_CHILD_UNCATCHABLE",
    );
    // Both handlers ran, the finally ran, and the process still died.
    assert!(stderr.contains("inner handler observed the failure"), "stderr: {stderr}");
    assert!(stderr.contains("inner finally ran"), "stderr: {stderr}");
    assert!(stderr.contains("outer handler observed the failure"), "stderr: {stderr}");
    assert!(stderr.contains("UNCATCHABLE"), "stderr: {stderr}");
    // The inner catch zeroed the pending code, so the escalation is
    // re-raised with code 0 and the exit value is the bare base offset.
    assert_eq!(code, Some(exstack::EXIT_UNCAUGHT));
}
