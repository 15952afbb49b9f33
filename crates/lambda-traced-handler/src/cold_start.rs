//! Cold start tracking.

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};

const INITIALIZATION_TYPE: &str = "AWS_LAMBDA_INITIALIZATION_TYPE";

static FIRST_INVOCATION: AtomicBool = AtomicBool::new(true);

/// Reports whether this invocation is the first one served by the process,
/// and consumes the flag.
///
/// Exactly one caller ever sees `true`. Environments initialised for
/// provisioned concurrency are pre-warmed, so they never report a cold start.
pub fn check_cold_start() -> bool {
    let first = FIRST_INVOCATION.swap(false, Ordering::SeqCst);
    first && !is_provisioned()
}

fn is_provisioned() -> bool {
    env::var(INITIALIZATION_TYPE).is_ok_and(|kind| kind == "provisioned-concurrency")
}

#[cfg(test)]
pub(crate) fn reset_cold_start() {
    FIRST_INVOCATION.store(true, Ordering::SeqCst);
}
