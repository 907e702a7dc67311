//! Runtime invariant checks with contract-test support.
//!
//! Production code states its invariants with [`assert_invariant!`]; each
//! check is recorded per thread so that tests can prove a code path actually
//! exercised the invariants it is supposed to guard.
//!
//! ```rust,ignore
//! use mirrorcam::assert_invariant;
//!
//! assert_invariant!(
//!     snapshot.min_zoom <= snapshot.zoom_ratio,
//!     "Snapshot zoom ratio lies within its range"
//! );
//!
//! mirrorcam::invariant_ppt::contract_test("snapshot ranges", &[
//!     "Snapshot zoom ratio lies within its range",
//! ]);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static CHECKED: RefCell<HashMap<String, usize>> = RefCell::new(HashMap::new());
}

/// Assert an invariant and record that it was checked.
///
/// # Panics
/// Panics if the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__record_invariant($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__record_invariant($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __record_invariant(condition: bool, message: &str, context: Option<&str>) {
    CHECKED.with(|checked| {
        *checked.borrow_mut().entry(message.to_string()).or_insert(0) += 1;
    });

    if !condition {
        panic!(
            "INVARIANT VIOLATION [{}]: {}",
            context.unwrap_or("unknown"),
            message
        );
    }
}

/// How many times `message` has been checked on this thread.
pub fn checked_count(message: &str) -> usize {
    CHECKED.with(|checked| checked.borrow().get(message).copied().unwrap_or(0))
}

/// Panics unless every invariant in `required` was checked on this thread.
pub fn contract_test(name: &str, required: &[&str]) {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|message| checked_count(message) == 0)
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: invariants never checked:\n  - {}",
            name,
            missing.join("\n  - ")
        );
    }
}

/// Forget every recorded check on this thread.
pub fn clear_invariant_log() {
    CHECKED.with(|checked| checked.borrow_mut().clear());
}
