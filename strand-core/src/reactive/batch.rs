//! Batching
//!
//! Writes made inside a batch only queue effects; the queue is flushed once,
//! when the outermost batch closes. Nested batches compose through a depth
//! counter.

use super::runtime::{flush, run_updates, with_runtime};

/// Run `f` with all of its writes coalesced into a single flush.
///
/// The batch is closed even if `f` panics; the effects it queued then run on
/// the next flush.
///
/// ```rust,ignore
/// batch(|| {
///     set_first.set("Ada");
///     set_last.set("Lovelace");
/// }); // effects reading both names run once, here
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    run_updates(f)
}

/// Open a batch by hand. Every call must be paired with [`batch_end`].
pub fn batch_start() {
    with_runtime(|rt| rt.scheduler.start());
}

/// Close a batch opened with [`batch_start`], flushing if it was the
/// outermost one.
pub fn batch_end() {
    let outermost = with_runtime(|rt| rt.scheduler.end());
    if outermost {
        flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;

    #[test]
    fn manual_batches_nest() {
        batch_start();
        batch_start();
        assert_eq!(Runtime::batch_depth(), 2);
        batch_end();
        assert_eq!(Runtime::batch_depth(), 1);
        batch_end();
        assert_eq!(Runtime::batch_depth(), 0);
    }

    #[test]
    fn batch_returns_the_closure_result() {
        assert_eq!(batch(|| batch(|| 7)), 7);
        assert_eq!(Runtime::batch_depth(), 0);
    }

    #[test]
    fn batch_closes_on_panic() {
        let result = std::panic::catch_unwind(|| batch(|| panic!("boom")));
        assert!(result.is_err());
        assert_eq!(Runtime::batch_depth(), 0);
    }
}
