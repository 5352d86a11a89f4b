//! Async Driver
//!
//! Hosts that run on tokio can hand the runtime's queues to [`drive`], which
//! maps the virtual clock onto `tokio::time`. Under a paused tokio clock
//! (`#[tokio::test(start_paused = true)]`) the sleeps complete instantly and
//! the driver behaves like a loop of `advance` calls.

use std::time::Duration;

use super::{advance, next_deadline, now, tick};

/// Run microtasks and timers until both queues are empty.
///
/// Returns the number of milliseconds of virtual time that elapsed.
pub async fn drive() -> u64 {
    let start = now();
    loop {
        tick();
        let Some(deadline) = next_deadline() else {
            break;
        };
        let wait = deadline.saturating_sub(now());
        if wait > 0 {
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
        advance(wait);
    }
    now() - start
}

/// Like [`drive`], but stop once `budget_ms` of virtual time has elapsed.
///
/// Timers armed beyond the budget stay pending.
pub async fn drive_for(budget_ms: u64) {
    let stop = now().saturating_add(budget_ms);
    loop {
        tick();
        let target = match next_deadline() {
            Some(deadline) if deadline <= stop => deadline,
            _ => stop,
        };
        let wait = target.saturating_sub(now());
        if wait > 0 {
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
        advance(wait);
        if now() >= stop {
            break;
        }
    }
}
