//! The process-wide packet serial counter.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    OnceLock,
};

use rand::Rng;

static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

/// Returns the next value of the process-wide packet serial counter.
///
/// The counter is seeded from a random value the first time it is used, then
/// incremented (wrapping on overflow) on every subsequent call. The serial
/// only needs to be unique within a single live session with a single
/// server, so a relaxed, wrapping counter is sufficient - there is no
/// ordering relationship with any other atomic in this crate to preserve.
pub(crate) fn next_serial() -> u32 {
    let counter = COUNTER.get_or_init(|| AtomicU32::new(rand::rng().random()));
    counter.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_within_process() {
        let a = next_serial();
        let b = next_serial();
        assert_eq!(b, a.wrapping_add(1));
    }
}
