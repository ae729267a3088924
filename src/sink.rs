//! Write-only destination that keeps measured results alive.
//!
//! A result nobody observes is a result the optimizer may delete, together
//! with the call that produced it. Every value the harness times is written
//! into a [`Sink`], which routes it through [`std::hint::black_box`] and keeps
//! it. Nothing ever reads the stored value back to make a decision.
//!
//! A sink has a single owner: the measurement run creates one per result
//! type, passes it to the harness by `&mut`, and drops it when the run ends.
//! Concurrent measurement streams would each need their own sink.

use std::hint::black_box;

/// Single-slot, write-only cell for one result type.
#[derive(Debug)]
pub struct Sink<T> {
    slot: Option<T>,
    writes: u64,
}

impl<T> Sink<T> {
    /// Create an empty sink.
    pub const fn new() -> Self {
        Self {
            slot: None,
            writes: 0,
        }
    }

    /// Absorb a value.
    #[inline(always)]
    pub fn write(&mut self, value: T) {
        self.slot = Some(black_box(value));
        self.writes += 1;
    }

    /// Number of values written so far.
    ///
    /// Diagnostic only; the stored value itself is not exposed.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Drop the stored value and zero the write count.
    pub fn clear(&mut self) {
        self.slot = None;
        self.writes = 0;
    }
}

impl<T> Default for Sink<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_writes() {
        let mut sink = Sink::new();
        for i in 0..10u64 {
            sink.write(i);
        }
        assert_eq!(sink.writes(), 10);

        sink.clear();
        assert_eq!(sink.writes(), 0);
    }

    #[test]
    fn owns_heap_values() {
        let mut sink: Sink<String> = Sink::default();
        sink.write("a".repeat(512));
        sink.write(String::new());
        assert_eq!(sink.writes(), 2);
    }
}
