//! Timer identifier allocation.

use bgtimer_core::{Error, Result, TimerId};

/// Issues strictly increasing timer identifiers, starting at 1.
///
/// Identifiers are never recycled. The space is only exhausted after
/// `u64::MAX` allocations.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    last: Option<TimerId>,
}

impl IdAllocator {
    /// Create an allocator whose first identifier is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Create an allocator that continues after `last`.
    #[must_use]
    pub const fn starting_after(last: TimerId) -> Self {
        Self { last: Some(last) }
    }

    /// Issue the next identifier.
    ///
    /// # Errors
    ///
    /// Returns `IdsExhausted` once `u64::MAX` has been issued.
    pub fn next_id(&mut self) -> Result<TimerId> {
        let next = match self.last {
            None => TimerId::FIRST,
            Some(last) => last.successor().ok_or(Error::IdsExhausted)?,
        };
        self.last = Some(next);
        Ok(next)
    }

    /// The most recently issued identifier.
    #[must_use]
    pub const fn last_issued(&self) -> Option<TimerId> {
        self.last
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_first_id_is_one() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.last_issued(), None);
        assert_eq!(ids.next_id().unwrap().get(), 1);
    }

    #[test]
    fn test_ids_strictly_increase() {
        let mut ids = IdAllocator::new();
        let issued: Vec<u64> = (0..5).map(|_| ids.next_id().unwrap().get()).collect();
        assert_eq!(issued, vec![1, 2, 3, 4, 5]);
        assert_eq!(ids.last_issued().map(TimerId::get), Some(5));
    }

    #[test]
    fn test_independent_allocators_do_not_share_state() {
        let mut a = IdAllocator::new();
        let mut b = IdAllocator::new();
        a.next_id().unwrap();
        a.next_id().unwrap();
        assert_eq!(b.next_id().unwrap(), TimerId::FIRST);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let mut ids = IdAllocator::starting_after(TimerId::new(u64::MAX).unwrap());
        assert_eq!(ids.next_id().unwrap_err(), Error::IdsExhausted);
    }
}
