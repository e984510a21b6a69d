//! Cap on concurrently running model inferences.
//!
//! A slot is taken before an inference starts and released when the inference actually
//! returns, not when the waiting job gives up on it. Inferences abandoned after a
//! timeout therefore keep occupying their slot until the model call finishes.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Instant;

#[derive(Debug)]
pub struct InferenceSlots {
    limit: usize,
    in_use: Mutex<usize>,
    freed: Condvar,
}

/// One running inference. Dropping it frees the slot.
#[derive(Debug)]
pub struct InferenceSlot {
    slots: Arc<InferenceSlots>,
}

impl InferenceSlots {
    pub fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            limit: limit.max(1),
            in_use: Mutex::new(0),
            freed: Condvar::new(),
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_use(&self) -> usize {
        *self.count()
    }

    /// Wait for a free slot until `deadline`. `None` means every slot stayed busy.
    pub fn acquire_until(self: &Arc<Self>, deadline: Instant) -> Option<InferenceSlot> {
        let mut in_use = self.count();
        while *in_use >= self.limit {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if remaining.is_zero() {
                return None;
            }
            in_use = self
                .freed
                .wait_timeout(in_use, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poison| poison.into_inner().0);
        }
        *in_use += 1;
        Some(InferenceSlot {
            slots: Arc::clone(self),
        })
    }

    fn count(&self) -> MutexGuard<'_, usize> {
        self.in_use.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Drop for InferenceSlot {
    fn drop(&mut self) {
        let mut in_use = self.slots.count();
        *in_use = in_use.saturating_sub(1);
        drop(in_use);
        self.slots.freed.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn soon(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[test]
    fn slots_are_capped_and_returned_on_drop() {
        let slots = InferenceSlots::new(2);
        let a = slots.acquire_until(soon(10)).unwrap();
        let _b = slots.acquire_until(soon(10)).unwrap();
        assert_eq!(slots.in_use(), 2);

        assert!(slots.acquire_until(soon(20)).is_none());

        drop(a);
        assert_eq!(slots.in_use(), 1);
        assert!(slots.acquire_until(soon(10)).is_some());
    }

    #[test]
    fn waiter_gets_slot_freed_by_another_thread() {
        let slots = InferenceSlots::new(1);
        let held = slots.acquire_until(soon(10)).unwrap();

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            drop(held);
        });

        assert!(slots.acquire_until(soon(2_000)).is_some());
        releaser.join().unwrap();
    }

    #[test]
    fn zero_limit_is_raised_to_one() {
        let slots = InferenceSlots::new(0);
        assert_eq!(slots.limit(), 1);
        assert!(slots.acquire_until(soon(10)).is_some());
    }
}
