//! Single-flight cache slot for lazily decoded payloads.
//!
//! A slot starts `NotRequested`. The first caller of [`Slot::get_or_load`]
//! moves it to `InFlight` and runs the loader outside the lock; concurrent
//! callers block on the condvar until the loader finishes, then share its
//! result. Both `Ready` and `Failed` are terminal.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

enum SlotState<T> {
    NotRequested,
    InFlight,
    Ready(Arc<T>),
    Failed(String),
}

pub(crate) struct Slot<T> {
    state: Mutex<SlotState<T>>,
    settled: Condvar,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::NotRequested),
            settled: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached value, if the slot is ready.
    pub fn get(&self) -> Option<Arc<T>> {
        match &*self.lock() {
            SlotState::Ready(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.lock(), SlotState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(&*self.lock(), SlotState::Failed(_))
    }

    /// Return the cached value, running `load` at most once across all callers.
    pub fn get_or_load<F>(&self, load: F) -> Result<Arc<T>, String>
    where
        F: FnOnce() -> Result<T, String>,
    {
        let mut state = self.lock();
        loop {
            match &*state {
                SlotState::Ready(value) => return Ok(Arc::clone(value)),
                SlotState::Failed(reason) => return Err(reason.clone()),
                SlotState::InFlight => {
                    state = self
                        .settled
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                SlotState::NotRequested => break,
            }
        }
        *state = SlotState::InFlight;
        drop(state);

        let mut guard = InFlightGuard { slot: self, armed: true };
        let outcome = load();
        guard.armed = false;

        let mut state = self.lock();
        let result = match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                *state = SlotState::Ready(Arc::clone(&value));
                Ok(value)
            }
            Err(reason) => {
                *state = SlotState::Failed(reason.clone());
                Err(reason)
            }
        };
        self.settled.notify_all();
        result
    }
}

/// Settles the slot as failed if the loader unwinds, so waiters never hang.
struct InFlightGuard<'a, T> {
    slot: &'a Slot<T>,
    armed: bool,
}

impl<T> Drop for InFlightGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            *self.slot.lock() = SlotState::Failed("loader panicked".to_string());
            self.slot.settled.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_loads_once() {
        let slot: Slot<u32> = Slot::new();
        let calls = AtomicUsize::new(0);
        let load = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        };
        assert_eq!(*slot.get_or_load(load).unwrap(), 7);
        assert_eq!(*slot.get_or_load(|| Ok(8)).unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(slot.is_ready());
    }

    #[test]
    fn test_concurrent_callers_share_one_load() {
        let slot: Slot<String> = Slot::new();
        let calls = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let value = slot
                        .get_or_load(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(50));
                            Ok("decoded".to_string())
                        })
                        .unwrap();
                    assert_eq!(value.as_str(), "decoded");
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_sticky() {
        let slot: Slot<u32> = Slot::new();
        assert_eq!(slot.get_or_load(|| Err("bad data".to_string())), Err("bad data".to_string()));
        assert_eq!(slot.get_or_load(|| Ok(1)), Err("bad data".to_string()));
        assert!(slot.is_failed());
        assert!(slot.get().is_none());
    }

    #[test]
    fn test_panicking_loader_settles_slot() {
        let slot: Slot<u32> = Slot::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = slot.get_or_load(|| panic!("decoder blew up"));
        }));
        assert!(result.is_err());
        assert_eq!(slot.get_or_load(|| Ok(1)), Err("loader panicked".to_string()));
    }
}
