//! Last-observed pin values, per connection.
//!
//! The cache is the single gate for publish decisions: [`PinStateCache::set`]
//! answers "did this observation change anything?", and every handler
//! publishes only when it says yes. Binary sensors store `{0, 1}`; analog
//! sensors store the packed ternary `{-1, 0, 1}`.

use std::collections::HashMap;
use std::sync::Mutex;

use pindock_core::Pin;

/// Thread-safe map from pin to last-observed logical value.
#[derive(Debug, Default)]
pub struct PinStateCache {
    states: Mutex<HashMap<Pin, i8>>,
}

impl PinStateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current value of the pin, or 0 if never observed.
    #[must_use]
    pub fn get(&self, pin: Pin) -> i8 {
        self.states
            .lock()
            .expect("pin state lock poisoned")
            .get(&pin)
            .copied()
            .unwrap_or(0)
    }

    /// The current value of the pin as a boolean, or false if never
    /// observed.
    #[must_use]
    pub fn get_bool(&self, pin: Pin) -> bool {
        self.get(pin) > 0
    }

    /// Whether the pin has ever been observed.
    #[must_use]
    pub fn has(&self, pin: Pin) -> bool {
        self.states
            .lock()
            .expect("pin state lock poisoned")
            .contains_key(&pin)
    }

    /// Store a value; returns true iff the pin had no prior value or the
    /// new value differs from the stored one.
    pub fn set(&self, pin: Pin, value: i8) -> bool {
        let mut states = self.states.lock().expect("pin state lock poisoned");

        let changed = match states.get(&pin) {
            Some(existing) => *existing != value,
            None => true,
        };

        states.insert(pin, value);
        changed
    }

    /// Boolean convenience over [`Self::set`].
    pub fn set_bool(&self, pin: Pin, value: bool) -> bool {
        self.set(pin, i8::from(value))
    }
}
