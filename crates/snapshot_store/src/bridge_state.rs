//! Producer-reported arm/gripper/mobile state

use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::BridgeState;

/// Single-value cell with the same copy-out discipline as the stores.
#[derive(Debug, Default)]
pub struct BridgeStateCell {
    state: Mutex<BridgeState>,
}

impl BridgeStateCell {
    pub fn new(initial: BridgeState) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }

    /// Replace the whole state (one `slave_info` report).
    pub fn replace(&self, state: BridgeState) {
        *self.lock() = state;
    }

    /// Mutate in place under the lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut BridgeState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> BridgeState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DEFAULT_ARM_POSITION;

    #[test]
    fn defaults_to_neutral_pose() {
        let cell = BridgeStateCell::default();
        let state = cell.snapshot();
        assert_eq!(state.robotarm.position, DEFAULT_ARM_POSITION.to_vec());
        assert!(state.mobile.gear);
    }

    #[test]
    fn replace_and_update() {
        let cell = BridgeStateCell::default();
        let mut next = BridgeState::default();
        next.gripper.position = 40.0;
        cell.replace(next);

        let stamp = cell.update(|s| {
            s.stamp = 12.5;
            s.stamp
        });
        assert_eq!(stamp, 12.5);

        let state = cell.snapshot();
        assert_eq!(state.gripper.position, 40.0);
        assert_eq!(state.stamp, 12.5);
    }
}
