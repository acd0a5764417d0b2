//! Receiver lifecycle state

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a receiver
///
/// `Created -> Running -> StopRequested -> Stopped`. `Stopped` is terminal;
/// restarting after a deliberate stop needs a new receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IngesterState {
    Created = 0,
    Running = 1,
    StopRequested = 2,
    Stopped = 3,
}

impl IngesterState {
    /// Label used in logs and the health endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            IngesterState::Created => "created",
            IngesterState::Running => "running",
            IngesterState::StopRequested => "stop_requested",
            IngesterState::Stopped => "stopped",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => IngesterState::Created,
            1 => IngesterState::Running,
            2 => IngesterState::StopRequested,
            _ => IngesterState::Stopped,
        }
    }
}

/// Atomic holder for [`IngesterState`]
///
/// The only state shared between the caller's thread and the receive loop.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(IngesterState::Created as u8))
    }

    pub(crate) fn load(&self) -> IngesterState {
        IngesterState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `from -> to`; on mismatch returns the actual state
    pub(crate) fn transition(
        &self,
        from: IngesterState,
        to: IngesterState,
    ) -> Result<(), IngesterState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(IngesterState::from_u8)
    }

    /// Request a stop, returning the state seen before the request
    ///
    /// `Running` becomes `StopRequested`. A receiver that never started goes
    /// straight to `Stopped`. Already stopping/stopped receivers are left alone.
    pub(crate) fn request_stop(&self) -> IngesterState {
        let mut current = self.load();
        loop {
            let next = match current {
                IngesterState::Created => IngesterState::Stopped,
                IngesterState::Running => IngesterState::StopRequested,
                IngesterState::StopRequested | IngesterState::Stopped => return current,
            };
            match self.transition(current, next) {
                Ok(()) => return current,
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn is_stop_requested(&self) -> bool {
        matches!(
            self.load(),
            IngesterState::StopRequested | IngesterState::Stopped
        )
    }

    pub(crate) fn mark_stopped(&self) {
        self.0.store(IngesterState::Stopped as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_transition_once() {
        let cell = StateCell::new();
        assert_eq!(cell.load(), IngesterState::Created);
        assert!(
            cell.transition(IngesterState::Created, IngesterState::Running)
                .is_ok()
        );
        assert_eq!(
            cell.transition(IngesterState::Created, IngesterState::Running),
            Err(IngesterState::Running)
        );
    }

    #[test]
    fn test_stop_running() {
        let cell = StateCell::new();
        cell.transition(IngesterState::Created, IngesterState::Running)
            .ok();
        assert!(!cell.is_stop_requested());
        assert_eq!(cell.request_stop(), IngesterState::Running);
        assert_eq!(cell.load(), IngesterState::StopRequested);
        assert!(cell.is_stop_requested());

        // Idempotent
        assert_eq!(cell.request_stop(), IngesterState::StopRequested);
        cell.mark_stopped();
        assert_eq!(cell.load(), IngesterState::Stopped);
        assert_eq!(cell.request_stop(), IngesterState::Stopped);
    }

    #[test]
    fn test_stop_before_start_is_terminal() {
        let cell = StateCell::new();
        assert_eq!(cell.request_stop(), IngesterState::Created);
        assert_eq!(cell.load(), IngesterState::Stopped);
        assert_eq!(
            cell.transition(IngesterState::Created, IngesterState::Running),
            Err(IngesterState::Stopped)
        );
    }
}
