//! Submit/receive state machine shared by the decode and encode engines.
//!
//! ```text
//!            submit(item)              receive() == WouldBlock
//!   Idle ─────────────────► Draining ─────────────────────────► Idle
//!     │                        │
//!     │ submit(end of stream)  │ receive() == Exhausted
//!     ▼                        ▼
//!   Flushing ──────────────► Finished
//!            receive() == Exhausted
//! ```
//!
//! After every submit the caller must call `receive` until it reports
//! `WouldBlock` or `Exhausted`; submitting again before that is rejected.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Draining,
    Flushing,
    Finished,
}

/// Outcome of one `receive` call.
#[derive(Debug)]
pub enum Drained<T> {
    Item(T),
    /// Nothing more until the next submit.
    WouldBlock,
    /// The codec is fully flushed.
    Exhausted,
}

impl<T> Drained<T> {
    pub fn is_item(&self) -> bool {
        matches!(self, Drained::Item(_))
    }
}

#[derive(Debug)]
pub(crate) struct DrainCursor {
    stage: &'static str,
    state: EngineState,
}

impl DrainCursor {
    pub(crate) fn new(stage: &'static str) -> Self {
        Self {
            stage,
            state: EngineState::Idle,
        }
    }

    pub(crate) fn state(&self) -> EngineState {
        self.state
    }

    pub(crate) fn check_submit(&self) -> Result<()> {
        match self.state {
            EngineState::Idle => Ok(()),
            EngineState::Draining => Err(Error::Usage(format!(
                "{}: submit before the previous output was drained",
                self.stage
            ))),
            EngineState::Flushing | EngineState::Finished => Err(Error::Usage(format!(
                "{}: submit after end of stream",
                self.stage
            ))),
        }
    }

    pub(crate) fn submitted(&mut self, end_of_stream: bool) {
        self.state = if end_of_stream {
            EngineState::Flushing
        } else {
            EngineState::Draining
        };
    }

    /// Answer for `receive` without touching the codec, if the state
    /// already decides it.
    pub(crate) fn settled<T>(&self) -> Option<Drained<T>> {
        match self.state {
            EngineState::Idle => Some(Drained::WouldBlock),
            EngineState::Finished => Some(Drained::Exhausted),
            EngineState::Draining | EngineState::Flushing => None,
        }
    }

    pub(crate) fn received<T>(&mut self, outcome: &Drained<T>) -> Result<()> {
        match (outcome, self.state) {
            (Drained::Item(_), _) => {}
            (Drained::WouldBlock, EngineState::Flushing) => {
                return Err(Error::Usage(format!(
                    "{}: codec asked for more input while flushing",
                    self.stage
                )));
            }
            (Drained::WouldBlock, _) => self.state = EngineState::Idle,
            (Drained::Exhausted, _) => self.state = EngineState::Finished,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_drain_cycle() {
        let mut cursor = DrainCursor::new("test");
        assert!(cursor.check_submit().is_ok());
        assert!(matches!(cursor.settled::<()>(), Some(Drained::WouldBlock)));

        cursor.submitted(false);
        assert_eq!(cursor.state(), EngineState::Draining);
        assert!(matches!(cursor.check_submit(), Err(Error::Usage(_))));
        assert!(cursor.settled::<()>().is_none());

        cursor.received(&Drained::Item(())).unwrap();
        assert_eq!(cursor.state(), EngineState::Draining);
        cursor.received(&Drained::<()>::WouldBlock).unwrap();
        assert_eq!(cursor.state(), EngineState::Idle);
    }

    #[test]
    fn test_flush_cycle() {
        let mut cursor = DrainCursor::new("test");
        cursor.submitted(true);
        assert_eq!(cursor.state(), EngineState::Flushing);
        assert!(matches!(cursor.check_submit(), Err(Error::Usage(_))));
        assert!(cursor.received(&Drained::<()>::WouldBlock).is_err());

        cursor.received(&Drained::<()>::Exhausted).unwrap();
        assert_eq!(cursor.state(), EngineState::Finished);
        assert!(matches!(cursor.settled::<()>(), Some(Drained::Exhausted)));
        assert!(cursor.check_submit().is_err());
    }
}
