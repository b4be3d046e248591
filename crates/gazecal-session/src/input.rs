//! Participant input captured between ticks.
//!
//! Events may arrive at any time from the windowing side; the session only
//! sees them when the latch is drained at the start of the next tick.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Space,
    Escape,
    Other(u32),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEvent {
    KeyDown(Key),
    PointerClick,
}

/// What happened since the previous tick.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LatchedInput {
    /// Participant signaled readiness (Space).
    pub ready: bool,
    /// Immediate cancel requested (Escape).
    pub cancel: bool,
    /// Pointer clicks, each one step of the abort countdown.
    pub clicks: u32,
}

#[derive(Clone, Debug, Default)]
pub struct InputLatch {
    pending: LatchedInput,
}

impl InputLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyDown(Key::Space) => self.pending.ready = true,
            InputEvent::KeyDown(Key::Escape) => self.pending.cancel = true,
            InputEvent::KeyDown(Key::Other(_)) => {}
            InputEvent::PointerClick => self.pending.clicks = self.pending.clicks.saturating_add(1),
        }
    }

    /// Take everything latched so far and clear the latch.
    pub fn drain(&mut self) -> LatchedInput {
        std::mem::take(&mut self.pending)
    }

    pub fn peek(&self) -> LatchedInput {
        self.pending
    }
}
