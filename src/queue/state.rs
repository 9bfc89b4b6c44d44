//! Queue lifecycle marker.
//!
//! A queue is `Open` until the first disposal claims it, `Disposing` while
//! that disposal waits for the in-flight item, and `Disposed` afterwards.
//! The marker only moves forward.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

const OPEN: u8 = 0;
const DISPOSING: u8 = 1;
const DISPOSED: u8 = 2;

/// Lifecycle state of a [`SerialQueue`](super::SerialQueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Accepting work.
    Open,
    /// A disposal has been claimed; new work is rejected.
    Disposing,
    /// Terminal. The lock has been closed.
    Disposed,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Open => "open",
            QueueState::Disposing => "disposing",
            QueueState::Disposed => "disposed",
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            OPEN => QueueState::Open,
            DISPOSING => QueueState::Disposing,
            _ => QueueState::Disposed,
        }
    }
}

impl std::fmt::Display for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic [`QueueState`] cell. All writes are compare-and-set.
#[derive(Debug)]
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(OPEN))
    }

    pub(crate) fn load(&self) -> QueueState {
        QueueState::from_raw(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire) == OPEN
    }

    /// Claim disposal: `Open -> Disposing`.
    ///
    /// Returns `true` for exactly one caller over the lifetime of the cell.
    pub(crate) fn begin_disposal(&self) -> bool {
        self.0
            .compare_exchange(OPEN, DISPOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Disposing -> Disposed`.
    ///
    /// Returns `true` for the single caller that made the transition; a no-op
    /// from `Open` or `Disposed`.
    pub(crate) fn finish_disposal(&self) -> bool {
        self.0
            .compare_exchange(DISPOSING, DISPOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
