use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;

/// Lifecycle of one byte-range part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PartState {
    Pending = 0,
    Downloading = 1,
    PauseRequested = 2,
    Paused = 3,
    SuspendRequested = 4,
    Cancelled = 5,
    Failed = 6,
    Done = 7,
}

/// Inputs to the part state machine. Requests come from controllers,
/// confirmations and completions from the worker that owns the part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartEvent {
    Start,
    PauseRequest,
    PauseConfirm,
    SuspendRequest,
    Resume,
    Cancel,
    Error,
    Complete,
}

impl PartState {
    pub const ALL: [PartState; 8] = [
        PartState::Pending,
        PartState::Downloading,
        PartState::PauseRequested,
        PartState::Paused,
        PartState::SuspendRequested,
        PartState::Cancelled,
        PartState::Failed,
        PartState::Done,
    ];

    fn from_u8(raw: u8) -> PartState {
        Self::ALL[usize::from(raw) & 7]
    }

    /// Cancelled, failed and done parts only leave their state through an explicit resume
    /// (failed) or not at all.
    pub fn is_terminal(self) -> bool {
        matches!(self, PartState::Cancelled | PartState::Failed | PartState::Done)
    }

    /// Next state for `event`, or `None` when the event is illegal here.
    /// Returning `Some(self)` means the event is accepted as a no-op.
    pub fn on(self, event: PartEvent) -> Option<PartState> {
        use PartEvent as E;
        use PartState as S;
        match (event, self) {
            (E::Start, S::Pending | S::SuspendRequested | S::PauseRequested | S::Downloading) => {
                Some(S::Downloading)
            }
            (E::Start, S::Paused | S::Cancelled | S::Failed | S::Done) => None,

            (E::PauseRequest, S::Downloading) => Some(S::PauseRequested),
            (E::PauseRequest, S::Pending) => Some(S::Paused),
            (E::PauseRequest, s) => Some(s),

            (E::PauseConfirm, S::PauseRequested | S::SuspendRequested) => Some(S::Paused),
            (E::PauseConfirm, S::Pending | S::Downloading) => None,
            (E::PauseConfirm, s) => Some(s),

            (E::SuspendRequest, S::Downloading) => Some(S::SuspendRequested),
            (E::SuspendRequest, s) => Some(s),

            (E::Resume, S::Paused | S::Failed) => Some(S::Pending),
            (E::Resume, s) => Some(s),

            (E::Cancel, S::Done) => Some(S::Done),
            (E::Cancel, _) => Some(S::Cancelled),

            (E::Error, S::Cancelled | S::Done | S::Failed) => Some(self),
            (E::Error, _) => Some(S::Failed),

            (E::Complete, S::Downloading | S::PauseRequested | S::SuspendRequested) => {
                Some(S::Done)
            }
            (E::Complete, S::Done | S::Cancelled) => Some(self),
            (E::Complete, S::Pending | S::Paused | S::Failed) => None,
        }
    }
}

impl fmt::Display for PartState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PartState::Pending => "pending",
            PartState::Downloading => "downloading",
            PartState::PauseRequested => "pause requested",
            PartState::Paused => "paused",
            PartState::SuspendRequested => "suspend requested",
            PartState::Cancelled => "cancelled",
            PartState::Failed => "failed",
            PartState::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal part transition: {event:?} from {from}")]
pub struct TransitionError {
    pub from: PartState,
    pub event: PartEvent,
}

/// Outcome of a committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PartState,
    pub to: PartState,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Part state shared between the worker, controllers and monitors.
#[derive(Debug)]
pub struct AtomicPartState(AtomicU8);

impl AtomicPartState {
    pub fn new(state: PartState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> PartState {
        PartState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Read current, compute next, commit if unchanged; on a lost race re-read
    /// and decide again. Never blocks.
    pub fn apply(&self, event: PartEvent) -> Result<Transition, TransitionError> {
        let mut current = self.load();
        loop {
            let next = current.on(event).ok_or(TransitionError {
                from: current,
                event,
            })?;
            if next == current {
                return Ok(Transition {
                    from: current,
                    to: next,
                });
            }
            match self.0.compare_exchange_weak(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Ok(Transition {
                        from: current,
                        to: next,
                    })
                }
                Err(observed) => current = PartState::from_u8(observed),
            }
        }
    }
}
