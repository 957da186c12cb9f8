use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::state::{AtomicPartState, PartEvent, PartState, Transition, TransitionError};

const UNKNOWN_LENGTH: i64 = -1;

static NEXT_PART_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique part identity; key of the dispatcher's part→file registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(u64);

impl PartId {
    fn next() -> Self {
        PartId(NEXT_PART_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One contiguous byte range of a remote resource, downloaded into its own temp file.
///
/// Counters and state are atomics so monitors never block the worker.
#[derive(Debug)]
pub struct FilePart {
    id: PartId,
    index: usize,
    locator: String,
    temp_path: PathBuf,
    start: u64,
    length: AtomicI64,
    downloaded: AtomicU64,
    state: AtomicPartState,
    speed: AtomicU64,
    partial_supported: bool,
    error_text: Mutex<Option<String>>,
}

impl FilePart {
    pub fn new(
        index: usize,
        locator: impl Into<String>,
        temp_path: impl Into<PathBuf>,
        start: u64,
        length: Option<u64>,
        partial_supported: bool,
    ) -> Self {
        Self {
            id: PartId::next(),
            index,
            locator: locator.into(),
            temp_path: temp_path.into(),
            start,
            length: AtomicI64::new(length.map_or(UNKNOWN_LENGTH, to_signed)),
            downloaded: AtomicU64::new(0),
            state: AtomicPartState::new(PartState::Pending),
            speed: AtomicU64::new(0),
            partial_supported,
            error_text: Mutex::new(None),
        }
    }

    pub fn id(&self) -> PartId {
        self.id
    }

    /// Position of this part within its file.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn length(&self) -> Option<u64> {
        u64::try_from(self.length.load(Ordering::Acquire)).ok()
    }

    /// Sets the length if it is still unknown. Returns false when it was already set.
    pub fn set_length(&self, length: u64) -> bool {
        self.length
            .compare_exchange(
                UNKNOWN_LENGTH,
                to_signed(length),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Acquire)
    }

    pub(crate) fn add_downloaded(&self, n: u64) {
        self.downloaded.fetch_add(n, Ordering::AcqRel);
    }

    /// Drops all progress; used when the server cannot resume at an offset.
    pub(crate) fn reset_downloaded(&self) {
        self.downloaded.store(0, Ordering::Release);
    }

    /// Bytes still expected, `None` while the length is unknown.
    pub fn remaining(&self) -> Option<u64> {
        self.length()
            .map(|len| len.saturating_sub(self.downloaded()))
    }

    pub fn status(&self) -> PartState {
        self.state.load()
    }

    /// Bytes per second over the last sample window.
    pub fn speed(&self) -> u64 {
        self.speed.load(Ordering::Relaxed)
    }

    pub(crate) fn set_speed(&self, bytes_per_sec: u64) {
        self.speed.store(bytes_per_sec, Ordering::Relaxed);
    }

    pub fn partial_download_supported(&self) -> bool {
        self.partial_supported
    }

    pub fn error_text(&self) -> Option<String> {
        self.error_text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fraction in `[0, 1]`; unknown length counts as no progress until done.
    pub fn progress(&self) -> f64 {
        if self.status() == PartState::Done {
            return 1.0;
        }
        match self.length() {
            Some(0) | None => 0.0,
            Some(len) => (self.downloaded() as f64 / len as f64).min(1.0),
        }
    }

    pub(crate) fn start_download(&self) -> Result<Transition, TransitionError> {
        self.state.apply(PartEvent::Start)
    }

    pub fn request_pause(&self) -> Transition {
        self.apply_total(PartEvent::PauseRequest)
    }

    pub(crate) fn confirm_pause(&self) -> Result<Transition, TransitionError> {
        self.state.apply(PartEvent::PauseConfirm)
    }

    /// Forced eviction; only a downloading part moves.
    pub fn request_suspend(&self) -> Transition {
        self.apply_total(PartEvent::SuspendRequest)
    }

    pub fn resume(&self) -> Transition {
        self.apply_total(PartEvent::Resume)
    }

    pub fn cancel(&self) -> Transition {
        self.apply_total(PartEvent::Cancel)
    }

    /// Moves the part to `Failed` and records `message`, unless cancellation or
    /// completion already happened.
    /// The message lock is held across the transition, so a reader that sees
    /// `Failed` and then asks for the message gets it.
    pub(crate) fn fail(&self, message: impl Into<String>) -> Transition {
        let mut error_text = self.error_text.lock().unwrap_or_else(PoisonError::into_inner);
        let transition = self.apply_total(PartEvent::Error);
        if transition.changed() && transition.to == PartState::Failed {
            *error_text = Some(message.into());
        }
        transition
    }

    pub(crate) fn complete(&self) -> Result<Transition, TransitionError> {
        self.state.apply(PartEvent::Complete)
    }

    /// Events whose table row has no illegal entries.
    fn apply_total(&self, event: PartEvent) -> Transition {
        self.state.apply(event).unwrap_or_else(|err| {
            tracing::error!(part = self.index, %err, "transition table rejected a total event");
            Transition {
                from: err.from,
                to: err.from,
            }
        })
    }
}

fn to_signed(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
