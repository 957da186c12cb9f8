use serde::Serialize;
use std::fmt;

use super::PartState;

/// Aggregate status of a download. Declaration order is not the severity
/// order; see [`FileState::priority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Initiated,
    Unsaved,
    Pending,
    Downloading,
    Paused,
    Pausing,
    Failed,
    Cancelled,
    Done,
}

impl FileState {
    pub fn priority(self) -> u16 {
        match self {
            FileState::Initiated => 0,
            FileState::Unsaved => 5,
            FileState::Pending => 10,
            FileState::Downloading => 20,
            FileState::Paused => 30,
            FileState::Pausing => 50,
            FileState::Failed => 100,
            FileState::Cancelled => 150,
            FileState::Done => 500,
        }
    }

    /// What a single part in `state` says about its file.
    pub fn from_part(state: PartState) -> FileState {
        match state {
            PartState::Pending => FileState::Pending,
            PartState::Downloading | PartState::SuspendRequested => FileState::Downloading,
            PartState::PauseRequested => FileState::Pausing,
            PartState::Paused => FileState::Paused,
            PartState::Failed => FileState::Failed,
            PartState::Cancelled => FileState::Cancelled,
            PartState::Done => FileState::Unsaved,
        }
    }

    /// Combines two part contributions. Commutative and associative: the
    /// higher priority wins, except that a running part next to a paused one
    /// means the file is still on its way to pausing.
    pub fn join(self, other: FileState) -> FileState {
        match (self, other) {
            (FileState::Downloading, FileState::Paused)
            | (FileState::Paused, FileState::Downloading) => FileState::Pausing,
            (a, b) if a.priority() >= b.priority() => a,
            (_, b) => b,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, FileState::Done | FileState::Cancelled | FileState::Failed)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileState::Initiated => "initiated",
            FileState::Unsaved => "unsaved",
            FileState::Pending => "pending",
            FileState::Downloading => "downloading",
            FileState::Paused => "paused",
            FileState::Pausing => "pausing",
            FileState::Failed => "failed",
            FileState::Cancelled => "cancelled",
            FileState::Done => "done",
        };
        f.write_str(s)
    }
}

/// Folds part states into a file status. No parts means `Initiated`.
pub fn reduce<I>(parts: I) -> FileState
where
    I: IntoIterator<Item = PartState>,
{
    parts
        .into_iter()
        .map(FileState::from_part)
        .fold(FileState::Initiated, FileState::join)
}
