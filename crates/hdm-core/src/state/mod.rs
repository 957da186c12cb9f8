//! Part and file state machines.
//!
//! Part states move through an explicit, total transition table applied with
//! compare-and-set; file status is never stored, only reduced from part states.

mod file;
mod part;

pub use file::{reduce, FileState};
pub use part::{AtomicPartState, PartEvent, PartState, Transition, TransitionError};
