//! Tasks executed by dispatcher workers: the planning probe and the chunk download.

mod check;
mod chunk;
mod plan;
mod speed;

pub use chunk::ChunkError;
pub use plan::{plan_parts, PlannedPart};

pub(crate) use check::run_check;
pub(crate) use chunk::run_chunk;
