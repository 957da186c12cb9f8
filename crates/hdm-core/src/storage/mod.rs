//! On-disk layout of a download.
//!
//! Each part writes to `<output>_part<N>`; the assembler concatenates those
//! into `<output>` and deletes them. A single-part download writes `<output>`
//! directly.

mod assemble;
mod writer;

pub use assemble::assemble;
pub use writer::PartWriter;

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("cannot mark file saved: {0} part(s) still outstanding")]
    PartsOutstanding(usize),
    #[error("assembling {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Temp file of part `index`: `<output>_part<index>`.
pub fn part_temp_path(output: &Path, index: usize) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(format!("_part{index}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_temp_path_appends_index() {
        assert_eq!(
            part_temp_path(Path::new("/tmp/archive.zip"), 0),
            PathBuf::from("/tmp/archive.zip_part0")
        );
        assert_eq!(
            part_temp_path(Path::new("file.iso"), 12).to_string_lossy(),
            "file.iso_part12"
        );
    }
}
