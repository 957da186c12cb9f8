//! Concatenation of completed parts into the output file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::AssemblyError;
use crate::file::DownloadFile;

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> AssemblyError + '_ {
    move |source| AssemblyError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Builds the output of `file` from its part temp files, in part order, deleting
/// each temp file once copied, then marks the file saved.
///
/// A single part already wrote the output in place. Fails without touching disk
/// if any part is still outstanding. On I/O failure the output may be partial.
pub fn assemble(file: &DownloadFile) -> Result<(), AssemblyError> {
    let outstanding = file.unsaved_part_count();
    if outstanding != 0 {
        return Err(AssemblyError::PartsOutstanding(outstanding));
    }
    let parts = file.parts();
    let output = file.output_path();
    if let [single] = parts.as_slice() {
        if single.temp_path() == output {
            return file.mark_saved();
        }
    }

    let out = File::create(output).map_err(io_err(output))?;
    let mut out = BufWriter::new(out);
    for part in &parts {
        let temp = part.temp_path();
        let mut input = File::open(temp).map_err(io_err(temp))?;
        let copied = io::copy(&mut input, &mut out).map_err(io_err(temp))?;
        tracing::debug!(part = part.index(), bytes = copied, "appended part to {}", output.display());
        drop(input);
        fs::remove_file(temp).map_err(io_err(temp))?;
    }
    out.flush().map_err(io_err(output))?;
    out.get_ref().sync_all().map_err(io_err(output))?;
    file.mark_saved()
}
