//! Append-only writer for a part's temp file.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

/// Appends to a part temp file starting exactly at the part's confirmed byte count.
///
/// Opening truncates anything past `confirmed`, so bytes written after the last
/// counted read (e.g. by a crashed worker) never survive into the output.
pub struct PartWriter {
    file: File,
}

impl PartWriter {
    pub fn open(path: &Path, confirmed: u64) -> io::Result<Self> {
        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(confirmed)?;
        file.seek(SeekFrom::Start(confirmed))?;
        Ok(Self { file })
    }

    /// Writes and flushes one buffer; the caller counts the bytes only after this returns.
    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.file.flush()
    }
}
