use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::TransferError;

// ---------------------------------------------------------------------------
// PartReader
// ---------------------------------------------------------------------------

/// Reads byte ranges of one file for part uploads.
pub struct PartReader {
    file: File,
    file_size: u64,
}

impl PartReader {
    /// Opens `path` for range reads.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self { file, file_size })
    }

    /// Reads exactly `length` bytes starting at `offset`.
    ///
    /// Fails with [`TransferError::RangeOutOfBounds`] if the range reaches
    /// past the end of the file, including when the file shrank after open.
    pub fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>, TransferError> {
        let out_of_bounds = |size| TransferError::RangeOutOfBounds {
            offset,
            length,
            size,
        };
        match offset.checked_add(length) {
            Some(end) if end <= self.file_size => {}
            _ => return Err(out_of_bounds(self.file_size)),
        }

        let len = usize::try_from(length).map_err(|_| out_of_bounds(self.file_size))?;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(len);
        (&mut self.file).take(length).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(out_of_bounds(offset + buf.len() as u64));
        }
        Ok(buf)
    }
}
