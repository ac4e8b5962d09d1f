use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use rapidup_protocol::ByteRange;
use rapidup_protocol::constants::QUICK_HASH_LEN;
use sha1::{Digest, Sha1};

use crate::{READ_BUFFER_SIZE, TransferError};

/// Content hashes of one file, all upper-hex SHA-1.
///
/// Every value is a pure function of the file bytes: the same content
/// fingerprints identically regardless of its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintSet {
    pub size: u64,
    /// Hash over the whole content.
    pub full_hash: String,
    /// Hash over the first `min(size, 128 KiB)` bytes.
    pub quick_hash: String,
    /// Hash over a server-chosen range, filled in only when challenged.
    pub challenge_hash: Option<String>,
}

impl FingerprintSet {
    /// Attaches a challenge answer.
    pub fn with_challenge(mut self, hash: String) -> Self {
        self.challenge_hash = Some(hash);
        self
    }
}

/// Fingerprints the file at `path`.
pub fn fingerprint_file(path: &Path) -> Result<FingerprintSet, TransferError> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    fingerprint_reader(file, size)
}

/// Fingerprints `size` bytes from `reader` in a single streaming pass.
///
/// Fails with [`TransferError::RangeOutOfBounds`] if the reader yields fewer
/// bytes than declared (the file shrank after it was stat'ed).
pub fn fingerprint_reader<R: Read>(reader: R, size: u64) -> Result<FingerprintSet, TransferError> {
    let quick_len = size.min(QUICK_HASH_LEN);
    let mut full = Sha1::new();
    let mut quick = Sha1::new();
    let mut limited = reader.take(size);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut consumed = 0u64;

    loop {
        let n = limited.read(&mut buf)?;
        if n == 0 {
            break;
        }
        let chunk = &buf[..n];
        full.update(chunk);
        if consumed < quick_len {
            let take = ((quick_len - consumed) as usize).min(n);
            quick.update(&chunk[..take]);
        }
        consumed += n as u64;
    }

    if consumed != size {
        return Err(TransferError::RangeOutOfBounds {
            offset: 0,
            length: size,
            size: consumed,
        });
    }

    Ok(FingerprintSet {
        size,
        full_hash: hex::encode_upper(full.finalize()),
        quick_hash: hex::encode_upper(quick.finalize()),
        challenge_hash: None,
    })
}

/// Hashes exactly the bytes of `range` in the file at `path`.
///
/// The size is checked at read time, not trusted from an earlier stat.
pub fn challenge_hash(path: &Path, range: ByteRange) -> Result<String, TransferError> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let out_of_bounds = TransferError::RangeOutOfBounds {
        offset: range.offset,
        length: range.length,
        size,
    };
    match range.offset.checked_add(range.length) {
        Some(end) if end <= size => {}
        _ => return Err(out_of_bounds),
    }

    file.seek(SeekFrom::Start(range.offset))?;
    let mut limited = file.take(range.length);
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut consumed = 0u64;
    loop {
        let n = limited.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        consumed += n as u64;
    }
    if consumed != range.length {
        return Err(out_of_bounds);
    }
    Ok(hex::encode_upper(hasher.finalize()))
}
