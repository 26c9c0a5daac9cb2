use crate::error::{Error, Result};
use crate::file_entry::FileEntry;
use crate::hash::{self, SHA256};
use std::fs::File;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// `None` when the entry records no sha-256 whole-file hash.
    pub whole_ok: Option<bool>,
    pub pieces_ok: u64,
    pub pieces_bad: Vec<u64>,
    /// Hashes in an algorithm this crate does not compute.
    pub unchecked: usize,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.whole_ok != Some(false) && self.pieces_bad.is_empty()
    }
}

/// Re-hash the file at `path` and compare with the sha-256 hashes recorded
/// on `entry`. A recorded piece the file is too short to contain is bad.
pub fn verify_file(entry: &FileEntry, path: &Path) -> Result<VerifyReport> {
    if !path.is_file() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    let pieces = entry.piece_hashes();
    // the recorded length is used verbatim, even below the 1 KiB floor
    let piece_size = entry.piece_size().filter(|_| pieces.iter().any(|h| h.algorithm() == SHA256));
    let computed = hash::hash_stream(File::open(path)?, piece_size)?;

    let mut report = VerifyReport::default();
    for h in entry.whole_file_hashes() {
        if h.algorithm() != SHA256 {
            report.unchecked += 1;
            continue;
        }
        let ok = h.value() == computed.whole.value();
        report.whole_ok = Some(report.whole_ok.unwrap_or(true) && ok);
    }
    for h in pieces {
        if h.algorithm() != SHA256 {
            report.unchecked += 1;
            continue;
        }
        let idx = h.piece_index().unwrap_or_default();
        let got = usize::try_from(idx).ok().and_then(|i| computed.pieces.get(i));
        if got.map(|p| p.value()) == Some(h.value()) {
            report.pieces_ok += 1;
        } else {
            report.pieces_bad.push(idx);
        }
    }
    tracing::debug!(
        path = %path.display(),
        whole_ok = ?report.whole_ok,
        pieces_ok = report.pieces_ok,
        pieces_bad = report.pieces_bad.len(),
        "verified"
    );
    Ok(report)
}
