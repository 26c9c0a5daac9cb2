//! Whole-file and piece hashes, and the engine that computes them.

use crate::error::{Error, Result};
use crate::validate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read};

/// Algorithm identifier written for every hash this crate computes.
pub const SHA256: &str = "sha-256";

/// Smallest piece this crate will cut a file into.
pub const MIN_PIECE_SIZE: u64 = 1024;

const READ_BUF: usize = 64 * 1024;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "RawFileHash")]
pub struct FileHash {
    value: String,
    algorithm: String,
    piece: Option<u64>,
}

#[derive(Deserialize)]
struct RawFileHash {
    value: String,
    algorithm: String,
    #[serde(default)]
    piece: Option<u64>,
}

impl TryFrom<RawFileHash> for FileHash {
    type Error = Error;

    fn try_from(raw: RawFileHash) -> Result<Self> {
        FileHash::new(raw.value, raw.algorithm, raw.piece)
    }
}

impl FileHash {
    /// Hash of the whole file.
    pub fn whole(value: impl Into<String>, algorithm: impl Into<String>) -> Result<Self> {
        Self::new(value, algorithm, None)
    }

    /// Hash of the piece at 0-based `index`.
    pub fn piece(value: impl Into<String>, algorithm: impl Into<String>, index: u64) -> Result<Self> {
        Self::new(value, algorithm, Some(index))
    }

    pub fn new(
        value: impl Into<String>,
        algorithm: impl Into<String>,
        piece: Option<u64>,
    ) -> Result<Self> {
        let value = value.into();
        if !validate::validate_hash_hex(&value) {
            return Err(Error::InvalidHash(value));
        }
        Ok(Self { value, algorithm: algorithm.into(), piece })
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn piece_index(&self) -> Option<u64> {
        self.piece
    }

    pub fn is_piece(&self) -> bool {
        self.piece.is_some()
    }

    /// Whether the value is lowercase hex from end to end. Values accepted
    /// by the unanchored check may still carry other characters.
    pub fn is_strict(&self) -> bool {
        validate::is_strict_hex(&self.value)
    }

    fn sha256(digest: Sha256, piece: Option<u64>) -> Self {
        Self { value: hex::encode(digest.finalize()), algorithm: SHA256.to_string(), piece }
    }
}

/// How a file is cut into pieces for piece hashing.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PiecePolicy {
    #[default]
    None,
    /// Fixed piece size in bytes, floored to [`MIN_PIECE_SIZE`].
    BySize(u64),
    /// Approximate piece count; the size is rounded up to a 1024 multiple.
    ByCount(u32),
}

impl PiecePolicy {
    /// Build a policy from optional size/count settings. Setting both is an
    /// error, as is a zero count.
    pub fn from_options(size: Option<u64>, count: Option<u32>) -> Result<Self> {
        match (size, count) {
            (Some(_), Some(_)) => Err(Error::InvalidConfiguration(
                "can not specify both piece_size and piece_count".into(),
            )),
            (Some(s), None) => Ok(PiecePolicy::BySize(s)),
            (None, Some(0)) => {
                Err(Error::InvalidConfiguration("piece_count must be at least 1".into()))
            }
            (None, Some(c)) => Ok(PiecePolicy::ByCount(c)),
            (None, None) => Ok(PiecePolicy::None),
        }
    }

    /// Like [`PiecePolicy::from_options`] for untyped settings text.
    pub fn parse(size: Option<&str>, count: Option<&str>) -> Result<Self> {
        let size = size
            .map(|s| {
                s.trim().parse::<u64>().map_err(|_| {
                    Error::InvalidConfiguration(format!("piece_size must be an integer: {s:?}"))
                })
            })
            .transpose()?;
        let count = count
            .map(|c| {
                c.trim().parse::<u32>().map_err(|_| {
                    Error::InvalidConfiguration(format!("piece_count must be an integer: {c:?}"))
                })
            })
            .transpose()?;
        Self::from_options(size, count)
    }

    /// Effective piece size for a file of `total_size` bytes, or `None` when
    /// no pieces are hashed.
    pub fn piece_size(&self, total_size: u64) -> Option<u64> {
        match *self {
            PiecePolicy::None => None,
            PiecePolicy::BySize(s) => Some(s.max(MIN_PIECE_SIZE)),
            PiecePolicy::ByCount(n) => {
                let per_piece = total_size / u64::from(n.max(1));
                Some(per_piece.div_ceil(MIN_PIECE_SIZE).max(1) * MIN_PIECE_SIZE)
            }
        }
    }
}

/// Output of one hash engine run.
#[derive(Clone, Debug)]
pub struct ComputedHashes {
    pub whole: FileHash,
    pub pieces: Vec<FileHash>,
    pub piece_size: Option<u64>,
    /// Bytes actually consumed from the source.
    pub size: u64,
}

impl ComputedHashes {
    /// Whole-file hash first, then pieces in index order.
    pub fn into_hashes(self) -> Vec<FileHash> {
        let mut out = Vec::with_capacity(1 + self.pieces.len());
        out.push(self.whole);
        out.extend(self.pieces);
        out
    }
}

/// Stream `source` once, producing the whole-file SHA-256 and, when the
/// policy yields a piece size, one SHA-256 per consecutive piece. The final
/// piece may be shorter.
pub fn compute_hashes<R: Read>(
    source: R,
    total_size: u64,
    policy: PiecePolicy,
) -> Result<ComputedHashes> {
    let piece_size = policy.piece_size(total_size);
    let computed = hash_stream(source, piece_size)?;
    tracing::debug!(
        declared = total_size,
        consumed = computed.size,
        piece_size = ?piece_size,
        pieces = computed.pieces.len(),
        "hashed source"
    );
    Ok(computed)
}

/// Hash `source` with an exact piece size, bypassing policy resolution.
/// A zero piece size hashes no pieces.
pub fn hash_stream<R: Read>(mut source: R, piece_size: Option<u64>) -> Result<ComputedHashes> {
    let piece_size = piece_size.filter(|&ps| ps > 0);
    let mut whole = Sha256::new();
    let mut pieces = Vec::new();
    let mut piece = Sha256::new();
    let mut piece_fill = 0u64;
    let mut consumed = 0u64;
    let mut buf = vec![0u8; READ_BUF];

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        let data = &buf[..n];
        whole.update(data);
        consumed += n as u64;

        let Some(ps) = piece_size else { continue };
        let mut rest = data;
        while !rest.is_empty() {
            let left = usize::try_from(ps - piece_fill).unwrap_or(usize::MAX);
            let take = rest.len().min(left);
            piece.update(&rest[..take]);
            piece_fill += take as u64;
            rest = &rest[take..];
            if piece_fill == ps {
                let idx = pieces.len() as u64;
                pieces.push(FileHash::sha256(std::mem::take(&mut piece), Some(idx)));
                piece_fill = 0;
            }
        }
    }
    if piece_fill > 0 {
        let idx = pieces.len() as u64;
        pieces.push(FileHash::sha256(piece, Some(idx)));
    }

    Ok(ComputedHashes { whole: FileHash::sha256(whole, None), pieces, piece_size, size: consumed })
}

/// Number of pieces a file of `size` bytes splits into.
pub fn piece_count(size: u64, piece_size: u64) -> u64 {
    if piece_size == 0 {
        0
    } else {
        size.div_ceil(piece_size)
    }
}
