//! Sequence alignment adapters for dupcall.
//!
//! Alignment itself is delegated: pairwise local/global alignment to
//! `bio::alignment::pairwise`, and multiple sequence alignment of read
//! families to an external engine (MAFFT or Kalign) run as a subprocess.
//! This crate wraps both behind small, swappable contracts that return
//! equal-length gapped strings, so the consensus code never sees an
//! aligner-specific type and tests can substitute a deterministic
//! pass-through strategy.

pub mod msa;
pub mod pairwise;

use std::path::PathBuf;

use thiserror::Error;

pub use msa::{MsaStrategy, MultipleAligner, PassthroughMsa};
pub use pairwise::{PairwiseAligner, PairwiseAlignment, PairwiseMode};

/// The gap character produced by every aligner in this crate.
pub const GAP_CHAR: u8 = b'-';

/// Result type alias for alignment operations.
pub type Result<T> = std::result::Result<T, AlignError>;

/// Errors from alignment adapters.
#[derive(Debug, Error)]
pub enum AlignError {
    /// An I/O failure while driving an external aligner.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The external aligner exited unsuccessfully.
    #[error("{program} failed ({status}): {detail}")]
    ProcessFailed {
        /// The program that failed.
        program: String,
        /// Its exit status.
        status: String,
        /// Captured stderr, if any.
        detail: String,
    },

    /// The external aligner returned a different number of sequences than
    /// it was given.
    #[error("aligner returned {actual} sequences for {expected} inputs")]
    OutputCountMismatch {
        /// Number of input sequences.
        expected: usize,
        /// Number of aligned sequences returned.
        actual: usize,
    },

    /// A quality string does not match the residue count of its aligned
    /// sequence.
    #[error("quality string has {actual} characters but the aligned sequence has {expected} residues")]
    QualityLengthMismatch {
        /// Residues (non-gap characters) in the aligned sequence.
        expected: usize,
        /// Characters in the quality string.
        actual: usize,
    },
}

/// Searches `PATH` for an executable, like `which`.
///
/// Used to verify required external aligners before any input is read.
#[must_use]
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).map(|dir| dir.join(name)).find(|candidate| candidate.is_file())
}

/// Transfers the gap pattern of an aligned sequence onto its raw quality
/// string.
///
/// Gap positions receive `gap_qual`; every other position consumes the
/// next raw quality character.
///
/// # Errors
///
/// Returns [`AlignError::QualityLengthMismatch`] when the quality string
/// is shorter or longer than the aligned sequence's residue count.
pub fn transfer_gaps(aligned_seq: &str, raw_qual: &str, gap_qual: u8) -> Result<String> {
    let residues = aligned_seq.bytes().filter(|&b| b != GAP_CHAR).count();
    if residues != raw_qual.len() {
        return Err(AlignError::QualityLengthMismatch { expected: residues, actual: raw_qual.len() });
    }

    let mut quals = raw_qual.bytes();
    let aligned_qual = aligned_seq
        .bytes()
        .map(|b| if b == GAP_CHAR { gap_qual } else { quals.next().expect("counted above") })
        .collect::<Vec<u8>>();
    Ok(String::from_utf8(aligned_qual).expect("quality strings are ASCII"))
}
