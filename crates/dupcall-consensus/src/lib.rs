//! Quality-aware consensus calling for read families and duplex merging.
//!
//! This crate implements the two consensus stages of the dupcall pipeline:
//!
//! 1. **Family consensus** ([`caller`]): given the gap-padded sequences and
//!    quality strings of one read family (one barcode/order/mate), call one
//!    consensus sequence by per-column majority vote under quality and
//!    fraction thresholds.
//! 2. **Duplex merge** ([`duplex`]): reconcile the two single-strand
//!    consensuses of one physical molecule into a duplex consensus, masking
//!    every disagreement with an `N` or an IUPAC ambiguity code.
//!
//! Both stages operate on plain byte strings; alignment is the caller's
//! responsibility (see the `dupcall-align` crate).

pub mod caller;
pub mod column;
pub mod duplex;

use thiserror::Error;

pub use caller::{ConsensusParams, call_consensus, call_family};
pub use column::{ColumnCall, ColumnTally};
pub use duplex::{ambiguity_code, merge_duplex};

/// The gap character used in aligned sequences.
pub const GAP_CHAR: u8 = b'-';

/// The quality placeholder carried by gap positions. Gaps never have a
/// real quality score.
pub const GAP_QUAL: u8 = b' ';

/// The no-call base emitted when no symbol wins a column.
pub const NO_CALL: u8 = b'N';

/// Result type alias for consensus operations.
pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Errors raised by consensus calling and duplex merging.
///
/// Length mismatches indicate a broken aligner contract upstream and are
/// treated as fatal by the pipeline.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// Two strings that must be aligned to equal length are not.
    #[error("aligned length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        /// What was being compared (for error context).
        what: &'static str,
        /// The expected length.
        expected: usize,
        /// The observed length.
        actual: usize,
    },

    /// The number of quality strings does not match the number of sequences.
    #[error("family has {seqs} sequences but {quals} quality strings")]
    CountMismatch {
        /// Number of sequences.
        seqs: usize,
        /// Number of quality strings.
        quals: usize,
    },
}
