//! Family consensus calling over aligned reads.

use crate::column::{ColumnTally, push_call};
use crate::{ConsensusError, Result};

/// Thresholds controlling the per-column vote.
#[derive(Debug, Clone, Copy)]
pub struct ConsensusParams {
    /// Minimum quality character (ASCII, offset applied) for a base to vote.
    pub qual_floor: u8,
    /// Fraction of votes the winning symbol must strictly exceed.
    pub cons_thres: f64,
    /// Absolute vote count the winning symbol must strictly exceed.
    pub min_cons_reads: u32,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        // Sanger offset ('!') plus the default Phred 20 floor.
        Self { qual_floor: b'!' + 20, cons_thres: 0.7, min_cons_reads: 0 }
    }
}

/// Calls the consensus of one aligned read family.
///
/// `seqs` and `quals` are the family's gap-padded sequences and quality
/// strings; every string must have the same length, with gap positions
/// carrying the blank quality placeholder. Columns where the gap wins the
/// vote, or where every read is masked, produce no output character, so
/// the returned consensus may be shorter than the alignment (and empty
/// when every column is masked or gapped).
///
/// # Errors
///
/// Returns [`ConsensusError`] when the inputs violate the aligner
/// contract: differing sequence lengths, or quality strings that do not
/// match their sequences.
pub fn call_consensus<S, Q>(seqs: &[S], quals: &[Q], params: &ConsensusParams) -> Result<String>
where
    S: AsRef<[u8]>,
    Q: AsRef<[u8]>,
{
    if seqs.len() != quals.len() {
        return Err(ConsensusError::CountMismatch { seqs: seqs.len(), quals: quals.len() });
    }
    let Some(first) = seqs.first() else {
        return Ok(String::new());
    };

    let width = first.as_ref().len();
    for seq in seqs {
        if seq.as_ref().len() != width {
            return Err(ConsensusError::LengthMismatch {
                what: "family sequence alignment",
                expected: width,
                actual: seq.as_ref().len(),
            });
        }
    }
    for qual in quals {
        if qual.as_ref().len() != width {
            return Err(ConsensusError::LengthMismatch {
                what: "family quality alignment",
                expected: width,
                actual: qual.as_ref().len(),
            });
        }
    }

    let mut consensus = Vec::with_capacity(width);
    let mut tally = ColumnTally::new();
    for col in 0..width {
        tally.reset();
        for (seq, qual) in seqs.iter().zip(quals) {
            tally.add(seq.as_ref()[col], qual.as_ref()[col], params.qual_floor);
        }
        push_call(&mut consensus, tally.call(params.cons_thres, params.min_cons_reads));
    }

    // Only ASCII symbols are ever pushed.
    Ok(String::from_utf8(consensus).expect("consensus is ASCII"))
}

/// Calls the consensus of one family under the family-size policy.
///
/// - an empty family produces no consensus;
/// - a single read *is* the consensus, verbatim, with no voting;
/// - a family of two or more reads below `min_reads` is treated as
///   failed and produces no consensus;
/// - otherwise the family is voted per column via [`call_consensus`].
///
/// A returned empty string means every column was masked or gapped;
/// downstream treats that the same as no consensus.
pub fn call_family<S, Q>(
    seqs: &[S],
    quals: &[Q],
    min_reads: usize,
    params: &ConsensusParams,
) -> Result<Option<String>>
where
    S: AsRef<[u8]>,
    Q: AsRef<[u8]>,
{
    match seqs.len() {
        0 => Ok(None),
        1 => Ok(Some(
            String::from_utf8(seqs[0].as_ref().to_vec()).expect("sequences are ASCII"),
        )),
        n if n < min_reads => Ok(None),
        _ => call_consensus(seqs, quals, params).map(Some),
    }
}
