//! Pairwise alignment wrapped to produce gapped strings.
//!
//! `bio`'s pairwise aligner returns an operation path; downstream code
//! wants the two sequences gap-padded to equal length plus the score, so
//! this module replays the path into strings. Local mode reports only the
//! aligned region (unaligned overhangs trimmed); global mode aligns the
//! full sequences, then trims terminal columns where either side is a
//! gap, which is how duplex strand consensuses of unequal length are
//! reconciled without fabricating end calls.

use bio::alignment::pairwise::Aligner;
use bio::alignment::{Alignment, AlignmentOperation};

use crate::GAP_CHAR;

/// Which flavor of pairwise alignment to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairwiseMode {
    /// Smith-Waterman; reports only the best-scoring aligned region.
    Local,
    /// Needleman-Wunsch over both full sequences, terminal gap columns
    /// trimmed.
    Global,
}

/// An alignment rendered as two equal-length gapped strings.
#[derive(Debug, Clone)]
pub struct PairwiseAlignment {
    /// The gapped first (target) sequence.
    pub target: String,
    /// The gapped second (query) sequence.
    pub query: String,
    /// The alignment score.
    pub score: i32,
}

/// Pairwise aligner with simple match/mismatch scoring and affine gaps.
#[derive(Debug, Clone, Copy)]
pub struct PairwiseAligner {
    match_score: i32,
    mismatch_score: i32,
    gap_open: i32,
    gap_extend: i32,
}

impl Default for PairwiseAligner {
    fn default() -> Self {
        Self { match_score: 2, mismatch_score: -1, gap_open: -1, gap_extend: -1 }
    }
}

impl PairwiseAligner {
    /// Creates an aligner with explicit scoring. Gap penalties are
    /// negative.
    #[must_use]
    pub fn new(match_score: i32, mismatch_score: i32, gap_open: i32, gap_extend: i32) -> Self {
        Self { match_score, mismatch_score, gap_open, gap_extend }
    }

    /// Aligns `target` against `query` and returns the gapped pair.
    #[must_use]
    pub fn align(&self, target: &str, query: &str, mode: PairwiseMode) -> PairwiseAlignment {
        let x = target.as_bytes();
        let y = query.as_bytes();
        let (match_score, mismatch_score) = (self.match_score, self.mismatch_score);
        let score_fn =
            |a: u8, b: u8| if a.eq_ignore_ascii_case(&b) { match_score } else { mismatch_score };
        let mut aligner =
            Aligner::with_capacity(x.len(), y.len(), self.gap_open, self.gap_extend, &score_fn);

        let alignment = match mode {
            PairwiseMode::Local => aligner.local(x, y),
            PairwiseMode::Global => aligner.global(x, y),
        };

        let (mut target, mut query) = gapped_strings(x, y, &alignment);
        if mode == PairwiseMode::Global {
            trim_terminal_gap_columns(&mut target, &mut query);
        }

        PairwiseAlignment {
            target: String::from_utf8(target).expect("sequences are ASCII"),
            query: String::from_utf8(query).expect("sequences are ASCII"),
            score: alignment.score,
        }
    }
}

/// Replays an alignment's operation path into two gapped byte strings.
fn gapped_strings(x: &[u8], y: &[u8], alignment: &Alignment) -> (Vec<u8>, Vec<u8>) {
    // Clip operations, when present, carry the offsets themselves;
    // otherwise start at the reported alignment start.
    let has_clips = alignment
        .operations
        .iter()
        .any(|op| matches!(op, AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_)));
    let (mut xi, mut yi) = if has_clips { (0, 0) } else { (alignment.xstart, alignment.ystart) };

    let mut gapped_x = Vec::with_capacity(alignment.operations.len());
    let mut gapped_y = Vec::with_capacity(alignment.operations.len());
    for op in &alignment.operations {
        match op {
            AlignmentOperation::Match | AlignmentOperation::Subst => {
                gapped_x.push(x[xi]);
                gapped_y.push(y[yi]);
                xi += 1;
                yi += 1;
            }
            AlignmentOperation::Del => {
                gapped_x.push(GAP_CHAR);
                gapped_y.push(y[yi]);
                yi += 1;
            }
            AlignmentOperation::Ins => {
                gapped_x.push(x[xi]);
                gapped_y.push(GAP_CHAR);
                xi += 1;
            }
            AlignmentOperation::Xclip(n) => xi += n,
            AlignmentOperation::Yclip(n) => yi += n,
        }
    }
    (gapped_x, gapped_y)
}

/// Drops leading and trailing columns where either side is a gap.
fn trim_terminal_gap_columns(x: &mut Vec<u8>, y: &mut Vec<u8>) {
    let len = x.len();
    let mut start = 0;
    while start < len && (x[start] == GAP_CHAR || y[start] == GAP_CHAR) {
        start += 1;
    }
    if start == len {
        x.clear();
        y.clear();
        return;
    }
    let mut end = len;
    while end > start && (x[end - 1] == GAP_CHAR || y[end - 1] == GAP_CHAR) {
        end -= 1;
    }
    x.truncate(end);
    x.drain(..start);
    y.truncate(end);
    y.drain(..start);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_sequences_align_without_gaps() {
        let aligner = PairwiseAligner::default();
        let result = aligner.align("GATTACA", "GATTACA", PairwiseMode::Global);
        assert_eq!(result.target, "GATTACA");
        assert_eq!(result.query, "GATTACA");
        assert_eq!(result.score, 14);
    }

    #[test]
    fn substitution_keeps_columns_paired() {
        let aligner = PairwiseAligner::default();
        let result = aligner.align("GATTACA", "GATTTCA", PairwiseMode::Global);
        assert_eq!(result.target.len(), result.query.len());
        assert_eq!(result.target, "GATTACA");
        assert_eq!(result.query, "GATTTCA");
    }

    #[test]
    fn deletion_introduces_gap_in_target() {
        let aligner = PairwiseAligner::default();
        let result = aligner.align("GATACA", "GATTACA", PairwiseMode::Global);
        assert_eq!(result.target.len(), result.query.len());
        assert_eq!(result.target.matches('-').count(), 1);
        assert_eq!(result.query.matches('-').count(), 0);
    }

    #[test]
    fn global_mode_trims_overhangs() {
        // The query extends past the target on both sides; global
        // alignment pads with terminal gaps, which are then trimmed.
        let aligner = PairwiseAligner::default();
        let result = aligner.align("TTACA", "GATTACAGG", PairwiseMode::Global);
        assert!(!result.target.starts_with('-'));
        assert!(!result.target.ends_with('-'));
        assert_eq!(result.target.len(), result.query.len());
        assert_eq!(result.target, "TTACA");
        assert_eq!(result.query, "TTACA");
    }

    #[test]
    fn local_mode_reports_aligned_region_only() {
        let aligner = PairwiseAligner::default();
        let result = aligner.align("CCCGATTACA", "GATTACATTT", PairwiseMode::Local);
        assert_eq!(result.target, "GATTACA");
        assert_eq!(result.query, "GATTACA");
    }

    #[test]
    fn rotated_half_swap_scores_higher_when_reversed() {
        // A barcode whose halves are swapped should align better to the
        // swapped form of its partner than to the original.
        let aligner = PairwiseAligner::default();
        let raw = "AAAATTTT";
        let canonical = "TTTTAAAA";
        let swapped = "AAAATTTT";
        let fwd = aligner.align(raw, canonical, PairwiseMode::Local);
        let rev = aligner.align(raw, swapped, PairwiseMode::Local);
        assert!(rev.score > fwd.score);
    }

    #[test]
    fn scoring_is_case_insensitive() {
        let aligner = PairwiseAligner::default();
        let result = aligner.align("gatt", "GATT", PairwiseMode::Global);
        assert_eq!(result.score, 8);
    }
}
