//! Per-column vote tallying.
//!
//! A consensus column collects one vote from each read in the family:
//!
//! - a gap character always votes, with no quality gate (gaps carry no
//!   quality score);
//! - any other symbol votes only when its quality character is at or above
//!   the configured floor;
//! - low-quality bases are masked and cast no vote at all.
//!
//! The winning symbol must hold a strict majority (`count / votes >` the
//! fraction threshold) *and* a strict absolute count (`count >` the
//! minimum). Ties at exactly the threshold therefore produce a no-call.
//! A column whose winner is the gap, or where every read is masked,
//! contributes no consensus character at all, which is how
//! minority insertions and all-gap columns are dropped from the output.

use crate::{GAP_CHAR, NO_CALL};

/// Symbols tracked per column, in vote-resolution order.
const SYMBOLS: [u8; 6] = [b'A', b'C', b'G', b'T', b'N', GAP_CHAR];
const SYM_COUNT: usize = 6;
const N_INDEX: usize = 4;
const GAP_INDEX: usize = 5;

/// Lookup table mapping an ASCII symbol to its tally index.
/// Anything unrecognized maps to `N` (index 4), matching how reads with
/// unexpected characters are treated as no-calls.
const SYM_TO_INDEX: [u8; 256] = {
    let mut table = [N_INDEX as u8; 256];
    table[b'A' as usize] = 0;
    table[b'a' as usize] = 0;
    table[b'C' as usize] = 1;
    table[b'c' as usize] = 1;
    table[b'G' as usize] = 2;
    table[b'g' as usize] = 2;
    table[b'T' as usize] = 3;
    table[b't' as usize] = 3;
    table[GAP_CHAR as usize] = GAP_INDEX as u8;
    table
};

/// The outcome of calling one alignment column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnCall {
    /// A symbol won the vote (may be `N` if the reads themselves vote `N`).
    Base(u8),
    /// Votes were cast but no symbol passed both thresholds.
    NoCall,
    /// The column contributes no consensus character: every read was
    /// masked, or the gap won the vote.
    Skip,
}

/// Vote tally for a single alignment column.
///
/// Reusable across columns via [`ColumnTally::reset`] to avoid
/// re-allocating per position.
#[derive(Debug, Default)]
pub struct ColumnTally {
    counts: [u32; SYM_COUNT],
}

impl ColumnTally {
    /// Creates an empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the tally for the next column.
    pub fn reset(&mut self) {
        self.counts.fill(0);
    }

    /// Adds one read's observation at this column.
    ///
    /// Gaps are always counted; other symbols are counted only when
    /// `qual >= qual_floor`. `qual_floor` is an ASCII quality character
    /// (offset already applied).
    pub fn add(&mut self, symbol: u8, qual: u8, qual_floor: u8) {
        let idx = SYM_TO_INDEX[symbol as usize] as usize;
        if idx == GAP_INDEX || qual >= qual_floor {
            self.counts[idx] += 1;
        }
    }

    /// Total votes cast at this column (masked reads excluded).
    #[must_use]
    pub fn votes(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Calls the column under the given thresholds.
    ///
    /// `cons_thres` is the majority fraction the winner must strictly
    /// exceed; `min_count` is the absolute vote count it must strictly
    /// exceed.
    #[must_use]
    pub fn call(&self, cons_thres: f64, min_count: u32) -> ColumnCall {
        let total = self.votes();
        if total == 0 {
            return ColumnCall::Skip;
        }

        let mut best = 0;
        let mut best_count = 0;
        for (idx, &count) in self.counts.iter().enumerate() {
            if count > best_count {
                best = idx;
                best_count = count;
            }
        }

        let fraction = f64::from(best_count) / f64::from(total);
        if fraction > cons_thres && best_count > min_count {
            if best == GAP_INDEX { ColumnCall::Skip } else { ColumnCall::Base(SYMBOLS[best]) }
        } else {
            ColumnCall::NoCall
        }
    }
}

/// Renders a [`ColumnCall`] into an output buffer, dropping skipped columns.
pub(crate) fn push_call(out: &mut Vec<u8>, call: ColumnCall) {
    match call {
        ColumnCall::Base(base) => out.push(base),
        ColumnCall::NoCall => out.push(NO_CALL),
        ColumnCall::Skip => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q20: u8 = b'5'; // '!' + 20
    const FLOOR: u8 = b'5';

    fn tally(entries: &[(u8, u8)]) -> ColumnTally {
        let mut t = ColumnTally::new();
        for &(symbol, qual) in entries {
            t.add(symbol, qual, FLOOR);
        }
        t
    }

    #[test]
    fn unanimous_base_wins() {
        let t = tally(&[(b'A', Q20), (b'A', Q20), (b'A', Q20)]);
        assert_eq!(t.call(0.7, 0), ColumnCall::Base(b'A'));
    }

    #[test]
    fn lowercase_counts_as_uppercase() {
        let t = tally(&[(b'a', Q20), (b'A', Q20)]);
        assert_eq!(t.call(0.5, 0), ColumnCall::Base(b'A'));
    }

    #[test]
    fn low_quality_bases_are_masked() {
        // Two high-quality As against three low-quality Cs: the Cs never vote.
        let t = tally(&[(b'A', Q20), (b'A', Q20), (b'C', b'!'), (b'C', b'!'), (b'C', b'!')]);
        assert_eq!(t.votes(), 2);
        assert_eq!(t.call(0.7, 0), ColumnCall::Base(b'A'));
    }

    #[test]
    fn exact_threshold_fraction_is_no_call() {
        // 7 of 10 is exactly 0.7: strict majority required, so no call.
        let mut entries = vec![(b'A', Q20); 7];
        entries.extend(vec![(b'C', Q20); 3]);
        let t = tally(&entries);
        assert_eq!(t.call(0.7, 0), ColumnCall::NoCall);
    }

    #[test]
    fn above_threshold_fraction_wins() {
        let mut entries = vec![(b'A', Q20); 8];
        entries.extend(vec![(b'C', Q20); 2]);
        let t = tally(&entries);
        assert_eq!(t.call(0.7, 0), ColumnCall::Base(b'A'));
    }

    #[test]
    fn min_count_is_strict() {
        let t = tally(&[(b'A', Q20), (b'A', Q20)]);
        assert_eq!(t.call(0.5, 2), ColumnCall::NoCall);
        assert_eq!(t.call(0.5, 1), ColumnCall::Base(b'A'));
    }

    #[test]
    fn gaps_vote_without_quality() {
        // Gap quality placeholder is below any floor but still counts.
        let t = tally(&[(GAP_CHAR, b' '), (GAP_CHAR, b' '), (b'A', Q20)]);
        assert_eq!(t.votes(), 3);
    }

    #[test]
    fn gap_majority_skips_column() {
        let t = tally(&[(GAP_CHAR, b' '), (GAP_CHAR, b' '), (GAP_CHAR, b' '), (b'A', Q20)]);
        assert_eq!(t.call(0.7, 0), ColumnCall::Skip);
    }

    #[test]
    fn all_masked_skips_column() {
        let t = tally(&[(b'A', b'!'), (b'C', b'!')]);
        assert_eq!(t.votes(), 0);
        assert_eq!(t.call(0.7, 0), ColumnCall::Skip);
    }

    #[test]
    fn n_votes_can_win() {
        let t = tally(&[(b'N', Q20), (b'N', Q20), (b'N', Q20), (b'A', Q20)]);
        assert_eq!(t.call(0.7, 0), ColumnCall::Base(b'N'));
    }

    #[test]
    fn split_vote_is_no_call() {
        let t = tally(&[(b'A', Q20), (b'C', Q20)]);
        assert_eq!(t.call(0.7, 0), ColumnCall::NoCall);
    }

    #[test]
    fn reset_clears_counts() {
        let mut t = tally(&[(b'A', Q20)]);
        t.reset();
        assert_eq!(t.votes(), 0);
        assert_eq!(t.call(0.7, 0), ColumnCall::Skip);
    }
}
