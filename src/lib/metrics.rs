//! Serializable per-run statistics.
//!
//! Each command accumulates one of these across its run, logs a summary,
//! and optionally writes it as a single-row TSV via
//! `fgoxide::io::DelimFile` when `--stats` is given.

use std::path::Path;

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use serde::{Deserialize, Serialize};

/// Statistics for the family-alignment stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlignStats {
    /// Read pairs consumed.
    pub read_pairs: u64,
    /// Duplexes (barcodes) processed.
    pub duplexes: u64,
    /// External aligner invocations (multi-read families only).
    pub runs: u64,
    /// Read pairs that went through the external aligner.
    pub aligned_pairs: u64,
    /// Families whose alignment failed.
    pub failures: u64,
    /// Seconds spent inside the aligner.
    pub align_secs: f64,
}

impl AlignStats {
    /// Folds another stats block into this one.
    pub fn merge(&mut self, other: &Self) {
        self.read_pairs += other.read_pairs;
        self.duplexes += other.duplexes;
        self.runs += other.runs;
        self.aligned_pairs += other.aligned_pairs;
        self.failures += other.failures;
        self.align_secs += other.align_secs;
    }
}

/// Statistics for the consensus stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusStats {
    /// Reads consumed.
    pub total_reads: u64,
    /// Reads contributing to at least one consensus.
    pub consensus_reads: u64,
    /// Duplexes (barcodes) processed.
    pub duplexes: u64,
    /// Duplexes that produced at least one single-strand consensus.
    pub runs: u64,
    /// Seconds spent calling consensuses.
    pub consensus_secs: f64,
}

impl ConsensusStats {
    /// Folds another stats block into this one.
    pub fn merge(&mut self, other: &Self) {
        self.total_reads += other.total_reads;
        self.consensus_reads += other.consensus_reads;
        self.duplexes += other.duplexes;
        self.runs += other.runs;
        self.consensus_secs += other.consensus_secs;
    }
}

/// Statistics for the barcode-correction stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectStats {
    /// Barcodes in the barcode list.
    pub barcodes: u64,
    /// Self-alignments that passed every filter.
    pub good_alignments: u64,
    /// Read pairs in the families file.
    pub read_pairs: u64,
    /// Barcodes rewritten to a canonical form.
    pub corrected_barcodes: u64,
    /// Read pairs whose barcode was rewritten.
    pub corrected_reads: u64,
    /// Corrections that also flipped the strand order.
    pub reversed: u64,
}

/// Writes one stats row as TSV.
pub fn write_stats<M: Serialize + Clone>(path: &Path, stats: &M) -> Result<()> {
    DelimFile::default()
        .write_tsv(&path, [stats.clone()])
        .with_context(|| format!("writing stats to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_stats_merge() {
        let mut a = AlignStats { read_pairs: 10, runs: 2, ..AlignStats::default() };
        let b = AlignStats { read_pairs: 5, failures: 1, ..AlignStats::default() };
        a.merge(&b);
        assert_eq!(a.read_pairs, 15);
        assert_eq!(a.runs, 2);
        assert_eq!(a.failures, 1);
    }

    #[test]
    fn stats_round_trip_through_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.tsv");
        let stats = CorrectStats { barcodes: 3, corrected_barcodes: 1, ..CorrectStats::default() };
        write_stats(&path, &stats).unwrap();

        let rows: Vec<CorrectStats> =
            DelimFile::default().read_tsv(&path).expect("readable stats");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].barcodes, 3);
        assert_eq!(rows[0].corrected_barcodes, 1);
    }
}
