//! Common CLI options shared across commands.
//!
//! These argument structures are composed into command structs with
//! `#[command(flatten)]`.

use std::path::PathBuf;

use anyhow::bail;
use clap::Args;

/// Worker-pool options for the embarrassingly parallel per-barcode
/// stages.
#[derive(Debug, Clone, Args)]
pub struct PoolOptions {
    /// Number of worker threads. With 0, everything runs on the main
    /// thread.
    #[arg(short = 'p', long = "processes", default_value_t = 0)]
    pub processes: usize,

    /// How many pending units to buffer between submission and result
    /// collection. Default: 8 * processes.
    #[arg(long = "queue-size")]
    pub queue_size: Option<usize>,
}

impl PoolOptions {
    /// Validates the options.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(queue_size) = self.queue_size {
            if queue_size == 0 {
                bail!("--queue-size must be greater than zero");
            }
        }
        Ok(())
    }

    /// The effective queue depth.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.queue_size.unwrap_or_else(|| (8 * self.processes).max(8))
    }
}

/// Options for writing run statistics to a file.
#[derive(Debug, Clone, Default, Args)]
pub struct StatsOptions {
    /// Optional output TSV for run statistics.
    #[arg(short = 's', long = "stats")]
    pub stats: Option<PathBuf>,
}

/// The FASTQ quality score encodings we accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum QualFormat {
    /// Sanger scores, offset 33 (`!`).
    #[default]
    Sanger,
    /// Solexa scores, offset 64 (`@`).
    Solexa,
}

impl QualFormat {
    /// The ASCII value representing a Phred score of zero.
    #[must_use]
    pub fn offset(self) -> u8 {
        match self {
            Self::Sanger => 33,
            Self::Solexa => 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_size_defaults_scale_with_processes() {
        let opts = PoolOptions { processes: 4, queue_size: None };
        assert_eq!(opts.queue_size(), 32);
        let inline = PoolOptions { processes: 0, queue_size: None };
        assert_eq!(inline.queue_size(), 8);
        let explicit = PoolOptions { processes: 4, queue_size: Some(2) };
        assert_eq!(explicit.queue_size(), 2);
    }

    #[test]
    fn zero_queue_size_is_rejected() {
        let opts = PoolOptions { processes: 1, queue_size: Some(0) };
        assert!(opts.validate().is_err());
        let ok = PoolOptions { processes: 1, queue_size: Some(1) };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn qual_format_offsets() {
        assert_eq!(QualFormat::Sanger.offset(), 33);
        assert_eq!(QualFormat::Solexa.offset(), 64);
    }
}
