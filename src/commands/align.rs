//! Multiple sequence alignment of read families.
//!
//! Reads the grouped-families file (sorted by barcode, then strand
//! order), runs one multiple sequence alignment per family mate, and
//! writes the aligned-families file consumed by the consensus stage.
//! Whole duplexes are dispatched to the worker pool so both strands of a
//! barcode stay together in one unit of work.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use fgoxide::io::Io;
use log::{info, warn};

use dupcall_align::{AlignError, MsaStrategy, MultipleAligner, find_executable, transfer_gaps};
use dupcall_consensus::GAP_QUAL;
use dupcall_lib::families::{BarFamily, GroupedFamilyReader, Mate, SeqRead, StrandOrder};
use dupcall_lib::logging::{OperationTimer, format_count};
use dupcall_lib::metrics::{AlignStats, write_stats};
use dupcall_lib::pool::FamilyPool;

use crate::commands::command::Command;
use crate::commands::common::{PoolOptions, StatsOptions};

/// CLI choice of MSA engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum AlignerChoice {
    /// MAFFT subprocess.
    #[default]
    Mafft,
    /// Kalign subprocess.
    Kalign,
    /// Pad with trailing gaps instead of aligning (deterministic; for
    /// tests and pre-aligned input).
    Passthrough,
}

impl From<AlignerChoice> for MsaStrategy {
    fn from(choice: AlignerChoice) -> Self {
        match choice {
            AlignerChoice::Mafft => MsaStrategy::Mafft,
            AlignerChoice::Kalign => MsaStrategy::Kalign,
            AlignerChoice::Passthrough => MsaStrategy::Passthrough,
        }
    }
}

/// Multiple-align each read family in a sorted family file.
#[derive(Parser, Debug)]
#[command(
    about = "Multiple-align each read family in a sorted family file",
    long_about = "Read sorted read families and do a multiple sequence alignment of each \
                  family. The input has one read pair per line, 8 tab-delimited columns: \
                  canonical barcode, barcode order (\"ab\" or \"ba\"), read 1 name, read 1 \
                  sequence, read 1 quality scores, and the same three columns for read 2. \
                  The output has one aligned read per line: barcode, order, mate, read name, \
                  aligned sequence, aligned quality scores (spaces at gap positions)."
)]
pub struct AlignFamilies {
    /// Input read families TSV, sorted by barcode then order.
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output aligned families TSV.
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// The multiple sequence aligner to use.
    #[arg(short = 'a', long = "aligner", value_enum, default_value_t = AlignerChoice::Mafft)]
    aligner: AlignerChoice,

    /// Don't check that the two reads of a pair have matching names.
    #[arg(short = 'I', long = "no-check-ids", default_value_t = false)]
    no_check_ids: bool,

    #[command(flatten)]
    pool: PoolOptions,

    #[command(flatten)]
    stats: StatsOptions,
}

impl Command for AlignFamilies {
    fn execute(&self) -> Result<()> {
        self.pool.validate()?;
        let strategy = MsaStrategy::from(self.aligner);
        if let Some(command) = strategy.required_command() {
            if find_executable(command).is_none() {
                bail!("missing command: {command:?}");
            }
        }

        let io = Io::default();
        let reader = io
            .new_reader(&self.input)
            .with_context(|| format!("opening {}", self.input.display()))?;
        let mut writer = io
            .new_writer(&self.output)
            .with_context(|| format!("creating {}", self.output.display()))?;

        let timer = OperationTimer::new("Aligning families");
        let aligner: Arc<dyn MultipleAligner> = Arc::from(strategy.aligner());
        let mut pool: FamilyPool<BarFamily, (String, AlignStats)> =
            FamilyPool::new(self.pool.processes, self.pool.queue_size(), move |family| {
                process_duplex(&family, aligner.as_ref())
            });

        let mut stats = AlignStats::default();
        for family in GroupedFamilyReader::with_options(reader, !self.no_check_ids, false) {
            let family = family?;
            stats.read_pairs += family.read_pairs() as u64;
            stats.duplexes += 1;
            for (output, unit) in pool.submit(family)? {
                stats.merge(&unit);
                writer.write_all(output.as_bytes())?;
            }
        }
        info!("flushing..");
        for (output, unit) in pool.flush()? {
            stats.merge(&unit);
            writer.write_all(output.as_bytes())?;
        }
        writer.flush()?;

        info!(
            "Processed {} read pairs in {} duplexes, with {} alignment failures.",
            format_count(stats.read_pairs),
            format_count(stats.duplexes),
            stats.failures
        );
        if stats.aligned_pairs > 0 && stats.runs > 0 {
            info!(
                "{:.3}s per pair, {:.3}s per run.",
                stats.align_secs / stats.aligned_pairs as f64,
                stats.align_secs / stats.runs as f64
            );
        }
        timer.log_completion(stats.duplexes);

        if let Some(path) = &self.stats.stats {
            write_stats(path, &stats)?;
        }
        Ok(())
    }
}

/// One aligned read, ready to be written.
struct AlignedRow {
    name: String,
    seq: String,
    qual: String,
}

/// Aligns every mate family of one duplex and renders the output lines.
///
/// With both strands present the mates are processed criss-cross
/// (ab mate 1, ba mate 2, ab mate 2, ba mate 1), keeping the two halves
/// of each future duplex mate adjacent in the output.
fn process_duplex(
    family: &BarFamily,
    aligner: &dyn MultipleAligner,
) -> Result<(String, AlignStats)> {
    let mut output = String::new();
    let mut stats = AlignStats::default();

    let present: Vec<StrandOrder> = StrandOrder::BOTH
        .into_iter()
        .filter(|&order| family.strand(order).read_pairs() > 0)
        .collect();
    let combos: Vec<(Mate, StrandOrder)> = match present.as_slice() {
        [] => return Ok((output, stats)),
        [order] => vec![(Mate::R1, *order), (Mate::R2, *order)],
        [first, second] => vec![
            (Mate::R1, *first),
            (Mate::R2, *second),
            (Mate::R2, *first),
            (Mate::R1, *second),
        ],
        _ => unreachable!("a BarFamily holds at most two strand orders"),
    };

    for (mate, order) in combos {
        let reads = &family.strand(order).mate(mate).reads;
        let start = Instant::now();
        let result = align_family(reads, aligner);
        if reads.len() > 1 {
            stats.runs += 1;
            stats.aligned_pairs += reads.len() as u64;
            stats.align_secs += start.elapsed().as_secs_f64();
        }
        match result {
            Ok(rows) => {
                for row in rows {
                    output.push_str(&format!(
                        "{}\t{}\t{}\t{}\t{}\t{}\n",
                        family.barcode, order, mate, row.name, row.seq, row.qual
                    ));
                }
            }
            Err(error @ (AlignError::ProcessFailed { .. } | AlignError::Io(_))) => {
                warn!(
                    "Error aligning family {}/{} (mate {}): {error}",
                    family.barcode, order, mate
                );
                stats.failures += 1;
            }
            Err(error) => {
                // Wrong output count or a quality/residue mismatch means
                // the aligner broke its contract; that is fatal.
                return Err(error).with_context(|| {
                    format!(
                        "aligner contract violated on family {}/{}, mate {}",
                        family.barcode, order, mate
                    )
                });
            }
        }
    }
    Ok((output, stats))
}

/// Aligns one mate family and transfers the gap pattern onto the quality
/// strings. A single read passes through verbatim; the aligner is only
/// invoked for two or more.
fn align_family(
    reads: &[SeqRead],
    aligner: &dyn MultipleAligner,
) -> std::result::Result<Vec<AlignedRow>, AlignError> {
    if reads.is_empty() {
        return Ok(Vec::new());
    }
    let aligned_seqs: Vec<String> = if reads.len() == 1 {
        vec![reads[0].seq.clone()]
    } else {
        let seqs: Vec<String> = reads.iter().map(|read| read.seq.clone()).collect();
        aligner.align(&seqs)?
    };

    reads
        .iter()
        .zip(aligned_seqs)
        .map(|(read, seq)| {
            let qual = transfer_gaps(&seq, &read.qual, GAP_QUAL)?;
            Ok(AlignedRow { name: read.name.clone(), seq, qual })
        })
        .collect()
}
