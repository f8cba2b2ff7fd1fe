//! Consensus calling from aligned families.
//!
//! Reads the aligned-families file, calls one single-strand consensus per
//! (order, mate) family, and merges complementary strand consensuses into
//! duplex consensus sequences. Duplex consensus mate 1 combines the ab
//! mate-1 and ba mate-2 consensuses; duplex mate 2 combines ab mate-2 and
//! ba mate-1. A true duplex requires both strands: when either half of
//! either mate is missing or empty, the barcode produces no duplex
//! output at all.
//!
//! Output is FASTA, or FASTQ with a constant caller-chosen quality when
//! `--fastq-out` is given. Duplex headers carry the hyphen-joined pair of
//! supporting-read counts; single-strand headers carry the strand order
//! suffix and their own count.

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use fgoxide::io::Io;
use log::info;

use dupcall_align::{PairwiseAligner, PairwiseMode};
use dupcall_consensus::{ConsensusParams, call_family, merge_duplex};
use dupcall_lib::families::{AlignedFamilyReader, Mate, MsaDuplex, StrandOrder};
use dupcall_lib::logging::{OperationTimer, format_count};
use dupcall_lib::metrics::{ConsensusStats, write_stats};
use dupcall_lib::pool::FamilyPool;

use crate::commands::command::Command;
use crate::commands::common::{PoolOptions, QualFormat, StatsOptions};

/// Build consensus sequences from aligned read families.
#[derive(Parser, Debug)]
#[command(
    about = "Build single-strand and duplex consensus sequences from aligned families",
    long_about = "Build consensus sequences from aligned read families. Single-strand \
                  consensuses are made by counting bases at each alignment column; bases \
                  below the quality threshold are not counted, and the winning base must \
                  hold more than the consensus threshold fraction of the votes or an N is \
                  used. Duplex consensuses are made by aligning pairs of single-strand \
                  consensuses and comparing bases at each position: agreement keeps the \
                  base, and disagreement produces the IUPAC ambiguity code for both (N + \
                  anything and gap + non-gap result in an N)."
)]
pub struct MakeConsensi {
    /// Input aligned families TSV (6 columns, sorted by barcode, order,
    /// mate).
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output file for the first mates of the duplex consensus sequences.
    #[arg(short = '1', long = "dcs1")]
    dcs1: Option<PathBuf>,

    /// Same, but for mate 2.
    #[arg(short = '2', long = "dcs2")]
    dcs2: Option<PathBuf>,

    /// Output file for the mate-1 single-strand consensus sequences.
    #[arg(long = "sscs1")]
    sscs1: Option<PathBuf>,

    /// Same, but for mate 2.
    #[arg(long = "sscs2")]
    sscs2: Option<PathBuf>,

    /// FASTQ quality score encoding of the input.
    #[arg(short = 'F', long = "qual-format", value_enum, default_value_t = QualFormat::Sanger)]
    qual_format: QualFormat,

    /// Output FASTQ instead of FASTA, giving every base this Phred score.
    #[arg(long = "fastq-out", value_name = "PHRED_SCORE")]
    fastq_out: Option<u8>,

    /// Minimum reads (per strand) required to form a single-strand
    /// consensus; smaller multi-read families are skipped.
    #[arg(short = 'r', long = "min-reads", default_value_t = 3)]
    min_reads: usize,

    /// Base quality threshold; bases below it are not counted.
    #[arg(short = 'q', long = "qual", value_name = "PHRED_SCORE", default_value_t = 20)]
    qual: u8,

    /// Fraction of the votes the consensus base must exceed, or N is
    /// used instead.
    #[arg(short = 'c', long = "cons-thres", value_name = "THRES", default_value_t = 0.7)]
    cons_thres: f64,

    /// Absolute number of reads the consensus base must exceed, or N is
    /// used instead.
    #[arg(short = 'C', long = "min-cons-reads", default_value_t = 0)]
    min_cons_reads: u32,

    #[command(flatten)]
    pool: PoolOptions,

    #[command(flatten)]
    stats: StatsOptions,
}

/// Settings handed to the consensus workers.
#[derive(Debug, Clone, Copy)]
struct ConsensusConfig {
    params: ConsensusParams,
    min_reads: usize,
    /// Quality character for FASTQ output; None means FASTA.
    output_qual: Option<char>,
}

impl MakeConsensi {
    fn validate(&self) -> Result<ConsensusConfig> {
        self.pool.validate()?;
        if self.dcs1.is_none() && self.dcs2.is_none() && self.sscs1.is_none() && self.sscs2.is_none()
        {
            bail!("must specify at least one output file (--dcs1/--dcs2/--sscs1/--sscs2)");
        }
        if self.min_cons_reads as usize > self.min_reads {
            bail!(
                "--min-reads must not be less than --min-cons-reads (or you'll have a lot of \
                 consensus sequences with only N's). If you want to exclude families with fewer \
                 than X reads, give --min-reads X instead of --min-cons-reads X."
            );
        }
        let offset = self.qual_format.offset();
        let qual_floor = offset.checked_add(self.qual).filter(|&floor| floor <= b'~');
        let Some(qual_floor) = qual_floor else {
            bail!("--qual PHRED score ({}) is too large", self.qual);
        };
        let output_qual = match self.fastq_out {
            None => None,
            Some(score) => match offset.checked_add(score).filter(|&q| q <= b'~') {
                Some(q) => Some(char::from(q)),
                None => bail!("--fastq-out PHRED score ({score}) is too large"),
            },
        };
        if !(0.0..=1.0).contains(&self.cons_thres) {
            bail!("--cons-thres must be between 0 and 1, got {}", self.cons_thres);
        }
        Ok(ConsensusConfig {
            params: ConsensusParams {
                qual_floor,
                cons_thres: self.cons_thres,
                min_cons_reads: self.min_cons_reads,
            },
            min_reads: self.min_reads,
            output_qual,
        })
    }
}

impl Command for MakeConsensi {
    fn execute(&self) -> Result<()> {
        let config = self.validate()?;

        let io = Io::default();
        let reader = io
            .new_reader(&self.input)
            .with_context(|| format!("opening {}", self.input.display()))?;
        let mut dcs_writers =
            [open_writer(&io, self.dcs1.as_deref())?, open_writer(&io, self.dcs2.as_deref())?];
        let mut sscs_writers =
            [open_writer(&io, self.sscs1.as_deref())?, open_writer(&io, self.sscs2.as_deref())?];

        let timer = OperationTimer::new("Calling consensus sequences");
        let mut pool: FamilyPool<MsaDuplex, DuplexResult> =
            FamilyPool::new(self.pool.processes, self.pool.queue_size(), move |duplex| {
                process_duplex(&duplex, &config)
            });

        let mut stats = ConsensusStats::default();
        for duplex in AlignedFamilyReader::new(reader) {
            let duplex = duplex?;
            stats.duplexes += 1;
            for result in pool.submit(duplex)? {
                write_result(result, &mut stats, &mut dcs_writers, &mut sscs_writers)?;
            }
        }
        info!("Flushing remaining results from worker processes..");
        for result in pool.flush()? {
            write_result(result, &mut stats, &mut dcs_writers, &mut sscs_writers)?;
        }

        for writer in dcs_writers.iter_mut().chain(sscs_writers.iter_mut()).flatten() {
            writer.flush()?;
        }

        info!(
            "Processed {} reads and {} duplexes.",
            format_count(stats.total_reads),
            format_count(stats.duplexes)
        );
        if stats.consensus_reads > 0 && stats.runs > 0 {
            info!(
                "{:.3}s per read, {:.3}s per run.",
                stats.consensus_secs / stats.consensus_reads as f64,
                stats.consensus_secs / stats.runs as f64
            );
        }
        timer.log_completion(stats.duplexes);

        if let Some(path) = &self.stats.stats {
            write_stats(path, &stats)?;
        }
        Ok(())
    }
}

/// Buffered, gzip-aware output stream.
type OutputWriter = std::io::BufWriter<Box<dyn Write + Send>>;

fn open_writer(io: &Io, path: Option<&std::path::Path>) -> Result<Option<OutputWriter>> {
    path.map(|path| {
        io.new_writer(&path).with_context(|| format!("creating {}", path.display()))
    })
    .transpose()
}

/// Routes one barcode's rendered output to the right files. A strand
/// order's single-strand pair is written only when both mates produced a
/// consensus.
fn write_result(
    result: DuplexResult,
    stats: &mut ConsensusStats,
    dcs_writers: &mut [Option<OutputWriter>; 2],
    sscs_writers: &mut [Option<OutputWriter>; 2],
) -> Result<()> {
    stats.merge(&result.stats);
    if let Some(dcs) = result.dcs {
        for (text, writer) in dcs.iter().zip(dcs_writers.iter_mut()) {
            if let Some(writer) = writer {
                writer.write_all(text.as_bytes())?;
            }
        }
    }
    for order in StrandOrder::BOTH {
        let pair = &result.sscs[order.index()];
        if pair.iter().all(Option::is_some) {
            for (text, writer) in pair.iter().zip(sscs_writers.iter_mut()) {
                if let (Some(text), Some(writer)) = (text, writer) {
                    writer.write_all(text.as_bytes())?;
                }
            }
        }
    }
    Ok(())
}

/// One single-strand consensus with its supporting-read count.
struct Sscs {
    seq: String,
    nreads: usize,
}

/// Rendered output for one barcode.
struct DuplexResult {
    /// FASTA/FASTQ text per duplex mate, present only when the full
    /// duplex formed.
    dcs: Option<[String; 2]>,
    /// FASTA/FASTQ text per `[order][mate]` single-strand consensus.
    sscs: [[Option<String>; 2]; 2],
    stats: ConsensusStats,
}

/// The order/mate composition of each duplex consensus mate.
const ORDERMATES: [[(StrandOrder, Mate); 2]; 2] = [
    [(StrandOrder::Ab, Mate::R1), (StrandOrder::Ba, Mate::R2)],
    [(StrandOrder::Ab, Mate::R2), (StrandOrder::Ba, Mate::R1)],
];

/// Builds the single-strand and duplex consensuses for one barcode.
fn process_duplex(duplex: &MsaDuplex, config: &ConsensusConfig) -> Result<DuplexResult> {
    let start = Instant::now();

    // Single-strand consensuses, indexed [order][mate]. An empty
    // consensus (every column masked or gapped) counts as absent.
    let mut sscss: [[Option<Sscs>; 2]; 2] = Default::default();
    for family in &duplex.families {
        let seqs: Vec<&str> = family.reads.iter().map(|read| read.seq.as_str()).collect();
        let quals: Vec<&str> = family.reads.iter().map(|read| read.qual.as_str()).collect();
        let consensus = call_family(&seqs, &quals, config.min_reads, &config.params)
            .with_context(|| {
                format!("while processing duplex {}, {}.{}", duplex.barcode, family.order, family.mate)
            })?;
        if let Some(seq) = consensus {
            if !seq.is_empty() {
                sscss[family.order.index()][family.mate.index()] =
                    Some(Sscs { seq, nreads: family.reads.len() });
            }
        }
    }

    // Duplex consensuses: both mates must form or neither is reported.
    let aligner = PairwiseAligner::default();
    let mut dcss: Vec<(String, (usize, usize))> = Vec::with_capacity(2);
    for pair in ORDERMATES {
        let [a, b] = pair.map(|(order, mate)| sscss[order.index()][mate.index()].as_ref());
        let (Some(a), Some(b)) = (a, b) else {
            dcss.clear();
            break;
        };
        let alignment = aligner.align(&a.seq, &b.seq, PairwiseMode::Global);
        let seq = merge_duplex(alignment.target.as_bytes(), alignment.query.as_bytes())
            .with_context(|| format!("while processing duplex {}", duplex.barcode))?;
        dcss.push((seq, (a.nreads, b.nreads)));
    }
    let dcs_complete = dcss.len() == 2 && dcss.iter().all(|(seq, _)| !seq.is_empty());

    // Render.
    let dcs = if dcs_complete {
        let mut rendered = dcss.iter().map(|(seq, (nreads1, nreads2))| {
            render(&format!("{} {nreads1}-{nreads2}", duplex.barcode), seq, config.output_qual)
        });
        Some([rendered.next().expect("two mates"), rendered.next().expect("two mates")])
    } else {
        None
    };
    let total_reads = duplex.total_reads() as u64;
    let any_sscs = sscss.iter().flatten().any(Option::is_some);
    let stats = ConsensusStats {
        total_reads,
        consensus_reads: if any_sscs { total_reads } else { 0 },
        runs: u64::from(any_sscs),
        duplexes: 0,
        consensus_secs: if any_sscs { start.elapsed().as_secs_f64() } else { 0.0 },
    };

    let mut sscs_rendered: [[Option<String>; 2]; 2] = Default::default();
    for order in StrandOrder::BOTH {
        for mate in Mate::BOTH {
            if let Some(sscs) = &sscss[order.index()][mate.index()] {
                sscs_rendered[order.index()][mate.index()] = Some(render(
                    &format!("{}.{} {}", duplex.barcode, order, sscs.nreads),
                    &sscs.seq,
                    config.output_qual,
                ));
            }
        }
    }

    Ok(DuplexResult { dcs, sscs: sscs_rendered, stats })
}

/// Formats one record as FASTA, or FASTQ with a constant quality.
fn render(header: &str, seq: &str, output_qual: Option<char>) -> String {
    match output_qual {
        None => format!(">{header}\n{seq}\n"),
        Some(qual) => {
            let quals: String = std::iter::repeat(qual).take(seq.chars().count()).collect();
            format!("@{header}\n{seq}\n+\n{quals}\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn config(min_reads: usize) -> ConsensusConfig {
        ConsensusConfig { params: ConsensusParams::default(), min_reads, output_qual: None }
    }

    fn duplex(lines: &str) -> MsaDuplex {
        AlignedFamilyReader::new(Cursor::new(lines.to_string())).next().unwrap().unwrap()
    }

    fn msa_lines(barcode: &str, order: &str, mate: &str, seqs: &[&str]) -> String {
        seqs.iter()
            .enumerate()
            .map(|(i, seq)| {
                format!("{barcode}\t{order}\t{mate}\tr{i}\t{seq}\t{}\n", "I".repeat(seq.len()))
            })
            .collect()
    }

    #[test]
    fn full_duplex_produces_both_mates_with_count_pairs() {
        let input = [
            msa_lines("AAAA", "ab", "1", &["GATTACA", "GATTACA", "GATTACA"]),
            msa_lines("AAAA", "ab", "2", &["CCCGGG", "CCCGGG", "CCCGGG"]),
            msa_lines("AAAA", "ba", "1", &["CCCGGG", "CCCGGG"]),
            msa_lines("AAAA", "ba", "2", &["GATTACA", "GATTACA"]),
        ]
        .concat();
        let result = process_duplex(&duplex(&input), &config(2)).unwrap();
        let dcs = result.dcs.expect("full duplex");
        assert_eq!(dcs[0], ">AAAA 3-2\nGATTACA\n");
        assert_eq!(dcs[1], ">AAAA 3-2\nCCCGGG\n");
    }

    #[test]
    fn strand_disagreement_becomes_iupac_code() {
        let input = [
            msa_lines("AAAA", "ab", "1", &["GATTACA", "GATTACA", "GATTACA"]),
            msa_lines("AAAA", "ab", "2", &["CCCGGG", "CCCGGG"]),
            msa_lines("AAAA", "ba", "1", &["CCCGGG", "CCCGGG"]),
            msa_lines("AAAA", "ba", "2", &["GATTTCA", "GATTTCA"]),
        ]
        .concat();
        let result = process_duplex(&duplex(&input), &config(2)).unwrap();
        let dcs = result.dcs.expect("full duplex");
        assert_eq!(dcs[0], ">AAAA 3-2\nGATTWCA\n");
    }

    #[test]
    fn missing_strand_half_suppresses_all_duplex_output() {
        let input = [
            msa_lines("AAAA", "ab", "1", &["GATTACA", "GATTACA"]),
            msa_lines("AAAA", "ab", "2", &["CCCGGG", "CCCGGG"]),
            // ba strand entirely absent.
        ]
        .concat();
        let result = process_duplex(&duplex(&input), &config(2)).unwrap();
        assert!(result.dcs.is_none());
        // The ab single-strand consensuses still exist.
        assert!(result.sscs[0][0].is_some());
        assert!(result.sscs[0][1].is_some());
    }

    #[test]
    fn small_families_produce_no_consensus() {
        let input = [
            msa_lines("AAAA", "ab", "1", &["GATTACA", "GATTACA"]),
            msa_lines("AAAA", "ab", "2", &["CCCGGG", "CCCGGG"]),
        ]
        .concat();
        let result = process_duplex(&duplex(&input), &config(3)).unwrap();
        assert!(result.dcs.is_none());
        assert!(result.sscs.iter().flatten().all(Option::is_none));
        assert_eq!(result.stats.runs, 0);
    }

    #[test]
    fn sscs_headers_carry_order_and_count() {
        let input = [
            msa_lines("AAAA", "ba", "1", &["GATT", "GATT", "GATT"]),
            msa_lines("AAAA", "ba", "2", &["CCGG", "CCGG", "CCGG"]),
        ]
        .concat();
        let result = process_duplex(&duplex(&input), &config(3)).unwrap();
        assert_eq!(result.sscs[1][0].as_deref(), Some(">AAAA.ba 3\nGATT\n"));
        assert_eq!(result.sscs[1][1].as_deref(), Some(">AAAA.ba 3\nCCGG\n"));
    }

    #[test]
    fn single_read_families_form_duplexes_verbatim() {
        let input = [
            msa_lines("AAAA", "ab", "1", &["GATTACA"]),
            msa_lines("AAAA", "ab", "2", &["CCGG"]),
            msa_lines("AAAA", "ba", "1", &["CCGG"]),
            msa_lines("AAAA", "ba", "2", &["GATTACA"]),
        ]
        .concat();
        let result = process_duplex(&duplex(&input), &config(3)).unwrap();
        let dcs = result.dcs.expect("verbatim single-read halves");
        assert_eq!(dcs[0], ">AAAA 1-1\nGATTACA\n");
    }

    #[test]
    fn fastq_rendering_uses_constant_quality() {
        assert_eq!(render("X 1-1", "ACGT", Some('I')), "@X 1-1\nACGT\n+\nIIII\n");
        assert_eq!(render("X 1-1", "ACGT", None), ">X 1-1\nACGT\n");
    }
}
