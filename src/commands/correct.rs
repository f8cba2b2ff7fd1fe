//! Barcode correction from a barcode self-alignment.
//!
//! Barcodes are aligned against themselves upstream; the filtered
//! alignments define a graph whose connected components are presumed to
//! be one true barcode plus error variants. One canonical barcode is
//! chosen per component, and the families file is rewritten with every
//! member mapped to it. A correction can also reverse the two barcode
//! halves, in which case the record's strand order flips; reversal is
//! confirmed by a local alignment of the raw barcode against the
//! canonical barcode and its half-swapped form, gated by a cheap
//! set-membership pre-filter so most corrections never pay for the
//! alignment.
//!
//! The correction map is built in full before any output is written, so
//! the rewritten file is never a mix of corrected and uncorrected
//! barcodes.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result, bail};
use clap::Parser;
use fgoxide::io::Io;
use itertools::Itertools;
use log::{debug, info, warn};
use noodles::sam;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::alignment::record_buf::data::field::Value;

use dupcall_align::{PairwiseAligner, PairwiseMode};
use dupcall_graph::{BarcodeGraph, ChoosePolicy, Structure, half_swapped};
use dupcall_lib::families::family_counts;
use dupcall_lib::fastaq::read_barcode_list;
use dupcall_lib::logging::{OperationTimer, format_count};
use dupcall_lib::metrics::{CorrectStats, write_stats};

use crate::commands::command::Command;
use crate::commands::common::StatsOptions;

/// CLI choice of canonical-barcode policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum ChooseBy {
    /// The barcode observed on the most read pairs wins.
    #[default]
    Count,
    /// The barcode most connected within its component wins.
    Connect,
}

impl From<ChooseBy> for ChoosePolicy {
    fn from(choice: ChooseBy) -> Self {
        match choice {
            ChooseBy::Count => ChoosePolicy::Count,
            ChooseBy::Connect => ChoosePolicy::Connect,
        }
    }
}

/// Correct barcodes using an alignment of all barcodes to themselves.
#[derive(Parser, Debug)]
#[command(
    about = "Correct barcodes using an alignment of all barcodes to themselves",
    long_about = "Correct barcodes using an alignment of all barcodes to themselves. Reads \
                  the alignment in SAM format and rewrites the barcode (and possibly order) \
                  columns of the families file. The alignment's read names must be integers \
                  giving each barcode's 1-based position in the barcode list, and a \
                  reference name may carry a \":rev\" suffix marking a reference stored \
                  with its halves swapped."
)]
pub struct CorrectBarcodes {
    /// The sorted families TSV whose barcodes should be corrected.
    families: PathBuf,

    /// The FASTA/FASTQ barcode list given to the aligner.
    reads: PathBuf,

    /// Barcode self-alignment, in SAM format.
    sam: PathBuf,

    /// Output families TSV with corrected barcode and order columns.
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Prepend the corrected barcode and order to the original columns
    /// instead of replacing them.
    #[arg(short = 'P', long = "prepend")]
    prepend: bool,

    /// NM edit distance threshold.
    #[arg(short = 'd', long = "dist", default_value_t = 3)]
    dist: u32,

    /// MAPQ threshold.
    #[arg(short = 'm', long = "mapq", default_value_t = 20)]
    mapq: u8,

    /// POS tolerance: alignments are ignored when abs(POS - 1) exceeds
    /// this. Set it greater than the barcode length for no threshold.
    #[arg(short = 'p', long = "pos", default_value_t = 2)]
    pos: u64,

    /// How to choose the canonical barcode of a component.
    #[arg(short = 'c', long = "choose-by", value_enum, default_value_t = ChooseBy::Count)]
    choose_by: ChooseBy,

    /// Allow alignments with missing NM tags when the barcode contains
    /// at least one N; otherwise a missing NM tag is an error.
    #[arg(short = 'N', long = "allow-no-nm-if-ns")]
    allow_no_nm_if_ns: bool,

    /// Don't check that the two reads of a pair have matching names.
    #[arg(short = 'I', long = "no-check-ids")]
    no_check_ids: bool,

    /// Limit the number of entries read from each input, for testing.
    #[arg(long = "limit")]
    limit: Option<u64>,

    /// Print the unique component shapes (isomorphism classes).
    #[arg(short = 'S', long = "structures")]
    structures: bool,

    /// Print the shape table in a human-readable layout.
    #[arg(long = "struct-human")]
    struct_human: bool,

    /// Build the graph and report, but write no corrected output.
    #[arg(short = 'n', long = "no-output")]
    no_output: bool,

    #[command(flatten)]
    stats: StatsOptions,
}

impl Command for CorrectBarcodes {
    fn execute(&self) -> Result<()> {
        let io = Io::default();
        let timer = OperationTimer::new("Correcting barcodes");

        info!("Reading the barcode list to map read names to barcodes..");
        let barcodes = read_barcode_list(&self.reads, self.limit)?;
        info!("{} barcodes", format_count(barcodes.len() as u64));

        info!("Reading the alignment to build the graph of barcode relationships..");
        let sam_reader = io
            .new_reader(&self.sam)
            .with_context(|| format!("opening {}", self.sam.display()))?;
        let filters = AlignmentFilters {
            pos_tolerance: self.pos,
            min_mapq: self.mapq,
            max_dist: i64::from(self.dist),
            allow_no_nm_if_ns: self.allow_no_nm_if_ns,
        };
        let (graph, reversed, good_alignments) =
            read_alignments(sam_reader, &barcodes, &filters, self.limit)?;
        info!("{} good alignments", format_count(good_alignments));

        info!("Reading the families file to get the counts of each family..");
        let families_reader = io
            .new_reader(&self.families)
            .with_context(|| format!("opening {}", self.families.display()))?;
        let (counts, read_pairs) = family_counts(families_reader, !self.no_check_ids, self.limit)?;

        let count_of = |barcode: &str| counts.get(barcode).map_or(0, |count| count.total());

        if self.structures {
            info!("Counting the unique barcode networks..");
            let structures = graph.count_structures(count_of);
            print_structures(structures, self.struct_human);
        }

        info!("Building the correction table from the graph..");
        let corrections = graph.correction_table(self.choose_by.into(), count_of);
        info!("{} corrections", format_count(corrections.len() as u64));

        info!("Reading the families file again to write corrected output..");
        let families_reader = io
            .new_reader(&self.families)
            .with_context(|| format!("opening {}", self.families.display()))?;
        let mut writer = io
            .new_writer(&self.output)
            .with_context(|| format!("creating {}", self.output.display()))?;
        let corrected = rewrite_families(
            families_reader,
            &mut writer,
            &corrections,
            &reversed,
            self.prepend,
            !self.no_output,
            self.limit,
        )?;
        writer.flush()?;

        info!(
            "Corrected {} barcodes on {} read pairs, with {} reversed.",
            format_count(corrected.barcodes),
            format_count(corrected.reads),
            corrected.reversed
        );
        timer.log_completion(read_pairs);

        if let Some(path) = &self.stats.stats {
            let stats = CorrectStats {
                barcodes: barcodes.len() as u64,
                good_alignments,
                read_pairs,
                corrected_barcodes: corrected.barcodes,
                corrected_reads: corrected.reads,
                reversed: corrected.reversed,
            };
            write_stats(path, &stats)?;
        }
        Ok(())
    }
}

/// Quality filters applied to each self-alignment record.
struct AlignmentFilters {
    pos_tolerance: u64,
    min_mapq: u8,
    max_dist: i64,
    allow_no_nm_if_ns: bool,
}

/// One filtered self-alignment: query index, reference index, and
/// whether the reference was stored with swapped halves.
type PassingAlignment = (u64, u64, bool);

/// Applies the quality filters to one alignment record.
///
/// Returns `Ok(None)` for records that are skipped (unmapped,
/// self-alignments, or threshold failures); a missing NM tag is an error
/// unless the sequence contains an N and the allow flag is set.
fn passing_alignment(
    record: &RecordBuf,
    header: &sam::Header,
    filters: &AlignmentFilters,
) -> Result<Option<PassingAlignment>> {
    let Some(reference_id) = record.reference_sequence_id() else {
        return Ok(None);
    };
    if record.flags().is_unmapped() {
        return Ok(None);
    }

    let (rname_raw, _) = header
        .reference_sequences()
        .get_index(reference_id)
        .with_context(|| format!("reference id {reference_id} not in the SAM header"))?;
    let rname_text =
        std::str::from_utf8(rname_raw.as_ref()).context("non-UTF-8 reference name")?;
    let (rname_text, is_reversed) = match rname_text.strip_suffix(":rev") {
        Some(stripped) => (stripped, true),
        None => (rname_text, false),
    };

    let qname_raw = record.name().context("alignment record missing a read name")?;
    let qname_text = std::str::from_utf8(qname_raw.as_ref()).context("non-UTF-8 read name")?;
    let qname: u64 = qname_text
        .parse()
        .with_context(|| format!("non-integer read name in alignment: {qname_text:?}"))?;
    let rname: u64 = rname_text
        .parse()
        .with_context(|| format!("non-integer reference name in alignment: {rname_text:?}"))?;
    if qname == rname {
        return Ok(None);
    }

    let Some(position) = record.alignment_start() else {
        warn!("alignment of {qname} to {rname} is missing a position");
        return Ok(None);
    };
    if (position.get() as u64).abs_diff(1) > filters.pos_tolerance {
        return Ok(None);
    }
    let Some(mapq) = record.mapping_quality() else {
        warn!("alignment of {qname} to {rname} is missing a mapping quality");
        return Ok(None);
    };
    if mapq.get() < filters.min_mapq {
        return Ok(None);
    }

    let distance = record.data().get(&Tag::from([b'N', b'M'])).and_then(Value::as_int);
    match distance {
        None => {
            if filters.allow_no_nm_if_ns && record.sequence().as_ref().contains(&b'N') {
                debug!("alignment of {qname} missing NM, likely due to N's in the barcode");
                Ok(None)
            } else {
                bail!("alignment of {qname} to {rname} is missing an NM tag")
            }
        }
        Some(distance) if distance > filters.max_dist => Ok(None),
        Some(_) => Ok(Some((qname, rname, is_reversed))),
    }
}

/// Builds the barcode graph from the filtered alignment stream.
///
/// Returns the graph, the set of barcode sequences that took part in at
/// least one reversed alignment (query and reference both), and the
/// number of passing alignments.
fn read_alignments<R: BufRead>(
    reader: R,
    barcodes: &AHashMap<u64, String>,
    filters: &AlignmentFilters,
    limit: Option<u64>,
) -> Result<(BarcodeGraph, AHashSet<String>, u64)> {
    let mut sam_reader = sam::io::Reader::new(reader);
    let header = sam_reader.read_header().context("reading SAM header")?;

    let mut graph = BarcodeGraph::new();
    let mut reversed: AHashSet<String> = AHashSet::new();
    let mut good_alignments = 0u64;
    let mut records = 0u64;
    for result in sam_reader.record_bufs(&header) {
        let record = result.context("reading SAM record")?;
        records += 1;
        if limit.is_some_and(|limit| records > limit) {
            break;
        }
        let Some((qname, rname, is_reversed)) = passing_alignment(&record, &header, filters)?
        else {
            continue;
        };
        let lookup = |index: u64| {
            barcodes
                .get(&index)
                .map(String::as_str)
                .with_context(|| format!("barcode index {index} not in the barcode list"))
        };
        let qseq = lookup(qname)?;
        let rseq = lookup(rname)?;
        if is_reversed {
            reversed.insert(qseq.to_string());
            reversed.insert(rseq.to_string());
        }
        graph.add_edge(rseq, qseq);
        good_alignments += 1;
    }
    Ok((graph, reversed, good_alignments))
}

/// Returns true when two barcodes align better with one of them
/// half-swapped, i.e. their alpha and beta halves are reversed with
/// respect to each other. Both alignments are local.
fn is_alignment_reversed(aligner: &PairwiseAligner, barcode1: &str, barcode2: &str) -> bool {
    let swapped = half_swapped(barcode2);
    let forward = aligner.align(barcode1, barcode2, PairwiseMode::Local);
    let reverse = aligner.align(barcode1, &swapped, PairwiseMode::Local);
    reverse.score > forward.score
}

/// Counts from the corrected rewrite pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RewriteCounts {
    /// Families with at least one corrected read pair.
    barcodes: u64,
    /// Read pairs whose barcode was corrected.
    reads: u64,
    /// Corrections that also flipped the strand order.
    reversed: u64,
}

/// Rewrites the families stream with corrected barcodes (and orders).
///
/// The reversal check runs only for corrections where either side took
/// part in a reversed alignment, and its verdict is cached per raw
/// barcode since the correction map is fixed.
fn rewrite_families<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    corrections: &AHashMap<String, String>,
    reversed: &AHashSet<String>,
    prepend: bool,
    output: bool,
    limit: Option<u64>,
) -> Result<RewriteCounts> {
    let aligner = PairwiseAligner::default();
    let mut reversal_cache: AHashMap<String, bool> = AHashMap::new();
    let mut counts = RewriteCounts::default();

    let mut barcode_last: Option<String> = None;
    let mut corrections_in_family = 0u64;
    let mut line_num = 0u64;

    let close_family = |counts: &mut RewriteCounts, corrections_in_family: u64| {
        if corrections_in_family > 0 {
            counts.reads += corrections_in_family;
            counts.barcodes += 1;
        }
    };

    for line in reader.lines() {
        let line = line?;
        line_num += 1;
        if limit.is_some_and(|limit| line_num > limit) {
            break;
        }
        let trimmed = line.trim_end_matches('\r');
        let fields: Vec<&str> = trimmed.split('\t').collect();
        if fields.len() < 2 {
            continue;
        }
        let raw_barcode = fields[0];
        let order = fields[1];

        if barcode_last.as_deref() != Some(raw_barcode) {
            if barcode_last.is_some() {
                close_family(&mut counts, corrections_in_family);
            }
            debug!("family {raw_barcode}");
            corrections_in_family = 0;
            barcode_last = Some(raw_barcode.to_string());
        }

        let (correct_barcode, correct_order) = match corrections.get(raw_barcode) {
            Some(canonical) => {
                corrections_in_family += 1;
                // Cheap set-membership pre-filter before the expensive
                // alignment-based reversal confirmation.
                let prefilter = reversed.contains(raw_barcode) || reversed.contains(canonical);
                let flipped = prefilter
                    && *reversal_cache.entry(raw_barcode.to_string()).or_insert_with(|| {
                        is_alignment_reversed(&aligner, raw_barcode, canonical)
                    });
                if flipped {
                    counts.reversed += 1;
                    let flipped_order = match order {
                        "ab" => "ba",
                        "ba" => "ab",
                        other => other,
                    };
                    (canonical.as_str(), flipped_order)
                } else {
                    (canonical.as_str(), order)
                }
            }
            None => (raw_barcode, order),
        };

        if output {
            if prepend {
                writeln!(writer, "{correct_barcode}\t{correct_order}\t{trimmed}")?;
            } else {
                let rest = fields[2..].join("\t");
                if rest.is_empty() {
                    writeln!(writer, "{correct_barcode}\t{correct_order}")?;
                } else {
                    writeln!(writer, "{correct_barcode}\t{correct_order}\t{rest}")?;
                }
            }
        }
    }
    if barcode_last.is_some() {
        close_family(&mut counts, corrections_in_family);
    }
    Ok(counts)
}

/// Translates a 1-based number to letters (1 -> A, 26 -> Z, 27 -> AA).
fn num_to_letters(mut i: usize) -> String {
    let mut letters = String::new();
    while i > 0 {
        let n = (i - 1) % 26;
        i /= 26;
        if n == 25 {
            i -= 1;
        }
        letters.insert(0, char::from(b'A' + n as u8));
    }
    letters
}

/// Prints the component-shape table, smallest shapes first, then most
/// frequent first.
fn print_structures(mut structures: Vec<Structure>, human: bool) {
    structures.sort_by(|a, b| a.size.cmp(&b.size).then(b.count.cmp(&a.count)));
    let mut index_within_size = 0;
    let mut last_size = None;
    for structure in &structures {
        if last_size == Some(structure.size) {
            index_within_size += 1;
        } else {
            index_within_size = 1;
        }
        let letters = num_to_letters(index_within_size);
        if human {
            let degrees = structure.degrees.iter().join(" ");
            println!(
                "{:2}{:<3} {:<6} {:<6} {}",
                structure.size,
                format!("{letters}:"),
                structure.count,
                structure.central,
                degrees
            );
        } else {
            let degrees = structure.degrees.iter().join(",");
            println!(
                "{}\t{}\t{}\t{}\t{}",
                structure.size, letters, structure.count, structure.central, degrees
            );
        }
        last_size = Some(structure.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAM_HEADER: &str = "@HD\tVN:1.6\n\
                              @SQ\tSN:1\tLN:8\n\
                              @SQ\tSN:2\tLN:8\n\
                              @SQ\tSN:3:rev\tLN:8\n";

    fn filters() -> AlignmentFilters {
        AlignmentFilters { pos_tolerance: 2, min_mapq: 20, max_dist: 3, allow_no_nm_if_ns: false }
    }

    fn barcodes() -> AHashMap<u64, String> {
        [
            (1, "AAAATTTT".to_string()),
            (2, "AAAATTTA".to_string()),
            (3, "TTTTAAAA".to_string()),
        ]
        .into_iter()
        .collect()
    }

    fn sam_line(qname: &str, rname: &str, pos: u32, mapq: u8, nm: Option<u32>) -> String {
        let tags = nm.map(|nm| format!("\tNM:i:{nm}")).unwrap_or_default();
        format!("{qname}\t0\t{rname}\t{pos}\t{mapq}\t8M\t*\t0\t0\tAAAATTTT\tIIIIIIII{tags}\n")
    }

    fn run_read_alignments(
        body: &str,
        filters: &AlignmentFilters,
    ) -> (BarcodeGraph, AHashSet<String>, u64) {
        let text = format!("{SAM_HEADER}{body}");
        read_alignments(Cursor::new(text.into_bytes()), &barcodes(), filters, None).unwrap()
    }

    #[test]
    fn passing_alignment_builds_an_edge() {
        let (graph, reversed, good) = run_read_alignments(&sam_line("2", "1", 1, 40, Some(1)), &filters());
        assert_eq!(good, 1);
        assert_eq!(graph.len(), 2);
        assert!(reversed.is_empty());
    }

    #[test]
    fn self_alignments_are_skipped() {
        let (graph, _, good) = run_read_alignments(&sam_line("1", "1", 1, 40, Some(0)), &filters());
        assert_eq!(good, 0);
        assert!(graph.is_empty());
    }

    #[test]
    fn threshold_failures_are_skipped() {
        // Position too far from the anchor.
        let (_, _, good) = run_read_alignments(&sam_line("2", "1", 7, 40, Some(1)), &filters());
        assert_eq!(good, 0);
        // MAPQ too low.
        let (_, _, good) = run_read_alignments(&sam_line("2", "1", 1, 5, Some(1)), &filters());
        assert_eq!(good, 0);
        // Edit distance too high.
        let (_, _, good) = run_read_alignments(&sam_line("2", "1", 1, 40, Some(4)), &filters());
        assert_eq!(good, 0);
        // At the thresholds, everything passes.
        let (_, _, good) = run_read_alignments(&sam_line("2", "1", 3, 20, Some(3)), &filters());
        assert_eq!(good, 1);
    }

    #[test]
    fn rev_suffix_marks_both_barcodes_reversed() {
        let (graph, reversed, good) =
            run_read_alignments(&sam_line("1", "3:rev", 1, 40, Some(0)), &filters());
        assert_eq!(good, 1);
        assert_eq!(graph.len(), 2);
        assert!(reversed.contains("AAAATTTT"));
        assert!(reversed.contains("TTTTAAAA"));
    }

    #[test]
    fn missing_nm_is_fatal_without_the_allow_flag() {
        let text = format!("{SAM_HEADER}{}", sam_line("2", "1", 1, 40, None));
        let result =
            read_alignments(Cursor::new(text.into_bytes()), &barcodes(), &filters(), None);
        assert!(result.is_err());
    }

    #[test]
    fn reversal_needs_a_strictly_higher_swapped_score() {
        let aligner = PairwiseAligner::default();
        // A barcode identical to the half-swap of its partner.
        assert!(is_alignment_reversed(&aligner, "TTTTAAAA", "AAAATTTT"));
        // Identical barcodes: equal scores must not count as reversed.
        assert!(!is_alignment_reversed(&aligner, "AAAATTTT", "AAAATTTT"));
    }

    #[test]
    fn rewrite_replaces_barcode_and_counts_families() {
        let corrections: AHashMap<String, String> =
            [("AAAT".to_string(), "AAAA".to_string())].into_iter().collect();
        let reversed = AHashSet::new();
        let input = "AAAT\tab\tr1/1\tG\tI\tr1/2\tC\tI\n\
                     CCCC\tab\tr2/1\tG\tI\tr2/2\tC\tI\n";
        let mut out = Vec::new();
        let counts = rewrite_families(
            Cursor::new(input),
            &mut out,
            &corrections,
            &reversed,
            false,
            true,
            None,
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("AAAA\tab\t"));
        assert!(lines[1].starts_with("CCCC\tab\t"));
        assert_eq!(counts, RewriteCounts { barcodes: 1, reads: 1, reversed: 0 });
    }

    #[test]
    fn rewrite_flips_order_for_reversed_corrections() {
        let corrections: AHashMap<String, String> =
            [("TTTTAAAA".to_string(), "AAAATTTT".to_string())].into_iter().collect();
        let reversed: AHashSet<String> = [String::from("TTTTAAAA")].into_iter().collect();
        let input = "TTTTAAAA\tab\tr1/1\tG\tI\tr1/2\tC\tI\n";
        let mut out = Vec::new();
        let counts = rewrite_families(
            Cursor::new(input),
            &mut out,
            &corrections,
            &reversed,
            false,
            true,
            None,
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("AAAATTTT\tba\t"), "order must flip: {text}");
        assert_eq!(counts.reversed, 1);
    }

    #[test]
    fn rewrite_prepend_keeps_original_columns() {
        let corrections: AHashMap<String, String> =
            [("AAAT".to_string(), "AAAA".to_string())].into_iter().collect();
        let input = "AAAT\tab\tr1/1\tG\tI\tr1/2\tC\tI\n";
        let mut out = Vec::new();
        rewrite_families(
            Cursor::new(input),
            &mut out,
            &corrections,
            &AHashSet::new(),
            true,
            true,
            None,
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "AAAA\tab\tAAAT\tab\tr1/1\tG\tI\tr1/2\tC\tI\n");
    }

    #[test]
    fn rewrite_no_output_still_counts() {
        let corrections: AHashMap<String, String> =
            [("AAAT".to_string(), "AAAA".to_string())].into_iter().collect();
        let input = "AAAT\tab\tr1/1\tG\tI\tr1/2\tC\tI\n";
        let mut out = Vec::new();
        let counts = rewrite_families(
            Cursor::new(input),
            &mut out,
            &corrections,
            &AHashSet::new(),
            false,
            false,
            None,
        )
        .unwrap();
        assert!(out.is_empty());
        assert_eq!(counts.barcodes, 1);
    }

    #[test]
    fn letters_count_like_spreadsheet_columns() {
        assert_eq!(num_to_letters(1), "A");
        assert_eq!(num_to_letters(2), "B");
        assert_eq!(num_to_letters(26), "Z");
        assert_eq!(num_to_letters(27), "AA");
    }
}
