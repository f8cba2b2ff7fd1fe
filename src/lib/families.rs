//! The barcode/strand/mate family data model and the streaming readers
//! that assemble families from sorted family files.
//!
//! A family file is sorted by barcode, then strand order, then (in the
//! aligned format) mate, so a whole [`BarFamily`] can be assembled from a
//! single forward pass holding only one barcode's reads in memory. The
//! nesting is a fixed-shape tree - `BarFamily` → [`StrandFamily`] →
//! [`ReadFamily`] - with explicit empty members rather than absent ones,
//! and all mate/order selection goes through the [`Mate`] and
//! [`StrandOrder`] enums.

use std::fmt;
use std::io::BufRead;

use ahash::AHashMap;

use crate::errors::{DupcallError, Result};

/// The two read-through orientations of the two-part barcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrandOrder {
    /// Alpha half first.
    Ab,
    /// Beta half first.
    Ba,
}

impl StrandOrder {
    /// Both orders, in file-sort order.
    pub const BOTH: [StrandOrder; 2] = [StrandOrder::Ab, StrandOrder::Ba];

    /// The order's text form (`ab` / `ba`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ab => "ab",
            Self::Ba => "ba",
        }
    }

    /// Parses `ab` / `ba`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "ab" => Some(Self::Ab),
            "ba" => Some(Self::Ba),
            _ => None,
        }
    }

    /// The opposite order, used when a barcode correction reverses the
    /// barcode halves.
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Ab => Self::Ba,
            Self::Ba => Self::Ab,
        }
    }

    /// Index into order-shaped arrays.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Ab => 0,
            Self::Ba => 1,
        }
    }
}

impl fmt::Display for StrandOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two mates of a read pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mate {
    /// First mate.
    R1,
    /// Second mate.
    R2,
}

impl Mate {
    /// Both mates, in file-sort order.
    pub const BOTH: [Mate; 2] = [Mate::R1, Mate::R2];

    /// The mate's text form (`1` / `2`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::R1 => "1",
            Self::R2 => "2",
        }
    }

    /// Parses `1` / `2`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "1" => Some(Self::R1),
            "2" => Some(Self::R2),
            _ => None,
        }
    }

    /// Index into mate-shaped arrays.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::R1 => 0,
            Self::R2 => 1,
        }
    }
}

impl fmt::Display for Mate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One read: name, sequence, and quality string of equal length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqRead {
    /// Read name.
    pub name: String,
    /// Base sequence.
    pub seq: String,
    /// Per-base quality characters.
    pub qual: String,
}

impl SeqRead {
    /// Creates a read.
    pub fn new(
        name: impl Into<String>,
        seq: impl Into<String>,
        qual: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), seq: seq.into(), qual: qual.into() }
    }
}

/// All reads with one barcode, strand order, and mate.
#[derive(Debug, Clone)]
pub struct ReadFamily {
    /// Which mate these reads are.
    pub mate: Mate,
    /// The reads, in input order.
    pub reads: Vec<SeqRead>,
}

impl ReadFamily {
    /// An empty family for the given mate.
    #[must_use]
    pub fn empty(mate: Mate) -> Self {
        Self { mate, reads: Vec::new() }
    }

    /// Number of reads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    /// True when the family holds no reads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }
}

/// The two mate families of one strand orientation.
#[derive(Debug, Clone)]
pub struct StrandFamily {
    /// The strand orientation.
    pub order: StrandOrder,
    mates: [ReadFamily; 2],
}

impl StrandFamily {
    /// A strand family with no reads in either mate.
    #[must_use]
    pub fn empty(order: StrandOrder) -> Self {
        Self { order, mates: [ReadFamily::empty(Mate::R1), ReadFamily::empty(Mate::R2)] }
    }

    /// The family for one mate.
    #[must_use]
    pub fn mate(&self, mate: Mate) -> &ReadFamily {
        &self.mates[mate.index()]
    }

    fn push_pair(&mut self, read1: SeqRead, read2: SeqRead) {
        self.mates[0].reads.push(read1);
        self.mates[1].reads.push(read2);
    }

    /// Number of read pairs on this strand.
    #[must_use]
    pub fn read_pairs(&self) -> usize {
        self.mates[0].len()
    }
}

/// Everything belonging to one barcode: both strand orientations, either
/// of which may be empty.
#[derive(Debug, Clone)]
pub struct BarFamily {
    /// The (possibly corrected) barcode.
    pub barcode: String,
    strands: [StrandFamily; 2],
}

impl BarFamily {
    fn from_strands(barcode: String, observed: Vec<StrandFamily>) -> Result<Self> {
        let mut slots: [Option<StrandFamily>; 2] = [None, None];
        for strand in observed {
            let slot = &mut slots[strand.order.index()];
            if slot.is_some() {
                return Err(DupcallError::TooManyOrders { barcode });
            }
            *slot = Some(strand);
        }
        let [ab, ba] = slots;
        Ok(Self {
            barcode,
            strands: [
                ab.unwrap_or_else(|| StrandFamily::empty(StrandOrder::Ab)),
                ba.unwrap_or_else(|| StrandFamily::empty(StrandOrder::Ba)),
            ],
        })
    }

    /// The family for one strand orientation.
    #[must_use]
    pub fn strand(&self, order: StrandOrder) -> &StrandFamily {
        &self.strands[order.index()]
    }

    /// Total read pairs across both strands.
    #[must_use]
    pub fn read_pairs(&self) -> usize {
        self.strands.iter().map(StrandFamily::read_pairs).sum()
    }
}

/// Per-barcode read-pair counts by strand order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FamilyCount {
    /// Read pairs with order `ab`.
    pub ab: u64,
    /// Read pairs with order `ba`.
    pub ba: u64,
}

impl FamilyCount {
    /// Total read pairs for the barcode.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.ab + self.ba
    }

    fn bump(&mut self, order: StrandOrder) {
        match order {
            StrandOrder::Ab => self.ab += 1,
            StrandOrder::Ba => self.ba += 1,
        }
    }
}

/// Verifies that a read pair's names match.
///
/// The first whitespace-delimited token is compared after stripping one
/// trailing `/1` from mate 1 and `/2` from mate 2. A mate 1 name ending
/// in `/2` paired with a mate 2 name ending in `/1` is reported as the
/// distinct swapped-mates error.
pub fn check_read_ids(name1: &str, name2: &str) -> Result<()> {
    let id1_full = name1.split_whitespace().next().unwrap_or("");
    let id2_full = name2.split_whitespace().next().unwrap_or("");
    let id1 = id1_full.strip_suffix("/1").unwrap_or(id1_full);
    let id2 = id2_full.strip_suffix("/2").unwrap_or(id2_full);
    if id1 == id2 {
        Ok(())
    } else if id1.ends_with("/2") && id2.ends_with("/1") {
        Err(DupcallError::SwappedMates { name1: name1.to_string(), name2: name2.to_string() })
    } else {
        Err(DupcallError::ReadNameMismatch { name1: name1.to_string(), name2: name2.to_string() })
    }
}

/// One parsed line of the grouped-families format.
#[derive(Debug, Clone)]
pub struct PairRecord {
    /// The barcode column.
    pub barcode: String,
    /// The strand-order column.
    pub order: StrandOrder,
    /// Mate 1 read.
    pub read1: SeqRead,
    /// Mate 2 read.
    pub read2: SeqRead,
}

/// Streaming reader over the grouped-families format, yielding one fully
/// populated [`BarFamily`] per distinct barcode, in input order.
///
/// Lines with the wrong column count and `#` comments are silently
/// skipped. With `prepended` set, records carry the corrected barcode and
/// order prepended to the original columns (10 columns) and the original
/// pair is dropped.
pub struct GroupedFamilyReader<B> {
    reader: B,
    check_ids: bool,
    prepended: bool,
    line_num: u64,
    pending: Option<PairRecord>,
    done: bool,
}

impl<B: BufRead> GroupedFamilyReader<B> {
    /// Creates a reader with read-name checking enabled.
    pub fn new(reader: B) -> Self {
        Self::with_options(reader, true, false)
    }

    /// Creates a reader with explicit options.
    pub fn with_options(reader: B, check_ids: bool, prepended: bool) -> Self {
        Self { reader, check_ids, prepended, line_num: 0, pending: None, done: false }
    }

    /// Reads the next well-formed record, skipping comments and lines
    /// with the wrong column count.
    fn read_record(&mut self) -> Result<Option<PairRecord>> {
        let expected_columns = if self.prepended { 10 } else { 8 };
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_num += 1;
            if line.starts_with('#') {
                continue;
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            let fields: Vec<&str> = trimmed.split('\t').collect();
            if fields.len() != expected_columns {
                continue;
            }
            // In prepended input the corrected barcode and order come
            // first; the original pair behind them is dropped.
            let offset = if self.prepended { 2 } else { 0 };
            let order = StrandOrder::parse(fields[1]).ok_or_else(|| DupcallError::Format {
                line: self.line_num,
                reason: format!("invalid order: {:?}", fields[1]),
            })?;
            let (name1, name2) = (fields[offset + 2], fields[offset + 5]);
            if self.check_ids {
                check_read_ids(name1, name2)?;
            }
            return Ok(Some(PairRecord {
                barcode: fields[0].to_string(),
                order,
                read1: SeqRead::new(name1, fields[offset + 3], fields[offset + 4]),
                read2: SeqRead::new(name2, fields[offset + 6], fields[offset + 7]),
            }));
        }
    }
}

impl<B: BufRead> Iterator for GroupedFamilyReader<B> {
    type Item = Result<BarFamily>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let first = if let Some(record) = self.pending.take() {
            record
        } else {
            match self.read_record() {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        };

        let barcode = first.barcode.clone();
        let mut strands = Vec::new();
        let mut current = StrandFamily::empty(first.order);
        current.push_pair(first.read1, first.read2);

        loop {
            match self.read_record() {
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Ok(None) => {
                    self.done = true;
                    strands.push(current);
                    return Some(BarFamily::from_strands(barcode, strands));
                }
                Ok(Some(record)) => {
                    if record.barcode != barcode {
                        self.pending = Some(record);
                        strands.push(current);
                        return Some(BarFamily::from_strands(barcode, strands));
                    }
                    if record.order != current.order {
                        strands.push(current);
                        current = StrandFamily::empty(record.order);
                    }
                    current.push_pair(record.read1, record.read2);
                }
            }
        }
    }
}

/// One read family of the aligned-families format: all aligned reads for
/// one (barcode, order, mate).
#[derive(Debug, Clone)]
pub struct MsaFamily {
    /// The strand orientation.
    pub order: StrandOrder,
    /// Which mate.
    pub mate: Mate,
    /// Aligned reads (gap-padded sequences, gap-blanked qualities).
    pub reads: Vec<SeqRead>,
}

/// All aligned families for one barcode: at most one per (order, mate).
#[derive(Debug, Clone)]
pub struct MsaDuplex {
    /// The barcode.
    pub barcode: String,
    /// The families, in input order.
    pub families: Vec<MsaFamily>,
}

impl MsaDuplex {
    /// The family for one order/mate combination, if present.
    #[must_use]
    pub fn family(&self, order: StrandOrder, mate: Mate) -> Option<&MsaFamily> {
        self.families.iter().find(|f| f.order == order && f.mate == mate)
    }

    /// Total reads across all families.
    #[must_use]
    pub fn total_reads(&self) -> usize {
        self.families.iter().map(|f| f.reads.len()).sum()
    }
}

/// Streaming reader over the aligned-families format (6 tab-separated
/// columns), yielding one [`MsaDuplex`] per barcode.
pub struct AlignedFamilyReader<B> {
    reader: B,
    line_num: u64,
    pending: Option<(String, StrandOrder, Mate, SeqRead)>,
    done: bool,
}

impl<B: BufRead> AlignedFamilyReader<B> {
    /// Creates a reader.
    pub fn new(reader: B) -> Self {
        Self { reader, line_num: 0, pending: None, done: false }
    }

    fn read_record(&mut self) -> Result<Option<(String, StrandOrder, Mate, SeqRead)>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_num += 1;
            if line.starts_with('#') {
                continue;
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            let fields: Vec<&str> = trimmed.split('\t').collect();
            if fields.len() != 6 {
                continue;
            }
            let order = StrandOrder::parse(fields[1]).ok_or_else(|| DupcallError::Format {
                line: self.line_num,
                reason: format!("invalid order: {:?}", fields[1]),
            })?;
            let mate = Mate::parse(fields[2]).ok_or_else(|| DupcallError::Format {
                line: self.line_num,
                reason: format!("invalid mate: {:?}", fields[2]),
            })?;
            let read = SeqRead::new(fields[3], fields[4], fields[5]);
            return Ok(Some((fields[0].to_string(), order, mate, read)));
        }
    }
}

impl<B: BufRead> Iterator for AlignedFamilyReader<B> {
    type Item = Result<MsaDuplex>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let (barcode, order, mate, read) = if let Some(record) = self.pending.take() {
            record
        } else {
            match self.read_record() {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        };

        let mut duplex = MsaDuplex { barcode, families: Vec::new() };
        duplex.families.push(MsaFamily { order, mate, reads: vec![read] });

        loop {
            match self.read_record() {
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Ok(None) => {
                    self.done = true;
                    return Some(Ok(duplex));
                }
                Ok(Some((barcode, order, mate, read))) => {
                    if barcode != duplex.barcode {
                        self.pending = Some((barcode, order, mate, read));
                        return Some(Ok(duplex));
                    }
                    let current = duplex.families.last_mut().expect("at least one family");
                    if current.order == order && current.mate == mate {
                        current.reads.push(read);
                    } else {
                        duplex.families.push(MsaFamily { order, mate, reads: vec![read] });
                        if duplex.families.len() > 4 {
                            self.done = true;
                            return Some(Err(DupcallError::Format {
                                line: self.line_num,
                                reason: format!(
                                    "more than four order/mate families for barcode {}",
                                    duplex.barcode
                                ),
                            }));
                        }
                    }
                }
            }
        }
    }
}

/// Counts read pairs per barcode and strand order from a grouped-families
/// stream. Returns the counts and the total number of read pairs seen.
///
/// Used by barcode correction, which needs the full count table before
/// the correction map can be built.
pub fn family_counts<B: BufRead>(
    reader: B,
    check_ids: bool,
    limit: Option<u64>,
) -> Result<(AHashMap<String, FamilyCount>, u64)> {
    let mut counts: AHashMap<String, FamilyCount> = AHashMap::new();
    let mut read_pairs = 0u64;
    let mut grouped = GroupedFamilyReader::with_options(reader, check_ids, false);
    loop {
        if limit.is_some_and(|limit| read_pairs >= limit) {
            break;
        }
        match grouped.read_record()? {
            None => break,
            Some(record) => {
                read_pairs += 1;
                counts.entry(record.barcode).or_default().bump(record.order);
            }
        }
    }
    Ok((counts, read_pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn line(barcode: &str, order: &str, pair: u32) -> String {
        format!(
            "{barcode}\t{order}\tr{pair}/1\tGATTACA\tIIIIIII\tr{pair}/2\tTGTAATC\tJJJJJJJ\n"
        )
    }

    #[test]
    fn groups_one_barcode_per_family() {
        let input = [line("AAAA", "ab", 1), line("AAAA", "ba", 2), line("CCCC", "ab", 3)].concat();
        let families: Vec<BarFamily> =
            GroupedFamilyReader::new(Cursor::new(input)).map(Result::unwrap).collect();
        assert_eq!(families.len(), 2);

        let first = &families[0];
        assert_eq!(first.barcode, "AAAA");
        assert_eq!(first.strand(StrandOrder::Ab).read_pairs(), 1);
        assert_eq!(first.strand(StrandOrder::Ba).read_pairs(), 1);
        assert_eq!(first.read_pairs(), 2);

        let second = &families[1];
        assert_eq!(second.barcode, "CCCC");
        assert_eq!(second.strand(StrandOrder::Ab).read_pairs(), 1);
        assert!(second.strand(StrandOrder::Ba).mate(Mate::R1).is_empty());
    }

    #[test]
    fn contiguous_pairs_join_one_strand_family() {
        let input = [line("AAAA", "ab", 1), line("AAAA", "ab", 2), line("AAAA", "ab", 3)].concat();
        let families: Vec<BarFamily> =
            GroupedFamilyReader::new(Cursor::new(input)).map(Result::unwrap).collect();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].strand(StrandOrder::Ab).read_pairs(), 3);
        assert_eq!(families[0].strand(StrandOrder::Ab).mate(Mate::R2).len(), 3);
    }

    #[test]
    fn malformed_and_comment_lines_are_skipped() {
        let input = format!("# header\nshort\tline\n{}", line("AAAA", "ab", 1));
        let families: Vec<BarFamily> =
            GroupedFamilyReader::new(Cursor::new(input)).map(Result::unwrap).collect();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].read_pairs(), 1);
    }

    #[test]
    fn invalid_order_is_a_format_error() {
        let input = "AAAA\txy\tr/1\tA\tI\tr/2\tT\tI\n";
        let result: Vec<_> = GroupedFamilyReader::new(Cursor::new(input)).collect();
        assert!(matches!(result[0], Err(DupcallError::Format { line: 1, .. })));
    }

    #[test]
    fn mismatched_read_names_fail_unless_disabled() {
        let input = "AAAA\tab\tfoo/1\tA\tI\tbar/2\tT\tI\n";
        let result: Vec<_> = GroupedFamilyReader::new(Cursor::new(input)).collect();
        assert!(matches!(result[0], Err(DupcallError::ReadNameMismatch { .. })));

        let relaxed: Vec<_> =
            GroupedFamilyReader::with_options(Cursor::new(input), false, false).collect();
        assert!(relaxed[0].is_ok());
    }

    #[test]
    fn swapped_mates_are_reported_distinctly() {
        let input = "AAAA\tab\tfoo/2\tA\tI\tfoo/1\tT\tI\n";
        let result: Vec<_> = GroupedFamilyReader::new(Cursor::new(input)).collect();
        assert!(matches!(result[0], Err(DupcallError::SwappedMates { .. })));
    }

    #[test]
    fn prepended_input_uses_corrected_columns() {
        let input = "CCCC\tba\tAAAA\tab\tr/1\tGATT\tIIII\tr/2\tAATC\tJJJJ\n";
        let families: Vec<BarFamily> =
            GroupedFamilyReader::with_options(Cursor::new(input), true, true)
                .map(Result::unwrap)
                .collect();
        assert_eq!(families[0].barcode, "CCCC");
        assert_eq!(families[0].strand(StrandOrder::Ba).read_pairs(), 1);
        assert_eq!(families[0].strand(StrandOrder::Ba).mate(Mate::R1).reads[0].seq, "GATT");
    }

    #[test]
    fn three_strand_blocks_for_one_barcode_fail() {
        let input =
            [line("AAAA", "ab", 1), line("AAAA", "ba", 2), line("AAAA", "ab", 3)].concat();
        let result: Vec<_> = GroupedFamilyReader::new(Cursor::new(input)).collect();
        assert!(matches!(result[0], Err(DupcallError::TooManyOrders { .. })));
    }

    #[test]
    fn empty_input_yields_nothing() {
        let mut reader = GroupedFamilyReader::new(Cursor::new(String::new()));
        assert!(reader.next().is_none());
    }

    #[test]
    fn check_read_ids_accepts_suffixes_and_descriptions() {
        assert!(check_read_ids("read1/1", "read1/2").is_ok());
        assert!(check_read_ids("read1", "read1").is_ok());
        assert!(check_read_ids("read1/1 desc", "read1/2 other").is_ok());
        assert!(check_read_ids("a", "b").is_err());
    }

    fn msa_line(barcode: &str, order: &str, mate: &str, seq: &str) -> String {
        format!("{barcode}\t{order}\t{mate}\tread\t{seq}\tIIII\n")
    }

    #[test]
    fn aligned_reader_groups_by_barcode_and_combo() {
        let input = [
            msa_line("AAAA", "ab", "1", "GATT"),
            msa_line("AAAA", "ab", "1", "GATT"),
            msa_line("AAAA", "ab", "2", "CCGG"),
            msa_line("AAAA", "ba", "1", "TTAA"),
            msa_line("CCCC", "ab", "1", "ACGT"),
        ]
        .concat();
        let duplexes: Vec<MsaDuplex> =
            AlignedFamilyReader::new(Cursor::new(input)).map(Result::unwrap).collect();
        assert_eq!(duplexes.len(), 2);

        let first = &duplexes[0];
        assert_eq!(first.barcode, "AAAA");
        assert_eq!(first.families.len(), 3);
        assert_eq!(first.family(StrandOrder::Ab, Mate::R1).unwrap().reads.len(), 2);
        assert_eq!(first.family(StrandOrder::Ba, Mate::R1).unwrap().reads.len(), 1);
        assert!(first.family(StrandOrder::Ba, Mate::R2).is_none());
        assert_eq!(first.total_reads(), 4);
    }

    #[test]
    fn aligned_reader_rejects_invalid_mate() {
        let input = "AAAA\tab\t3\tread\tGATT\tIIII\n";
        let result: Vec<_> = AlignedFamilyReader::new(Cursor::new(input)).collect();
        assert!(matches!(result[0], Err(DupcallError::Format { .. })));
    }

    #[test]
    fn family_counts_tallies_per_order() {
        let input = [
            line("AAAA", "ab", 1),
            line("AAAA", "ab", 2),
            line("AAAA", "ba", 3),
            line("CCCC", "ba", 4),
        ]
        .concat();
        let (counts, read_pairs) = family_counts(Cursor::new(input), true, None).unwrap();
        assert_eq!(read_pairs, 4);
        assert_eq!(counts["AAAA"], FamilyCount { ab: 2, ba: 1 });
        assert_eq!(counts["AAAA"].total(), 3);
        assert_eq!(counts["CCCC"], FamilyCount { ab: 0, ba: 1 });
    }

    #[test]
    fn family_counts_respects_limit() {
        let input = [line("AAAA", "ab", 1), line("AAAA", "ab", 2)].concat();
        let (counts, read_pairs) = family_counts(Cursor::new(input), true, Some(1)).unwrap();
        assert_eq!(read_pairs, 1);
        assert_eq!(counts["AAAA"].total(), 1);
    }
}
