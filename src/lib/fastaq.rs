//! Barcode list reading.
//!
//! The barcode self-alignment names barcodes by their 1-based position in
//! an accompanying FASTA or FASTQ file, so this module maps those indices
//! to barcode sequences. Format is decided by file extension when it is
//! conclusive, otherwise by peeking at the first record marker. Gzipped
//! files are handled transparently by `fgoxide`.

use std::io::BufRead;
use std::path::Path;

use ahash::AHashMap;
use anyhow::{Context, Result, bail};
use fgoxide::io::Io;
use seq_io::fasta::Record as FastaRecord;
use seq_io::fastq::Record as FastqRecord;

use crate::errors::DupcallError;

/// Supported barcode list formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqFormat {
    /// FASTA (`>` records).
    Fasta,
    /// FASTQ (`@` records).
    Fastq,
}

/// Decides the format from the file extension, ignoring a trailing `.gz`.
fn format_from_extension(path: &Path) -> Option<SeqFormat> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    match name.rsplit('.').next() {
        Some("fa" | "fasta") => Some(SeqFormat::Fasta),
        Some("fq" | "fastq") => Some(SeqFormat::Fastq),
        _ => None,
    }
}

/// Decides the format from the first record marker in the stream.
fn format_from_content(reader: &mut impl BufRead) -> Result<SeqFormat> {
    let buffer = reader.fill_buf().context("peeking at barcode list")?;
    match buffer.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'>') => Ok(SeqFormat::Fasta),
        Some(b'@') => Ok(SeqFormat::Fastq),
        _ => bail!("cannot determine whether the barcode list is FASTA or FASTQ"),
    }
}

/// Reads the barcode list, mapping each record's 1-based integer name to
/// its sequence.
///
/// # Errors
///
/// Fails when the file cannot be read, the format cannot be determined,
/// or a record name is not an integer.
pub fn read_barcode_list(path: &Path, limit: Option<u64>) -> Result<AHashMap<u64, String>> {
    let mut reader = Io::default()
        .new_reader(path)
        .with_context(|| format!("opening barcode list {}", path.display()))?;
    let format = match format_from_extension(path) {
        Some(format) => format,
        None => format_from_content(&mut reader)?,
    };
    parse_barcode_list(reader, format, limit)
}

/// Parses an open barcode list stream.
pub fn parse_barcode_list<R: BufRead>(
    reader: R,
    format: SeqFormat,
    limit: Option<u64>,
) -> Result<AHashMap<u64, String>> {
    let mut barcodes = AHashMap::new();
    let mut record_num = 0u64;

    let mut insert = |name: &str, seq: Vec<u8>| -> Result<()> {
        let index: u64 = name
            .parse()
            .map_err(|_| DupcallError::BarcodeIndex { name: name.to_string() })?;
        barcodes.insert(index, String::from_utf8(seq).context("barcode is not valid UTF-8")?);
        Ok(())
    };

    match format {
        SeqFormat::Fasta => {
            let mut records = seq_io::fasta::Reader::new(reader);
            while let Some(result) = records.next() {
                let record = result.context("reading barcode FASTA")?;
                record_num += 1;
                if limit.is_some_and(|limit| record_num > limit) {
                    break;
                }
                insert(record.id()?, record.full_seq().into_owned())?;
            }
        }
        SeqFormat::Fastq => {
            let mut records = seq_io::fastq::Reader::new(reader);
            while let Some(result) = records.next() {
                let record = result.context("reading barcode FASTQ")?;
                record_num += 1;
                if limit.is_some_and(|limit| record_num > limit) {
                    break;
                }
                insert(record.id()?, record.seq().to_vec())?;
            }
        }
    }
    Ok(barcodes)
}
