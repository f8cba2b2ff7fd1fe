//! Multiple sequence alignment strategies.
//!
//! Families with two or more reads are aligned by an external engine
//! (MAFFT by default, Kalign as an alternative) invoked per family on a
//! temporary FASTA file. The [`PassthroughMsa`] strategy pads sequences
//! with trailing gaps instead of aligning, for tests and for input that
//! is already aligned.

use std::io::Write;
use std::process::Command;

use log::debug;
use tempfile::NamedTempFile;

use crate::{AlignError, GAP_CHAR, Result};

/// Contract for multiple sequence alignment of one read family.
///
/// Implementations return one gapped sequence per input, all of equal
/// length, in input order.
pub trait MultipleAligner: Send + Sync {
    /// Aligns the family's sequences.
    fn align(&self, seqs: &[String]) -> Result<Vec<String>>;
}

/// Which MSA strategy to run, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MsaStrategy {
    /// MAFFT subprocess (`mafft --nuc --quiet`).
    #[default]
    Mafft,
    /// Kalign subprocess (`kalign -f fasta`).
    Kalign,
    /// No alignment: pad with trailing gaps. Deterministic, for tests
    /// and pre-aligned input.
    Passthrough,
}

impl MsaStrategy {
    /// The external command this strategy requires, if any.
    #[must_use]
    pub fn required_command(&self) -> Option<&'static str> {
        match self {
            Self::Mafft => Some("mafft"),
            Self::Kalign => Some("kalign"),
            Self::Passthrough => None,
        }
    }

    /// Builds the aligner for this strategy.
    #[must_use]
    pub fn aligner(&self) -> Box<dyn MultipleAligner> {
        match self {
            Self::Mafft => Box::new(ExternalMsa { program: Program::Mafft }),
            Self::Kalign => Box::new(ExternalMsa { program: Program::Kalign }),
            Self::Passthrough => Box::new(PassthroughMsa),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Program {
    Mafft,
    Kalign,
}

impl Program {
    fn name(self) -> &'static str {
        match self {
            Self::Mafft => "mafft",
            Self::Kalign => "kalign",
        }
    }
}

/// Runs an external MSA engine on a temporary FASTA file.
struct ExternalMsa {
    program: Program,
}

impl MultipleAligner for ExternalMsa {
    fn align(&self, seqs: &[String]) -> Result<Vec<String>> {
        let mut family_file = NamedTempFile::with_prefix("dupcall.msa.")?;
        for (i, seq) in seqs.iter().enumerate() {
            writeln!(family_file, ">{}", i + 1)?;
            writeln!(family_file, "{seq}")?;
        }
        family_file.flush()?;

        debug!("aligning {} sequences with {}", seqs.len(), self.program.name());
        let output = match self.program {
            Program::Mafft => Command::new("mafft")
                .args(["--nuc", "--quiet"])
                .arg(family_file.path())
                .output()?,
            Program::Kalign => Command::new("kalign")
                .args(["-f", "fasta"])
                .arg(family_file.path())
                .output()?,
        };
        if !output.status.success() {
            return Err(AlignError::ProcessFailed {
                program: self.program.name().to_string(),
                status: output.status.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let aligned = read_fasta(&String::from_utf8_lossy(&output.stdout));
        if aligned.len() == seqs.len() {
            Ok(aligned)
        } else {
            Err(AlignError::OutputCountMismatch { expected: seqs.len(), actual: aligned.len() })
        }
    }
}

/// Pads sequences with trailing gaps to a common length.
pub struct PassthroughMsa;

impl MultipleAligner for PassthroughMsa {
    fn align(&self, seqs: &[String]) -> Result<Vec<String>> {
        let width = seqs.iter().map(String::len).max().unwrap_or(0);
        Ok(seqs
            .iter()
            .map(|seq| {
                let mut padded = seq.to_ascii_uppercase().into_bytes();
                padded.resize(width, GAP_CHAR);
                String::from_utf8(padded).expect("sequences are ASCII")
            })
            .collect())
    }
}

/// Parses aligner FASTA output: sequences only, uppercased, line breaks
/// within a record joined.
fn read_fasta(text: &str) -> Vec<String> {
    let mut sequences = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.starts_with('>') {
            if !current.is_empty() {
                sequences.push(std::mem::take(&mut current));
            }
        } else {
            current.push_str(line.trim().to_ascii_uppercase().as_str());
        }
    }
    if !current.is_empty() {
        sequences.push(current);
    }
    sequences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_fasta_joins_wrapped_lines() {
        let text = ">1\nGATT\nACA\n>2\ngat-\naca\n";
        assert_eq!(read_fasta(text), vec!["GATTACA".to_string(), "GAT-ACA".to_string()]);
    }

    #[test]
    fn read_fasta_of_empty_input_is_empty() {
        assert!(read_fasta("").is_empty());
    }

    #[test]
    fn passthrough_pads_to_common_length() {
        let seqs = vec!["GATTACA".to_string(), "GATT".to_string()];
        let aligned = PassthroughMsa.align(&seqs).unwrap();
        assert_eq!(aligned, vec!["GATTACA".to_string(), "GATT---".to_string()]);
    }

    #[test]
    fn passthrough_uppercases() {
        let seqs = vec!["gatt".to_string()];
        assert_eq!(PassthroughMsa.align(&seqs).unwrap(), vec!["GATT".to_string()]);
    }

    #[test]
    fn strategy_commands() {
        assert_eq!(MsaStrategy::Mafft.required_command(), Some("mafft"));
        assert_eq!(MsaStrategy::Kalign.required_command(), Some("kalign"));
        assert_eq!(MsaStrategy::Passthrough.required_command(), None);
    }
}
