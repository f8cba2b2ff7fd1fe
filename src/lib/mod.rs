#![deny(unsafe_code)]

//! # dupcall library
//!
//! Core functionality for building duplex consensus sequences from
//! barcode-tagged read families:
//!
//! - **[`families`]** - the barcode/strand/mate family data model and the
//!   streaming readers that group sorted family files
//! - **[`fastaq`]** - barcode list reading (FASTA or FASTQ, gzip-aware)
//! - **[`pool`]** - the bounded worker pool used to process families in
//!   parallel
//! - **[`errors`]** - the library error taxonomy
//! - **[`logging`]** - formatting helpers and operation timing
//! - **[`metrics`]** - serializable per-run statistics
//!
//! The alignment adapters and the consensus/graph algorithms live in the
//! `dupcall-align`, `dupcall-consensus`, and `dupcall-graph` crates; the
//! CLI commands that tie everything together live in the `dupcall` binary.

pub mod errors;
pub mod families;
pub mod fastaq;
pub mod logging;
pub mod metrics;
pub mod pool;
