//! Custom error types for dupcall operations.

use thiserror::Error;

/// Result type alias for dupcall operations.
pub type Result<T> = std::result::Result<T, DupcallError>;

/// Error type for dupcall operations.
#[derive(Error, Debug)]
pub enum DupcallError {
    /// An underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A malformed record that cannot be skipped.
    #[error("line {line}: {reason}")]
    Format {
        /// 1-based line number in the offending file.
        line: u64,
        /// Explanation of the problem.
        reason: String,
    },

    /// The two read names of a pair do not match.
    #[error("read names {name1:?} and {name2:?} do not match")]
    ReadNameMismatch {
        /// Mate 1 read name.
        name1: String,
        /// Mate 2 read name.
        name2: String,
    },

    /// The two read names of a pair look swapped (mate 1 carries `/2`
    /// and mate 2 carries `/1`).
    #[error(
        "read names not as expected; mate 1 {name1:?} ends with /2 and mate 2 {name2:?} ends with /1"
    )]
    SwappedMates {
        /// Mate 1 read name.
        name1: String,
        /// Mate 2 read name.
        name2: String,
    },

    /// More than two strand orders were observed for one barcode, which
    /// breaks the sorted-input contract.
    #[error("more than two strand orders for barcode {barcode}")]
    TooManyOrders {
        /// The offending barcode.
        barcode: String,
    },

    /// A barcode list entry whose name is not a 1-based integer index.
    #[error("barcode list entry {name:?} is not a 1-based integer index")]
    BarcodeIndex {
        /// The offending record name.
        name: String,
    },

    /// Invalid parameter value provided.
    #[error("invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name.
        parameter: String,
        /// Explanation of why it's invalid.
        reason: String,
    },
}
