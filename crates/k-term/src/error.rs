// SPDX-License-Identifier: MIT
//
// Error taxonomy for the terminal core.
//
// Only fatal conditions are errors. Malformed input (decode anomalies) is
// recovered inside the decoder and layout overflow is clamped inside the
// widget layer; neither ever reaches a caller as an `Err`.

use std::io;

use thiserror::Error;

/// Fatal terminal-core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The terminal attributes could not be read or applied.
    ///
    /// Raised before any mode switch, so the terminal is untouched.
    #[error("terminal unavailable: {0}")]
    TerminalUnavailable(#[source] io::Error),

    /// A cell grid could not grow to the requested size.
    #[error("cannot allocate a {width}x{height} cell grid")]
    AllocationFailure {
        /// Requested columns.
        width: u16,
        /// Requested rows.
        height: u16,
    },

    /// Reading from or writing to the terminal failed.
    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for terminal-core operations.
pub type Result<T> = std::result::Result<T, Error>;
