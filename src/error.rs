//! Load-time error types.
//!
//! The simulation core never fails once a level is loaded: bad numbers are
//! sanitised and logged, stale brick references are no-ops. Errors only
//! surface when data enters the core (tuning/settings JSON, layout import),
//! so a rejected document leaves the running level untouched.

use std::fmt;

/// Top-level error enum for the simulation core.
#[derive(Debug)]
pub enum SimError {
    /// A JSON configuration document could not be parsed.
    Config {
        /// Which document was being read (for logging).
        what: &'static str,
        /// Parser message.
        message: String,
    },

    /// A layout record could not be parsed.
    MalformedRecord {
        /// Zero-based index of the record in the layout string.
        index: usize,
        /// Human-readable description of the problem.
        reason: String,
    },

    /// A brick's span falls outside the grid.
    OutOfBounds {
        /// Grid column of the brick's top-left cell.
        col: i32,
        /// Grid row of the brick's top-left cell.
        row: i32,
        /// Span width in cells.
        width: usize,
        /// Span height in cells.
        height: usize,
    },

    /// Two bricks claim the same cell.
    CellOccupied {
        /// Grid column of the contested cell.
        col: usize,
        /// Grid row of the contested cell.
        row: usize,
    },

    /// A document could not be read from disk.
    Io {
        /// Path that was being read.
        path: String,
        /// OS error message.
        reason: String,
    },

    /// Board and level dimensions disagree.
    DimensionMismatch {
        /// Expected (cols, rows).
        expected: (usize, usize),
        /// Supplied (cols, rows).
        got: (usize, usize),
    },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config { what, message } => {
                write!(f, "invalid {} document: {}", what, message)
            }
            SimError::MalformedRecord { index, reason } => {
                write!(f, "malformed layout record #{}: {}", index, reason)
            }
            SimError::OutOfBounds {
                col,
                row,
                width,
                height,
            } => write!(
                f,
                "brick at ({}, {}) spanning {}x{} cells falls outside the grid",
                col, row, width, height
            ),
            SimError::CellOccupied { col, row } => {
                write!(f, "cell ({}, {}) is already occupied", col, row)
            }
            SimError::Io { path, reason } => write!(f, "cannot read {}: {}", path, reason),
            SimError::DimensionMismatch { expected, got } => write!(
                f,
                "level is {}x{} but the board is {}x{}",
                got.0, got.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for SimError {}

impl SimError {
    /// Wrap a JSON parse failure for document `what`
    pub fn config(what: &'static str, err: serde_json::Error) -> Self {
        SimError::Config {
            what,
            message: err.to_string(),
        }
    }
}
