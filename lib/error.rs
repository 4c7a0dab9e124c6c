//! Error types for register, index, and gate operations.

use thiserror::Error;

/// Everything that can go wrong short of memory exhaustion.
///
/// Allocation failure is not represented here; a failed growth aborts the
/// process and the register involved must be considered invalid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// A qubit position at or beyond the register width.
    #[error("qubit position {bit} is out of range for a register of width {width}")]
    OutOfRange { bit: usize, width: usize },

    /// A register width outside `[1, 64]`.
    #[error("unsupported register width {width}")]
    WidthRange { width: usize },

    /// Two registers of different widths in a binary vector operation.
    #[error("register widths do not match: {left} vs. {right}")]
    WidthMismatch { left: usize, right: usize },

    /// A conditional phase gate with its control below its target.
    #[error("conditional phase requires control ≥ target; got ({control}, {target})")]
    ControlOrder { control: usize, target: usize },

    /// The sparse index ran out of cells; the table was sized with too
    /// little headroom for the number of distinct basis states reached.
    #[error("sparse index saturated at 2^{bits} cells")]
    IndexFull { bits: u32 },

    /// A dense conversion whose `2^width` components exceed addressable
    /// bounds.
    #[error("width {width} exceeds the addressable dense dimension")]
    TooLarge { width: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
