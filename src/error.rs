use thiserror::Error;

/// Errors raised by the matrix engine, the layers and chain construction.
///
/// Every numeric failure is reported to the immediate caller; nothing in the
/// engine panics on a bad shape or index.
#[derive(Debug, Error)]
pub enum NnError {
    /// Operands of `op` have incompatible shapes (rows, cols).
    #[error("shape mismatch in {op}: left is {left:?}, right is {right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    /// A reshape was asked to change the number of elements.
    #[error("cannot reshape {from:?} into {to:?}: element counts differ")]
    InvalidReshape {
        from: (usize, usize),
        to: (usize, usize),
    },

    /// Row, column, history or cursor index outside the valid range.
    #[error("{what} index {index} out of range (length {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// The operation exists on the protocol but this layer cannot perform it.
    #[error("{layer} does not support {op}")]
    Unsupported {
        layer: &'static str,
        op: &'static str,
    },

    /// Backward pass requested before a forward pass filled the cache.
    #[error("{layer} has no cached {what}; call forward_prop first")]
    MissingCache {
        layer: &'static str,
        what: &'static str,
    },

    /// A chain configuration that cannot be turned into layers.
    #[error("invalid chain spec: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NnError>;

impl NnError {
    pub(crate) fn shape(op: &'static str, left: (usize, usize), right: (usize, usize)) -> NnError {
        NnError::ShapeMismatch { op, left, right }
    }
}
