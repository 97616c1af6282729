//! Error types for numblob

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using numblob's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in numblob operations
///
/// Every error is a contract violation (bad shape, bad data, missing
/// capability), never a transient condition. Nothing in the crate retries.
#[derive(Error, Debug)]
pub enum Error {
    /// More axes than a blob supports
    #[error("Too many axes: {ndim} (maximum is {max})")]
    TooManyAxes {
        /// Requested number of axes
        ndim: usize,
        /// Maximum number of axes
        max: usize,
    },

    /// A dimension given as a signed value was negative
    #[error("Negative dimension {value} at axis {axis}")]
    NegativeDimension {
        /// Axis index
        axis: usize,
        /// The offending value
        value: i64,
    },

    /// Element count would exceed the signed 32-bit range
    #[error("Blob size exceeds i32::MAX: shape {shape:?}")]
    CountOverflow {
        /// The rejected shape
        shape: Vec<usize>,
    },

    /// Shape mismatch in an operation
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Element counts differ where they must be equal
    #[error("Count mismatch in '{op}': expected {expected}, got {got}")]
    CountMismatch {
        /// The operation name
        op: &'static str,
        /// Expected element count
        expected: usize,
        /// Actual element count
        got: usize,
    },

    /// A serialized array has the wrong length
    #[error("Length mismatch for field '{field}': expected {expected}, got {got}")]
    LengthMismatch {
        /// Wire field name
        field: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        got: usize,
    },

    /// Invalid dimension index
    #[error("Invalid axis {axis} for blob with {ndim} axes")]
    InvalidAxis {
        /// The invalid axis
        axis: isize,
        /// Number of axes
        ndim: usize,
    },

    /// A synchronized buffer was requested with zero size
    #[error("Synced buffer size must be positive")]
    ZeroSizedBuffer,

    /// A buffer was accessed before it was ever allocated
    #[error("Buffer '{buffer}' is not initialized")]
    Uninitialized {
        /// Buffer name (data, diff, mask, ...)
        buffer: &'static str,
    },

    /// A buffer is already borrowed through a view that conflicts with the request
    #[error("Buffer '{buffer}' is borrowed by an outstanding view")]
    BufferBusy {
        /// Buffer name (data, diff, mask, ...)
        buffer: &'static str,
    },

    /// Device operation requested without an accelerator
    #[error("No accelerator available for '{op}' (host-only runtime)")]
    NoAccelerator {
        /// The operation name
        op: &'static str,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),

    /// CUDA-specific error
    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cudarc::driver::DriverError),

    /// Wire message could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Wire message could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create a length mismatch error for a wire field
    pub fn length_mismatch(field: &'static str, expected: usize, got: usize) -> Self {
        Self::LengthMismatch {
            field,
            expected,
            got,
        }
    }

    /// Create an unsupported dtype error
    pub fn unsupported_dtype(dtype: DType, op: &'static str) -> Self {
        Self::UnsupportedDType { dtype, op }
    }
}
