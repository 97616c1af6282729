//! # numblob
//!
//! **Dual-location parameter blobs for training with pruning.**
//!
//! A [`Blob`] holds the value, gradient and pruning mask of one network
//! parameter. Each buffer keeps a host copy and a device copy and moves data
//! between them lazily: accessors record which side was written last, and the
//! next read on the other side copies once.
//!
//! ## Features
//!
//! - **Lazy synchronization**: [`SyncedBuffer`](tensor::SyncedBuffer) with an
//!   explicit authority state per buffer
//! - **Growth-only capacity**: reshaping never shrinks or churns allocations
//! - **Pruning masks**: `update()` re-applies the mask after each step
//! - **CSR extraction**: dense 2-D values compressed on host or with cuSPARSE
//! - **Wire format**: [`BlobMessage`] with bincode byte encoding
//!
//! ## Quick Start
//!
//! ```
//! use numblob::prelude::*;
//!
//! let mut weights = Blob::<f32, CpuRuntime>::with_shape(&[2, 3], BlobConfig::default())?;
//! weights.set_sparse(true)?;
//! weights.mutable_host_data()?.copy_from_slice(&[1.0, 0.0, 2.0, 0.0, 0.0, 3.0]);
//!
//! let msg = weights.to_wire(false)?;
//! assert_eq!(msg.nnz, Some(3));
//! assert_eq!(msg.csrrowptr, vec![0, 2, 3]);
//!
//! let mut restored = Blob::<f32, CpuRuntime>::new(BlobConfig::default())?;
//! restored.from_wire(&BlobMessage::decode(&msg.encode()?)?, true)?;
//! assert_eq!(&*restored.host_data()?, &*weights.host_data()?);
//! # Ok::<(), numblob::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): Multi-threaded host kernels
//! - `cuda`: NVIDIA CUDA backend (cuBLAS, cuSPARSE)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dtype;
pub mod error;
pub mod runtime;
pub mod sparse;
pub mod tensor;
pub mod wire;

pub use config::{BlobConfig, PruneStage};
pub use error::{Error, Result};
pub use tensor::Blob;
pub use wire::BlobMessage;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{BlobConfig, PruneStage};
    pub use crate::dtype::{DType, Element, FloatElement};
    pub use crate::error::{Error, Result};
    pub use crate::runtime::cpu::CpuRuntime;
    pub use crate::runtime::{Device, Runtime, RuntimeClient};
    pub use crate::sparse::CsrParts;
    pub use crate::tensor::{Blob, Shape, SyncHead, TargetShape};
    pub use crate::wire::{BlobMessage, BlobShape, WireElement};

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::CudaRuntime;
}

/// Default runtime based on enabled features
///
/// - With `cuda` feature: `CudaRuntime`
/// - Otherwise: `CpuRuntime`
#[cfg(feature = "cuda")]
pub type DefaultRuntime = runtime::cuda::CudaRuntime;

/// Default runtime based on enabled features
#[cfg(not(feature = "cuda"))]
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
