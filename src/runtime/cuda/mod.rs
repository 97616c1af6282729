//! CUDA runtime implementation
//!
//! This module backs a blob's device copies with NVIDIA GPU memory via
//! cudarc.
//!
//! # Features
//!
//! - `CudaDevice` - Represents a CUDA GPU device
//! - `CudaClient` - Owns context, stream, cuBLAS and cuSPARSE handles
//! - `CudaRuntime` - Implements the generic Runtime trait
//!
//! Level-1 kernels (`axpy`, `asum`, `dot`, `scal`) go through cuBLAS; the
//! element-wise mask product is a PTX kernel compiled by `build.rs`; dense to
//! CSR conversion uses cuSPARSE `DenseToSparse`.
//!
//! # Errors
//!
//! Allocation, copy and kernel failures are returned as [`Error`](crate::Error)
//! values. Deallocation failures are logged and otherwise ignored.

mod cache;
mod client;
mod cusparse;
mod device;
mod kernels;
mod runtime;

pub use client::CudaClient;
pub use device::CudaDevice;
pub use runtime::{CudaRuntime, cuda_device, is_cuda_available};
