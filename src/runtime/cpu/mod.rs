//! CPU runtime implementation
//!
//! The CPU runtime uses 64-byte aligned heap allocation. It serves two
//! roles: it owns the host copy of every blob buffer regardless of the
//! blob's runtime, and it is the host-only backend for builds without an
//! accelerator. As a backend it reports `is_accelerator() == false`, so a
//! blob on `CpuRuntime` never migrates and every device-side request fails.

mod client;
mod device;
pub(crate) mod kernels;
mod runtime;

pub use client::CpuClient;
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
