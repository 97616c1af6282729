//! Native CUDA kernels
//!
//! `elementwise.cu` is compiled to PTX by `build.rs`; the launchers here
//! resolve the typed entry point and launch it on the client's stream.

mod loader;

use cudarc::driver::PushKernelArg;
use cudarc::driver::safe::{CudaContext, CudaStream};
use std::sync::Arc;

use crate::dtype::DType;
use crate::error::{Error, Result};
use loader::{elementwise_launch_config, get_kernel_function, get_or_load_module};

/// PTX module holding the element-wise kernels
const ELEMENTWISE_MODULE: &str = "elementwise";

/// Launch `out[i] = a[i] * b[i]` for `i < numel`.
///
/// # Safety
///
/// - All pointers must be valid device memory with at least `numel` elements
///   of `dtype`
/// - `out` may alias `a` or `b`; each thread reads its inputs before writing
pub unsafe fn launch_mul(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    dtype: DType,
    a_ptr: u64,
    b_ptr: u64,
    out_ptr: u64,
    numel: usize,
) -> Result<()> {
    if numel == 0 {
        return Ok(());
    }

    let func_name = match dtype {
        DType::F32 => "mul_f32",
        DType::F64 => "mul_f64",
        other => return Err(Error::unsupported_dtype(other, "mul")),
    };

    let module = get_or_load_module(context, device_index, ELEMENTWISE_MODULE)?;
    let func = get_kernel_function(&module, func_name)?;

    let cfg = elementwise_launch_config(numel);
    let n = numel as u32;

    let mut builder = stream.launch_builder(&func);
    builder.arg(&a_ptr);
    builder.arg(&b_ptr);
    builder.arg(&out_ptr);
    builder.arg(&n);

    unsafe {
        builder.launch(cfg).map_err(|e| {
            Error::Backend(format!("CUDA {} kernel launch failed: {:?}", func_name, e))
        })?;
    }
    Ok(())
}
