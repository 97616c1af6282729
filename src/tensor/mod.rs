//! Blob types and operations
//!
//! This module provides the core [`Blob`] type: a shaped parameter buffer
//! whose value, gradient and mask each live in a [`SyncedBuffer`] that
//! migrates between host and device memory on demand.

mod blob;
mod shape;
mod synced;
mod update;

pub use blob::{Blob, HostView, HostViewMut};
pub(crate) use blob::{SharedBuffer, head_of, lock_mut, read_view, required, write_view};
pub use shape::{MAX_AXES, Shape, TargetShape};
pub use synced::{SyncHead, SyncedBuffer};
