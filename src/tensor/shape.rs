//! Shape type: dimensions of a blob

use crate::error::{Error, Result};
use smallvec::SmallVec;
use std::fmt;
use std::iter::FromIterator;
use std::ops::Deref;

/// Stack allocation threshold for dimensions
/// Most parameter blobs have 4 or fewer axes, so we stack-allocate up to 4
pub(crate) const STACK_DIMS: usize = 4;

/// Maximum number of axes a blob may have
pub const MAX_AXES: usize = 32;

/// Shape type: dimensions of a blob
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct Shape(SmallVec<[usize; STACK_DIMS]>);

impl Shape {
    /// Create an empty shape (a scalar blob, count 1).
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    /// Build a shape from signed dimensions, rejecting negative values.
    pub fn from_signed(dims: &[i64]) -> Result<Self> {
        dims.iter()
            .enumerate()
            .map(|(axis, &value)| {
                usize::try_from(value).map_err(|_| Error::NegativeDimension { axis, value })
            })
            .collect()
    }

    /// View shape as a slice.
    pub fn as_slice(&self) -> &[usize] {
        self.0.as_slice()
    }

    /// Number of axes in this shape.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Element count, checked against the signed 32-bit range.
    ///
    /// Each multiplication is checked before it happens, so a shape whose
    /// product would overflow is rejected even when a later zero axis would
    /// bring the product back down.
    pub fn checked_count(&self) -> Result<usize> {
        checked_count(self.as_slice())
    }

    /// Size of an axis under the legacy 4-axis convention.
    ///
    /// Legacy parameter blobs were indexed from the end of the shape (a bias
    /// is `1 x 1 x 1 x N`, an inner-product weight `1 x 1 x M x N`), so
    /// `index` is in `-4..4` and axes outside this blob's rank read as 1.
    pub fn legacy_dim(&self, index: isize) -> Result<usize> {
        let ndim = self.ndim();
        if ndim > 4 {
            return Err(Error::InvalidArgument {
                arg: "shape",
                reason: format!(
                    "legacy accessors require at most 4 axes, blob has {}",
                    ndim
                ),
            });
        }
        if !(-4..4).contains(&index) {
            return Err(Error::InvalidAxis { axis: index, ndim });
        }
        let ndim = ndim as isize;
        if index >= ndim || index < -ndim {
            return Ok(1);
        }
        let axis = if index < 0 { index + ndim } else { index };
        Ok(self.0[axis as usize])
    }

    /// Resolve a possibly negative axis index to `0..ndim`.
    pub fn canonical_axis(&self, axis: isize) -> Result<usize> {
        let ndim = self.ndim() as isize;
        if axis < -ndim || axis >= ndim {
            return Err(Error::InvalidAxis {
                axis,
                ndim: self.ndim(),
            });
        }
        Ok(if axis < 0 { axis + ndim } else { axis } as usize)
    }
}

/// Product of `dims`, failing if it would exceed `i32::MAX`.
pub(crate) fn checked_count(dims: &[usize]) -> Result<usize> {
    let limit = i32::MAX as usize;
    let mut count: usize = 1;
    for &dim in dims {
        if dim > limit || (count != 0 && dim > limit / count) {
            return Err(Error::CountOverflow {
                shape: dims.to_vec(),
            });
        }
        count *= dim;
    }
    Ok(count)
}

impl Deref for Shape {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "{} ({})", dims.join(" "), self.0.iter().product::<usize>())
    }
}

impl AsRef<[usize]> for Shape {
    fn as_ref(&self) -> &[usize] {
        self.0.as_slice()
    }
}

impl From<Vec<usize>> for Shape {
    fn from(value: Vec<usize>) -> Self {
        Self(value.into_iter().collect())
    }
}

impl From<&[usize]> for Shape {
    fn from(value: &[usize]) -> Self {
        Self(value.iter().copied().collect())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(value: [usize; N]) -> Self {
        Self(value.into_iter().collect())
    }
}

impl FromIterator<usize> for Shape {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A target shape as carried by a serialized blob
///
/// Older checkpoints describe parameter shapes with the fixed
/// `(num, channels, height, width)` tuple; newer ones carry an explicit
/// dimension list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetShape {
    /// Deprecated 4-axis description, compared against the *last* four axes
    Legacy {
        /// Batch / output axis
        num: i64,
        /// Channel axis
        channels: i64,
        /// Height axis
        height: i64,
        /// Width axis
        width: i64,
    },
    /// Explicit dimension list, compared exactly (including rank)
    Explicit(Vec<i64>),
}

impl TargetShape {
    /// The dimensions a blob is reshaped to when loading this target.
    ///
    /// A legacy target always reshapes to four axes.
    pub fn dims(&self) -> Vec<i64> {
        match self {
            Self::Legacy {
                num,
                channels,
                height,
                width,
            } => vec![*num, *channels, *height, *width],
            Self::Explicit(dims) => dims.clone(),
        }
    }

    /// Whether `shape` is compatible with this target.
    pub fn matches(&self, shape: &Shape) -> bool {
        match self {
            Self::Legacy {
                num,
                channels,
                height,
                width,
            } => {
                let legacy = [*num, *channels, *height, *width];
                shape.ndim() <= 4
                    && (-4..0).zip(legacy).all(|(index, want)| {
                        shape
                            .legacy_dim(index)
                            .is_ok_and(|got| got as i64 == want)
                    })
            }
            Self::Explicit(dims) => {
                dims.len() == shape.ndim()
                    && dims.iter().zip(shape.iter()).all(|(&a, &b)| a == b as i64)
            }
        }
    }
}
