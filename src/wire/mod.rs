//! Serialized form of a blob
//!
//! [`BlobMessage`] mirrors the checkpoint schema field for field. Blobs
//! convert to and from it with [`Blob::to_wire`](crate::Blob::to_wire) and
//! [`Blob::from_wire`](crate::Blob::from_wire); the message itself turns
//! into bytes with `bincode` (standard configuration, serde integration).

mod codec;

pub use codec::WireElement;

use crate::error::{Error, Result};
use crate::tensor::TargetShape;
use serde::{Deserialize, Serialize};

/// Explicit dimension list
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobShape {
    /// Dimensions, outermost first
    pub dim: Vec<i64>,
}

/// One serialized blob
///
/// Dense arrays come in a single- and a double-precision flavor; a writer
/// fills the flavor matching its element type and a reader prefers the
/// double-precision one when both are present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlobMessage {
    /// Explicit shape
    pub shape: Option<BlobShape>,
    /// Legacy 4-axis shape: num
    pub num: Option<i32>,
    /// Legacy 4-axis shape: channels
    pub channels: Option<i32>,
    /// Legacy 4-axis shape: height
    pub height: Option<i32>,
    /// Legacy 4-axis shape: width
    pub width: Option<i32>,
    /// Values (single precision)
    pub data: Vec<f32>,
    /// Gradient (single precision)
    pub diff: Vec<f32>,
    /// Pruning mask (single precision)
    pub mask: Vec<f32>,
    /// CSR values (single precision)
    pub csrval: Vec<f32>,
    /// Values (double precision)
    pub double_data: Vec<f64>,
    /// Gradient (double precision)
    pub double_diff: Vec<f64>,
    /// Pruning mask (double precision)
    pub double_mask: Vec<f64>,
    /// CSR values (double precision)
    pub double_csrval: Vec<f64>,
    /// CSR row pointers (rows + 1)
    pub csrrowptr: Vec<i32>,
    /// CSR column indices (nnz)
    pub csrcolind: Vec<i32>,
    /// Number of CSR entries
    pub nnz: Option<i32>,
    /// Whether the blob was sparse when written
    pub sparse: bool,
}

/// A dense array slot present in both precisions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireField {
    /// `data` / `double_data`
    Data,
    /// `diff` / `double_diff`
    Diff,
    /// `mask` / `double_mask`
    Mask,
    /// `csrval` / `double_csrval`
    CsrVal,
}

impl WireField {
    /// Name of the single-precision field
    pub fn name(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Diff => "diff",
            Self::Mask => "mask",
            Self::CsrVal => "csrval",
        }
    }

    /// Name of the double-precision field
    pub fn double_name(self) -> &'static str {
        match self {
            Self::Data => "double_data",
            Self::Diff => "double_diff",
            Self::Mask => "double_mask",
            Self::CsrVal => "double_csrval",
        }
    }
}

fn bin_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

impl BlobMessage {
    /// The shape this message asks for.
    ///
    /// An explicit shape wins; otherwise any legacy field selects the legacy
    /// tuple (missing members read as 0); otherwise the empty shape.
    pub fn target_shape(&self) -> TargetShape {
        if let Some(shape) = &self.shape {
            return TargetShape::Explicit(shape.dim.clone());
        }
        let legacy = [self.num, self.channels, self.height, self.width];
        if legacy.iter().any(Option::is_some) {
            let [num, channels, height, width] = legacy.map(|d| i64::from(d.unwrap_or(0)));
            return TargetShape::Legacy {
                num,
                channels,
                height,
                width,
            };
        }
        TargetShape::Explicit(Vec::new())
    }

    /// Single-precision array for `field`
    pub fn single(&self, field: WireField) -> &[f32] {
        match field {
            WireField::Data => &self.data,
            WireField::Diff => &self.diff,
            WireField::Mask => &self.mask,
            WireField::CsrVal => &self.csrval,
        }
    }

    /// Double-precision array for `field`
    pub fn double(&self, field: WireField) -> &[f64] {
        match field {
            WireField::Data => &self.double_data,
            WireField::Diff => &self.double_diff,
            WireField::Mask => &self.double_mask,
            WireField::CsrVal => &self.double_csrval,
        }
    }

    pub(crate) fn single_mut(&mut self, field: WireField) -> &mut Vec<f32> {
        match field {
            WireField::Data => &mut self.data,
            WireField::Diff => &mut self.diff,
            WireField::Mask => &mut self.mask,
            WireField::CsrVal => &mut self.csrval,
        }
    }

    pub(crate) fn double_mut(&mut self, field: WireField) -> &mut Vec<f64> {
        match field {
            WireField::Data => &mut self.double_data,
            WireField::Diff => &mut self.double_diff,
            WireField::Mask => &mut self.double_mask,
            WireField::CsrVal => &mut self.double_csrval,
        }
    }

    /// Encode to bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bin_config()).map_err(|e| Error::Encode(e.to_string()))
    }

    /// Decode from bytes produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (msg, read) = bincode::serde::decode_from_slice::<Self, _>(bytes, bin_config())
            .map_err(|e| Error::Decode(e.to_string()))?;
        if read != bytes.len() {
            return Err(Error::Decode(format!(
                "{} trailing bytes after message",
                bytes.len() - read
            )));
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_shape_prefers_explicit() {
        let msg = BlobMessage {
            shape: Some(BlobShape { dim: vec![4, 2] }),
            num: Some(1),
            ..Default::default()
        };
        assert_eq!(msg.target_shape(), TargetShape::Explicit(vec![4, 2]));
    }

    #[test]
    fn test_target_shape_legacy() {
        let msg = BlobMessage {
            height: Some(5),
            width: Some(3),
            ..Default::default()
        };
        assert_eq!(
            msg.target_shape(),
            TargetShape::Legacy {
                num: 0,
                channels: 0,
                height: 5,
                width: 3
            }
        );
        assert_eq!(
            BlobMessage::default().target_shape(),
            TargetShape::Explicit(vec![])
        );
    }

    #[test]
    fn test_bytes_roundtrip() {
        let msg = BlobMessage {
            shape: Some(BlobShape { dim: vec![2, 2] }),
            csrval: vec![1.0, -2.5],
            csrrowptr: vec![0, 1, 2],
            csrcolind: vec![1, 0],
            nnz: Some(2),
            sparse: true,
            ..Default::default()
        };
        let bytes = msg.encode().unwrap();
        assert_eq!(BlobMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = BlobMessage::default().encode().unwrap();
        bytes.push(0);
        assert!(matches!(BlobMessage::decode(&bytes), Err(Error::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(BlobMessage::decode(&[0xff; 3]).is_err());
    }
}
