//! Integration tests for blob shape handling and capacity

use numblob::prelude::*;
use numblob::tensor::MAX_AXES;

type CpuBlob = Blob<f32, CpuRuntime>;

#[test]
fn test_capacity_grows_but_never_shrinks() {
    let mut blob = CpuBlob::with_shape(&[4, 5], BlobConfig::default()).unwrap();
    assert_eq!(blob.count(), 20);
    assert_eq!(blob.capacity(), 20);

    blob.reshape(&[2, 3]).unwrap();
    assert_eq!(blob.count(), 6);
    assert_eq!(blob.capacity(), 20);

    blob.reshape(&[10, 3]).unwrap();
    assert_eq!(blob.count(), 30);
    assert_eq!(blob.capacity(), 30);

    blob.reshape(&[1]).unwrap();
    assert_eq!(blob.capacity(), 30);
}

#[test]
fn test_shrinking_reuses_buffers() {
    let mut blob = CpuBlob::with_shape(&[6], BlobConfig::default()).unwrap();
    blob.mutable_host_data()
        .unwrap()
        .copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

    blob.reshape(&[2, 2]).unwrap();
    assert_eq!(&*blob.host_data().unwrap(), &[1.0, 2.0, 3.0, 4.0]);

    // Growing back within capacity keeps the old tail
    blob.reshape(&[3, 2]).unwrap();
    assert_eq!(blob.host_data().unwrap()[5], 6.0);
}

#[test]
fn test_growth_replaces_buffers() {
    let mut blob = CpuBlob::with_shape(&[2], BlobConfig::default()).unwrap();
    blob.mutable_host_data().unwrap().fill(9.0);
    blob.reshape(&[4]).unwrap();
    assert_eq!(blob.data_head().unwrap(), SyncHead::Uninitialized);
    assert_eq!(&*blob.host_data().unwrap(), &[0.0; 4]);
}

#[test]
fn test_overflowing_reshape_leaves_blob_unchanged() {
    let mut blob = CpuBlob::with_shape(&[3, 4], BlobConfig::default()).unwrap();
    let result = blob.reshape(&[1 << 16, 1 << 16]);
    assert!(matches!(result, Err(Error::CountOverflow { .. })));
    assert_eq!(blob.shape().as_slice(), &[3, 4]);
    assert_eq!(blob.count(), 12);
    assert_eq!(blob.capacity(), 12);
}

#[test]
fn test_count_at_the_signed_limit_is_accepted_lazily() {
    // Buffers are only allocated on first access, so a huge shape is cheap
    let mut blob = CpuBlob::new(BlobConfig::default()).unwrap();
    blob.reshape(&[i32::MAX as usize]).unwrap();
    assert_eq!(blob.count(), i32::MAX as usize);
    assert!(blob.reshape(&[i32::MAX as usize, 2]).is_err());
}

#[test]
fn test_too_many_axes() {
    let mut blob = CpuBlob::new(BlobConfig::default()).unwrap();
    let dims = vec![1; MAX_AXES + 1];
    assert!(matches!(
        blob.reshape(&dims),
        Err(Error::TooManyAxes { .. })
    ));
    blob.reshape(&vec![1; MAX_AXES]).unwrap();
    assert_eq!(blob.num_axes(), MAX_AXES);
}

#[test]
fn test_negative_message_dimension_rejected() {
    let mut blob = CpuBlob::new(BlobConfig::default()).unwrap();
    assert!(matches!(
        blob.reshape_from_message_shape(&[2, -1]),
        Err(Error::NegativeDimension { .. })
    ));
    assert_eq!(blob.count(), 0);
}

#[test]
fn test_zero_dimension_has_no_buffers() {
    let mut blob = CpuBlob::with_shape(&[3, 0], BlobConfig::default()).unwrap();
    assert_eq!(blob.count(), 0);
    assert_eq!(blob.capacity(), 0);
    assert!(blob.host_data().is_err());
    blob.reshape(&[2]).unwrap();
    assert_eq!(blob.host_data().unwrap().len(), 2);
}

#[test]
fn test_axis_helpers() {
    let blob = CpuBlob::with_shape(&[2, 3, 4], BlobConfig::default()).unwrap();
    assert_eq!(blob.shape_at(-1).unwrap(), 4);
    assert_eq!(blob.shape_at(0).unwrap(), 2);
    assert_eq!(blob.canonical_axis_index(-3).unwrap(), 0);
    assert!(matches!(
        blob.shape_at(3),
        Err(Error::InvalidAxis { .. })
    ));
    assert!(blob.shape_at(-4).is_err());
}

#[test]
fn test_legacy_accessors_pad_with_ones() {
    let blob = CpuBlob::with_shape(&[5, 3], BlobConfig::default()).unwrap();
    assert_eq!(blob.num().unwrap(), 5);
    assert_eq!(blob.channels().unwrap(), 3);
    assert_eq!(blob.height().unwrap(), 1);
    assert_eq!(blob.width().unwrap(), 1);
    assert_eq!(blob.legacy_dim(-1).unwrap(), 3);
}

#[test]
fn test_legacy_shape_equality_uses_trailing_axes() {
    let blob = CpuBlob::with_shape(&[5, 3], BlobConfig::default()).unwrap();
    let legacy = TargetShape::Legacy {
        num: 1,
        channels: 1,
        height: 5,
        width: 3,
    };
    assert!(blob.shape_equals(&legacy));
    assert!(!blob.shape_equals(&TargetShape::Legacy {
        num: 0,
        channels: 0,
        height: 5,
        width: 3,
    }));
    assert!(blob.shape_equals(&TargetShape::Explicit(vec![5, 3])));
    assert!(!blob.shape_equals(&TargetShape::Explicit(vec![1, 5, 3])));
}

#[test]
fn test_reshape_like() {
    let src = Blob::<f64, CpuRuntime>::with_shape(&[7, 2], BlobConfig::default()).unwrap();
    let mut dst = CpuBlob::new(BlobConfig::default()).unwrap();
    dst.reshape_like(&src).unwrap();
    assert_eq!(dst.shape().as_slice(), &[7, 2]);
    assert_eq!(dst.count(), 14);
}

#[test]
fn test_growth_commits_shape_and_buffers_together() {
    let mut blob = CpuBlob::with_shape(&[2, 2], BlobConfig::default()).unwrap();
    blob.set_sparse(true).unwrap();

    blob.reshape(&[3, 3]).unwrap();
    assert_eq!(blob.count(), blob.capacity());
    assert_eq!(blob.host_data().unwrap().len(), 9);
    assert_eq!(blob.host_diff().unwrap().len(), 9);
    assert_eq!(&*blob.host_mask().unwrap(), &[1.0; 9]);

    assert!(blob.reshape(&[1 << 16, 1 << 16]).is_err());
    assert_eq!(blob.shape().as_slice(), &[3, 3]);
    assert_eq!(blob.count(), blob.capacity());
    assert_eq!(blob.host_mask().unwrap().len(), 9);
}
