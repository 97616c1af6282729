//! Integration tests for update, reductions, sharing and copying

mod common;

use common::{MirrorRuntime, assert_allclose_f64, reset_traffic, traffic};
use numblob::prelude::*;

fn filled<R: Runtime>(dims: &[usize], data: &[f64], diff: &[f64]) -> Blob<f64, R> {
    let mut blob = Blob::<f64, R>::with_shape(dims, BlobConfig::default()).unwrap();
    blob.mutable_host_data().unwrap().copy_from_slice(data);
    blob.mutable_host_diff().unwrap().copy_from_slice(diff);
    blob
}

#[test]
fn test_all_ones_mask_matches_dense_update() {
    let data = [0.5, -1.0, 2.0, 4.0];
    let diff = [0.25, 0.5, -1.0, 3.0];

    let mut dense = filled::<CpuRuntime>(&[2, 2], &data, &diff);
    let mut sparse = filled::<CpuRuntime>(&[2, 2], &data, &diff);
    sparse.set_sparse(true).unwrap();
    assert_eq!(&*sparse.host_mask().unwrap(), &[1.0; 4]);

    dense.update().unwrap();
    sparse.update().unwrap();
    assert_eq!(&*dense.host_data().unwrap(), &*sparse.host_data().unwrap());
}

#[test]
fn test_pruned_weights_stay_zero() {
    let mut blob = filled::<CpuRuntime>(&[3], &[1.0, 1.0, 1.0], &[0.0; 3]);
    blob.set_sparse(true).unwrap();
    blob.mutable_host_mask()
        .unwrap()
        .copy_from_slice(&[1.0, 0.0, 1.0]);

    for _ in 0..3 {
        blob.mutable_host_diff().unwrap().fill(-0.5);
        blob.update().unwrap();
    }
    assert_eq!(&*blob.host_data().unwrap(), &[2.5, 0.0, 2.5]);
}

#[test]
fn test_update_runs_on_device_when_device_is_authoritative() {
    let mut blob = filled::<MirrorRuntime>(&[4], &[1.0, 2.0, 3.0, 4.0], &[1.0; 4]);
    blob.set_sparse(true).unwrap();
    blob.mutable_host_mask()
        .unwrap()
        .copy_from_slice(&[0.0, 1.0, 1.0, 0.0]);
    blob.mutable_device_data().unwrap();

    reset_traffic();
    blob.update().unwrap();
    assert_eq!(blob.data_head().unwrap(), SyncHead::AtDevice);
    // axpy + mask product
    assert_eq!(traffic().kernels, 2);
    // gradient and mask move to the device once each
    assert_eq!(traffic().to_device, 2);

    assert_eq!(&*blob.host_data().unwrap(), &[0.0, 1.0, 2.0, 0.0]);
    assert_eq!(traffic().to_host, 1);
}

#[test]
fn test_update_stays_on_host_when_host_is_authoritative() {
    let mut blob = filled::<MirrorRuntime>(&[2], &[1.0, 1.0], &[0.5, 0.5]);
    reset_traffic();
    blob.update().unwrap();
    assert_eq!(traffic(), common::Traffic::default());
    assert_eq!(&*blob.host_data().unwrap(), &[0.5, 0.5]);
}

#[test]
fn test_device_reductions_match_host() {
    let values = [3.0, -4.0, 0.5, -0.25, 8.0];
    let mut host = filled::<MirrorRuntime>(&[5], &values, &values);
    let mut device = filled::<MirrorRuntime>(&[5], &values, &values);
    device.device_data().unwrap();
    device.mutable_device_diff().unwrap();

    reset_traffic();
    let got = [
        device.sum_abs_data().unwrap(),
        device.sum_squares_data().unwrap(),
        device.sum_abs_diff().unwrap(),
    ];
    assert_eq!(traffic().kernels, 3);
    let want = [
        host.sum_abs_data().unwrap(),
        host.sum_squares_data().unwrap(),
        host.sum_abs_diff().unwrap(),
    ];
    assert_allclose_f64(&got, &want, 1e-12, 0.0, "device vs host reductions");

    device.scale_diff(2.0).unwrap();
    host.scale_diff(2.0).unwrap();
    assert_allclose_f64(
        &device.host_diff().unwrap(),
        &host.host_diff().unwrap(),
        0.0,
        0.0,
        "scaled gradient",
    );
}

#[test]
fn test_shared_data_sees_updates() {
    let mut owner = filled::<CpuRuntime>(&[3], &[1.0, 2.0, 3.0], &[1.0; 3]);
    let mut tied = Blob::<f64, CpuRuntime>::with_shape(&[3], BlobConfig::default()).unwrap();
    tied.share_data(&owner).unwrap();

    owner.update().unwrap();
    assert_eq!(&*tied.host_data().unwrap(), &[0.0, 1.0, 2.0]);

    tied.mutable_host_data().unwrap()[0] = 10.0;
    assert_eq!(owner.host_data().unwrap()[0], 10.0);
}

#[test]
fn test_share_requires_equal_count() {
    let owner = filled::<CpuRuntime>(&[3], &[0.0; 3], &[0.0; 3]);
    let mut other = Blob::<f64, CpuRuntime>::with_shape(&[4], BlobConfig::default()).unwrap();
    assert!(matches!(
        other.share_diff(&owner),
        Err(Error::CountMismatch { .. })
    ));
}

#[test]
fn test_copy_from_with_reshape() {
    let source = filled::<CpuRuntime>(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[0.5; 6]);
    let mut target = Blob::<f64, CpuRuntime>::with_shape(&[3], BlobConfig::default()).unwrap();

    assert!(matches!(
        target.copy_from(&source, false, false),
        Err(Error::ShapeMismatch { .. })
    ));

    target.copy_from(&source, false, true).unwrap();
    assert_eq!(target.shape().as_slice(), &[2, 3]);
    assert_eq!(&*target.host_data().unwrap(), &*source.host_data().unwrap());

    target.copy_from(&source, true, false).unwrap();
    assert_eq!(&*target.host_diff().unwrap(), &[0.5; 6]);
}

#[test]
fn test_copy_from_device_source_stays_on_device() {
    let mut source = filled::<MirrorRuntime>(&[4], &[1.0, 2.0, 3.0, 4.0], &[0.0; 4]);
    source.device_data().unwrap();
    let mut target = Blob::<f64, MirrorRuntime>::with_shape(&[4], BlobConfig::default()).unwrap();

    reset_traffic();
    target.copy_from(&source, false, false).unwrap();
    assert_eq!(traffic().within_device, 1);
    assert_eq!(target.data_head().unwrap(), SyncHead::AtDevice);
    assert_eq!(&*target.host_data().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_add_mask_only_at_capacity() {
    let mut blob = Blob::<f32, CpuRuntime>::with_shape(&[4], BlobConfig::default()).unwrap();
    blob.reshape(&[2]).unwrap();
    blob.add_mask().unwrap();
    assert!(!blob.has_mask());

    blob.reshape(&[4]).unwrap();
    blob.add_mask().unwrap();
    assert_eq!(&*blob.host_mask().unwrap(), &[1.0; 4]);
}

#[test]
fn test_adopted_host_data() {
    #[repr(align(64))]
    struct Aligned([f32; 16]);

    let mut external = Aligned([2.0; 16]);
    let mut blob = Blob::<f32, CpuRuntime>::with_shape(&[16], BlobConfig::default()).unwrap();
    blob.mutable_host_data().unwrap();
    unsafe { blob.set_host_data(external.0.as_mut_ptr()).unwrap() };

    assert_eq!(blob.sum_abs_data().unwrap(), 32.0);
    blob.scale_data(0.5).unwrap();
    drop(blob);
    assert_eq!(external.0[3], 1.0);
}

#[test]
fn test_mask_follows_sparse_mode_across_growth() {
    let mut blob = Blob::<f32, CpuRuntime>::with_shape(&[2], BlobConfig::default()).unwrap();
    blob.set_sparse(true).unwrap();
    assert!(blob.has_mask());
    blob.set_sparse(false).unwrap();
    assert!(!blob.has_mask());

    blob.reshape(&[8]).unwrap();
    assert!(!blob.has_mask());
    blob.set_sparse(true).unwrap();
    assert_eq!(&*blob.host_mask().unwrap(), &[1.0; 8]);

    blob.mutable_host_data().unwrap().fill(2.0);
    blob.mutable_host_diff().unwrap().fill(0.5);
    blob.update().unwrap();
    assert_eq!(&*blob.host_data().unwrap(), &[1.5; 8]);
}

#[test]
fn test_growth_while_dense_drops_explicit_mask() {
    let mut blob = Blob::<f32, CpuRuntime>::with_shape(&[3], BlobConfig::default()).unwrap();
    blob.add_mask().unwrap();
    assert!(blob.has_mask());

    blob.reshape(&[6]).unwrap();
    assert!(!blob.has_mask());
    assert_eq!(blob.capacity(), 6);
    assert_eq!(blob.shape().as_slice(), &[6]);
}

#[test]
fn test_stage_change_updates_mask() {
    let compressed = BlobConfig::default().with_prune_stage(PruneStage::Compressed);
    let mut blob = Blob::<f32, CpuRuntime>::with_shape(&[4], compressed).unwrap();
    blob.set_sparse(true).unwrap();
    assert!(!blob.has_mask());

    blob.set_config(BlobConfig::default()).unwrap();
    assert_eq!(&*blob.host_mask().unwrap(), &[1.0; 4]);
    blob.mutable_host_data().unwrap().fill(1.0);
    blob.mutable_host_diff().unwrap().fill(0.25);
    blob.update().unwrap();
    assert_eq!(&*blob.host_data().unwrap(), &[0.75; 4]);

    blob.set_config(compressed).unwrap();
    assert!(!blob.has_mask());
}
