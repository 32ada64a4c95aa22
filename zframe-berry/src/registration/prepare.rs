//! 求解前后的数据准备: 中心裁剪与去除旋转.

use crate::{Transform, VolumeAttr, VoxelMask};
use std::ops::Range;

/// 长度为 `len` 的轴中心裁剪到 `dim` 后保留的区间. 长度不超过 `dim` 时保留全部, 不做填充.
/// 多出的体素为奇数个时, 低端多裁一个.
#[inline]
pub fn crop_range(len: usize, dim: usize) -> Range<usize> {
    if len <= dim {
        return 0..len;
    }
    let excess = len - dim;
    let low = excess - excess / 2;
    low..low + dim
}

/// 把掩膜的水平切片中心裁剪到 `dim x dim`. 裁剪会平移几何原点, 使 RAS 坐标保持不变.
pub fn crop_to_solver_dim(mask: &VoxelMask, dim: usize) -> VoxelMask {
    let (h, w) = mask.slice_shape();
    if h == dim && w == dim {
        return mask.clone();
    }
    let (h_range, w_range) = (crop_range(h, dim), crop_range(w, dim));
    log::debug!("求解前裁剪: ({h}, {w}) -> ({}, {})", h_range.len(), w_range.len());
    mask.cropped(h_range, w_range)
}

/// 去除变换的旋转分量: 左上 3x3 置为单位矩阵, 保留平移.
pub fn strip_orientation(transform: &mut Transform) {
    for (r, c) in itertools::iproduct!(0..3, 0..3) {
        transform[(r, c)] = if r == c { 1.0 } else { 0.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::{crop_range, crop_to_solver_dim, strip_orientation};
    use crate::{Transform, VolumeAttr, VolumeGeometry, VoxelMask};
    use nalgebra::{Rotation3, Vector3};

    #[test]
    fn test_crop_range() {
        assert_eq!(crop_range(300, 256), 22..278);
        assert_eq!(crop_range(257, 256), 1..257);
        assert_eq!(crop_range(256, 256), 0..256);
        assert_eq!(crop_range(100, 256), 0..100);
    }

    #[test]
    fn test_crop_keeps_world_coordinates() {
        let g = VolumeGeometry::axis_aligned([0.8, 0.8, 3.0], [-100.0, -90.0, 10.0]).unwrap();
        let mut m = VoxelMask::zeros((2, 300, 257), g);
        m.set_foreground((1, 150, 128));
        let c = crop_to_solver_dim(&m, 256);
        assert_eq!(c.shape(), (2, 256, 256));
        assert!(c.is_foreground_at((1, 128, 127)));
        assert_eq!(
            c.geometry().index_to_ras((1, 128, 127)),
            m.geometry().index_to_ras((1, 150, 128))
        );
    }

    #[test]
    fn test_strip_orientation() {
        let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.3).to_homogeneous();
        let mut t = Transform::new_translation(&Vector3::new(4.0, 5.0, 6.0)) * rot;
        strip_orientation(&mut t);
        assert_eq!(t, Transform::new_translation(&Vector3::new(4.0, 5.0, 6.0)));
    }
}
