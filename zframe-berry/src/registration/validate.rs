//! 配准结果校验.

use crate::config::{FiducialBox, FiducialSpec};
use crate::{Idx3d, Transform, VolumeAttr, VoxelMask};
use nalgebra::Vector4;
use num::ToPrimitive;

/// 一个 fiducial 经变换后在掩膜中的位置.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FiducialLocation {
    /// 落在掩膜范围之外.
    OutOfExtent,

    /// 在范围内, 但附近没有前景.
    NotFound,

    /// 找到了. 参数为最近体素的索引.
    Found(Idx3d),
}

/// 把 fiducial 中心经 `transform` 变换到 RAS, 再换算为最近的体素索引.
/// 越界时返回 `None`.
fn nearest_voxel(transform: &Transform, mask: &VoxelMask, fiducial: &FiducialBox) -> Option<Idx3d> {
    let [x, y, z] = fiducial.midpoint();
    let ras = transform * Vector4::new(x, y, z, 1.0);
    let idx = mask.geometry().ras_to_index([ras.x, ras.y, ras.z]);
    let [z, h, w] = idx.map(|v| v.round().to_isize().and_then(|i| i.to_usize()));
    let pos = (z?, h?, w?);
    mask.check(&pos).then_some(pos)
}

/// 定位一个 fiducial. 在最近体素及其沿各轴 `±offset` 的六个邻居上采样,
/// 任一为前景即视为找到.
pub fn locate_fiducial(
    transform: &Transform,
    mask: &VoxelMask,
    fiducial: &FiducialBox,
    offset: usize,
) -> FiducialLocation {
    let Some(pos) = nearest_voxel(transform, mask, fiducial) else {
        return FiducialLocation::OutOfExtent;
    };
    let (z, h, w) = pos;
    let samples = [
        Some(pos),
        z.checked_sub(offset).map(|z| (z, h, w)),
        z.checked_add(offset).map(|z| (z, h, w)),
        h.checked_sub(offset).map(|h| (z, h, w)),
        h.checked_add(offset).map(|h| (z, h, w)),
        w.checked_sub(offset).map(|w| (z, h, w)),
        w.checked_add(offset).map(|w| (z, h, w)),
    ];
    if samples.into_iter().flatten().any(|p| mask.is_foreground_at(p)) {
        FiducialLocation::Found(pos)
    } else {
        FiducialLocation::NotFound
    }
}

/// 校验变换. 只有每个 fiducial 都被找到时才合法.
pub fn validate(
    transform: &Transform,
    mask: &VoxelMask,
    fiducials: &FiducialSpec,
    offset: usize,
) -> bool {
    for fiducial in fiducials.iter() {
        match locate_fiducial(transform, mask, fiducial, offset) {
            FiducialLocation::Found(_) => {}
            other => {
                log::debug!("fiducial {} 校验失败: {other:?}", fiducial.id);
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::{locate_fiducial, validate, FiducialLocation};
    use crate::test_utils::{phantom_mask, test_frame, ALL_RODS};
    use crate::Transform;
    use nalgebra::Vector3;

    #[test]
    fn test_exact_placement() {
        let frame = test_frame();
        let mask = phantom_mask(&ALL_RODS);
        assert!(validate(&Transform::identity(), &mask, &frame.fiducials, 2));
    }

    #[test]
    fn test_out_of_extent() {
        let frame = test_frame();
        let mask = phantom_mask(&ALL_RODS);
        let t = Transform::new_translation(&Vector3::new(-20.0, 0.0, 0.0));
        assert!(!validate(&t, &mask, &frame.fiducials, 2));

        let first = frame.fiducials.iter().next().unwrap();
        assert_eq!(
            locate_fiducial(&t, &mask, first, 2),
            FiducialLocation::OutOfExtent
        );
    }

    #[test]
    fn test_neighbour_sampling() {
        let frame = test_frame();
        let mask = phantom_mask(&ALL_RODS);
        // 沿 w 方向偏移 2 个体素 (3 mm), 仍可由邻居采样找到.
        let t = Transform::new_translation(&Vector3::new(3.0, 0.0, 0.0));
        assert!(validate(&t, &mask, &frame.fiducials, 2));
        // 偏移 4 个体素则找不到.
        let t = Transform::new_translation(&Vector3::new(6.0, 0.0, 0.0));
        assert!(!validate(&t, &mask, &frame.fiducials, 2));
    }

    #[test]
    fn test_missing_rod_fails() {
        let frame = test_frame();
        let mask = phantom_mask(&ALL_RODS[..6]);
        assert!(!validate(&Transform::identity(), &mask, &frame.fiducials, 2));
    }
}
