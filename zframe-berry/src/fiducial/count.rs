use crate::config::FrameTopology;
use crate::{BoundingBox, Connectivity, VolumeAttr, VoxelMask};
use num::ToPrimitive;

/// 一次 fiducial 计数的结果.
#[derive(Debug, Clone, PartialEq)]
pub struct FiducialCount {
    /// 岛屿个数, 不做尺寸过滤.
    pub count: usize,

    /// 前景 `z` 质心的整数部分.
    pub mid_slice: usize,

    /// 中间切片上的前景包围盒. 中间切片没有前景时为 `None`.
    pub bounding_box: Option<BoundingBox>,

    /// 包围盒宽度, 以毫米为单位.
    pub width_mm: f64,

    /// 包围盒高度, 以毫米为单位.
    pub height_mm: f64,

    /// 宽度是否与框架理论宽度相符.
    pub width_ok: bool,

    /// 高度是否与框架理论高度相符.
    pub height_ok: bool,
}

impl FiducialCount {
    /// 包围盒的宽和高是否都与框架相符.
    #[inline]
    pub fn geometry_ok(&self) -> bool {
        self.width_ok && self.height_ok
    }
}

/// 统计 fiducial 个数, 并用中间切片上的包围盒校验框架尺寸. 不修改掩膜.
///
/// 包围盒的宽、高按水平体素分辨率换算为毫米, 分别与 [`FrameTopology::expected_width`]
/// 和 [`FrameTopology::expected_height`] 比较, 误差不超过 `tolerance_mm` 即为相符.
///
/// 掩膜为全背景时返回 `None`.
pub fn count_and_validate(
    mask: &VoxelMask,
    topology: &FrameTopology,
    tolerance_mm: f64,
    connectivity: Connectivity,
) -> Option<FiducialCount> {
    let mid_slice = mask.centroid_z()?.trunc().to_usize()?;
    let count = mask.islands(connectivity).len();
    let bounding_box = mask.slice_at(mid_slice).bounding_box();

    let (width_mm, height_mm) = bounding_box.map_or((0.0, 0.0), |b| {
        (
            b.width() as f64 * mask.width_mm(),
            b.height() as f64 * mask.height_mm(),
        )
    });
    let close = |measured: f64, expected: f64| (measured - expected).abs() <= tolerance_mm;
    let width_ok = bounding_box.is_some() && close(width_mm, topology.expected_width());
    let height_ok = bounding_box.is_some() && close(height_mm, topology.expected_height());

    log::debug!(
        "fiducial 计数: {count} 个, 中间切片 {mid_slice}, 包围盒 {width_mm:.1} x {height_mm:.1} mm"
    );
    Some(FiducialCount {
        count,
        mid_slice,
        bounding_box,
        width_mm,
        height_mm,
        width_ok,
        height_ok,
    })
}

#[cfg(test)]
mod tests {
    use super::count_and_validate;
    use crate::config::FrameTopology;
    use crate::test_utils::{phantom_mask, test_topology, ALL_RODS};
    use crate::{Connectivity, VolumeAttr};

    #[test]
    fn test_full_frame() {
        let mask = phantom_mask(&ALL_RODS);
        let c = count_and_validate(&mask, &test_topology(), 15.0, Connectivity::Face).unwrap();
        assert_eq!(c.count, 7);
        assert_eq!(c.mid_slice, 9);
        let b = c.bounding_box.unwrap();
        assert_eq!((b.top, b.bottom, b.left, b.right), (9, 51, 9, 51));
        assert!((c.width_mm - 63.0).abs() < 1e-9);
        assert!(c.geometry_ok());
    }

    #[test]
    fn test_height_compared_with_expected_height() {
        let mask = phantom_mask(&ALL_RODS);
        // 理论宽度仍为 60 mm, 理论高度变为 20 mm.
        let topology = FrameTopology {
            base: [-30.0, 10.0, 0.0],
            ..test_topology()
        };
        let c = count_and_validate(&mask, &topology, 15.0, Connectivity::Face).unwrap();
        assert!(c.width_ok);
        assert!(!c.height_ok);
    }

    #[test]
    fn test_empty_mask() {
        let mask = crate::VoxelMask::zeros_like(&phantom_mask(&ALL_RODS));
        assert!(mask.shape().0 > 0);
        assert!(count_and_validate(&mask, &test_topology(), 15.0, Connectivity::Face).is_none());
    }
}
