use crate::consts::{MAX_SYNTHESIZED_FIDUCIALS, REPAIRABLE_FIDUCIAL_COUNT};
use crate::{BoundingBox, Idx2d, VoxelMask};
use std::fmt::{Display, Formatter};

/// 7-fiducial 框架在中间切片上的探测位置.
///
/// 框架左、上、右三个面各有三根标记, 共享两个上角, 因此为四个角加上左、上、右三条边的中点.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Probe {
    /// 左上角.
    TopLeft,

    /// 右上角.
    TopRight,

    /// 左下角.
    BottomLeft,

    /// 右下角.
    BottomRight,

    /// 左边中点.
    MiddleLeft,

    /// 上边中点.
    TopMiddle,

    /// 右边中点.
    MiddleRight,
}

impl Probe {
    /// 全部探测位置, 按照探测顺序排列.
    pub const ALL: [Probe; REPAIRABLE_FIDUCIAL_COUNT] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
        Self::MiddleLeft,
        Self::TopMiddle,
        Self::MiddleRight,
    ];

    /// 探测位置在包围盒上的 `(h, w)` 坐标.
    pub fn center(&self, b: &BoundingBox) -> Idx2d {
        let (mid_h, mid_w) = b.center();
        match self {
            Self::TopLeft => (b.top, b.left),
            Self::TopRight => (b.top, b.right),
            Self::BottomLeft => (b.bottom, b.left),
            Self::BottomRight => (b.bottom, b.right),
            Self::MiddleLeft => (mid_h, b.left),
            Self::TopMiddle => (b.top, mid_w),
            Self::MiddleRight => (mid_h, b.right),
        }
    }
}

impl Display for Probe {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
            Self::MiddleLeft => "middle-left",
            Self::TopMiddle => "top-middle",
            Self::MiddleRight => "middle-right",
        };
        f.write_str(s)
    }
}

/// 修复时的探测与绘制参数.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RepairConfig {
    /// 探测窗口半径 (像素). 窗口为边长 `2 * probe_radius + 1` 的正方形.
    pub probe_radius: usize,

    /// 合成标记的截面边长 (像素).
    pub thickness: usize,

    /// 合成标记沿 `z` 方向的半长 (切片个数).
    pub half_length: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            probe_radius: 10,
            thickness: 3,
            half_length: 5,
        }
    }
}

/// 修复结果的状态.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairStatus {
    /// 修复成功 (包括无需修复). 参数为合成了标记的探测位置.
    Success {
        /// 合成了标记的探测位置.
        synthesized: Vec<Probe>,
    },

    /// 缺失的标记过多, 无法修复. 掩膜未被修改.
    Anomaly {
        /// 缺失标记的探测位置.
        missing: Vec<Probe>,
    },
}

impl RepairStatus {
    /// 是否成功.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// 修复结果.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    /// 状态.
    pub status: RepairStatus,

    /// 修复后的掩膜. 异常时与输入相同.
    pub mask: VoxelMask,
}

/// 在第 `mid_slice` 层切片上找出缺失标记的探测位置.
pub fn missing_probes(
    mask: &VoxelMask,
    bbox: &BoundingBox,
    mid_slice: usize,
    radius: usize,
) -> Vec<Probe> {
    let slice = mask.slice_at(mid_slice);
    Probe::ALL
        .into_iter()
        .filter(|p| !slice.has_foreground_within(p.center(bbox), radius))
        .collect()
}

/// 修复缺失的标记.
///
/// 在第 `mid_slice` 层切片上, 对 `bbox` 的七个探测位置检查窗口内是否有前景.
/// 缺失 1 到 2 个时, 在每个缺失位置沿 `z` 方向画一条粗线段, 返回成功;
/// 缺失超过 2 个时返回异常, 掩膜不变; 没有缺失时返回成功, 不做修改.
///
/// `mid_slice` 越界时 panic.
pub fn repair_missing(
    mut mask: VoxelMask,
    bbox: &BoundingBox,
    mid_slice: usize,
    config: &RepairConfig,
) -> RepairOutcome {
    let missing = missing_probes(&mask, bbox, mid_slice, config.probe_radius);
    if missing.len() > MAX_SYNTHESIZED_FIDUCIALS {
        log::info!("缺失 {} 个标记, 无法修复", missing.len());
        return RepairOutcome {
            status: RepairStatus::Anomaly { missing },
            mask,
        };
    }
    for probe in missing.iter() {
        let (h, w) = probe.center(bbox);
        let cnt = mask.draw_z_line((mid_slice, h, w), config.half_length, config.thickness);
        log::info!("在 {probe} ({h}, {w}) 合成标记, 新增 {cnt} 个体素");
    }
    RepairOutcome {
        status: RepairStatus::Success {
            synthesized: missing,
        },
        mask,
    }
}
