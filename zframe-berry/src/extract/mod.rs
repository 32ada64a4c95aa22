//! 从 3D 扫描中提取候选 fiducial 掩膜.
//!
//! 流程为: 按比例阈值二值化 -> 删除小岛屿 -> 删除大岛屿 -> (可选) 删除边缘岛屿.
//! 同样的输入总是得到完全相同的掩膜.

mod border;

pub use border::remove_border_touching;

use crate::consts::gray::*;
use crate::{Connectivity, VoxelMask, VoxelVolume};

/// 一次掩膜提取的全部参数.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractParams {
    /// 阈值在扫描强度范围中的比例, 通常位于 `[0, 1]`.
    pub threshold_fraction: f64,

    /// 保留岛屿的最小体素个数 (含).
    pub min_size: usize,

    /// 保留岛屿的最大体素个数 (不含).
    pub max_size: usize,

    /// 边缘区域宽度 (像素).
    pub border_margin: usize,

    /// 是否删除接触边缘区域的岛屿.
    pub remove_border_islands: bool,

    /// 岛屿的相邻规则.
    pub connectivity: Connectivity,
}

/// 按 `fraction` 二值化扫描.
///
/// 阈值为 `min + fraction * (max - min)`, 强度位于 `[阈值, max]` 的体素为前景.
/// 非有限值既不参与强度范围的计算, 也不会成为前景. 扫描没有有限值时返回全背景掩膜.
pub fn threshold_mask(volume: &VoxelVolume, fraction: f64) -> VoxelMask {
    let mut mask = VoxelMask::zeros_like(volume);
    let Some((lo, hi)) = volume.scalar_range() else {
        log::warn!("扫描不含有限强度值, 掩膜为空");
        return mask;
    };
    let (lo, hi) = (f64::from(lo), f64::from(hi));
    let cutoff = lo + fraction * (hi - lo);
    mask.data_mut()
        .iter_mut()
        .zip(volume.data().iter())
        .filter(|(_, v)| v.is_finite() && (cutoff..=hi).contains(&f64::from(**v)))
        .for_each(|(p, _)| *p = MASK_FOREGROUND);
    mask
}

/// 提取候选 fiducial 掩膜. 最终保留的岛屿体素个数位于 `[min_size, max_size)`.
///
/// 没有前景时返回全背景掩膜, 不视为错误.
pub fn extract_mask(volume: &VoxelVolume, params: &ExtractParams) -> VoxelMask {
    let conn = params.connectivity;
    let mut mask = threshold_mask(volume, params.threshold_fraction);
    mask.remove_small_islands(params.min_size, conn);

    // 副本中只剩下 "大岛屿", 相减后剩下的就是尺寸合适的岛屿.
    let mut largest = mask.clone();
    largest.remove_small_islands(params.max_size, conn);
    mask.subtract(&largest);

    if params.remove_border_islands {
        mask = remove_border_touching(mask, params.border_margin, conn);
    }
    log::debug!(
        "阈值比例 {:.4}: 提取到 {} 个前景体素",
        params.threshold_fraction,
        mask.foreground_count()
    );
    mask
}

#[cfg(test)]
mod tests {
    use super::{extract_mask, threshold_mask, ExtractParams};
    use crate::{Connectivity, VolumeGeometry, VoxelVolume};
    use ndarray::Array3;

    fn params() -> ExtractParams {
        ExtractParams {
            threshold_fraction: 0.5,
            min_size: 10,
            max_size: 100,
            border_margin: 2,
            remove_border_islands: true,
            connectivity: Connectivity::Face,
        }
    }

    /// 在一行中放置若干长度不同的条带, 每个条带各自成为一个岛屿.
    fn volume(lengths: &[usize]) -> VoxelVolume {
        let mut data = Array3::<f32>::zeros((3, 4 + 2 * lengths.len(), 160));
        for (i, len) in lengths.iter().enumerate() {
            for w in 5..5 + len {
                data[(1, 3 + 2 * i, w)] = 100.0;
            }
        }
        VoxelVolume::new(data, VolumeGeometry::axis_aligned([1.0; 3], [0.0; 3]).unwrap())
    }

    #[test]
    fn test_threshold_cutoff() {
        let mut data = Array3::<f32>::zeros((1, 1, 4));
        data[(0, 0, 1)] = 40.0;
        data[(0, 0, 2)] = 50.0;
        data[(0, 0, 3)] = f32::NAN;
        let v = VoxelVolume::new(data, VolumeGeometry::axis_aligned([1.0; 3], [0.0; 3]).unwrap());
        let m = threshold_mask(&v, 0.75);
        assert_eq!(m.foreground_pos(), vec![(0, 0, 1), (0, 0, 2)]);
    }

    #[test]
    fn test_half_open_size_band() {
        let v = volume(&[9, 10, 64, 99, 100, 125]);
        let m = extract_mask(&v, &params());
        let kept: Vec<usize> = m.islands(Connectivity::Face).iter().map(Vec::len).collect();
        assert_eq!(kept, vec![10, 64, 99]);
    }

    #[test]
    fn test_idempotent() {
        let v = volume(&[12, 30, 120]);
        let first = extract_mask(&v, &params());
        let second = extract_mask(&v, &params());
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_volume() {
        let data = Array3::<f32>::from_elem((2, 8, 8), 7.0);
        let v = VoxelVolume::new(data, VolumeGeometry::axis_aligned([1.0; 3], [0.0; 3]).unwrap());
        // 所有体素构成一个 128 体素的岛屿, 超过上限.
        let m = extract_mask(&v, &params());
        assert!(m.is_all_background());
    }
}
