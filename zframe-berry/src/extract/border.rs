//! 边缘岛屿清除.

use crate::{Connectivity, VolumeAttr, VoxelMask};

/// 水平切片上, `(h, w)` 是否距离某条边不足 `margin` 个像素.
#[inline]
fn in_border_region((h, w): (usize, usize), (h_len, w_len): (usize, usize), margin: usize) -> bool {
    h < margin || w < margin || h + margin >= h_len || w + margin >= w_len
}

/// 删除所有接触边缘区域的岛屿.
///
/// 边缘区域是水平切片上距离任意一条边不足 `margin` 个像素的部分, 不包括 `z` 方向.
/// 边缘区域内的每个前景体素都作为洪泛起点, 其所在的整个岛屿被删除.
/// 结果与洪泛起点的选取顺序无关, 返回时边缘区域内没有前景.
///
/// `margin` 为 0 时不删除任何岛屿.
pub fn remove_border_touching(
    mut mask: VoxelMask,
    margin: usize,
    connectivity: Connectivity,
) -> VoxelMask {
    if margin == 0 {
        return mask;
    }
    let plane = mask.slice_shape();
    let removed_islands = mask.remove_islands_touching(connectivity, |(_, h, w)| {
        in_border_region((h, w), plane, margin)
    });
    log::debug!("边缘清除: 删除了 {removed_islands} 个岛屿");
    mask
}
