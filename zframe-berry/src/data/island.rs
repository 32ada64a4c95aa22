//! 三维岛屿 (前景连通区域) 的查找与删除.

use super::VoxelMask;
use crate::consts::gray::*;
use crate::{Area3d, Areas3d, Idx3d, VolumeAttr};
use ndarray::Array3;
use std::collections::VecDeque;

/// 三维体素的相邻规则.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Connectivity {
    /// 6-邻域, 即仅共享一个面的体素相邻.
    #[default]
    Face,

    /// 26-邻域, 即共享面、边或顶点的体素都相邻.
    Full,
}

impl Connectivity {
    /// 获取所有非零的邻域偏移 `(dz, dh, dw)`.
    pub fn offsets(&self) -> Vec<(isize, isize, isize)> {
        match self {
            Self::Face => vec![
                (-1, 0, 0),
                (1, 0, 0),
                (0, -1, 0),
                (0, 1, 0),
                (0, 0, -1),
                (0, 0, 1),
            ],
            Self::Full => itertools::iproduct!(-1..=1, -1..=1, -1..=1)
                .filter(|d| *d != (0, 0, 0))
                .collect(),
        }
    }
}

/// `pos` 按 `d` 偏移后的索引. 结果越界时返回 `None`.
#[inline]
pub(crate) fn offset_in(
    (z, h, w): Idx3d,
    (dz, dh, dw): (isize, isize, isize),
    (lz, lh, lw): Idx3d,
) -> Option<Idx3d> {
    let z = z.checked_add_signed(dz).filter(|z| *z < lz)?;
    let h = h.checked_add_signed(dh).filter(|h| *h < lh)?;
    let w = w.checked_add_signed(dw).filter(|w| *w < lw)?;
    Some((z, h, w))
}

impl VoxelMask {
    /// 从 `seed` 开始洪泛, 获取其所在岛屿的全部体素, 并在 `visited` 中标记.
    /// `seed` 不是前景或已被访问时返回空岛屿.
    fn flood(
        &self,
        seed: Idx3d,
        offsets: &[(isize, isize, isize)],
        visited: &mut Array3<bool>,
    ) -> Area3d {
        let mut area = Area3d::new();
        if visited[seed] || !is_foreground(self[seed]) {
            return area;
        }
        let shape = self.shape();
        let mut q = VecDeque::with_capacity(16);
        visited[seed] = true;
        q.push_back(seed);
        while let Some(cur) = q.pop_front() {
            area.push(cur);
            for d in offsets {
                let Some(next) = offset_in(cur, *d, shape) else {
                    continue;
                };
                if !visited[next] && is_foreground(self[next]) {
                    visited[next] = true;
                    q.push_back(next);
                }
            }
        }
        area
    }

    /// 按照 `connectivity` 相邻规则获取所有岛屿. 岛屿按照其第一个体素的行优先顺序排列.
    pub fn islands(&self, connectivity: Connectivity) -> Areas3d {
        let offsets = connectivity.offsets();
        let mut visited = Array3::from_elem(self.shape(), false);
        let mut ans = Areas3d::new();
        for (pos, &p) in self.data.indexed_iter() {
            if is_foreground(p) && !visited[pos] {
                ans.push(self.flood(pos, &offsets, &mut visited));
            }
        }
        ans
    }

    /// 获取包含 `seed` 的岛屿. `seed` 越界或不是前景时返回空岛屿.
    pub fn island_at(&self, seed: Idx3d, connectivity: Connectivity) -> Area3d {
        if !self.check(&seed) {
            return Area3d::new();
        }
        let mut visited = Array3::from_elem(self.shape(), false);
        self.flood(seed, &connectivity.offsets(), &mut visited)
    }

    /// 将 `area` 中的体素全部设置为背景.
    #[inline]
    pub fn clear_area(&mut self, area: &[Idx3d]) {
        for pos in area {
            self.data[*pos] = MASK_BACKGROUND;
        }
    }

    /// 删除包含 `seed` 的岛屿. 返回被删除的体素个数.
    pub fn remove_island_at(&mut self, seed: Idx3d, connectivity: Connectivity) -> usize {
        let area = self.island_at(seed, connectivity);
        self.clear_area(&area);
        area.len()
    }

    /// 删除所有至少有一个体素满足 `touches` 的岛屿. 返回被删除的岛屿个数.
    ///
    /// 只扫描一遍体数据, 所有洪泛共享同一个访问标记.
    pub fn remove_islands_touching<F>(
        &mut self,
        connectivity: Connectivity,
        mut touches: F,
    ) -> usize
    where
        F: FnMut(Idx3d) -> bool,
    {
        let offsets = connectivity.offsets();
        let mut visited = Array3::from_elem(self.shape(), false);
        let seeds: Vec<Idx3d> = self
            .data
            .indexed_iter()
            .filter(|(pos, p)| is_foreground(**p) && touches(*pos))
            .map(|(pos, _)| pos)
            .collect();
        let mut removed = 0usize;
        for seed in seeds {
            let area = self.flood(seed, &offsets, &mut visited);
            if !area.is_empty() {
                self.clear_area(&area);
                removed += 1;
            }
        }
        removed
    }

    /// 只保留满足谓词 `keep` 的岛屿. 返回被删除的岛屿个数.
    pub fn retain_islands<F>(&mut self, connectivity: Connectivity, mut keep: F) -> usize
    where
        F: FnMut(&[Idx3d]) -> bool,
    {
        let mut removed = 0usize;
        for island in self.islands(connectivity) {
            if !keep(&island) {
                self.clear_area(&island);
                removed += 1;
            }
        }
        removed
    }

    /// 删除体素个数小于 `min_size` 的岛屿. 返回被删除的岛屿个数.
    #[inline]
    pub fn remove_small_islands(&mut self, min_size: usize, connectivity: Connectivity) -> usize {
        self.retain_islands(connectivity, |island| island.len() >= min_size)
    }
}
