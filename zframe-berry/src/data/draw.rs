//! 在掩膜上绘制前景.

use super::VoxelMask;
use crate::consts::gray::*;
use crate::{Idx3d, VolumeAttr};
use num::ToPrimitive;

/// 一个轴上以 `center` 为中心, 宽度为 `thickness` 的闭区间, 裁剪到 `[0, len)`.
/// 完全越界时返回 `None`.
fn clipped_span(center: isize, thickness: usize, len: usize) -> Option<(usize, usize)> {
    let t = thickness.max(1) as isize;
    let lo = center - (t - 1) / 2;
    let hi = lo + t - 1;
    if hi < 0 || lo >= len as isize {
        return None;
    }
    Some((lo.max(0) as usize, hi.min(len as isize - 1) as usize))
}

impl VoxelMask {
    /// 以 `center` 为中心填充一个边长为 `thickness` 的立方体, 越界部分被忽略.
    /// 返回新变为前景的体素个数.
    pub fn fill_cube(&mut self, center: [isize; 3], thickness: usize) -> usize {
        let (lz, lh, lw) = self.shape();
        let (Some((z0, z1)), Some((h0, h1)), Some((w0, w1))) = (
            clipped_span(center[0], thickness, lz),
            clipped_span(center[1], thickness, lh),
            clipped_span(center[2], thickness, lw),
        ) else {
            return 0;
        };
        let mut cnt = 0;
        for pos in itertools::iproduct!(z0..=z1, h0..=h1, w0..=w1) {
            if is_background(self.data[pos]) {
                self.data[pos] = MASK_FOREGROUND;
                cnt += 1;
            }
        }
        cnt
    }

    /// 在第 `z` 层切片上以 `(h, w)` 为中心填充一个边长为 `thickness` 的正方形,
    /// 越界部分被忽略. 返回新变为前景的体素个数.
    pub fn fill_square(&mut self, [z, h, w]: [isize; 3], thickness: usize) -> usize {
        let (lz, lh, lw) = self.shape();
        let Some(z) = z.to_usize().filter(|z| *z < lz) else {
            return 0;
        };
        let (Some((h0, h1)), Some((w0, w1))) = (
            clipped_span(h, thickness, lh),
            clipped_span(w, thickness, lw),
        ) else {
            return 0;
        };
        let mut cnt = 0;
        for (h, w) in itertools::iproduct!(h0..=h1, w0..=w1) {
            if is_background(self.data[(z, h, w)]) {
                self.data[(z, h, w)] = MASK_FOREGROUND;
                cnt += 1;
            }
        }
        cnt
    }

    /// 绘制一条从 `from` 到 `to` (均为 `(z, h, w)` 连续索引坐标, 闭区间) 的粗线段.
    /// 沿线段以不大于一个体素的步长采样, 在每个采样点所在的切片上填充边长为
    /// `thickness` 的正方形. 线段在 `z` 方向不会超出两个端点所在的切片.
    ///
    /// 越界部分被忽略. 返回新变为前景的体素个数.
    pub fn draw_thick_line(&mut self, from: [f64; 3], to: [f64; 3], thickness: usize) -> usize {
        let delta = [to[0] - from[0], to[1] - from[1], to[2] - from[2]];
        let longest = delta.iter().fold(0.0f64, |acc, d| acc.max(d.abs()));
        let Some(steps) = longest.ceil().to_usize() else {
            return 0;
        };

        let mut cnt = 0;
        let mut last: Option<[isize; 3]> = None;
        for i in 0..=steps {
            let t = if steps == 0 { 0.0 } else { i as f64 / steps as f64 };
            let p = [0, 1, 2].map(|k| (from[k] + t * delta[k]).round().to_isize());
            let [Some(z), Some(h), Some(w)] = p else {
                continue;
            };
            let cur = [z, h, w];
            if last != Some(cur) {
                cnt += self.fill_square(cur, thickness);
                last = Some(cur);
            }
        }
        cnt
    }

    /// 在水平位置 `(h, w)` 上绘制一条沿 `z` 方向、以 `mid_slice` 为中心、
    /// 半长为 `half_length` 的粗线段, 共 `2 * half_length + 1` 层切片.
    /// 返回新变为前景的体素个数.
    pub fn draw_z_line(
        &mut self,
        (mid_slice, h, w): Idx3d,
        half_length: usize,
        thickness: usize,
    ) -> usize {
        let (z, h, w) = (mid_slice as f64, h as f64, w as f64);
        let half = half_length as f64;
        self.draw_thick_line([z - half, h, w], [z + half, h, w], thickness)
    }
}
