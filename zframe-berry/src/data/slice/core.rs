use super::iter::RectIter;
use crate::consts::gray::*;
use crate::Idx2d;
use ndarray::iter::Iter;
use ndarray::{ArrayView2, Ix2};
use std::ops::{Index, Range};

/// 水平切片上的前景包围盒. 四条边都是闭区间的像素索引.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    /// 最小行索引.
    pub top: usize,

    /// 最大行索引.
    pub bottom: usize,

    /// 最小列索引.
    pub left: usize,

    /// 最大列索引.
    pub right: usize,
}

impl BoundingBox {
    /// 垂直跨度 (像素步数), 即 `bottom - top`.
    #[inline]
    pub fn height(&self) -> usize {
        self.bottom - self.top
    }

    /// 水平跨度 (像素步数), 即 `right - left`.
    #[inline]
    pub fn width(&self) -> usize {
        self.right - self.left
    }

    /// 中心位置, 向下取整.
    #[inline]
    pub fn center(&self) -> Idx2d {
        ((self.top + self.bottom) / 2, (self.left + self.right) / 2)
    }

    /// `(h, w)` 是否位于包围盒内 (含边界).
    #[inline]
    pub fn contains(&self, (h, w): Idx2d) -> bool {
        (self.top..=self.bottom).contains(&h) && (self.left..=self.right).contains(&w)
    }
}

/// 不可变、借用的二维水平掩膜切片.
pub struct MaskSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::VoxelMask`].
    data: ArrayView2<'a, u8>,
}

impl Index<Idx2d> for MaskSlice<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> MaskSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, u8>) -> Self {
        Self { data }
    }

    /// 获得 **底层** 数据的一份不可变 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<u8> {
        self.data.view()
    }

    /// 获取可以迭代图像像素的迭代器.
    #[inline]
    pub fn iter(&self) -> Iter<'_, u8, Ix2> {
        self.data.iter()
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, 像素值)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &u8)> {
        self.data.indexed_iter()
    }

    /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&u8> {
        self.data.get(pos)
    }

    /// 该图是否为全背景图?
    #[inline]
    pub fn is_background(&self) -> bool {
        self.data.iter().copied().all(is_background)
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 图像的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (h, w) = self.shape();
        h * w
    }

    /// 判断一个索引是否合法 (未越界).
    #[inline]
    pub fn check(&self, (h, w): Idx2d) -> bool {
        let (h_len, w_len) = self.shape();
        h < h_len && w < w_len
    }

    /// 获得图像的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 获得图像的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 统计前景像素个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|p| is_foreground(**p)).count()
    }

    /// 获取所有前景像素的索引.
    pub fn foreground_pos<B: FromIterator<Idx2d>>(&self) -> B {
        FromIterator::from_iter(
            self.data
                .indexed_iter()
                .filter_map(|(pos, pixel)| is_foreground(*pixel).then_some(pos)),
        )
    }

    /// 前景像素的包围盒. 若切片为全背景则返回 `None`.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.data
            .indexed_iter()
            .filter(|(_, p)| is_foreground(**p))
            .fold(None, |acc: Option<BoundingBox>, ((h, w), _)| {
                Some(match acc {
                    None => BoundingBox {
                        top: h,
                        bottom: h,
                        left: w,
                        right: w,
                    },
                    Some(b) => BoundingBox {
                        top: b.top.min(h),
                        bottom: b.bottom.max(h),
                        left: b.left.min(w),
                        right: b.right.max(w),
                    },
                })
            })
    }

    /// 以 `center` 为中心, 半径为 `radius` 的正方形窗口 (边长 `2 * radius + 1`)
    /// 裁剪到图像范围后的行、列区间.
    pub fn window(&self, (h, w): Idx2d, radius: usize) -> (Range<usize>, Range<usize>) {
        let (h_len, w_len) = self.shape();
        let clip = |c: usize, len: usize| {
            let lo = c.saturating_sub(radius).min(len);
            let hi = c.saturating_add(radius).saturating_add(1).min(len);
            lo..hi
        };
        (clip(h, h_len), clip(w, w_len))
    }

    /// 以行优先规则, 获取能迭代窗口内所有索引的迭代器. 窗口定义见 [`Self::window`].
    #[inline]
    pub fn window_iter(&self, center: Idx2d, radius: usize) -> RectIter {
        let (h, w) = self.window(center, radius);
        RectIter::new(h, w)
    }

    /// 窗口内是否存在前景像素. 窗口定义见 [`Self::window`].
    #[inline]
    pub fn has_foreground_within(&self, center: Idx2d, radius: usize) -> bool {
        self.window_iter(center, radius)
            .any(|pos| is_foreground(self[pos]))
    }
}

#[cfg(test)]
mod tests {
    use super::BoundingBox;
    use crate::{VolumeGeometry, VoxelMask};

    fn mask() -> VoxelMask {
        VoxelMask::zeros(
            (1, 30, 40),
            VolumeGeometry::axis_aligned([1.0; 3], [0.0; 3]).unwrap(),
        )
    }

    #[test]
    fn test_bounding_box() {
        let mut m = mask();
        assert_eq!(m.slice_at(0).bounding_box(), None);

        m.set_foreground((0, 5, 30));
        m.set_foreground((0, 20, 3));
        m.set_foreground((0, 12, 12));
        let b = m.slice_at(0).bounding_box().unwrap();
        assert_eq!(
            b,
            BoundingBox {
                top: 5,
                bottom: 20,
                left: 3,
                right: 30
            }
        );
        assert_eq!((b.height(), b.width()), (15, 27));
        assert_eq!(b.center(), (12, 16));
        assert!(b.contains((5, 3)) && !b.contains((21, 3)));
    }

    #[test]
    fn test_window_clipped() {
        let m = mask();
        let s = m.slice_at(0);
        assert_eq!(s.window((2, 38), 10), (0..13, 28..40));
        assert_eq!(s.window((15, 20), 3), (12..19, 17..24));
        assert_eq!(s.window_iter((0, 0), 1).count(), 4);
    }

    #[test]
    fn test_has_foreground_within() {
        let mut m = mask();
        m.set_foreground((0, 10, 10));
        let s = m.slice_at(0);
        assert!(s.has_foreground_within((20, 20), 10));
        assert!(!s.has_foreground_within((21, 20), 10));
        assert!(!s.has_foreground_within((20, 21), 10));
    }
}
