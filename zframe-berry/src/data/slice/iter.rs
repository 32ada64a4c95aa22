use crate::Idx2d;
use std::ops::Range;

/// 矩形区域内的行优先索引迭代器.
///
/// 虽然如下函数也能实现相同的功能:
///
/// ```
/// use std::ops::Range;
/// type Idx2d = (usize, usize);
///
/// fn rect_iter_auto(h: Range<usize>, w: Range<usize>) -> impl Iterator<Item = Idx2d> {
///     h.flat_map(move |first| w.clone().map(move |second| (first, second)))
/// }
///
/// // ...
/// ```
///
/// 但该迭代器对象占用的空间更大. 切片窗口查询会频繁创建它, 因此保留该结构.
#[derive(Debug, Clone)]
pub struct RectIter {
    cur_h: usize,
    cur_w: usize,
    h_end: usize,
    w_start: usize,
    w_end: usize,
}

impl RectIter {
    /// 迭代 `h` 行和 `w` 列围成的矩形.
    #[inline]
    pub fn new(h: Range<usize>, w: Range<usize>) -> Self {
        Self {
            cur_h: h.start,
            cur_w: w.start,
            h_end: h.end,
            w_start: w.start,
            w_end: w.end,
        }
    }

    /// 迭代形状为 `(h, w)` 的整幅图像.
    #[inline]
    pub fn full((h, w): Idx2d) -> Self {
        Self::new(0..h, 0..w)
    }
}

impl Iterator for RectIter {
    type Item = Idx2d;

    fn next(&mut self) -> Option<Self::Item> {
        if self.w_start >= self.w_end || self.cur_h >= self.h_end {
            return None;
        }
        let ret_pos = (self.cur_h, self.cur_w);
        if self.cur_w + 1 == self.w_end {
            self.cur_w = self.w_start;
            self.cur_h += 1;
        } else {
            self.cur_w += 1;
        }
        Some(ret_pos)
    }
}

/// 该测试已足够覆盖所有情况, 不用变更.
#[cfg(test)]
mod completeness_tests {
    use super::RectIter;
    use crate::Idx2d;
    use std::ops::Range;

    fn rect_iter_builtin(h: Range<usize>, w: Range<usize>) -> impl Iterator<Item = Idx2d> {
        h.flat_map(move |first| w.clone().map(move |second| (first, second)))
    }

    #[test]
    fn test_rect_iter() {
        // 这几个基本例子足以证明正确性了.
        for (h0, h1, w0, w1) in itertools::iproduct!(0..=2, 0..=4, 0..=2, 0..=4) {
            assert!(Iterator::eq(
                rect_iter_builtin(h0..h1, w0..w1),
                RectIter::new(h0..h1, w0..w1)
            ));
        }
    }

    #[test]
    fn test_full() {
        assert!(Iterator::eq(rect_iter_builtin(0..3, 0..2), RectIter::full((3, 2))));
        assert_eq!(RectIter::full((0, 5)).count(), 0);
    }
}
