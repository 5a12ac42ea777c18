use crate::geometry::Rect;
use crate::Idx2d;

/// 矩形窗口内的行优先索引迭代器, 产生 `(h, w)` 全局索引.
///
/// 手写结构比 `flat_map` 组合出来的迭代器小得多, 在逐像素扫描时更省.
#[derive(Clone, Debug)]
pub struct PosIter {
    cur_h: usize,
    cur_w: usize,
    w0: usize,
    h_end: usize,
    w_end: usize,
}

impl PosIter {
    /// 以 `(0, 0)` 为原点, 迭代 `(h, w)` 大小的整幅图像.
    #[inline]
    pub fn new((h, w): Idx2d) -> Self {
        Self::from_bounds((0, 0), (h, w))
    }

    /// 迭代 `rect` 覆盖的窗口. 负坐标部分会被截掉.
    pub fn window(rect: Rect) -> Self {
        let h0 = rect.y.max(0) as usize;
        let w0 = rect.x.max(0) as usize;
        let h1 = rect.bottom().max(0) as usize;
        let w1 = rect.right().max(0) as usize;
        Self::from_bounds((h0, w0), (h1, w1))
    }

    #[inline]
    fn from_bounds((h0, w0): Idx2d, (h_end, w_end): Idx2d) -> Self {
        Self {
            cur_h: h0,
            cur_w: w0,
            w0,
            h_end,
            w_end,
        }
    }

    #[inline]
    fn remaining(&self) -> usize {
        if self.w0 >= self.w_end || self.cur_h >= self.h_end {
            return 0;
        }
        let row = self.w_end - self.w0;
        (self.h_end - self.cur_h) * row - (self.cur_w - self.w0)
    }
}

impl Iterator for PosIter {
    type Item = Idx2d;

    fn next(&mut self) -> Option<Self::Item> {
        if self.w0 >= self.w_end || self.cur_h >= self.h_end {
            return None;
        }
        let ret_pos = (self.cur_h, self.cur_w);
        if self.cur_w + 1 == self.w_end {
            self.cur_w = self.w0;
            self.cur_h += 1;
        } else {
            self.cur_w += 1;
        }
        Some(ret_pos)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for PosIter {}
