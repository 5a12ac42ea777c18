//! 轮廓、矩形等基础几何对象.
//!
//! 与 [`crate::Idx2d`] 的 `(h, w)` 约定不同, 本模块的所有点都以图像坐标 `(x, y)`
//! 表示, 即 `x` 为列, `y` 为行. 这与 `imageproc` 保持一致.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 整数像素点 `(x, y)`.
pub type Pt = Point<i32>;

/// 轴对齐矩形. `(x, y)` 为左上角, 宽高至少为 1.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rect {
    /// 左上角列.
    pub x: i32,
    /// 左上角行.
    pub y: i32,
    /// 宽.
    pub width: u32,
    /// 高.
    pub height: u32,
}

impl Rect {
    /// 直接初始化.
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 包含所有 `points` 的最小矩形. `points` 为空时返回 `None`.
    pub fn bounding(points: &[Pt]) -> Option<Self> {
        let first = points.first()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in points.iter().skip(1) {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Some(Self::new(x0, y0, (x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32))
    }

    /// 右边界 (不含).
    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// 下边界 (不含).
    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// 矩形像素个数.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// 将矩形裁剪到 `[0, w) x [0, h)` 之内. 若交集为空则返回 `None`.
    pub fn clip(&self, (w, h): (u32, u32)) -> Option<Self> {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = self.right().min(w as i32);
        let y1 = self.bottom().min(h as i32);
        (x0 < x1 && y0 < y1).then(|| Self::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
    }

    /// 判断点是否位于矩形内.
    #[inline]
    pub fn contains(&self, p: Pt) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }
}

/// 首尾隐式相连的有序轮廓.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Contour {
    points: Vec<Pt>,
}

impl Contour {
    /// 直接初始化.
    #[inline]
    pub fn new(points: Vec<Pt>) -> Self {
        Self { points }
    }

    /// 轮廓点.
    #[inline]
    pub fn points(&self) -> &[Pt] {
        &self.points
    }

    /// 消费自我, 获得轮廓点.
    #[inline]
    pub fn into_points(self) -> Vec<Pt> {
        self.points
    }

    /// 轮廓点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 轮廓是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 鞋带公式计算的有向面积的两倍.
    ///
    /// 以 `i64` 累加, 结果精确.
    pub fn signed_area2(&self) -> i64 {
        if self.points.len() < 3 {
            return 0;
        }
        let closing = self.points.first().copied();
        self.points
            .iter()
            .zip(self.points.iter().skip(1).copied().chain(closing))
            .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
            .sum()
    }

    /// 多边形面积 (取绝对值), 单位为像素².
    #[inline]
    pub fn area(&self) -> f64 {
        self.signed_area2().unsigned_abs() as f64 / 2.0
    }

    /// 闭合周长.
    pub fn perimeter(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let closing = self.points.first().copied();
        self.points
            .iter()
            .zip(self.points.iter().skip(1).copied().chain(closing))
            .map(|(a, b)| {
                let dx = (a.x - b.x) as f64;
                let dy = (a.y - b.y) as f64;
                dx.hypot(dy)
            })
            .sum()
    }

    /// 轮廓的外接矩形.
    #[inline]
    pub fn bounding_rect(&self) -> Option<Rect> {
        Rect::bounding(&self.points)
    }

    /// 轮廓点的几何平均.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0i64, 0i64), |(sx, sy), p| (sx + p.x as i64, sy + p.y as i64));
        Some((sx as f64 / n, sy as f64 / n))
    }

    /// `(x, y)` 到轮廓点的最小欧氏距离.
    pub fn distance_to(&self, (x, y): (f64, f64)) -> Option<f64> {
        self.points
            .iter()
            .map(|p| (p.x as f64 - x).hypot(p.y as f64 - y))
            .min_by(f64::total_cmp)
    }

    /// 平移轮廓.
    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.points
                .iter()
                .map(|p| Pt::new(p.x + dx, p.y + dy))
                .collect(),
        )
    }
}

/// 在 `binary` 图像上做边界跟踪, 只返回最外层的外边界 (孔洞及孔洞内的轮廓被忽略).
///
/// 非零像素被视为前景, 前景按 8-邻接连通.
pub fn external_contours(binary: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| Contour::new(c.points))
        .collect()
}

/// 以 `value` 填充 `points` 围成的多边形 (包括边界像素), 超出画布的部分被裁掉.
///
/// 少于 3 个不同点的退化多边形按折线绘制.
pub fn fill_polygon(canvas: &mut GrayImage, points: &[Pt], value: u8) {
    let mut poly = points;
    while poly.len() > 1 && poly.first() == poly.last() {
        poly = &poly[..poly.len() - 1];
    }
    match poly {
        [] => {}
        [p] => {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < canvas.width() && (p.y as u32) < canvas.height()
            {
                canvas.put_pixel(p.x as u32, p.y as u32, Luma([value]));
            }
        }
        [a, b] => draw_line_segment_mut(
            canvas,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            Luma([value]),
        ),
        _ => draw_polygon_mut(canvas, poly, Luma([value])),
    }
}

/// 将 `contour` 填充为 `(w, h)` 大小的二值足迹图 (内部为 255, 外部为 0).
pub fn footprint(contour: &Contour, (w, h): (u32, u32)) -> GrayImage {
    let mut canvas = GrayImage::new(w, h);
    fill_polygon(&mut canvas, contour.points(), u8::MAX);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    fn square(x: i32, y: i32, n: i32) -> Contour {
        Contour::new(vec![
            Pt::new(x, y),
            Pt::new(x + n, y),
            Pt::new(x + n, y + n),
            Pt::new(x, y + n),
        ])
    }

    #[test]
    fn test_shoelace_square() {
        let c = square(3, 4, 10);
        assert_eq!(c.signed_area2().abs(), 200);
        assert!(f64_eq(c.area(), 100.0));
        assert!(f64_eq(c.perimeter(), 40.0));
        assert_eq!(c.bounding_rect(), Some(Rect::new(3, 4, 11, 11)));
        let (cx, cy) = c.centroid().unwrap();
        assert!(f64_eq(cx, 8.0) && f64_eq(cy, 9.0));
    }

    #[test]
    fn test_orientation_does_not_change_area() {
        let c = square(0, 0, 5);
        let mut rev = c.points().to_vec();
        rev.reverse();
        let r = Contour::new(rev);
        assert_eq!(c.signed_area2(), -r.signed_area2());
        assert!(f64_eq(c.area(), r.area()));
    }

    #[test]
    fn test_degenerate_contours() {
        let empty = Contour::default();
        assert!(f64_eq(empty.area(), 0.0));
        assert!(f64_eq(empty.perimeter(), 0.0));
        assert!(empty.centroid().is_none());
        assert!(empty.bounding_rect().is_none());

        let single = Contour::new(vec![Pt::new(2, 2)]);
        assert!(f64_eq(single.area(), 0.0));
        assert!(f64_eq(single.perimeter(), 0.0));

        // 来回两个点: 周长按闭合折线计算.
        let line = Contour::new(vec![Pt::new(0, 0), Pt::new(3, 0)]);
        assert!(f64_eq(line.area(), 0.0));
        assert!(f64_eq(line.perimeter(), 6.0));
    }

    #[test]
    fn test_rect_clip() {
        let r = Rect::new(-5, 2, 10, 10);
        assert_eq!(r.clip((8, 8)), Some(Rect::new(0, 2, 5, 6)));
        assert_eq!(Rect::new(10, 10, 2, 2).clip((8, 8)), None);
        assert!(r.contains(Pt::new(-5, 2)));
        assert!(!r.contains(Pt::new(5, 2)));
    }

    #[test]
    fn test_external_contours_ignore_holes() {
        // 10x10 实心方块, 中间挖一个 4x4 的洞; 另有一个孤立像素.
        let mut img = GrayImage::new(20, 20);
        for y in 2..12 {
            for x in 2..12 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        for y in 5..9 {
            for x in 5..9 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        // 洞中的孤岛属于嵌套轮廓, 不应出现在结果中.
        img.put_pixel(6, 6, Luma([255]));
        img.put_pixel(16, 16, Luma([255]));

        let contours = external_contours(&img);
        assert_eq!(contours.len(), 2);
        let mut areas: Vec<f64> = contours.iter().map(Contour::area).collect();
        areas.sort_by(f64::total_cmp);
        assert!(f64_eq(areas[0], 0.0));
        assert!(f64_eq(areas[1], 81.0));
    }

    #[test]
    fn test_footprint_fills_interior_and_boundary() {
        let c = square(1, 1, 4);
        let fp = footprint(&c, (8, 8));
        let filled = fp.pixels().filter(|p| p.0[0] == u8::MAX).count();
        assert_eq!(filled, 25);
        assert_eq!(fp.get_pixel(0, 0).0[0], 0);
        assert_eq!(fp.get_pixel(5, 5).0[0], u8::MAX);
    }

    #[test]
    fn test_fill_polygon_degenerate() {
        let mut canvas = GrayImage::new(4, 4);
        fill_polygon(&mut canvas, &[Pt::new(1, 1), Pt::new(1, 1)], 7);
        assert_eq!(canvas.get_pixel(1, 1).0[0], 7);
        fill_polygon(&mut canvas, &[Pt::new(9, 9)], 7);
        fill_polygon(&mut canvas, &[], 7);
        assert_eq!(canvas.pixels().filter(|p| p.0[0] == 7).count(), 1);
    }
}
