//! 淋巴结区域分割.

use crate::geometry::{external_contours, footprint, Contour, Rect};
use crate::mask::{Connectivity, MaskView};
use crate::{Area2d, Idx2d};
use image::{GrayImage, Luma};

/// 一个淋巴结区域.
///
/// 轮廓和外接矩形都位于缩略图坐标系, 足迹图位于外接矩形内的局部坐标系.
#[derive(Clone, Debug)]
pub struct Region {
    /// 区域编号, 即在行优先扫描中被发现的顺序, 从 0 开始.
    pub index: usize,
    /// 外轮廓.
    pub contour: Contour,
    /// 外接矩形.
    pub rect: Rect,
    /// 轮廓填充后的足迹 (内部为 255), 大小与 `rect` 相同. 孔洞也被填充.
    pub footprint: GrayImage,
    /// 足迹内组织像素的个数.
    pub pixel_area: usize,
}

impl Region {
    /// 轮廓围成的多边形面积 (缩略图像素²).
    #[inline]
    pub fn contour_area(&self) -> f64 {
        self.contour.area()
    }

    /// 外接矩形内的局部轮廓.
    #[inline]
    pub fn local_contour(&self) -> Contour {
        self.contour.translated(-self.rect.x, -self.rect.y)
    }

    /// 局部坐标 `(h, w)` 是否落在足迹内?
    #[inline]
    pub fn in_footprint(&self, (h, w): Idx2d) -> bool {
        matches!(self.footprint.get_pixel_checked(w as u32, h as u32), Some(p) if p.0[0] != 0)
    }

    /// 截取 `mask` 中属于本区域外接矩形的部分.
    #[inline]
    pub fn mask_crop<'m>(&self, mask: &'m MaskView<'_>) -> Option<MaskView<'m>> {
        mask.crop(self.rect)
    }
}

/// 对一个连通块做边界跟踪, 返回其外接矩形与外轮廓, 均位于 `area` 所在的坐标系.
///
/// `area` 为空时返回 `None`.
pub(crate) fn trace_component(area: &Area2d) -> Option<(Rect, Contour)> {
    let (&(h0, w0), rest) = area.split_first()?;
    let (mut top, mut left, mut bottom, mut right) = (h0, w0, h0, w0);
    for &(h, w) in rest {
        top = top.min(h);
        left = left.min(w);
        bottom = bottom.max(h);
        right = right.max(w);
    }
    let rect = Rect::new(
        left as i32,
        top as i32,
        (right - left + 1) as u32,
        (bottom - top + 1) as u32,
    );

    // 四周留 1 像素边, 让边界跟踪不受图像边缘影响.
    let mut bin = GrayImage::new(rect.width + 2, rect.height + 2);
    for &(h, w) in area {
        bin.put_pixel((w - left + 1) as u32, (h - top + 1) as u32, Luma([u8::MAX]));
    }
    let contour = external_contours(&bin)
        .into_iter()
        .max_by_key(Contour::len)?
        .translated(left as i32 - 1, top as i32 - 1);
    Some((rect, contour))
}

/// `(h, w)` 是否落在某个已填充的外轮廓之内?
fn enclosed(outers: &[(Rect, GrayImage)], (h, w): Idx2d) -> bool {
    outers.iter().any(|(rect, fp)| {
        let (x, y) = (w as i32 - rect.x, h as i32 - rect.y);
        x >= 0
            && y >= 0
            && matches!(fp.get_pixel_checked(x as u32, y as u32), Some(p) if p.0[0] != 0)
    })
}

/// 从缩略图大小的类别掩码中提取淋巴结区域.
///
/// 前景为 `node_class` 或 `nested` 中的类别, 按 8-邻接分组. 只取最外层的外轮廓:
/// 位于另一连通块孔洞中的连通块已被外层足迹覆盖, 不单独成为区域. 只有含至少一个
/// `node_class` 像素的连通块会成为区域; `pixel_area` 小于 `min_pixels` 的区域被丢弃.
pub fn extract_regions(
    mask: &MaskView<'_>,
    node_class: u8,
    nested: &[u8],
    min_pixels: usize,
) -> Vec<Region> {
    let is_fg = |p: u8| p == node_class || nested.contains(&p);
    let mut regions = Vec::new();
    // 已跟踪过的外层足迹. 行优先扫描保证外层连通块先于其孔洞中的连通块被发现.
    let mut outers: Vec<(Rect, GrayImage)> = Vec::new();

    for area in mask.areas(is_fg, Connectivity::Eight) {
        let Some(&first) = area.first() else {
            continue;
        };
        if enclosed(&outers, first) {
            log::debug!("skipped a component of {} pixels inside a hole", area.len());
            continue;
        }
        if !area.iter().any(|&pos| mask[pos] == node_class) {
            log::debug!("dropped a component of {} nested-only pixels", area.len());
            continue;
        }
        let Some((rect, contour)) = trace_component(&area) else {
            continue;
        };

        let local = contour.translated(-rect.x, -rect.y);
        let mut fp = footprint(&local, (rect.width, rect.height));
        for &(h, w) in area.iter() {
            fp.put_pixel(
                (w as i32 - rect.x) as u32,
                (h as i32 - rect.y) as u32,
                Luma([u8::MAX]),
            );
        }

        let pixel_area = fp
            .enumerate_pixels()
            .filter(|(x, y, p)| {
                p.0[0] != 0 && is_fg(mask[((*y as i32 + rect.y) as usize, (*x as i32 + rect.x) as usize)])
            })
            .count();
        if pixel_area < min_pixels {
            log::debug!("dropped a region of {pixel_area} pixels (< {min_pixels})");
            outers.push((rect, fp));
            continue;
        }

        outers.push((rect, fp.clone()));
        regions.push(Region {
            index: regions.len(),
            contour,
            rect,
            footprint: fp,
            pixel_area,
        });
    }
    log::debug!("extracted {} lymph node region(s)", regions.len());
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::class::*;
    use crate::detect::{detect_objects, ObjectKind};
    use crate::mask::{ClassMask, PosIter};

    fn paint(mask: &mut ClassMask, (h0, w0): Idx2d, (h, w): Idx2d, class: u8) {
        mask.view_mut()
            .fill_batch(PosIter::new((h, w)).map(|(a, b)| (a + h0, b + w0)), class);
    }

    #[test]
    fn test_two_squares() {
        let mut m = ClassMask::zeros((60, 60));
        paint(&mut m, (5, 5), (10, 10), LYMPH_NODE);
        paint(&mut m, (30, 25), (20, 20), LYMPH_NODE);

        let regions = extract_regions(&m.view(), LYMPH_NODE, &[GERMINAL, SINUS], 0);
        assert_eq!(regions.len(), 2);

        let mut pix: Vec<usize> = regions.iter().map(|r| r.pixel_area).collect();
        pix.sort_unstable();
        assert_eq!(pix, vec![100, 400]);

        let mut areas: Vec<f64> = regions.iter().map(Region::contour_area).collect();
        areas.sort_by(f64::total_cmp);
        assert!((areas[0] - 81.0).abs() < 1e-8);
        assert!((areas[1] - 361.0).abs() < 1e-8);

        assert_eq!(regions[0].index, 0);
        assert_eq!(regions[0].rect, Rect::new(5, 5, 10, 10));
        assert_eq!(regions[1].rect, Rect::new(25, 30, 20, 20));
        assert!(regions[1].in_footprint((0, 0)));
        assert!(regions[1].in_footprint((19, 19)));
        assert!(!regions[1].in_footprint((20, 0)));
    }

    #[test]
    fn test_area_tolerance() {
        // 不规则形状: 轮廓面积 + 周长 / 2 + 1 近似于像素个数.
        let mut m = ClassMask::zeros((40, 40));
        paint(&mut m, (5, 5), (12, 20), LYMPH_NODE);
        paint(&mut m, (17, 5), (8, 6), LYMPH_NODE);
        let regions = extract_regions(&m.view(), LYMPH_NODE, &[], 0);
        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert_eq!(r.pixel_area, 12 * 20 + 8 * 6);
        let approx = r.contour_area() + r.contour.perimeter() / 2.0 + 1.0;
        assert!((approx - r.pixel_area as f64).abs() <= 0.05 * r.pixel_area as f64);
    }

    #[test]
    fn test_nested_classes_join_the_node() {
        let mut m = ClassMask::zeros((30, 30));
        paint(&mut m, (5, 5), (10, 10), LYMPH_NODE);
        // 贴着淋巴结边缘的生发中心.
        paint(&mut m, (5, 15), (10, 4), GERMINAL);
        // 孤立的生发中心不构成区域.
        paint(&mut m, (25, 25), (3, 3), GERMINAL);

        let regions = extract_regions(&m.view(), LYMPH_NODE, &[GERMINAL, SINUS], 0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].rect, Rect::new(5, 5, 14, 10));
        assert_eq!(regions[0].pixel_area, 140);

        // 不含嵌套类别时回到字面上的行为.
        let regions = extract_regions(&m.view(), LYMPH_NODE, &[], 0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].rect, Rect::new(5, 5, 10, 10));
    }

    #[test]
    fn test_holes_are_part_of_the_footprint() {
        let mut m = ClassMask::zeros((20, 20));
        paint(&mut m, (2, 2), (10, 10), LYMPH_NODE);
        paint(&mut m, (5, 5), (3, 3), BACKGROUND);
        let regions = extract_regions(&m.view(), LYMPH_NODE, &[], 0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].pixel_area, 91);
        assert!(regions[0].in_footprint((4, 4)));
    }

    #[test]
    fn test_island_in_hole_belongs_to_outer_node() {
        // 30x30 的环, 中间 16x16 的洞里有一个 8x8 的淋巴结孤岛, 孤岛内含生发中心.
        let mut m = ClassMask::zeros((40, 40));
        paint(&mut m, (2, 2), (30, 30), LYMPH_NODE);
        paint(&mut m, (9, 9), (16, 16), BACKGROUND);
        paint(&mut m, (13, 13), (8, 8), LYMPH_NODE);
        paint(&mut m, (15, 15), (4, 4), GERMINAL);

        let regions = extract_regions(&m.view(), LYMPH_NODE, &[GERMINAL, SINUS], 0);
        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert_eq!(r.rect, Rect::new(2, 2, 30, 30));
        assert_eq!(r.pixel_area, 30 * 30 - 16 * 16 + 8 * 8);
        assert!(r.in_footprint((15, 15)));

        let germinals = detect_objects(&m.view(), r, GERMINAL, ObjectKind::Germinal);
        assert_eq!(germinals.len(), 1);
    }

    #[test]
    fn test_empty_and_min_pixels() {
        let m = ClassMask::zeros((10, 10));
        assert!(extract_regions(&m.view(), LYMPH_NODE, &[], 0).is_empty());

        let mut m = ClassMask::zeros((30, 30));
        paint(&mut m, (1, 1), (2, 2), LYMPH_NODE);
        paint(&mut m, (10, 10), (10, 10), LYMPH_NODE);
        let regions = extract_regions(&m.view(), LYMPH_NODE, &[], 5);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].index, 0);
        assert_eq!(regions[0].pixel_area, 100);
    }

    #[test]
    fn test_trace_single_pixel() {
        let (rect, contour) = trace_component(&vec![(3, 4)]).unwrap();
        assert_eq!(rect, Rect::new(4, 3, 1, 1));
        assert_eq!(contour.points(), &[crate::geometry::Pt::new(4, 3)]);
        assert!(trace_component(&Vec::new()).is_none());
    }
}
