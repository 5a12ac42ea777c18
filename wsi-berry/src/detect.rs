//! 淋巴结内部嵌套结构 (生发中心, 淋巴窦) 的检测.

use crate::consts::class::*;
use crate::geometry::{Contour, Rect};
use crate::mask::{Connectivity, MaskView};
use crate::segment::{trace_component, Region};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 嵌套结构的种类.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ObjectKind {
    /// 生发中心.
    Germinal,
    /// 淋巴窦.
    Sinus,
}

impl ObjectKind {
    /// 全部种类.
    pub const ALL: [ObjectKind; 2] = [ObjectKind::Germinal, ObjectKind::Sinus];

    /// 默认编码下的类别值.
    #[inline]
    pub const fn default_class(self) -> u8 {
        match self {
            ObjectKind::Germinal => GERMINAL,
            ObjectKind::Sinus => SINUS,
        }
    }

    /// 写入表格时使用的名字.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Germinal => "germinal",
            ObjectKind::Sinus => "sinus",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "germinal" => Ok(ObjectKind::Germinal),
            "sinus" => Ok(ObjectKind::Sinus),
            other => Err(format!("unknown object kind `{other}`")),
        }
    }
}

/// 区域内检测到的一个对象.
#[derive(Clone, Debug)]
pub struct DetectedObject {
    pub kind: ObjectKind,
    /// 外轮廓, 位于父区域外接矩形的局部坐标系.
    pub contour: Contour,
    /// 外接矩形, 同样是局部坐标.
    pub rect: Rect,
    /// 连通块的像素个数.
    pub pixel_area: usize,
}

/// 在 `region` 的足迹内检测所有值为 `class` 的 8-连通块.
///
/// `mask` 是整幅缩略图大小的类别掩码. 足迹之外的像素 (包括同一外接矩形内的相邻淋巴结)
/// 被忽略. 没有目标像素时返回空集.
pub fn detect_objects(
    mask: &MaskView<'_>,
    region: &Region,
    class: u8,
    kind: ObjectKind,
) -> Vec<DetectedObject> {
    let Some(crop) = region.mask_crop(mask) else {
        return Vec::new();
    };
    let mut local = crop.to_class_mask();
    let outside: Vec<_> = local
        .pos_iter()
        .filter(|&pos| !region.in_footprint(pos))
        .collect();
    local.view_mut().fill_batch(outside, BACKGROUND);

    let objects: Vec<DetectedObject> = local
        .areas(|p| p == class, Connectivity::Eight)
        .into_iter()
        .filter_map(|area| {
            let (rect, contour) = trace_component(&area)?;
            Some(DetectedObject {
                kind,
                contour,
                rect,
                pixel_area: area.len(),
            })
        })
        .collect();
    log::debug!(
        "region #{}: {} {} object(s)",
        region.index,
        objects.len(),
        kind
    );
    objects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{ClassMask, PosIter};
    use crate::segment::extract_regions;
    use crate::Idx2d;

    fn paint(mask: &mut ClassMask, (h0, w0): Idx2d, (h, w): Idx2d, class: u8) {
        mask.view_mut()
            .fill_batch(PosIter::new((h, w)).map(|(a, b)| (a + h0, b + w0)), class);
    }

    #[test]
    fn test_no_target_pixels() {
        let mut m = ClassMask::zeros((30, 30));
        paint(&mut m, (5, 5), (10, 10), LYMPH_NODE);
        let regions = extract_regions(&m.view(), LYMPH_NODE, &[GERMINAL, SINUS], 0);
        assert_eq!(regions.len(), 1);
        for kind in ObjectKind::ALL {
            assert!(detect_objects(&m.view(), &regions[0], kind.default_class(), kind).is_empty());
        }
    }

    #[test]
    fn test_nested_objects() {
        let mut m = ClassMask::zeros((40, 40));
        paint(&mut m, (2, 2), (30, 30), LYMPH_NODE);
        paint(&mut m, (5, 5), (4, 4), GERMINAL);
        paint(&mut m, (20, 20), (5, 3), GERMINAL);
        paint(&mut m, (10, 20), (2, 6), SINUS);

        let regions = extract_regions(&m.view(), LYMPH_NODE, &[GERMINAL, SINUS], 0);
        assert_eq!(regions.len(), 1);
        let region = &regions[0];

        let germs = detect_objects(&m.view(), region, GERMINAL, ObjectKind::Germinal);
        assert_eq!(germs.len(), 2);
        assert_eq!(germs[0].pixel_area, 16);
        assert_eq!(germs[0].rect, Rect::new(3, 3, 4, 4));
        assert_eq!(germs[1].pixel_area, 15);
        assert!(germs.iter().all(|g| g.kind == ObjectKind::Germinal));
        for g in &germs {
            assert!(g.contour.area() <= region.contour_area());
        }

        let sinuses = detect_objects(&m.view(), region, SINUS, ObjectKind::Sinus);
        assert_eq!(sinuses.len(), 1);
        assert_eq!(sinuses[0].pixel_area, 12);
    }

    #[test]
    fn test_pixels_outside_the_footprint_are_ignored() {
        // 三角形淋巴结, 外接矩形右上角有一块不属于它的生发中心.
        let mut m = ClassMask::zeros((30, 30));
        for h in 0..20 {
            for w in 0..=h {
                m[(h + 5, w + 5)] = LYMPH_NODE;
            }
        }
        paint(&mut m, (5, 20), (3, 3), GERMINAL);

        let regions = extract_regions(&m.view(), LYMPH_NODE, &[], 0);
        assert_eq!(regions.len(), 1);
        let germs = detect_objects(&m.view(), &regions[0], GERMINAL, ObjectKind::Germinal);
        assert!(germs.is_empty());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ObjectKind::Sinus.to_string(), "sinus");
        assert_eq!("Germinal".parse::<ObjectKind>(), Ok(ObjectKind::Germinal));
        assert!("node".parse::<ObjectKind>().is_err());
    }
}
