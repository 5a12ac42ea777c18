//! 形态学测量.
//!
//! 所有面积和长度都先在缩略图坐标系中精确计算, 再经 [`Scale`] 换算为物理单位.
//! 圆度是无量纲量, 直接在缩略图坐标系中计算.

use crate::detect::{DetectedObject, ObjectKind};
use crate::reconcile::Scale;
use crate::segment::Region;
use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 单个对象的测量结果.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ObjectMeasure {
    pub kind: ObjectKind,
    /// 轮廓多边形面积.
    pub area: f64,
    /// 连通块像素个数换算的面积.
    pub pixel_area: f64,
    /// 外接矩形宽.
    pub width: f64,
    /// 外接矩形高.
    pub height: f64,
    /// 闭合周长 (缩略图像素).
    pub perimeter: f64,
    /// `4π·面积 / 周长²`, 周长为 0 时为 0.
    pub circularity: f64,
    /// 轮廓点的均值, 父区域局部坐标 `(x, y)`.
    pub centroid: Option<(f64, f64)>,
}

/// `4π·area / perimeter²`. 周长为 0 时返回 0.
#[inline]
pub fn circularity(area: f64, perimeter: f64) -> f64 {
    if perimeter > 0.0 {
        4.0 * PI * area / (perimeter * perimeter)
    } else {
        0.0
    }
}

/// 测量一个对象.
pub fn measure(obj: &DetectedObject, scale: &Scale) -> ObjectMeasure {
    let area = obj.contour.area();
    let perimeter = obj.contour.perimeter();
    let (width, height) = scale.physical_lengths(obj.rect.width as f64, obj.rect.height as f64);
    ObjectMeasure {
        kind: obj.kind,
        area: scale.physical_area(area),
        pixel_area: scale.physical_area(obj.pixel_area as f64),
        width,
        height,
        perimeter,
        circularity: circularity(area, perimeter),
        centroid: obj.contour.centroid(),
    }
}

fn mean(it: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = it.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// 每个淋巴结一行的汇总统计.
///
/// 没有生发中心时, 所有基于生发中心的统计量为 `None`, 而不是 0.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RegionSummary {
    pub name: String,
    pub ln_idx: usize,
    pub ln_area: f64,
    pub ln_pixel_area: f64,
    pub germ_number: usize,
    pub avg_germ_width: Option<f64>,
    pub avg_germ_height: Option<f64>,
    pub total_germ_area: f64,
    pub avg_germ_area: Option<f64>,
    pub max_germ_area: Option<f64>,
    pub min_germ_area: Option<f64>,
    pub avg_germ_shape: Option<f64>,
    pub germ_distance_to_centre: Option<f64>,
    pub germ_distance_to_boundary: Option<f64>,
    pub sinus_number: usize,
    pub total_sinus_area: f64,
}

impl RegionSummary {
    /// 汇总一个区域. `objects` 可以混合多种对象, 按 `kind` 区分.
    pub fn summarize(
        name: &str,
        region: &Region,
        objects: &[ObjectMeasure],
        scale: &Scale,
    ) -> Self {
        let germs: Vec<&ObjectMeasure> = objects
            .iter()
            .filter(|o| o.kind == ObjectKind::Germinal)
            .collect();
        let sinuses = objects.iter().filter(|o| o.kind == ObjectKind::Sinus);

        let areas = || germs.iter().map(|g| g.area);
        let local = region.local_contour();
        let node_centre = local.centroid();
        let to_centre = mean(germs.iter().filter_map(|g| {
            let (gx, gy) = g.centroid?;
            let (cx, cy) = node_centre?;
            Some(scale.physical_length((gx - cx).hypot(gy - cy)))
        }));
        let to_boundary = mean(germs.iter().filter_map(|g| {
            let d = local.distance_to(g.centroid?)?;
            Some(scale.physical_length(d))
        }));

        Self {
            name: name.to_string(),
            ln_idx: region.index,
            ln_area: scale.physical_area(region.contour_area()),
            ln_pixel_area: scale.physical_area(region.pixel_area as f64),
            germ_number: germs.len(),
            avg_germ_width: mean(germs.iter().map(|g| g.width)),
            avg_germ_height: mean(germs.iter().map(|g| g.height)),
            total_germ_area: areas().sum(),
            avg_germ_area: mean(areas()),
            max_germ_area: areas().max_by(f64::total_cmp),
            min_germ_area: areas().min_by(f64::total_cmp),
            avg_germ_shape: mean(germs.iter().map(|g| g.circularity)),
            germ_distance_to_centre: to_centre,
            germ_distance_to_boundary: to_boundary,
            sinus_number: sinuses.clone().count(),
            total_sinus_area: sinuses.map(|s| s.area).sum(),
        }
    }
}
