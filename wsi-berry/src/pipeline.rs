//! 一对 (切片, 掩码) 的完整处理流程: 协调 -> 分割 -> 检测 -> 测量.

use crate::consts::{class, DEFAULT_THUMBNAIL_LEVEL};
use crate::detect::{detect_objects, DetectedObject, ObjectKind};
use crate::error::PipelineResult;
use crate::mask::{ClassMask, Palette};
use crate::measure::{measure, ObjectMeasure, RegionSummary};
use crate::reconcile::{check_thumbnail, reconcile, Scale};
use crate::segment::{extract_regions, Region};
use crate::slide::SlideReader;
use image::RgbImage;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// 流程配置, 构造一次后只读.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// 缩略图所在的金字塔层级. 超出切片层数时取最深一层.
    pub level: usize,
    /// 三通道掩码的编码.
    pub palette: Palette,
    pub node_class: u8,
    pub germinal_class: u8,
    pub sinus_class: u8,
    /// 分割淋巴结时, 是否把生发中心和淋巴窦也视为前景.
    pub nested_in_node: bool,
    /// 小于该像素数的区域被丢弃.
    pub min_region_pixels: usize,
    /// 切片本身没有分辨率信息时使用的 µm/像素.
    pub mpp_fallback: Option<(f64, f64)>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_THUMBNAIL_LEVEL,
            palette: Palette::default(),
            node_class: class::LYMPH_NODE,
            germinal_class: class::GERMINAL,
            sinus_class: class::SINUS,
            nested_in_node: true,
            min_region_pixels: 0,
            mpp_fallback: None,
        }
    }
}

impl PipelineConfig {
    /// 某种对象对应的类别值.
    #[inline]
    pub fn class_of(&self, kind: ObjectKind) -> u8 {
        match kind {
            ObjectKind::Germinal => self.germinal_class,
            ObjectKind::Sinus => self.sinus_class,
        }
    }

    fn nested(&self) -> Vec<u8> {
        if self.nested_in_node {
            vec![self.germinal_class, self.sinus_class]
        } else {
            Vec::new()
        }
    }
}

/// 一个淋巴结的处理结果.
#[derive(Clone, Debug)]
pub struct RegionAnalysis {
    pub region: Region,
    /// 生发中心在前, 淋巴窦在后.
    pub objects: Vec<DetectedObject>,
    /// 与 `objects` 一一对应.
    pub measures: Vec<ObjectMeasure>,
    pub summary: RegionSummary,
}

impl RegionAnalysis {
    /// 某一种对象的测量结果.
    pub fn measures_of(&self, kind: ObjectKind) -> impl Iterator<Item = &ObjectMeasure> {
        self.measures.iter().filter(move |m| m.kind == kind)
    }
}

/// 一张切片的处理结果.
#[derive(Clone, Debug)]
pub struct SlideAnalysis {
    pub name: String,
    /// 实际使用的层级.
    pub level: usize,
    pub thumbnail: RgbImage,
    /// 缩略图大小的规范化类别掩码.
    pub mask: ClassMask,
    pub scale: Scale,
    pub regions: Vec<RegionAnalysis>,
}

impl SlideAnalysis {
    /// 全部对象个数.
    pub fn object_count(&self, kind: ObjectKind) -> usize {
        self.regions.iter().map(|r| r.measures_of(kind).count()).sum()
    }
}

fn analyze_region(
    name: &str,
    mask: &ClassMask,
    region: Region,
    scale: &Scale,
    config: &PipelineConfig,
) -> RegionAnalysis {
    let view = mask.view();
    let objects: Vec<DetectedObject> = ObjectKind::ALL
        .iter()
        .flat_map(|&kind| detect_objects(&view, &region, config.class_of(kind), kind))
        .collect();
    let measures: Vec<ObjectMeasure> = objects.iter().map(|o| measure(o, scale)).collect();
    let summary = RegionSummary::summarize(name, &region, &measures, scale);
    RegionAnalysis {
        region,
        objects,
        measures,
        summary,
    }
}

/// 处理一张切片.
///
/// `mask` 是哨兵编码的三通道掩码, 大小任意. 缩略图层级超出切片层数时取最深一层并警告.
pub fn analyze_slide<R: SlideReader>(
    reader: &R,
    name: &str,
    mask: &RgbImage,
    config: &PipelineConfig,
) -> PipelineResult<SlideAnalysis> {
    let deepest = reader.level_count().saturating_sub(1);
    let level = if config.level > deepest {
        log::warn!(
            "{name}: level {} is not available, using level {deepest}",
            config.level
        );
        deepest
    } else {
        config.level
    };

    let thumb_dims = reader.level_dimensions(level)?;
    let thumbnail = reader.thumbnail(level)?;
    check_thumbnail(&thumbnail, thumb_dims)?;

    let mpp = reader.mpp().or(config.mpp_fallback);
    if mpp.is_none() {
        log::warn!("{name}: no resolution metadata, areas are reported in level-0 pixels");
    }
    let reconciled = reconcile(reader.dimensions(), thumb_dims, mask, &config.palette)?;
    let scale = reconciled.scale.with_mpp(mpp);
    let mask = reconciled.mask;

    let regions = extract_regions(
        &mask.view(),
        config.node_class,
        &config.nested(),
        config.min_region_pixels,
    );
    log::info!("{name}: {} lymph node(s) at level {level}", regions.len());

    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            let regions: Vec<RegionAnalysis> = regions
                .into_par_iter()
                .map(|r| analyze_region(name, &mask, r, &scale, config))
                .collect();
        } else {
            let regions: Vec<RegionAnalysis> = regions
                .into_iter()
                .map(|r| analyze_region(name, &mask, r, &scale, config))
                .collect();
        }
    }

    Ok(SlideAnalysis {
        name: name.to_string(),
        level,
        thumbnail,
        mask,
        scale,
        regions,
    })
}
