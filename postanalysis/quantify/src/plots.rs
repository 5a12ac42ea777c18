//! 每个淋巴结的可视化输出.

use image::imageops;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use std::path::Path;
use wsi_berry::consts::{class, rgb};
use wsi_berry::mask::ClassMask;
use wsi_berry::pipeline::{PipelineConfig, SlideAnalysis};
use wsi_berry::segment::Region;

/// 轮廓线的半径. 每个轮廓点画一个实心圆, 线宽为 `2 * r + 1`.
const CONTOUR_RADIUS: i32 = 1;

/// 缩略图中该区域的外接矩形部分, 画上红色外轮廓.
pub fn region_overlay(thumbnail: &RgbImage, region: &Region) -> RgbImage {
    let r = region.rect;
    let mut crop =
        imageops::crop_imm(thumbnail, r.x.max(0) as u32, r.y.max(0) as u32, r.width, r.height)
            .to_image();
    for p in region.local_contour().points() {
        draw_filled_circle_mut(&mut crop, (p.x, p.y), CONTOUR_RADIUS, Rgb(rgb::RED));
    }
    crop
}

/// 区域的三色掩码: 淋巴结为蓝, 生发中心为绿, 淋巴窦为红, 足迹外为黑.
pub fn region_classes(mask: &ClassMask, region: &Region, config: &PipelineConfig) -> RgbImage {
    let view = mask.view();
    let Some(crop) = region.mask_crop(&view) else {
        return RgbImage::new(region.rect.width, region.rect.height);
    };
    let (h, w) = crop.shape();
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let pos = (y as usize, x as usize);
        let px = match crop[pos] {
            _ if !region.in_footprint(pos) => rgb::BLACK,
            c if c == config.germinal_class => rgb::GREEN,
            c if c == config.sinus_class => rgb::RED,
            class::BACKGROUND => rgb::BLACK,
            _ => rgb::BLUE,
        };
        Rgb(px)
    })
}

/// 为每个淋巴结写出 `<name><i>_ln.png` 与 `<name><i>_binarymask.png`.
pub fn save_region_plots(
    save_path: &Path,
    analysis: &SlideAnalysis,
    config: &PipelineConfig,
) -> image::ImageResult<()> {
    for ra in &analysis.regions {
        let idx = ra.region.index;
        let stem = format!("{}{idx}", analysis.name);
        region_overlay(&analysis.thumbnail, &ra.region)
            .save(save_path.join(format!("{stem}_ln.png")))?;
        region_classes(&analysis.mask, &ra.region, config)
            .save(save_path.join(format!("{stem}_binarymask.png")))?;
    }
    Ok(())
}
