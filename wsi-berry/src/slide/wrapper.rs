use super::{resize_border, BorderOp, RasterSlide, SlideConfig, SlideError, SlideReader, SlideResult};
use crate::annotations::Annotations;
use crate::consts::rgb;
use crate::geometry::{external_contours, fill_polygon, Contour, Pt, Rect};
use crate::mask::ClassMask;
use crate::reconcile::Scale;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::filter::gaussian_blur_f32;
use ordered_float::OrderedFloat;
use std::path::Path;

/// 未给出区域时, 标注外围默认留出的像素.
const DEFAULT_BORDER_SPACE: u32 = 100;

/// 标注掩码着色用的颜色表, 第 `i` 个标签取第 `i % len` 个颜色.
const LABEL_COLOURS: [[u8; 3]; 6] = [
    rgb::RED,
    rgb::GREEN,
    rgb::BLUE,
    [255, 255, 0],
    [255, 0, 255],
    [0, 255, 255],
];

/// 带标注的切片.
#[derive(Debug)]
pub struct Slide<R> {
    reader: R,
    name: String,
    mag: usize,
    config: SlideConfig,
    annotations: Option<Annotations>,
    /// 位于 `mag` 层的过滤掩码, 非零为保留.
    filter_mask: Option<GrayImage>,
}

/// [`Slide::detect_components`] 的结果.
#[derive(Clone, Debug)]
pub struct Components {
    /// 画上了外接矩形的缩略图.
    pub annotated: RgbImage,
    /// 各组织块在第 0 层的外接矩形, 按面积升序.
    pub borders: Vec<Rect>,
}

/// [`Slide::generate_region`] 的参数.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionRequest {
    /// 读取的层级.
    pub mag: usize,
    /// 左上角 (第 0 层). 缺省时取标注外围.
    pub origin: Option<(u32, u32)>,
    /// 第 0 层的区域大小. 缺省时取标注外围的大小.
    pub size: Option<(u32, u32)>,
    /// 以 `(factor, threshold, op)` 调整区域大小, 见 [`resize_border`].
    pub scale_border: Option<(u32, Option<u32>, BorderOp)>,
}

impl Slide<RasterSlide> {
    /// 打开一个栅格切片, 名字取文件名 (不含扩展名).
    pub fn open<P: AsRef<Path>>(path: P, config: SlideConfig) -> SlideResult<Self> {
        let path = path.as_ref();
        let reader = RasterSlide::open(path, &config)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(reader, name, config))
    }
}

impl<R: SlideReader> Slide<R> {
    /// 直接初始化.
    pub fn new(reader: R, name: impl Into<String>, config: SlideConfig) -> Self {
        Self {
            reader,
            name: name.into(),
            mag: 0,
            config,
            annotations: None,
            filter_mask: None,
        }
    }

    /// 设置过滤掩码所在的层级.
    pub fn with_mag(mut self, mag: usize) -> SlideResult<Self> {
        self.config.mag_factor(mag)?;
        self.mag = mag;
        Ok(self)
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// 设置位于 `mag` 层的过滤掩码.
    pub fn set_filter_mask(&mut self, mask: GrayImage) {
        self.filter_mask = Some(mask);
    }

    #[inline]
    pub fn reader(&self) -> &R {
        &self.reader
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn mag(&self) -> usize {
        self.mag
    }

    #[inline]
    pub fn config(&self) -> &SlideConfig {
        &self.config
    }

    #[inline]
    pub fn annotations(&self) -> Option<&Annotations> {
        self.annotations.as_ref()
    }

    /// 第 0 层的尺寸 (宽, 高).
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.reader.dimensions()
    }

    /// 将第 0 层中以 `origin` 为左上角, 大小为 `src` 的窗口内的标注栅格化为 `dst` 大小的类别掩码.
    ///
    /// 多边形按类别编号升序填充, 编号大的覆盖编号小的.
    fn rasterize(&self, origin: (u32, u32), src: (u32, u32), dst: (u32, u32)) -> SlideResult<ClassMask> {
        let anns = self.annotations.as_ref().ok_or(SlideError::NoAnnotations)?;
        if dst.0 == 0 || dst.1 == 0 || src.0 == 0 || src.1 == 0 {
            return Err(SlideError::EmptyRegion(dst));
        }
        let sx = dst.0 as f64 / src.0 as f64;
        let sy = dst.1 as f64 / src.1 as f64;
        let (ox, oy) = (origin.0 as f64, origin.1 as f64);

        let mut canvas = GrayImage::new(dst.0, dst.1);
        for (class, polys) in anns.encoded() {
            for poly in polys {
                let pts: Vec<Pt> = poly
                    .iter()
                    .map(|p| {
                        Pt::new(
                            ((p.x as f64 - ox) * sx).round() as i32,
                            ((p.y as f64 - oy) * sy).round() as i32,
                        )
                    })
                    .collect();
                fill_polygon(&mut canvas, &pts, class);
            }
        }
        Ok(ClassMask::from_gray_image(&canvas))
    }

    /// 把全部标注栅格化为类别掩码, 类别编号见 [`Annotations::class_key`].
    ///
    /// 给出 `size` (宽, 高) 时先缩放多边形再填充, 不会分配第 0 层大小的缓冲.
    pub fn generate_mask(&self, size: Option<(u32, u32)>) -> SlideResult<ClassMask> {
        let dims = self.dimensions();
        self.rasterize((0, 0), dims, size.unwrap_or(dims))
    }

    /// [`SlideConfig::mask_size`] 大小的彩色标注掩码.
    pub fn slide_mask(&self) -> SlideResult<RgbImage> {
        let mask = self.generate_mask(Some(self.config.mask_size()))?;
        let (h, w) = mask.shape();
        Ok(RgbImage::from_fn(w as u32, h as u32, |x, y| {
            match mask[(y as usize, x as usize)] {
                0 => Rgb(rgb::BLACK),
                c => Rgb(LABEL_COLOURS[(c as usize - 1) % LABEL_COLOURS.len()]),
            }
        }))
    }

    /// 标注点外围 `space` 像素的边框 `[(x_min, x_max), (y_min, y_max)]`, 再除以 `mag` 层的倍率.
    ///
    /// 没有标注 (或标注为空) 时为整张切片.
    pub fn border(&self, space: u32) -> SlideResult<[(u32, u32); 2]> {
        let factor = self.config.mag_factor(self.mag)?.max(1);
        let (w, h) = self.dimensions();
        let mut border = [(0, w), (0, h)];
        if let Some(anns) = &self.annotations {
            let mut pts = anns.points().peekable();
            if pts.peek().is_some() {
                let (mut x0, mut y0, mut x1, mut y1) = (i64::MAX, i64::MAX, i64::MIN, i64::MIN);
                for p in pts {
                    x0 = x0.min(p.x as i64);
                    y0 = y0.min(p.y as i64);
                    x1 = x1.max(p.x as i64);
                    y1 = y1.max(p.y as i64);
                }
                let s = space as i64;
                let clamp = |v: i64| v.clamp(0, u32::MAX as i64) as u32;
                border = [(clamp(x0 - s), clamp(x1 + s)), (clamp(y0 - s), clamp(y1 + s))];
            }
        }
        Ok(border.map(|(a, b)| (a / factor, b / factor)))
    }

    /// 在第 `level` 层缩略图上检测组织块.
    ///
    /// 灰度化后取反, 高斯平滑, 再以 Otsu 阈值二值化并提取外轮廓. 给出 `num_component`
    /// 时只保留面积最大的若干块; 给出 `min_size` 时只保留面积 (缩略图像素²) 大于它的块.
    pub fn detect_components(
        &self,
        level: usize,
        num_component: Option<usize>,
        min_size: Option<f64>,
    ) -> SlideResult<Components> {
        let thumb = self.reader.thumbnail(level)?;
        let mut gray = imageops::grayscale(&thumb);
        imageops::invert(&mut gray);
        let blur = gaussian_blur_f32(&gray, 2.0);
        let t = otsu_level(&blur);
        let bin = GrayImage::from_fn(blur.width(), blur.height(), |x, y| {
            Luma([if blur.get_pixel(x, y).0[0] > t { u8::MAX } else { 0 }])
        });

        let mut contours = external_contours(&bin);
        contours.sort_by_key(|c| OrderedFloat(c.area()));
        if let Some(n) = num_component {
            let skip = contours.len().saturating_sub(n);
            contours.drain(..skip);
        }
        if let Some(min) = min_size {
            contours.retain(|c| c.area() > min);
        }

        let scale = Scale::new(self.dimensions(), thumb.dimensions())
            .map_err(|_| SlideError::EmptyRegion(thumb.dimensions()))?;
        let mut annotated = thumb;
        let mut borders = Vec::with_capacity(contours.len());
        for rect in contours.iter().filter_map(Contour::bounding_rect) {
            for d in 0..2 {
                let r = imageproc::rect::Rect::at(rect.x - d, rect.y - d)
                    .of_size(rect.width + 2 * d as u32, rect.height + 2 * d as u32);
                draw_hollow_rect_mut(&mut annotated, r, Rgb(rgb::GREEN));
            }
            borders.push(scale.rect_to_level0(rect));
        }
        log::debug!("{}: {} tissue component(s) at level {level}", self.name, borders.len());
        Ok(Components { annotated, borders })
    }

    /// 读取一块区域, 并附带同一区域的标注掩码 (若有标注).
    ///
    /// 区域超出切片的部分被裁掉; 返回的图像和掩码大小都是第 0 层大小除以 `mag` 层倍率.
    pub fn generate_region(&self, req: RegionRequest) -> SlideResult<(RgbImage, Option<ClassMask>)> {
        let [(bx0, bx1), (by0, by1)] = match (req.origin, req.size) {
            (Some(_), Some(_)) => [(0, 0), (0, 0)],
            _ => self.border(DEFAULT_BORDER_SPACE)?,
        };
        let (x0, y0) = req.origin.unwrap_or((bx0, by0));
        let (mut w, mut h) = req
            .size
            .unwrap_or((bx1.saturating_sub(bx0), by1.saturating_sub(by0)));

        if let Some((factor, threshold, op)) = req.scale_border {
            w = resize_border(w, factor, threshold, op).unwrap_or(w);
            h = resize_border(h, factor, threshold, op).unwrap_or(h);
        }
        let (dw, dh) = self.dimensions();
        w = w.min(dw.saturating_sub(x0));
        h = h.min(dh.saturating_sub(y0));

        let factor = self.config.mag_factor(req.mag)?.max(1);
        let adj = (w / factor, h / factor);
        if adj.0 == 0 || adj.1 == 0 {
            return Err(SlideError::EmptyRegion(adj));
        }
        let region = self.reader.read_region((x0, y0), req.mag, adj)?;
        let mask = match self.annotations {
            Some(_) => Some(self.rasterize((x0, y0), (w, h), adj)?),
            None => None,
        };
        Ok((region, mask))
    }

    /// 读取区域并应用过滤掩码: 掩码为 0 处变为白色.
    ///
    /// `start` 是第 0 层坐标, `size` 是 `mag` 层的大小. 过滤掩码位于 [`Self::mag`] 层,
    /// 会先缩放到 `mag` 层, 再截取并以 0 补齐. 没有过滤掩码时原样返回区域.
    pub fn filtered_region(
        &self,
        start: (u32, u32),
        mag: usize,
        size: (u32, u32),
    ) -> SlideResult<(RgbImage, Option<GrayImage>)> {
        let mut region = self.reader.read_region(start, mag, size)?;
        let Some(filter) = &self.filter_mask else {
            return Ok((region, None));
        };

        let own = self.config.mag_factor(self.mag)?.max(1) as f64;
        let target = self.config.mag_factor(mag)?.max(1);
        let scaled = if mag == self.mag {
            filter.clone()
        } else {
            let s = own / target as f64;
            let w = ((filter.width() as f64 * s).round() as u32).max(1);
            let h = ((filter.height() as f64 * s).round() as u32).max(1);
            imageops::resize(filter, w, h, FilterType::Nearest)
        };

        let (sx, sy) = (start.0 / target, start.1 / target);
        let padded = GrayImage::from_fn(size.0, size.1, |x, y| {
            scaled
                .get_pixel_checked(sx + x, sy + y)
                .copied()
                .unwrap_or(Luma([0]))
        });
        for (x, y, px) in region.enumerate_pixels_mut() {
            if padded.get_pixel(x, y).0[0] == 0 {
                *px = Rgb(rgb::WHITE);
            }
        }
        Ok((region, Some(padded)))
    }

    /// 保存不大于 `size` (宽, 高) 的缩略图, 保持宽高比.
    pub fn save_thumbnail<P: AsRef<Path>>(&self, path: P, size: (u32, u32)) -> SlideResult<()> {
        // 选择仍不小于目标大小的最深一层, 避免读取第 0 层.
        let mut level = 0;
        for l in 1..self.reader.level_count() {
            let (w, h) = self.reader.level_dimensions(l)?;
            if w >= size.0 && h >= size.1 {
                level = l;
            }
        }
        let img = self.reader.thumbnail(level)?;
        let (w, h) = img.dimensions();
        let ratio = (size.0 as f64 / w as f64).min(size.1 as f64 / h as f64).min(1.0);
        let tw = ((w as f64 * ratio).round() as u32).max(1);
        let th = ((h as f64 * ratio).round() as u32).max(1);
        imageops::resize(&img, tw, th, FilterType::Triangle).save(path)?;
        Ok(())
    }

    /// 保存 [`Self::slide_mask`].
    pub fn save_mask<P: AsRef<Path>>(&self, path: P) -> SlideResult<()> {
        self.slide_mask()?.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::Polygon;

    fn square(x: i32, y: i32, n: i32) -> Polygon {
        vec![Pt::new(x, y), Pt::new(x + n, y), Pt::new(x + n, y + n), Pt::new(x, y + n)]
    }

    fn slide_with(anns: Option<Annotations>) -> Slide<RasterSlide> {
        // 256x128, 左侧有一块深色组织.
        let mut img = RgbImage::from_pixel(256, 128, Rgb(rgb::WHITE));
        for y in 32..96 {
            for x in 32..96 {
                img.put_pixel(x, y, Rgb([120, 40, 90]));
            }
        }
        let config = SlideConfig::default();
        let slide = Slide::new(RasterSlide::from_image(img, &config), "s", config);
        match anns {
            Some(a) => slide.with_annotations(a),
            None => slide,
        }
    }

    fn anns() -> Annotations {
        Annotations::from_polygons([
            ("node", vec![square(20, 20, 100)]),
            ("germ", vec![square(40, 40, 20)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_generate_mask_scaled() {
        let slide = slide_with(Some(anns()));
        let full = slide.generate_mask(None).unwrap();
        assert_eq!(full.shape(), (128, 256));
        assert_eq!(full.count(2), 21 * 21);
        assert_eq!(full.count(1), 101 * 101 - 21 * 21);

        let half = slide.generate_mask(Some((128, 64))).unwrap();
        assert_eq!(half.shape(), (64, 128));
        assert_eq!(half[(25, 25)], 2);
        assert_eq!(half[(15, 15)], 1);
        assert_eq!(half[(5, 5)], 0);

        let mut m = slide.generate_mask(Some((128, 64))).unwrap();
        assert!(m.view_mut().replace(1, crate::consts::class::LYMPH_NODE) > 0);

        let rgb_mask = slide.slide_mask().unwrap();
        assert_eq!(rgb_mask.dimensions(), (2000, 2000));
        assert!(matches!(slide_with(None).generate_mask(None), Err(SlideError::NoAnnotations)));
    }

    #[test]
    fn test_border() {
        let slide = slide_with(Some(anns()));
        assert_eq!(slide.border(10).unwrap(), [(10, 130), (10, 130)]);
        assert_eq!(slide_with(None).border(10).unwrap(), [(0, 256), (0, 128)]);
        let slide = slide_with(Some(anns())).with_mag(1).unwrap();
        assert_eq!(slide.border(0).unwrap(), [(10, 60), (10, 60)]);
        assert!(slide_with(None).with_mag(9).is_err());
    }

    #[test]
    fn test_detect_components() {
        let slide = slide_with(None);
        let comps = slide.detect_components(2, Some(1), None).unwrap();
        assert_eq!(comps.borders.len(), 1);
        let r = comps.borders[0];
        assert!(r.x >= 24 && r.x <= 40, "{r:?}");
        assert!(r.right() >= 88 && r.right() <= 104, "{r:?}");
        assert_eq!(comps.annotated.dimensions(), (64, 32));
    }

    #[test]
    fn test_generate_region() {
        let slide = slide_with(Some(anns()));
        let req = RegionRequest {
            mag: 1,
            origin: Some((200, 100)),
            size: Some((100, 100)),
            scale_border: None,
        };
        let (region, mask) = slide.generate_region(req).unwrap();
        // 超出切片的部分被裁掉: 56x28 -> 28x14.
        assert_eq!(region.dimensions(), (28, 14));
        assert_eq!(mask.unwrap().shape(), (14, 28));

        let (region, mask) = slide.generate_region(RegionRequest::default()).unwrap();
        assert_eq!(region.dimensions(), (220, 128));
        assert!(mask.unwrap().has_class(2));
    }

    #[test]
    fn test_filtered_region() {
        let mut slide = slide_with(None);
        let (r, f) = slide.filtered_region((0, 0), 0, (8, 8)).unwrap();
        assert!(f.is_none());
        assert_eq!(r.dimensions(), (8, 8));

        // 位于第 1 层的过滤掩码, 只保留左上 2x2.
        let mut filter = GrayImage::new(128, 64);
        for (x, y, p) in filter.enumerate_pixels_mut() {
            if x < 2 && y < 2 {
                *p = Luma([255]);
            }
        }
        slide = slide.with_mag(1).unwrap();
        slide.set_filter_mask(filter);
        let (r, f) = slide.filtered_region((32, 32), 0, (8, 8)).unwrap();
        let f = f.unwrap();
        assert_eq!(f.dimensions(), (8, 8));
        // 第 0 层 (32, 32) 起的窗口已在过滤区之外.
        assert!(r.pixels().all(|p| p.0 == rgb::WHITE));

        let (r, f) = slide.filtered_region((0, 0), 0, (8, 8)).unwrap();
        assert_eq!(f.unwrap().get_pixel(3, 3).0[0], 255);
        assert_eq!(r.get_pixel(7, 7).0, rgb::WHITE);
    }

    #[test]
    fn test_save_thumbnail_and_mask() {
        let dir = tempfile::tempdir().unwrap();
        let slide = slide_with(Some(anns()));
        let thumb = dir.path().join("thumb.png");
        slide.save_thumbnail(&thumb, (64, 64)).unwrap();
        assert_eq!(image::open(&thumb).unwrap().into_rgb8().dimensions(), (64, 32));
        let mask = dir.path().join("mask.png");
        slide.save_mask(&mask).unwrap();
        assert!(mask.exists());
    }
}
