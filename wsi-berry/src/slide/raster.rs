use super::{SlideConfig, SlideError, SlideReader, SlideResult};
use crate::consts::rgb;
use image::imageops::{self, FilterType};
use image::{ImageReader, Rgb, RgbImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::ifd::Value;
use tiff::decoder::Decoder;
use tiff::tags::Tag;

/// TIFF `ResolutionUnit` 的取值.
const UNIT_INCH: u16 = 2;
const UNIT_CENTIMETER: u16 = 3;

/// 由一幅普通栅格图像在内存中合成的金字塔切片.
///
/// 第 `k` 层的尺寸为 `ceil(dim / factor_k)`, 由上一层以三角滤波缩小得到.
#[derive(Clone, Debug)]
pub struct RasterSlide {
    levels: Vec<RgbImage>,
    factors: Vec<u32>,
    mpp: Option<(f64, f64)>,
}

impl RasterSlide {
    /// 打开 `image` 能解码的任意图像文件.
    ///
    /// 格式按文件内容判断, 因此 `.ndpi`/`.svs` 等基于 TIFF 的文件也能打开 (前提是
    /// 其压缩方式受支持). 若文件是 TIFF 且带有分辨率标签, 同时读出第 0 层的 mpp.
    pub fn open<P: AsRef<Path>>(path: P, config: &SlideConfig) -> SlideResult<Self> {
        let path = path.as_ref();
        let img = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?
            .into_rgb8();
        let mpp = tiff_mpp(path);
        if mpp.is_none() {
            log::debug!("`{}` carries no resolution", path.display());
        }
        Ok(Self::from_image(img, config).with_mpp(mpp))
    }

    /// 以 `img` 为第 0 层构造金字塔.
    pub fn from_image(img: RgbImage, config: &SlideConfig) -> Self {
        let (w, h) = img.dimensions();
        let mut levels: Vec<RgbImage> = Vec::with_capacity(config.mag_factors().len());
        let mut factors = Vec::with_capacity(config.mag_factors().len());
        for &f in config.mag_factors() {
            let f = f.max(1);
            let dims = (w.div_ceil(f).max(1), h.div_ceil(f).max(1));
            let level = match levels.last() {
                None if dims == (w, h) => img.clone(),
                None => imageops::resize(&img, dims.0, dims.1, FilterType::Triangle),
                Some(prev) if prev.dimensions() == dims => prev.clone(),
                Some(prev) => imageops::resize(prev, dims.0, dims.1, FilterType::Triangle),
            };
            levels.push(level);
            factors.push(f);
        }
        Self {
            levels,
            factors,
            mpp: None,
        }
    }

    /// 附带第 0 层的物理分辨率.
    #[inline]
    pub fn with_mpp(self, mpp: Option<(f64, f64)>) -> Self {
        Self { mpp, ..self }
    }

    fn level(&self, level: usize) -> SlideResult<(&RgbImage, u32)> {
        match (self.levels.get(level), self.factors.get(level)) {
            (Some(img), Some(&f)) => Ok((img, f)),
            _ => Err(SlideError::Level {
                level,
                count: self.levels.len(),
            }),
        }
    }
}

fn rational(v: Value) -> Option<f64> {
    match v {
        Value::Rational(n, d) if n > 0 && d > 0 => Some(n as f64 / d as f64),
        _ => None,
    }
}

/// 由每单位长度的像素数换算 µm/像素. 没有绝对单位时返回 `None`.
fn microns_per_pixel(pixels_per_unit: f64, unit: u16) -> Option<f64> {
    let microns = match unit {
        UNIT_INCH => 25_400.0,
        UNIT_CENTIMETER => 10_000.0,
        _ => return None,
    };
    (pixels_per_unit > 0.0).then(|| microns / pixels_per_unit)
}

/// 读取 TIFF 第一个 IFD 的 `XResolution`/`YResolution`, 换算为 `(mpp_x, mpp_y)`.
///
/// 文件不是 TIFF 或缺少标签时返回 `None`.
fn tiff_mpp(path: &Path) -> Option<(f64, f64)> {
    let file = File::open(path).ok()?;
    let mut dec = Decoder::new(BufReader::new(file)).ok()?;
    // 未给出单位时, TIFF 规定为英寸.
    let unit = match dec.find_tag(Tag::ResolutionUnit).ok()? {
        Some(v) => v.into_u16().ok()?,
        None => UNIT_INCH,
    };
    let x = rational(dec.find_tag(Tag::XResolution).ok()??)?;
    let y = rational(dec.find_tag(Tag::YResolution).ok()??)?;
    Some((microns_per_pixel(x, unit)?, microns_per_pixel(y, unit)?))
}

impl SlideReader for RasterSlide {
    fn dimensions(&self) -> (u32, u32) {
        self.levels.first().map_or((0, 0), RgbImage::dimensions)
    }

    fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn level_dimensions(&self, level: usize) -> SlideResult<(u32, u32)> {
        Ok(self.level(level)?.0.dimensions())
    }

    fn read_region(
        &self,
        (x, y): (u32, u32),
        level: usize,
        (w, h): (u32, u32),
    ) -> SlideResult<RgbImage> {
        let (src, f) = self.level(level)?;
        let (lx, ly) = (x / f, y / f);
        let (sw, sh) = src.dimensions();
        let mut out = RgbImage::from_pixel(w, h, Rgb(rgb::WHITE));
        let cw = sw.saturating_sub(lx).min(w);
        let ch = sh.saturating_sub(ly).min(h);
        for oy in 0..ch {
            for ox in 0..cw {
                out.put_pixel(ox, oy, *src.get_pixel(lx + ox, ly + oy));
            }
        }
        Ok(out)
    }

    fn mpp(&self) -> Option<(f64, f64)> {
        self.mpp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pyramid_dimensions() {
        let slide = RasterSlide::from_image(RgbImage::new(130, 65), &SlideConfig::default());
        assert_eq!(slide.level_count(), 7);
        assert_eq!(slide.dimensions(), (130, 65));
        assert_eq!(slide.level_dimensions(1).unwrap(), (65, 33));
        assert_eq!(slide.level_dimensions(6).unwrap(), (3, 2));
        assert!(matches!(
            slide.level_dimensions(7),
            Err(SlideError::Level { level: 7, count: 7 })
        ));
        assert!((slide.level_downsample(1).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(slide.mpp(), None);
        assert_eq!(slide.with_mpp(Some((0.5, 0.5))).mpp(), Some((0.5, 0.5)));
    }

    #[test]
    fn test_open_detects_format_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let tif = dir.path().join("a.tif");
        RgbImage::from_pixel(16, 16, Rgb([9, 8, 7])).save(&tif).unwrap();
        let ndpi = dir.path().join("a.ndpi");
        std::fs::copy(&tif, &ndpi).unwrap();

        let slide = RasterSlide::open(&ndpi, &SlideConfig::default()).unwrap();
        assert_eq!(slide.dimensions(), (16, 16));
        assert_eq!(slide.read_region((0, 0), 0, (1, 1)).unwrap().get_pixel(0, 0).0, [9, 8, 7]);

        std::fs::write(dir.path().join("b.ndpi"), b"not a slide").unwrap();
        assert!(RasterSlide::open(dir.path().join("b.ndpi"), &SlideConfig::default()).is_err());
    }

    #[test]
    fn test_open_reads_tiff_resolution() {
        use tiff::encoder::{colortype, Rational, TiffEncoder};
        use tiff::tags::ResolutionUnit;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.ndpi");
        let file = File::create(&path).unwrap();
        let mut enc = TiffEncoder::new(file).unwrap();
        let mut img = enc.new_image::<colortype::RGB8>(8, 8).unwrap();
        // 40000 像素/厘米, 即 0.25 µm/像素.
        img.resolution(ResolutionUnit::Centimeter, Rational { n: 40_000, d: 1 });
        img.write_data(&[200u8; 8 * 8 * 3]).unwrap();

        let slide = RasterSlide::open(&path, &SlideConfig::default()).unwrap();
        let (mx, my) = slide.mpp().unwrap();
        assert!((mx - 0.25).abs() < 1e-12);
        assert!((my - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_microns_per_pixel_units() {
        assert!((microns_per_pixel(40_000.0, UNIT_CENTIMETER).unwrap() - 0.25).abs() < 1e-12);
        assert!((microns_per_pixel(254.0, UNIT_INCH).unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(microns_per_pixel(72.0, 1), None);
        assert_eq!(microns_per_pixel(0.0, UNIT_INCH), None);
        assert_eq!(rational(Value::Rational(0, 1)), None);
    }

    #[test]
    fn test_read_region_is_clipped() {
        let mut img = RgbImage::new(8, 8);
        img.put_pixel(6, 6, Rgb([1, 2, 3]));
        let slide = RasterSlide::from_image(img, &SlideConfig::default());

        let r = slide.read_region((6, 6), 0, (4, 4)).unwrap();
        assert_eq!(r.dimensions(), (4, 4));
        assert_eq!(r.get_pixel(0, 0).0, [1, 2, 3]);
        assert_eq!(r.get_pixel(1, 1).0, [0, 0, 0]);
        assert_eq!(r.get_pixel(2, 2).0, rgb::WHITE);

        let t = slide.thumbnail(1).unwrap();
        assert_eq!(t.dimensions(), (4, 4));
    }
}
