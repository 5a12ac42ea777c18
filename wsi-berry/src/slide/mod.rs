//! 全视野数字切片 (WSI) 的抽象.
//!
//! [`SlideReader`] 描述一个金字塔式的只读栅格: 第 0 层为全分辨率, 第 `k` 层按
//! [`SlideConfig::mag_factors`] 降采样. 本 crate 自带的 [`RasterSlide`] 可以打开任何
//! `image` 能解码的文件, 并在内存中合成金字塔; 其他格式只需实现该 trait.

mod border;
mod raster;
mod wrapper;

pub use border::{resize_border, BorderOp};
pub use raster::RasterSlide;
pub use wrapper::{Components, RegionRequest, Slide};

use crate::consts::{DEFAULT_MASK_SIZE, MAG_FACTORS};
use image::RgbImage;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 切片相关的错误.
#[derive(Debug, Error)]
pub enum SlideError {
    #[error("failed to read slide: {0}")]
    Image(#[from] image::ImageError),

    #[error("level {level} is out of range, slide has {count} level(s)")]
    Level { level: usize, count: usize },

    #[error("slide has no annotations")]
    NoAnnotations,

    #[error("requested region {0:?} (w, h) is empty")]
    EmptyRegion((u32, u32)),

    #[error("failed to open slide: {0}")]
    Io(#[from] std::io::Error),
}

pub type SlideResult<T> = Result<T, SlideError>;

/// 切片的不可变配置, 构造时传入.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SlideConfig {
    mag_factors: [u32; 7],
    mask_size: (u32, u32),
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self::new(MAG_FACTORS, DEFAULT_MASK_SIZE)
    }
}

impl SlideConfig {
    /// 直接初始化.
    #[inline]
    pub const fn new(mag_factors: [u32; 7], mask_size: (u32, u32)) -> Self {
        Self {
            mag_factors,
            mask_size,
        }
    }

    /// 各层相对第 0 层的降采样倍率.
    #[inline]
    pub fn mag_factors(&self) -> &[u32; 7] {
        &self.mag_factors
    }

    /// 第 `level` 层的降采样倍率.
    #[inline]
    pub fn mag_factor(&self, level: usize) -> SlideResult<u32> {
        self.mag_factors
            .get(level)
            .copied()
            .ok_or(SlideError::Level {
                level,
                count: self.mag_factors.len(),
            })
    }

    /// 标注掩码的默认大小 (宽, 高).
    #[inline]
    pub fn mask_size(&self) -> (u32, u32) {
        self.mask_size
    }
}

/// 金字塔式只读切片.
pub trait SlideReader {
    /// 第 0 层的尺寸 (宽, 高).
    fn dimensions(&self) -> (u32, u32);

    /// 层数.
    fn level_count(&self) -> usize;

    /// 第 `level` 层的尺寸 (宽, 高).
    fn level_dimensions(&self, level: usize) -> SlideResult<(u32, u32)>;

    /// 读取第 `level` 层中大小为 `size` 的区域. `location` 为左上角在 **第 0 层** 的坐标.
    ///
    /// 超出切片的部分为白色.
    fn read_region(&self, location: (u32, u32), level: usize, size: (u32, u32))
        -> SlideResult<RgbImage>;

    /// 第 0 层每像素的微米数 `(x, y)`, 未知时为 `None`.
    fn mpp(&self) -> Option<(f64, f64)>;

    /// 整层读取.
    fn thumbnail(&self, level: usize) -> SlideResult<RgbImage> {
        let dims = self.level_dimensions(level)?;
        self.read_region((0, 0), level, dims)
    }

    /// 第 `level` 层相对第 0 层的实际降采样倍率 (按宽计算).
    fn level_downsample(&self, level: usize) -> SlideResult<f64> {
        let (w, _) = self.level_dimensions(level)?;
        Ok(self.dimensions().0 as f64 / w.max(1) as f64)
    }
}
