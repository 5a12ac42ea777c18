//! 坐标系协调.
//!
//! 一对 (切片, 掩码) 涉及三个坐标系: 第 0 层全分辨率像素、某一层的缩略图像素,
//! 以及大小任意的掩码像素. 本模块把掩码重采样到缩略图大小, 并给出缩略图到第 0 层的
//! 缩放比例, 以便把面积和长度换算成物理单位.

use crate::geometry::{Pt, Rect};
use crate::mask::{ClassMask, Palette};
use image::RgbImage;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 协调过程中的错误.
#[derive(Debug, Error, PartialEq)]
pub enum ReconcileError {
    /// 两个本应相等的尺寸 (宽, 高) 不相等.
    #[error("{what} is {found:?} (w, h) but {expected:?} was expected")]
    DimensionMismatch {
        what: &'static str,
        expected: (u32, u32),
        found: (u32, u32),
    },

    /// 尺寸中有 0, 无法计算缩放比例.
    #[error("{what} has an empty dimension {found:?}")]
    EmptyDimension {
        what: &'static str,
        found: (u32, u32),
    },
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// 缩略图坐标到第 0 层坐标的缩放, 以及可选的第 0 层物理分辨率.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Scale {
    /// 水平缩放 `w / w_new`.
    pub sx: f64,
    /// 竖直缩放 `h / h_new`.
    pub sy: f64,
    /// 第 0 层每像素的微米数 `(x, y)`.
    pub mpp: Option<(f64, f64)>,
}

impl Scale {
    /// 由第 0 层尺寸和缩略图尺寸 (都是 (宽, 高)) 计算缩放.
    pub fn new((w, h): (u32, u32), (w_new, h_new): (u32, u32)) -> ReconcileResult<Self> {
        if w_new == 0 || h_new == 0 {
            return Err(ReconcileError::EmptyDimension {
                what: "thumbnail",
                found: (w_new, h_new),
            });
        }
        Ok(Self {
            sx: w as f64 / w_new as f64,
            sy: h as f64 / h_new as f64,
            mpp: None,
        })
    }

    /// 不缩放.
    #[inline]
    pub const fn identity() -> Self {
        Self {
            sx: 1.0,
            sy: 1.0,
            mpp: None,
        }
    }

    /// 附带物理分辨率.
    #[inline]
    pub fn with_mpp(self, mpp: Option<(f64, f64)>) -> Self {
        Self { mpp, ..self }
    }

    /// 面积和长度是否以微米为单位?
    #[inline]
    pub fn is_physical(&self) -> bool {
        self.mpp.is_some()
    }

    /// 缩略图上的点映射到第 0 层.
    #[inline]
    pub fn to_level0(&self, p: Pt) -> (f64, f64) {
        (p.x as f64 * self.sx, p.y as f64 * self.sy)
    }

    /// 缩略图上的矩形映射到第 0 层, 向外取整.
    pub fn rect_to_level0(&self, r: Rect) -> Rect {
        let x0 = (r.x as f64 * self.sx).floor();
        let y0 = (r.y as f64 * self.sy).floor();
        let x1 = (r.right() as f64 * self.sx).ceil();
        let y1 = (r.bottom() as f64 * self.sy).ceil();
        Rect::new(x0 as i32, y0 as i32, (x1 - x0) as u32, (y1 - y0) as u32)
    }

    /// 缩略图面积 (像素²) 换算为 µm², 没有分辨率信息时为第 0 层像素².
    #[inline]
    pub fn physical_area(&self, area: f64) -> f64 {
        let (mx, my) = self.mpp.unwrap_or((1.0, 1.0));
        area * self.sx * self.sy * mx * my
    }

    /// 缩略图上的宽高换算为 µm, 没有分辨率信息时为第 0 层像素.
    #[inline]
    pub fn physical_lengths(&self, w: f64, h: f64) -> (f64, f64) {
        let (mx, my) = self.mpp.unwrap_or((1.0, 1.0));
        (w * self.sx * mx, h * self.sy * my)
    }

    /// 方向无关的长度换算, 取两个方向比例的几何平均.
    #[inline]
    pub fn physical_length(&self, d: f64) -> f64 {
        let (mx, my) = self.mpp.unwrap_or((1.0, 1.0));
        d * (self.sx * mx * self.sy * my).sqrt()
    }
}

/// 已对齐到缩略图坐标系的类别掩码.
#[derive(Clone, Debug)]
pub struct ReconciledMask {
    pub mask: ClassMask,
    pub scale: Scale,
}

/// 检查从切片读出的缩略图与声明的层级尺寸一致.
pub fn check_thumbnail(thumbnail: &RgbImage, declared: (u32, u32)) -> ReconcileResult<()> {
    let found = thumbnail.dimensions();
    if found != declared {
        return Err(ReconcileError::DimensionMismatch {
            what: "thumbnail",
            expected: declared,
            found,
        });
    }
    Ok(())
}

/// 把哨兵编码的 `mask` 规范化, 用最近邻插值缩放到 `thumb_dims`, 并计算缩放比例.
///
/// 规范化必须在缩放之前, 否则插值会混合通道. `level0_dims`, `thumb_dims` 均为 (宽, 高).
pub fn reconcile(
    level0_dims: (u32, u32),
    thumb_dims: (u32, u32),
    mask: &RgbImage,
    palette: &Palette,
) -> ReconcileResult<ReconciledMask> {
    let scale = Scale::new(level0_dims, thumb_dims)?;
    let (mw, mh) = mask.dimensions();
    if mw == 0 || mh == 0 {
        return Err(ReconcileError::EmptyDimension {
            what: "mask",
            found: (mw, mh),
        });
    }

    let canonical = palette.canonicalize(mask);
    let resized = canonical.resize_nearest(thumb_dims);
    let (h, w) = resized.shape();
    let found = (w as u32, h as u32);
    if found != thumb_dims {
        return Err(ReconcileError::DimensionMismatch {
            what: "resized mask",
            expected: thumb_dims,
            found,
        });
    }
    log::debug!(
        "mask {mw}x{mh} reconciled to {}x{}, scale ({:.3}, {:.3})",
        thumb_dims.0,
        thumb_dims.1,
        scale.sx,
        scale.sy
    );
    Ok(ReconciledMask {
        mask: resized,
        scale,
    })
}
