//! 掩码的持久化存储.

use super::{ClassMask, MaskView, MaskViewMut};
use image::ImageResult;
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 类别值 0, 64, 128, 255 肉眼很难与 "空" 区分开, 因此保存时会映射到对比更强的灰度.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
///
/// 按原样保存的掩码可以被 [`ClassMask::from_gray_image`] 无损读回.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 使像素更有利于单通道可视化. 未知类别按原样输出.
#[inline]
pub(crate) fn pretty(class: u8) -> u8 {
    use crate::consts::class::*;
    use crate::consts::gray::*;
    match class {
        BACKGROUND => BLACK,

        // 淋巴结为白色
        LYMPH_NODE => WHITE,

        // 生发中心与淋巴窦用不同的灰度, 都与淋巴结有明显反差
        GERMINAL => DARK_GRAY,
        SINUS => LIGHT_GRAY,

        any_else => any_else,
    }
}

macro_rules! impl_mask_save {
    ($($mask: ty),+) => {
        $(
            /// 背景/淋巴结/生发中心/淋巴窦分别映射为黑色/白色/暗灰色/亮灰色.
            impl ImgWriteVis for $mask {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let (height, width) = self.shape();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in self.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([pretty(pix)]));
                    }
                    buf.save(path)
                }
            }

            /// 按原样存储.
            impl ImgWriteRaw for $mask {
                fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    self.to_gray_image().save(path)
                }
            }
        )+
    };
}

impl_mask_save!(ClassMask, MaskView<'_>, MaskViewMut<'_>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::class::*;

    #[test]
    fn test_save_raw_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = ClassMask::zeros((4, 6));
        m[(1, 2)] = LYMPH_NODE;
        m[(2, 3)] = GERMINAL;
        m[(3, 5)] = SINUS;

        let raw = dir.path().join("raw.png");
        m.save_raw(&raw).unwrap();
        let back = image::open(&raw).unwrap().into_luma8();
        assert_eq!(ClassMask::from_gray_image(&back), m);

        let vis = dir.path().join("vis.png");
        m.view().save(&vis).unwrap();
        let back = image::open(&vis).unwrap().into_luma8();
        assert_eq!(back.get_pixel(2, 1).0[0], crate::consts::gray::WHITE);
        assert_eq!(back.get_pixel(3, 2).0[0], crate::consts::gray::DARK_GRAY);
    }
}
