//! 掩码的窗口展示, 主要用于调试.
//!
//! # 注意
//!
//! 需要 `plot` feature.

use super::{ClassMask, MaskView, MaskViewMut};
use crate::Idx2d;
use opencv::highgui::{imshow, wait_key};
use opencv::prelude::{Mat, MatTrait, MatTraitConst};
use std::time::Duration;

/// 表明一个可以在窗口中可视化的对象.
pub trait ImgDisplay {
    /// 展示对象.
    fn show(&self) -> opencv::Result<()>;

    /// 同 `show()`, 但在之后自动等待一次用户按键输入.
    fn show_and_wait(&self) -> opencv::Result<i32> {
        self.show()?;
        wait_key(0)
    }

    /// 同 `show()`, 但在之后自动等待给定时间.
    fn show_and_wait_for(&self, d: Duration) -> opencv::Result<i32> {
        self.show()?;
        let ms = d.as_millis().min(i32::MAX as u128);
        wait_key(ms as i32)
    }
}

/// 将行优先数据以 `(h, w)` 分辨率存储为矩阵, 并做可视化友好的像素转换.
fn mask_to_opencv_mat(data: &[u8], (h, w): Idx2d) -> opencv::Result<Mat> {
    let mut mat = Mat::from_slice_rows_cols(data, h, w)?;
    for i in 0..h as i32 {
        for j in 0..w as i32 {
            let slot = mat.at_2d_mut::<u8>(i, j)?;
            *slot = super::save::pretty(*slot);
        }
    }
    Ok(mat)
}

macro_rules! impl_mask_display {
    ($($mask: ty),+) => {
        $(
            /// 背景/淋巴结/生发中心/淋巴窦分别映射为黑色/白色/暗灰色/亮灰色.
            impl ImgDisplay for $mask {
                fn show(&self) -> opencv::Result<()> {
                    let mat = mask_to_opencv_mat(&self.as_row_major_slice(), self.shape())?;
                    imshow("Mask", &mat)
                }
            }
        )+
    };
}

impl_mask_display!(ClassMask, MaskView<'_>, MaskViewMut<'_>);
