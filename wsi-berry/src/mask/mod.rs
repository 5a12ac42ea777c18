//! 单通道类别掩码及其视图.
//!
//! 掩码按 `(h, w)` 行优先存储, 每个像素是一个类别值 (见 [`crate::consts::class`]).

mod core;
mod iter;
mod palette;
mod save;

pub use core::{ClassMask, Connectivity, MaskView, MaskViewMut};
pub use iter::PosIter;
pub use palette::{Channel, Palette, PaletteParseError, PaletteRule};
pub use save::{ImgWriteRaw, ImgWriteVis};

cfg_if::cfg_if! {
    if #[cfg(feature = "plot")] {
        mod plot;

        pub use plot::ImgDisplay;
    }
}

use crate::Idx2d;

/// `(h, w)` 的 4-邻居索引. 不检查越界, 越界的索引会回绕到 `usize::MAX` 附近.
#[inline]
pub(crate) fn neighbour4((h, w): Idx2d) -> [Idx2d; 4] {
    [
        (h.wrapping_sub(1), w),
        (h.saturating_add(1), w),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
    ]
}

/// `(h, w)` 的 8-邻居索引. 不检查越界.
#[inline]
pub(crate) fn neighbour8((h, w): Idx2d) -> [Idx2d; 8] {
    [
        (h.wrapping_sub(1), w.wrapping_sub(1)),
        (h.wrapping_sub(1), w),
        (h.wrapping_sub(1), w.saturating_add(1)),
        (h, w.wrapping_sub(1)),
        (h, w.saturating_add(1)),
        (h.saturating_add(1), w.wrapping_sub(1)),
        (h.saturating_add(1), w),
        (h.saturating_add(1), w.saturating_add(1)),
    ]
}
