//! 通用常量.

/// 规范化后单通道类别掩码中的类别值.
pub mod class {
    /// 背景.
    pub const BACKGROUND: u8 = 0;

    /// 淋巴结组织.
    pub const LYMPH_NODE: u8 = 255;

    /// 生发中心.
    pub const GERMINAL: u8 = 128;

    /// 淋巴窦.
    pub const SINUS: u8 = 64;

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, BACKGROUND)
    }

    /// 像素是否是淋巴结组织?
    #[inline]
    pub const fn is_lymph_node(p: u8) -> bool {
        matches!(p, LYMPH_NODE)
    }

    /// 像素是否是生发中心?
    #[inline]
    pub const fn is_germinal(p: u8) -> bool {
        matches!(p, GERMINAL)
    }

    /// 像素是否是淋巴窦?
    #[inline]
    pub const fn is_sinus(p: u8) -> bool {
        matches!(p, SINUS)
    }

    /// 像素是否属于淋巴结 (包括其内部嵌套结构)?
    #[inline]
    pub const fn is_tissue(p: u8) -> bool {
        matches!(p, LYMPH_NODE | GERMINAL | SINUS)
    }
}

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道暗灰色.
    pub const DARK_GRAY: u8 = 0b_0100_0000;

    /// 单通道灰色.
    pub const GRAY: u8 = 0b_1000_0000;

    /// 单通道亮灰色.
    pub const LIGHT_GRAY: u8 = 0b_1100_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;
}

/// 三通道 (RGB) 颜色.
pub mod rgb {
    /// 黑色.
    pub const BLACK: [u8; 3] = [0, 0, 0];

    /// 白色.
    pub const WHITE: [u8; 3] = [255, 255, 255];

    /// 红色. 区域轮廓和淋巴窦.
    pub const RED: [u8; 3] = [255, 0, 0];

    /// 绿色. 生发中心.
    pub const GREEN: [u8; 3] = [0, 255, 0];

    /// 蓝色. 淋巴结组织.
    pub const BLUE: [u8; 3] = [0, 0, 255];
}

/// 金字塔各层相对于第 0 层的降采样倍率.
pub const MAG_FACTORS: [u32; 7] = [1, 2, 4, 8, 16, 32, 64];

/// 标注掩码的默认输出大小 (宽, 高).
pub const DEFAULT_MASK_SIZE: (u32, u32) = (2000, 2000);

/// 默认提取缩略图所用的金字塔层级.
pub const DEFAULT_THUMBNAIL_LEVEL: usize = 6;
