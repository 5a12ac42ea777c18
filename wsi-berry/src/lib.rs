//! 核心库. 从全视野数字切片 (WSI) 及其分割掩码中提取淋巴结、生发中心与淋巴窦,
//! 并给出面积、宽高、圆度等形态学测量.
//!
//! 该 crate 只提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 掩码由上游分割工具生成, 以三通道哨兵值编码. 编码方式见 [`mask::Palette`].
//! 2. 本 crate 自带的切片后端 [`slide::RasterSlide`] 只能读取 `image` 支持的栅格格式.
//!   金字塔格式 (如 ndpi) 需要另外实现 [`slide::SlideReader`].
//! 3. `(h, w)` 形式的索引 ([`Idx2d`]) 用于掩码; `(x, y)` 形式的点 ([`geometry::Pt`])
//!   用于轮廓. 两者不要混用.
//!
//! # 开发计划
//!
//! ### 坐标系协调 ✅
//!
//! 掩码规范化 -> 最近邻缩放到缩略图大小 -> 缩放比例与物理单位换算.
//!
//! 实现位于 `wsi-berry/src/reconcile.rs`.
//!
//! ### 淋巴结分割与嵌套结构检测 ✅
//!
//! 8-邻接广度优先分组, 再对每个连通块做边界跟踪. 区域的足迹由外轮廓填充得到,
//! 检测时只考虑足迹内的像素.
//!
//! 实现位于 `wsi-berry/src/segment.rs` 与 `wsi-berry/src/detect.rs`.
//!
//! ### 形态学测量与汇总 ✅
//!
//! 鞋带公式面积 (整数精确累加), 闭合周长, 圆度, 以及每个淋巴结的汇总统计.
//!
//! 实现位于 `wsi-berry/src/measure.rs` 与 `wsi-berry/src/aggregate.rs`.
//!
//! ### 切片与标注 ✅
//!
//! 1. 切片金字塔抽象, 区域读取, 组织块检测. ✅
//! 2. ImageJ / ASAP / QuPath / JSON / CSV 标注解析与栅格化. ✅
//!
//! 实现位于 `wsi-berry/src/slide` 与 `wsi-berry/src/annotations`.
//!
//! ### 真正的金字塔格式后端 ⌛️
//!
//! 需要绑定 OpenSlide 之类的 C 库.

/// 二维索引 `(h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 一个连通区域的全部像素索引.
pub type Area2d = Vec<Idx2d>;

/// 若干连通区域.
pub type Areas2d = Vec<Area2d>;

pub mod aggregate;
pub mod annotations;
pub mod consts;
pub mod detect;
mod error;
pub mod geometry;
pub mod mask;
pub mod measure;
pub mod pipeline;
pub mod prelude;
pub mod reconcile;
pub mod segment;
pub mod slide;

pub use error::{PipelineError, PipelineResult};
pub use mask::{ClassMask, ImgWriteRaw, ImgWriteVis, MaskView, MaskViewMut};

#[cfg(feature = "plot")]
pub use mask::ImgDisplay;
