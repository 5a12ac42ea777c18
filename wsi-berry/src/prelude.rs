//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::aggregate::{write_objects_csv, write_summary_csv, Aggregator, Record};
pub use crate::detect::ObjectKind;
pub use crate::mask::{ClassMask, Palette};
pub use crate::measure::{ObjectMeasure, RegionSummary};
pub use crate::pipeline::{analyze_slide, PipelineConfig, RegionAnalysis, SlideAnalysis};
pub use crate::slide::{RasterSlide, Slide, SlideConfig, SlideReader};
pub use crate::{Idx2d, PipelineError, PipelineResult};
