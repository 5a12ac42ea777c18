//! 跨区域、跨切片的测量结果汇总与 CSV 输出.

use crate::detect::ObjectKind;
use crate::measure::{ObjectMeasure, RegionSummary};
use itertools::Itertools;
use std::io;
use std::path::Path;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 汇总过程中的错误.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// 各列长度不一致. 按列名给出每一列的长度.
    #[error("column lengths differ: {}", fmt_lengths(.0))]
    LengthMismatch(Vec<(&'static str, usize)>),

    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

fn fmt_lengths(lengths: &[(&'static str, usize)]) -> String {
    lengths
        .iter()
        .map(|(name, len)| format!("{name}={len}"))
        .join(", ")
}

pub type AggregateResult<T> = Result<T, AggregateError>;

/// 表格中的一行: 一个对象.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub name: String,
    pub ln_idx: usize,
    pub kind: ObjectKind,
    pub area: f64,
    pub shape: f64,
    pub width: f64,
    pub height: f64,
}

/// 对象表的表头.
pub const OBJECT_HEADER: [&str; 7] = ["name", "ln_idx", "kind", "areas", "shapes", "width", "height"];

/// 区域汇总表的表头.
pub const SUMMARY_HEADER: [&str; 16] = [
    "name",
    "ln_idx",
    "ln_area",
    "ln_pixel_area",
    "germ_number",
    "avg_germ_width",
    "avg_germ_height",
    "total_germ_area",
    "avg_germ_area",
    "max_germ_area",
    "min_germ_area",
    "avg_germ_shape",
    "germ_distance_to_centre",
    "germ_distance_to_boundary",
    "sinus_number",
    "total_sinus_area",
];

/// 按列累积的测量结果.
///
/// 每个区域追加一段, 最后统一展开. 展开前会检查所有列长度一致.
#[derive(Clone, Debug, Default)]
pub struct Aggregator {
    names: Vec<String>,
    ln_idx: Vec<usize>,
    kinds: Vec<ObjectKind>,
    areas: Vec<f64>,
    shapes: Vec<f64>,
    widths: Vec<f64>,
    heights: Vec<f64>,
    summaries: Vec<RegionSummary>,
}

impl Aggregator {
    /// 空汇总.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个区域的全部对象.
    pub fn extend_region(&mut self, name: &str, ln_idx: usize, objects: &[ObjectMeasure]) {
        let n = objects.len();
        self.names.extend(std::iter::repeat(name.to_string()).take(n));
        self.ln_idx.extend(std::iter::repeat(ln_idx).take(n));
        self.kinds.extend(objects.iter().map(|o| o.kind));
        self.areas.extend(objects.iter().map(|o| o.area));
        self.shapes.extend(objects.iter().map(|o| o.circularity));
        self.widths.extend(objects.iter().map(|o| o.width));
        self.heights.extend(objects.iter().map(|o| o.height));
    }

    /// 追加一个区域的汇总行.
    #[inline]
    pub fn push_summary(&mut self, summary: RegionSummary) {
        self.summaries.push(summary);
    }

    /// 已追加的区域汇总.
    #[inline]
    pub fn summaries(&self) -> &[RegionSummary] {
        &self.summaries
    }

    /// 已追加的对象个数 (以名字列为准).
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn lengths(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("name", self.names.len()),
            ("ln_idx", self.ln_idx.len()),
            ("kind", self.kinds.len()),
            ("areas", self.areas.len()),
            ("shapes", self.shapes.len()),
            ("width", self.widths.len()),
            ("height", self.heights.len()),
        ]
    }

    /// 把各列展开为行, 只保留 `kinds` 中的对象.
    ///
    /// 列长度不一致时返回 [`AggregateError::LengthMismatch`], 不会截断.
    pub fn flatten(&self, kinds: &[ObjectKind]) -> AggregateResult<Vec<Record>> {
        let lengths = self.lengths();
        if lengths.iter().any(|&(_, l)| l != self.names.len()) {
            return Err(AggregateError::LengthMismatch(lengths));
        }
        Ok((0..self.names.len())
            .filter(|&i| kinds.contains(&self.kinds[i]))
            .map(|i| Record {
                name: self.names[i].clone(),
                ln_idx: self.ln_idx[i],
                kind: self.kinds[i],
                area: self.areas[i],
                shape: self.shapes[i],
                width: self.widths[i],
                height: self.heights[i],
            })
            .collect())
    }
}

fn opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// 写出对象表. 没有记录时只写表头.
pub fn write_objects_csv<P: AsRef<Path>>(path: P, records: &[Record]) -> AggregateResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(OBJECT_HEADER)?;
    for r in records {
        wtr.write_record([
            r.name.clone(),
            r.ln_idx.to_string(),
            r.kind.to_string(),
            r.area.to_string(),
            r.shape.to_string(),
            r.width.to_string(),
            r.height.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// 写出区域汇总表. 缺失的统计量写为空字段.
pub fn write_summary_csv<P: AsRef<Path>>(
    path: P,
    summaries: &[RegionSummary],
) -> AggregateResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(SUMMARY_HEADER)?;
    for s in summaries {
        wtr.write_record([
            s.name.clone(),
            s.ln_idx.to_string(),
            s.ln_area.to_string(),
            s.ln_pixel_area.to_string(),
            s.germ_number.to_string(),
            opt(s.avg_germ_width),
            opt(s.avg_germ_height),
            s.total_germ_area.to_string(),
            opt(s.avg_germ_area),
            opt(s.max_germ_area),
            opt(s.min_germ_area),
            opt(s.avg_germ_shape),
            opt(s.germ_distance_to_centre),
            opt(s.germ_distance_to_boundary),
            s.sinus_number.to_string(),
            s.total_sinus_area.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
