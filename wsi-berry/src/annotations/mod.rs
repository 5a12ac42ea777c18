//! 病理标注的读取、编码与保存.
//!
//! 标注是 "标签 -> 多边形列表" 的映射, 坐标位于切片第 0 层. 标签的顺序决定了
//! 它在单通道掩码中的类别编号: 第 `i` 个标签 (从 0 开始) 编码为 `i + 1`, 0 留给背景.

mod error;
mod parse;

pub use error::{AnnotationError, AnnotationResult};

use crate::geometry::Pt;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 多边形, 首尾隐式相连.
pub type Polygon = Vec<Pt>;

/// 标注文件的来源格式.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AnnotationSource {
    ImageJ,
    Asap,
    QuPath,
    Json,
    Csv,
    /// [`Annotations::save`] 写出的格式.
    DataFrame,
}

impl AnnotationSource {
    /// 解析一个文件.
    fn parse(self, path: &Path) -> AnnotationResult<parse::Parsed> {
        match self {
            AnnotationSource::ImageJ => parse::imagej(path),
            AnnotationSource::Asap => parse::asap(path),
            AnnotationSource::QuPath => parse::qupath(path),
            AnnotationSource::Json => parse::json(path),
            AnnotationSource::Csv => parse::csv(path),
            AnnotationSource::DataFrame => parse::dataframe(path),
        }
    }
}

impl FromStr for AnnotationSource {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "imagej" => Ok(AnnotationSource::ImageJ),
            "asap" => Ok(AnnotationSource::Asap),
            "qupath" => Ok(AnnotationSource::QuPath),
            "json" => Ok(AnnotationSource::Json),
            "csv" => Ok(AnnotationSource::Csv),
            "dataframe" => Ok(AnnotationSource::DataFrame),
            _ => Err(AnnotationError::UnknownSource(s.to_string())),
        }
    }
}

/// 按标签分组的多边形标注.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Annotations {
    labels: Vec<String>,
    polygons: HashMap<String, Vec<Polygon>>,
}

impl Annotations {
    /// 从已经分好组的多边形构造. 同名标签会被合并.
    pub fn from_polygons<I, S>(groups: I) -> AnnotationResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<Polygon>)>,
        S: Into<String>,
    {
        let mut ans = Self::default();
        for (label, polys) in groups {
            ans.merge(label.into(), polys);
        }
        ans.check_encodable()?;
        Ok(ans)
    }

    /// 读取一个或多个同格式的标注文件, 按标签合并.
    ///
    /// 给出 `labels` 时只保留这些标签, 且类别编号按 `labels` 的顺序分配.
    pub fn open<P: AsRef<Path>>(
        paths: &[P],
        source: AnnotationSource,
        labels: Option<&[&str]>,
    ) -> AnnotationResult<Self> {
        let mut ans = Self::default();
        for p in paths {
            for (label, polys) in source.parse(p.as_ref())? {
                ans.merge(label, polys);
            }
        }
        if let Some(keep) = labels {
            ans.filter_labels(keep);
        }
        ans.check_encodable()?;
        log::debug!("read {} label(s): {}", ans.labels.len(), ans);
        Ok(ans)
    }

    fn merge(&mut self, label: String, polys: Vec<Polygon>) {
        if !self.polygons.contains_key(&label) {
            self.labels.push(label.clone());
        }
        self.polygons.entry(label).or_default().extend(polys);
    }

    fn check_encodable(&self) -> AnnotationResult<()> {
        if self.labels.len() > u8::MAX as usize {
            return Err(AnnotationError::TooManyLabels(self.labels.len()));
        }
        Ok(())
    }

    /// 按编号顺序排列的标签.
    #[inline]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// 某个标签的多边形.
    #[inline]
    pub fn polygons(&self, label: &str) -> Option<&[Polygon]> {
        self.polygons.get(label).map(Vec::as_slice)
    }

    /// 是否没有任何多边形?
    pub fn is_empty(&self) -> bool {
        self.polygons.values().all(Vec::is_empty)
    }

    /// 按标签顺序迭代 `(标签, 多边形)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Polygon])> {
        self.labels.iter().map(|l| {
            let polys = self.polygons.get(l).map_or(&[][..], Vec::as_slice);
            (l.as_str(), polys)
        })
    }

    /// 所有多边形的所有点.
    pub fn points(&self) -> impl Iterator<Item = Pt> + '_ {
        self.iter().flat_map(|(_, polys)| polys.iter().flatten().copied())
    }

    /// 标签到类别编号 (从 1 开始) 的映射.
    pub fn class_key(&self) -> HashMap<&str, u8> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), (i + 1) as u8))
            .collect()
    }

    /// 以类别编号代替标签, 按编号升序排列.
    pub fn encoded(&self) -> Vec<(u8, &[Polygon])> {
        self.iter()
            .enumerate()
            .map(|(i, (_, polys))| ((i + 1) as u8, polys))
            .collect()
    }

    /// 每个标签的多边形个数.
    pub fn numbers(&self) -> Vec<(&str, usize)> {
        self.iter().map(|(l, polys)| (l, polys.len())).collect()
    }

    /// 只保留 `keep` 中的标签, 并按 `keep` 的顺序重新编号.
    ///
    /// `keep` 中不存在的标签以空多边形列表保留, 以使编号稳定.
    pub fn filter_labels(&mut self, keep: &[&str]) {
        self.polygons.retain(|l, _| keep.contains(&l.as_str()));
        self.labels = keep.iter().map(|l| l.to_string()).collect();
        for l in &self.labels {
            self.polygons.entry(l.clone()).or_default();
        }
    }

    /// 重命名标签, 编号不变. `names` 中的旧标签必须存在.
    pub fn rename_labels(&mut self, names: &[(&str, &str)]) -> AnnotationResult<()> {
        for &(old, new) in names {
            let polys = self
                .polygons
                .remove(old)
                .ok_or_else(|| AnnotationError::UnknownLabel(old.to_string()))?;
            for l in self.labels.iter_mut().filter(|l| l.as_str() == old) {
                *l = new.to_string();
            }
            self.polygons.insert(new.to_string(), polys);
        }
        Ok(())
    }

    /// 以 `labels,polygon,x,y` 格式保存, 可被 [`AnnotationSource::DataFrame`] 读回.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> AnnotationResult<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["labels", "polygon", "x", "y"])?;
        for (label, polys) in self.iter() {
            for (i, poly) in polys.iter().enumerate() {
                for p in poly {
                    wtr.write_record([label.to_string(), i.to_string(), p.x.to_string(), p.y.to_string()])?;
                }
            }
        }
        wtr.flush()?;
        Ok(())
    }
}

/// `标签 (多边形个数), ...`.
impl fmt::Display for Annotations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (l, n)) in self.numbers().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{l} ({n})")?;
        }
        Ok(())
    }
}
