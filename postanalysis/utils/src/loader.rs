//! 切片与掩码文件的发现与配对.

use glob::{MatchOptions, Pattern, PatternError};
use image::RgbImage;
use std::path::{Path, PathBuf};
use wsi_berry::slide::{RasterSlide, SlideConfig, SlideReader};
use wsi_berry::PipelineResult;

/// 掩码文件名中含有该字串时视为切片的预览图, 不作为掩码.
pub const PREVIEW_MARKER: &str = "image";

/// 递归查找 `dir` 下扩展名为 `ext` (不区分大小写) 的全部文件, 按路径排序.
///
/// 无法读取的条目会被跳过并警告.
pub fn get_files<P: AsRef<Path>>(dir: P, ext: &str) -> Result<Vec<PathBuf>, PatternError> {
    let dir = dir.as_ref().to_string_lossy();
    let ext = ext.trim_start_matches('.');
    let pattern = format!(
        "{}/**/*.{}",
        Pattern::escape(dir.trim_end_matches('/')),
        Pattern::escape(ext)
    );
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut files: Vec<PathBuf> = glob::glob_with(&pattern, options)?
        .filter_map(|entry| match entry {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// `dir` 下的全部掩码文件. 文件名含有 [`PREVIEW_MARKER`] 的会被排除.
pub fn mask_files<P: AsRef<Path>>(dir: P, ext: &str) -> Result<Vec<PathBuf>, PatternError> {
    let mut files = get_files(dir, ext)?;
    files.retain(|p| {
        !p.file_name()
            .is_some_and(|n| n.to_string_lossy().contains(PREVIEW_MARKER))
    });
    Ok(files)
}

/// 文件名去掉扩展名.
#[inline]
pub fn base_name<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 掩码与切片的配对结果.
#[derive(Debug, PartialEq, Eq)]
pub enum SlideMatch<'a> {
    Unique(&'a Path),
    Missing,
    /// 全部候选切片.
    Ambiguous(Vec<&'a Path>),
}

/// 找到路径中含有掩码基本名的那张切片.
///
/// 恰好一张时为 [`SlideMatch::Unique`].
pub fn match_slide<'a>(mask: &Path, slides: &'a [PathBuf]) -> SlideMatch<'a> {
    let name = base_name(mask);
    if name.is_empty() {
        return SlideMatch::Missing;
    }
    let mut hits: Vec<&Path> = slides
        .iter()
        .filter(|s| s.to_string_lossy().contains(name.as_str()))
        .map(PathBuf::as_path)
        .collect();
    match hits.len() {
        0 => SlideMatch::Missing,
        1 => SlideMatch::Unique(hits.remove(0)),
        _ => SlideMatch::Ambiguous(hits),
    }
}

/// 打开一对切片与掩码. 切片自身没有分辨率信息时, 以 `mpp` 代替.
pub fn open_pair(
    slide: &Path,
    mask: &Path,
    config: &SlideConfig,
    mpp: Option<(f64, f64)>,
) -> PipelineResult<(RasterSlide, RgbImage)> {
    let reader = RasterSlide::open(slide, config)?;
    let reader = match reader.mpp() {
        Some(_) => reader,
        None => reader.with_mpp(mpp),
    };
    let mask = image::open(mask)?.into_rgb8();
    Ok((reader, mask))
}
