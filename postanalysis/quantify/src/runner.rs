//! 程序运行函数.

use crate::plots;
use crate::result::RunSummary;
use anyhow::Context;
use std::path::{Path, PathBuf};
use utils::loader::{self, SlideMatch};
use wsi_berry::prelude::*;

/// 一次运行所需的全部配置.
#[derive(Clone, Debug)]
pub struct Settings {
    pub wsi_path: PathBuf,
    pub mask_path: PathBuf,
    pub save_path: PathBuf,
    pub slide_ext: String,
    pub mask_ext: String,
    pub slide: SlideConfig,
    pub pipeline: PipelineConfig,
    pub output_csv: PathBuf,
    pub summary_csv: PathBuf,
    /// 写入对象表的对象种类.
    pub kinds: Vec<ObjectKind>,
    pub plots: bool,
}

/// 处理单张切片, 并把结果追加到 `agg`.
fn process(
    settings: &Settings,
    slide_path: &Path,
    mask_path: &Path,
    agg: &mut Aggregator,
    summary: &mut RunSummary,
) -> anyhow::Result<()> {
    let name = loader::base_name(slide_path);
    let (reader, mask) = loader::open_pair(
        slide_path,
        mask_path,
        &settings.slide,
        settings.pipeline.mpp_fallback,
    )?;
    let analysis = analyze_slide(&reader, &name, &mask, &settings.pipeline)?;

    if settings.plots {
        plots::save_region_plots(&settings.save_path, &analysis, &settings.pipeline)
            .with_context(|| format!("writing plots of `{name}`"))?;
    }

    summary.regions += analysis.regions.len();
    summary.germinal += analysis.object_count(ObjectKind::Germinal);
    summary.sinus += analysis.object_count(ObjectKind::Sinus);
    for ra in analysis.regions {
        log::debug!(
            "{name}: lymph node {} has {} germinal centre(s), {} sinus(es)",
            ra.region.index,
            ra.measures_of(ObjectKind::Germinal).count(),
            ra.measures_of(ObjectKind::Sinus).count()
        );
        agg.extend_region(&name, ra.region.index, &ra.measures);
        agg.push_summary(ra.summary);
    }
    Ok(())
}

/// 实际运行.
///
/// 单张切片的失败只会被记录并跳过; 汇总或写表失败则直接返回错误.
pub fn run(settings: &Settings) -> anyhow::Result<RunSummary> {
    anyhow::ensure!(
        settings.wsi_path.is_dir(),
        "slide directory `{}` does not exist",
        settings.wsi_path.display()
    );
    anyhow::ensure!(
        settings.mask_path.is_dir(),
        "mask directory `{}` does not exist",
        settings.mask_path.display()
    );
    std::fs::create_dir_all(&settings.save_path)
        .with_context(|| format!("creating `{}`", settings.save_path.display()))?;

    let slides = loader::get_files(&settings.wsi_path, &settings.slide_ext)?;
    let masks = loader::mask_files(&settings.mask_path, &settings.mask_ext)?;
    log::info!("found {} slide(s) and {} mask(s)", slides.len(), masks.len());

    let mut summary = RunSummary {
        masks: masks.len(),
        ..RunSummary::default()
    };
    let mut agg = Aggregator::new();

    for mask_path in &masks {
        let slide_path = match loader::match_slide(mask_path, &slides) {
            SlideMatch::Unique(p) => p,
            SlideMatch::Missing => {
                log::warn!("no slide matches mask `{}`, skipped", mask_path.display());
                summary.missing += 1;
                continue;
            }
            SlideMatch::Ambiguous(candidates) => {
                log::warn!(
                    "mask `{}` matches {} slides, skipped",
                    mask_path.display(),
                    candidates.len()
                );
                summary.ambiguous += 1;
                continue;
            }
        };

        println!("Processing `{}`...", slide_path.display());
        match process(settings, slide_path, mask_path, &mut agg, &mut summary) {
            Ok(()) => summary.processed += 1,
            Err(e) => {
                log::error!("failed to process `{}`: {e:#}", slide_path.display());
                summary.failed += 1;
            }
        }
    }

    let records = agg.flatten(&settings.kinds)?;
    summary.rows = records.len();
    write_objects_csv(&settings.output_csv, &records)
        .with_context(|| format!("writing `{}`", settings.output_csv.display()))?;
    write_summary_csv(&settings.summary_csv, agg.summaries())
        .with_context(|| format!("writing `{}`", settings.summary_csv.display()))?;
    log::info!(
        "wrote {} and {}",
        settings.output_csv.display(),
        settings.summary_csv.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// 在 `dir` 下生成一张 256x256 的切片与一张 64x64 的掩码.
    ///
    /// 掩码中有一个 32x32 的淋巴结, 内含 8x8 的生发中心.
    fn write_pair(dir: &Path, name: &str) {
        std::fs::create_dir_all(dir.join("wsi")).unwrap();
        std::fs::create_dir_all(dir.join("mask")).unwrap();
        RgbImage::from_pixel(256, 256, Rgb([230, 230, 230]))
            .save(dir.join("wsi").join(format!("{name}.png")))
            .unwrap();
        let mask = RgbImage::from_fn(64, 64, |x, y| match (x, y) {
            (20..=27, 20..=27) => Rgb([0, 128, 255]),
            (16..=47, 16..=47) => Rgb([0, 0, 255]),
            _ => Rgb([0, 0, 0]),
        });
        mask.save(dir.join("mask").join(format!("{name}.png")))
            .unwrap();
    }

    fn settings(root: &Path) -> Settings {
        let save = root.join("out");
        Settings {
            wsi_path: root.join("wsi"),
            mask_path: root.join("mask"),
            save_path: save.clone(),
            slide_ext: "png".to_string(),
            mask_ext: "png".to_string(),
            slide: SlideConfig::default(),
            pipeline: PipelineConfig {
                level: 2,
                ..PipelineConfig::default()
            },
            output_csv: save.join("germ_details.csv"),
            summary_csv: save.join("ln_summary.csv"),
            kinds: vec![ObjectKind::Germinal],
            plots: true,
        }
    }

    #[test]
    fn test_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_pair(root, "alpha");
        // 没有对应切片的掩码
        RgbImage::new(4, 4)
            .save(root.join("mask").join("orphan.png"))
            .unwrap();

        let s = settings(root);
        let summary = run(&s).unwrap();
        assert_eq!(summary.masks, 2);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.regions, 1);
        assert_eq!(summary.germinal, 1);
        assert_eq!(summary.rows, 1);

        assert!(s.save_path.join("alpha0_ln.png").is_file());
        assert!(s.save_path.join("alpha0_binarymask.png").is_file());

        let mut rdr = csv::Reader::from_path(&s.output_csv).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "alpha");
        assert_eq!(&rows[0][2], "germinal");

        let mut rdr = csv::Reader::from_path(&s.summary_csv).unwrap();
        assert_eq!(rdr.records().count(), 1);
    }

    #[test]
    fn test_two_nodes_without_germinal_centres() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("wsi")).unwrap();
        std::fs::create_dir_all(root.join("mask")).unwrap();
        RgbImage::from_pixel(256, 256, Rgb([230, 230, 230]))
            .save(root.join("wsi").join("delta.png"))
            .unwrap();
        // 两个互不相连的纯淋巴结方块.
        let mask = RgbImage::from_fn(64, 64, |x, y| match (x, y) {
            (4..=13, 4..=13) | (30..=49, 30..=49) => Rgb([0, 0, 255]),
            _ => Rgb([0, 0, 0]),
        });
        mask.save(root.join("mask").join("delta.png")).unwrap();

        let s = settings(root);
        let summary = run(&s).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.regions, 2);
        assert_eq!(summary.germinal, 0);
        assert_eq!(summary.rows, 0);

        for i in 0..2 {
            assert!(s.save_path.join(format!("delta{i}_ln.png")).is_file());
            assert!(s.save_path.join(format!("delta{i}_binarymask.png")).is_file());
        }
        let mut rdr = csv::Reader::from_path(&s.output_csv).unwrap();
        assert_eq!(rdr.records().count(), 0);
        let mut rdr = csv::Reader::from_path(&s.summary_csv).unwrap();
        assert_eq!(rdr.records().count(), 2);
    }

    #[test]
    fn test_failed_slide_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_pair(root, "beta");
        // 无法解码的切片
        std::fs::write(root.join("wsi").join("gamma.png"), b"not a png").unwrap();
        RgbImage::new(4, 4)
            .save(root.join("mask").join("gamma.png"))
            .unwrap();

        let mut s = settings(root);
        s.plots = false;
        let summary = run(&s).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);
        assert!(!s.save_path.join("beta0_ln.png").exists());
        assert!(s.output_csv.is_file());
    }

    #[test]
    fn test_missing_input_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&settings(dir.path())).is_err());
    }
}
