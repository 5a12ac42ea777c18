//! 批量提取淋巴结、生发中心与淋巴窦的形态学测量.
//!
//! 对 `--maskpath` 下的每张掩码, 在 `--wsipath` 下找到对应的切片, 逐个淋巴结测量,
//! 最后写出对象表与淋巴结汇总表.

mod plots;
mod result;
mod runner;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use wsi_berry::prelude::*;

#[derive(Parser, Debug)]
#[command(
    name = "quantify",
    about = "Measures lymph nodes, germinal centres and sinuses from slide/mask pairs",
    long_about = None
)]
struct Args {
    /// Directory searched recursively for slides
    #[arg(short = 'w', long)]
    wsipath: PathBuf,

    /// Directory searched recursively for masks
    #[arg(short = 'm', long)]
    maskpath: PathBuf,

    /// Output directory for plots and tables
    #[arg(short = 's', long)]
    savepath: PathBuf,

    /// Pyramid level of the thumbnail the masks are aligned to
    #[arg(long, default_value_t = 6)]
    level: usize,

    /// Slide file extension
    #[arg(long, default_value = "ndpi")]
    slide_ext: String,

    /// Mask file extension
    #[arg(long, default_value = "png")]
    mask_ext: String,

    /// Microns per level-0 pixel, used when a slide carries no resolution
    #[arg(long)]
    mpp: Option<f64>,

    /// Mask colour encoding, e.g. `b255=255,b128=64,g128=128`
    #[arg(long, default_value_t = Palette::default())]
    palette: Palette,

    /// Object table (default: <savepath>/germ_details.csv)
    #[arg(long)]
    output_csv: Option<PathBuf>,

    /// Lymph node table (default: <savepath>/ln_summary.csv)
    #[arg(long)]
    summary_csv: Option<PathBuf>,

    /// Also write sinus rows to the object table
    #[arg(long)]
    include_sinus: bool,

    /// Lymph nodes with fewer thumbnail pixels are ignored
    #[arg(long, default_value_t = 0)]
    min_region_pixels: usize,

    /// Skip the per-node images
    #[arg(long)]
    no_plots: bool,

    /// Print debug logs
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_settings(self) -> runner::Settings {
        let output_csv = self
            .output_csv
            .unwrap_or_else(|| self.savepath.join("germ_details.csv"));
        let summary_csv = self
            .summary_csv
            .unwrap_or_else(|| self.savepath.join("ln_summary.csv"));
        let kinds = if self.include_sinus {
            ObjectKind::ALL.to_vec()
        } else {
            vec![ObjectKind::Germinal]
        };
        runner::Settings {
            wsi_path: self.wsipath,
            mask_path: self.maskpath,
            save_path: self.savepath,
            slide_ext: self.slide_ext,
            mask_ext: self.mask_ext,
            slide: SlideConfig::default(),
            pipeline: PipelineConfig {
                level: self.level,
                palette: self.palette,
                min_region_pixels: self.min_region_pixels,
                mpp_fallback: self.mpp.map(|m| (m, m)),
                ..PipelineConfig::default()
            },
            output_csv,
            summary_csv,
            kinds,
            plots: !self.no_plots,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new()
        .with_level(level)
        .init()
        .context("initializing logger")?;

    let settings = args.into_settings();
    println!("Running quantification...");
    let summary = runner::run(&settings)?;
    summary.analyze()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["quantify", "-w", "a", "-m", "b", "-s", "out"]);
        assert_eq!(args.level, 6);
        assert_eq!(args.slide_ext, "ndpi");
        let s = args.into_settings();
        assert_eq!(s.output_csv, PathBuf::from("out/germ_details.csv"));
        assert_eq!(s.summary_csv, PathBuf::from("out/ln_summary.csv"));
        assert_eq!(s.kinds, [ObjectKind::Germinal]);
        assert_eq!(s.pipeline.palette, Palette::default());
        assert!(s.plots);
    }

    #[test]
    fn test_options() {
        let args = Args::parse_from([
            "quantify",
            "--wsipath",
            "a",
            "--maskpath",
            "b",
            "--savepath",
            "out",
            "--level",
            "3",
            "--mpp",
            "0.25",
            "--palette",
            "b255=255,g128=128",
            "--include-sinus",
            "--no-plots",
            "--output-csv",
            "x.csv",
        ]);
        let s = args.into_settings();
        assert_eq!(s.pipeline.level, 3);
        assert_eq!(s.pipeline.mpp_fallback, Some((0.25, 0.25)));
        assert_eq!(s.pipeline.palette.rules().len(), 2);
        assert_eq!(s.kinds, ObjectKind::ALL);
        assert_eq!(s.output_csv, PathBuf::from("x.csv"));
        assert!(!s.plots);
    }

    #[test]
    fn test_required_paths() {
        assert!(Args::try_parse_from(["quantify", "-w", "a", "-m", "b"]).is_err());
    }
}
