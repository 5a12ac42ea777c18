//! 批处理结果.

use std::io::{self, Write};

/// 一次运行的计数.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub masks: usize,
    pub processed: usize,
    pub missing: usize,
    pub ambiguous: usize,
    pub failed: usize,
    pub regions: usize,
    pub germinal: usize,
    pub sinus: usize,
    /// 写入对象表的行数.
    pub rows: usize,
}

impl RunSummary {
    #[inline]
    pub fn skipped(&self) -> usize {
        self.missing + self.ambiguous + self.failed
    }

    /// 将结果写进 `w` 中.
    pub fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        writeln!(w, "Run summary:")?;
        writeln!(w, "{S4}Masks found: {}", self.masks)?;
        writeln!(w, "{S4}Slides processed: {}", self.processed)?;
        writeln!(
            w,
            "{S4}Slides skipped: {} (missing {}, ambiguous {}, failed {})",
            self.skipped(),
            self.missing,
            self.ambiguous,
            self.failed
        )?;
        writeln!(w, "{S4}Lymph nodes: {}", self.regions)?;
        writeln!(w, "{S4}Germinal centres: {}", self.germinal)?;
        writeln!(w, "{S4}Sinuses: {}", self.sinus)?;
        write!(w, "{S4}Rows written: {}", self.rows)?;
        Ok(())
    }

    /// 打印结果.
    pub fn analyze(&self) -> io::Result<()> {
        let mut out = io::stdout().lock();
        utils::sep_to(&mut out)?;
        self.describe_into(&mut out)?;
        writeln!(out)?;
        utils::sep_to(&mut out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let s = RunSummary {
            masks: 5,
            processed: 2,
            missing: 1,
            ambiguous: 1,
            failed: 1,
            regions: 3,
            germinal: 7,
            sinus: 2,
            rows: 7,
        };
        assert_eq!(s.skipped(), 3);

        let mut buf = Vec::new();
        s.describe_into(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Slides processed: 2"));
        assert!(text.contains("Slides skipped: 3 (missing 1, ambiguous 1, failed 1)"));
        assert!(text.ends_with("Rows written: 7"));
    }
}
