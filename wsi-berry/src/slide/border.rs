use std::fmt;
use std::str::FromStr;

/// [`resize_border`] 中的阈值比较方式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum BorderOp {
    /// `>`
    Gt,
    /// `>=`
    #[default]
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
}

impl FromStr for BorderOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(BorderOp::Gt),
            ">=" | "=>" => Ok(BorderOp::Ge),
            "<" => Ok(BorderOp::Lt),
            "<=" | "=<" => Ok(BorderOp::Le),
            other => Err(format!("unknown comparison `{other}`")),
        }
    }
}

impl fmt::Display for BorderOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BorderOp::Gt => ">",
            BorderOp::Ge => ">=",
            BorderOp::Lt => "<",
            BorderOp::Le => "<=",
        })
    }
}

/// 在所有满足 `op(m, threshold)` 的 `factor` 倍数 `m` 中, 找到离 `dim` 最近的一个.
/// 距离相同时取较小者. `threshold` 缺省为 `dim`.
///
/// 不存在满足条件的倍数时返回 `None`.
pub fn resize_border(dim: u32, factor: u32, threshold: Option<u32>, op: BorderOp) -> Option<u32> {
    let t = threshold.unwrap_or(dim) as u64;
    let dim = dim as u64;
    if factor == 0 {
        let ok = match op {
            BorderOp::Gt => false,
            BorderOp::Ge => t == 0,
            BorderOp::Lt => t > 0,
            BorderOp::Le => true,
        };
        return ok.then_some(0);
    }

    let f = factor as u64;
    let (q, r) = (dim / f, dim % f);
    let nearest = if 2 * r <= f { q * f } else { (q + 1) * f };
    let ans = match op {
        BorderOp::Ge => nearest.max(t.div_ceil(f) * f),
        BorderOp::Gt => nearest.max((t / f + 1) * f),
        BorderOp::Le => nearest.min(t / f * f),
        BorderOp::Lt => {
            if t == 0 {
                return None;
            }
            nearest.min((t - 1) / f * f)
        }
    };
    u32::try_from(ans).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 穷举所有倍数的参考实现.
    fn brute(dim: u32, factor: u32, t: u32, op: BorderOp) -> Option<u32> {
        (0..2000u32)
            .map(|i| i * factor)
            .filter(|&m| match op {
                BorderOp::Gt => m > t,
                BorderOp::Ge => m >= t,
                BorderOp::Lt => m < t,
                BorderOp::Le => m <= t,
            })
            .min_by_key(|&m| (m.abs_diff(dim), m))
    }

    #[test]
    fn test_against_brute_force() {
        for op in [BorderOp::Gt, BorderOp::Ge, BorderOp::Lt, BorderOp::Le] {
            for factor in [1, 3, 7, 16] {
                for dim in 0..60 {
                    for t in [0, 5, 16, 33, 59] {
                        assert_eq!(
                            resize_border(dim, factor, Some(t), op),
                            brute(dim, factor, t, op),
                            "dim={dim} factor={factor} t={t} op={op}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(resize_border(1000, 256, None, BorderOp::Ge), Some(1024));
        assert_eq!(resize_border(1000, 256, None, BorderOp::Le), Some(768));
        assert_eq!(resize_border(0, 4, None, BorderOp::Lt), None);
        assert_eq!("=<".parse::<BorderOp>(), Ok(BorderOp::Le));
        assert!("!=".parse::<BorderOp>().is_err());
    }
}
