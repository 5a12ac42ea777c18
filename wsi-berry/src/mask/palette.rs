//! 三通道哨兵编码掩码与单通道类别掩码之间的转换.
//!
//! 上游分割工具把类别写在彩色 PNG 的某个通道上, 例如蓝色通道为 255 表示淋巴结,
//! 绿色通道为 128 表示生发中心. 在任何缩放之前, 必须先把这种编码折叠为单通道类别,
//! 否则插值会产生不存在的类别.

use super::ClassMask;
use crate::consts::class::*;
use image::{Rgb, RgbImage};
use itertools::Itertools;
use ndarray::Array2;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 颜色通道 (RGB 顺序).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    /// 通道在 `[r, g, b]` 中的下标.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }

    const fn letter(self) -> char {
        match self {
            Channel::Red => 'r',
            Channel::Green => 'g',
            Channel::Blue => 'b',
        }
    }
}

/// 一条规则: 若像素的 `channel` 通道等于 `value`, 则其类别为 `class`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PaletteRule {
    pub channel: Channel,
    pub value: u8,
    pub class: u8,
}

impl PaletteRule {
    /// 直接初始化.
    #[inline]
    pub const fn new(channel: Channel, value: u8, class: u8) -> Self {
        Self {
            channel,
            value,
            class,
        }
    }

    #[inline]
    fn matches(&self, px: [u8; 3]) -> bool {
        px[self.channel.index()] == self.value
    }
}

/// 有序的规则表. 后面的规则覆盖前面的规则, 不匹配任何规则的像素为背景.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Palette {
    rules: Vec<PaletteRule>,
}

impl Default for Palette {
    /// 上游工具的编码: 蓝 255 为淋巴结, 蓝 128 为淋巴窦, 绿 128 为生发中心.
    ///
    /// 淋巴窦在这里是独立类别. 若要像旧的批处理流程那样在缩放前把蓝 128 清零
    /// (淋巴窦视为背景, 不计入淋巴结足迹), 可用 `b255=255,b128=0,g128=128`.
    fn default() -> Self {
        Self::new(vec![
            PaletteRule::new(Channel::Blue, 255, LYMPH_NODE),
            PaletteRule::new(Channel::Blue, 128, SINUS),
            PaletteRule::new(Channel::Green, 128, GERMINAL),
        ])
    }
}

impl Palette {
    /// 直接初始化.
    #[inline]
    pub fn new(rules: Vec<PaletteRule>) -> Self {
        Self { rules }
    }

    /// 全部规则.
    #[inline]
    pub fn rules(&self) -> &[PaletteRule] {
        &self.rules
    }

    /// 单个像素的类别.
    pub fn classify(&self, px: [u8; 3]) -> u8 {
        self.rules
            .iter()
            .rev()
            .find(|r| r.matches(px))
            .map_or(BACKGROUND, |r| r.class)
    }

    /// 将哨兵编码的三通道图像折叠为单通道类别掩码.
    pub fn canonicalize(&self, img: &RgbImage) -> ClassMask {
        let (w, h) = img.dimensions();
        ClassMask::new(Array2::from_shape_fn((h as usize, w as usize), |(r, c)| {
            self.classify(img.get_pixel(c as u32, r as u32).0)
        }))
    }

    /// `class` 的代表颜色: 只在该类别最后一条规则的通道上取规则值.
    ///
    /// 背景以及没有规则的类别为黑色.
    pub fn representative(&self, class: u8) -> [u8; 3] {
        let mut px = [0u8; 3];
        if let Some(r) = self.rules.iter().rev().find(|r| r.class == class) {
            px[r.channel.index()] = r.value;
        }
        px
    }

    /// 将类别掩码编码回三通道图像, 是 [`Self::canonicalize`] 的逆过程.
    pub fn encode(&self, mask: &ClassMask) -> RgbImage {
        let (h, w) = mask.shape();
        RgbImage::from_fn(w as u32, h as u32, |x, y| {
            Rgb(self.representative(mask[(y as usize, x as usize)]))
        })
    }
}

/// 调色板描述字符串的解析错误.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PaletteParseError {
    #[error("palette rule `{0}` is not of the form <r|g|b><value>=<class>")]
    Malformed(String),

    #[error("unknown channel `{0}`, expected one of r, g, b")]
    Channel(char),

    #[error("`{0}` is not a value in 0..=255")]
    Value(String),

    #[error("palette has no rules")]
    Empty,
}

/// 形如 `b255=255,b128=64,g128=128` 的描述, 规则按书写顺序排列.
impl FromStr for Palette {
    type Err = PaletteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rules = Vec::new();
        for item in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (lhs, rhs) = item
                .split_once('=')
                .ok_or_else(|| PaletteParseError::Malformed(item.to_string()))?;
            let mut chars = lhs.chars();
            let channel = match chars.next() {
                Some('r' | 'R') => Channel::Red,
                Some('g' | 'G') => Channel::Green,
                Some('b' | 'B') => Channel::Blue,
                Some(c) => return Err(PaletteParseError::Channel(c)),
                None => return Err(PaletteParseError::Malformed(item.to_string())),
            };
            let value = chars.as_str().trim();
            let value = value
                .parse::<u8>()
                .map_err(|_| PaletteParseError::Value(value.to_string()))?;
            let class = rhs
                .trim()
                .parse::<u8>()
                .map_err(|_| PaletteParseError::Value(rhs.trim().to_string()))?;
            rules.push(PaletteRule::new(channel, value, class));
        }
        if rules.is_empty() {
            return Err(PaletteParseError::Empty);
        }
        Ok(Self::new(rules))
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .rules
            .iter()
            .map(|r| format!("{}{}={}", r.channel.letter(), r.value, r.class))
            .join(",");
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let p = Palette::default();
        assert_eq!(p.classify([0, 0, 0]), BACKGROUND);
        assert_eq!(p.classify([0, 0, 255]), LYMPH_NODE);
        assert_eq!(p.classify([0, 0, 128]), SINUS);
        assert_eq!(p.classify([0, 128, 0]), GERMINAL);
        // 嵌套在淋巴结中的生发中心: 后面的规则胜出.
        assert_eq!(p.classify([0, 128, 255]), GERMINAL);
        assert_eq!(p.classify([17, 3, 200]), BACKGROUND);
    }

    #[test]
    fn test_sinus_as_background() {
        let p: Palette = "b255=255,b128=0,g128=128".parse().unwrap();
        assert_eq!(p.classify([0, 0, 128]), BACKGROUND);
        assert_eq!(p.classify([0, 0, 255]), LYMPH_NODE);
        assert_eq!(p.classify([0, 128, 255]), GERMINAL);
    }

    #[test]
    fn test_canonicalize_round_trip() {
        let p = Palette::default();
        let classes = [BACKGROUND, LYMPH_NODE, GERMINAL, SINUS];
        let mut mask = ClassMask::zeros((3, 5));
        for (i, pos) in mask.pos_iter().collect::<Vec<_>>().into_iter().enumerate() {
            mask[pos] = classes[i % classes.len()];
        }
        let encoded = p.encode(&mask);
        assert_eq!(p.canonicalize(&encoded), mask);
    }

    #[test]
    fn test_parse_and_display() {
        let p: Palette = "b255=255, b128=64,g128=128".parse().unwrap();
        assert_eq!(p, Palette::default());
        assert_eq!(p.to_string(), "b255=255,b128=64,g128=128");

        assert_eq!("".parse::<Palette>(), Err(PaletteParseError::Empty));
        assert_eq!(
            "x1=2".parse::<Palette>(),
            Err(PaletteParseError::Channel('x'))
        );
        assert_eq!(
            "b300=2".parse::<Palette>(),
            Err(PaletteParseError::Value("300".to_string()))
        );
        assert!(matches!(
            "b255".parse::<Palette>(),
            Err(PaletteParseError::Malformed(_))
        ));
    }
}
