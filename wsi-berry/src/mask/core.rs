use super::iter::PosIter;
use super::{neighbour4, neighbour8};
use crate::consts::class::*;
use crate::geometry::Rect;
use crate::{Area2d, Areas2d, Idx2d};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use ndarray::iter::{Iter, IterMut};
use ndarray::{s, Array2, ArrayView2, ArrayViewMut2, Ix2};
use std::borrow::Cow;
use std::collections::{BTreeMap, VecDeque};
use std::ops::{Index, IndexMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 像素连通规则.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Connectivity {
    /// 上下左右.
    Four,

    /// 上下左右及四个对角. 与边界跟踪得到的外轮廓一致.
    #[default]
    Eight,
}

/// 拥有所有权的单通道类别掩码.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassMask {
    data: Array2<u8>,
}

/// 不可变、借用的类别掩码, 一般是 [`ClassMask`] 的整体或局部.
#[derive(Clone, Debug)]
pub struct MaskView<'a> {
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, u8>,
}

/// 可变、借用的类别掩码.
#[derive(Debug)]
pub struct MaskViewMut<'a> {
    data: ArrayViewMut2<'a, u8>,
}

impl ClassMask {
    /// 直接初始化.
    #[inline]
    pub fn new(data: Array2<u8>) -> Self {
        Self { data }
    }

    /// 全背景掩码, 大小为 `(h, w)`.
    #[inline]
    pub fn zeros((h, w): Idx2d) -> Self {
        Self::new(Array2::from_elem((h, w), BACKGROUND))
    }

    /// 从单通道图像中按原样读取类别.
    pub fn from_gray_image(img: &GrayImage) -> Self {
        let (w, h) = img.dimensions();
        Self::new(Array2::from_shape_fn((h as usize, w as usize), |(r, c)| {
            img.get_pixel(c as u32, r as u32).0[0]
        }))
    }

    /// 消费自我, 获得底层数组.
    #[inline]
    pub fn into_raw(self) -> Array2<u8> {
        self.data
    }

    /// 整体的不可变视图.
    #[inline]
    pub fn view(&self) -> MaskView<'_> {
        MaskView {
            data: self.data.view(),
        }
    }

    /// 整体的可变视图.
    #[inline]
    pub fn view_mut(&mut self) -> MaskViewMut<'_> {
        MaskViewMut {
            data: self.data.view_mut(),
        }
    }

    /// 以最近邻插值缩放到 `(w, h)`. 不会产生新的类别值.
    pub fn resize_nearest(&self, (w, h): (u32, u32)) -> Self {
        let (h_old, w_old) = self.shape();
        if (h_old, w_old) == (h as usize, w as usize) {
            return self.clone();
        }
        let resized = imageops::resize(&self.to_gray_image(), w, h, FilterType::Nearest);
        Self::from_gray_image(&resized)
    }
}

impl<'a> MaskView<'a> {
    /// 直接初始化.
    #[inline]
    pub fn new(data: ArrayView2<'a, u8>) -> Self {
        Self { data }
    }
}

/// 可变方法集合.
impl<'a> MaskViewMut<'a> {
    /// 直接初始化.
    #[inline]
    pub fn new(data: ArrayViewMut2<'a, u8>) -> Self {
        Self { data }
    }

    /// 获得 **底层** 数据的一份可变 shallow copy.
    #[inline]
    pub fn array_view_mut(&mut self) -> ArrayViewMut2<u8> {
        self.data.view_mut()
    }

    /// 获取可以迭代并修改像素的迭代器.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, u8, Ix2> {
        self.data.iter_mut()
    }

    /// 获取给定位置 (高, 宽) 的像素值, 并可就地修改. 越界时返回 `None`.
    #[inline]
    pub fn get_mut(&mut self, pos: Idx2d) -> Option<&mut u8> {
        self.data.get_mut(pos)
    }

    /// 将值为 `old` 的像素全部替换为 `new`, 返回替换的个数.
    pub fn replace(&mut self, old: u8, new: u8) -> usize {
        let mut cnt = 0usize;
        self.iter_mut().filter(|pix| **pix == old).for_each(|p| {
            cnt += 1;
            *p = new;
        });
        cnt
    }

    /// 将 `it` 给出的所有位置设置为 `value`. 越界的位置被忽略.
    pub fn fill_batch<I: IntoIterator<Item = Idx2d>>(&mut self, it: I, value: u8) {
        for pos in it {
            if let Some(p) = self.get_mut(pos) {
                *p = value;
            }
        }
    }
}

impl IndexMut<Idx2d> for MaskViewMut<'_> {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl IndexMut<Idx2d> for ClassMask {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// 掩码不可变方法集合.
macro_rules! impl_mask_immut {
    ($($mask: ty),+) => {
        $(
            impl Index<Idx2d> for $mask {
                type Output = u8;

                #[inline]
                fn index(&self, index: Idx2d) -> &Self::Output {
                    &self.data[index]
                }
            }

            /// 不可变方法集合.
            impl $mask {
                /// 获得 **底层** 数据的一份不可变 shallow copy.
                #[inline]
                pub fn array_view(&self) -> ArrayView2<u8> {
                    self.data.view()
                }

                /// 获得一份不可变的 **本体** shallow copy.
                #[inline]
                pub fn as_mask_view(&self) -> MaskView<'_> {
                    MaskView::new(self.data.view())
                }

                /// 克隆自己, 获得一个拥有所有权的掩码.
                #[inline]
                pub fn to_class_mask(&self) -> ClassMask {
                    ClassMask::new(self.data.to_owned())
                }

                /// 获取可以迭代像素的迭代器.
                #[inline]
                pub fn iter(&self) -> Iter<'_, u8, Ix2> {
                    self.data.iter()
                }

                /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
                #[inline]
                pub fn get(&self, pos: Idx2d) -> Option<&u8> {
                    self.data.get(pos)
                }

                /// 掩码的分辨率 (高, 宽).
                #[inline]
                pub fn shape(&self) -> Idx2d {
                    self.data.dim()
                }

                /// 获得掩码的高.
                #[inline]
                pub fn height(&self) -> usize {
                    self.shape().0
                }

                /// 获得掩码的宽.
                #[inline]
                pub fn width(&self) -> usize {
                    self.shape().1
                }

                /// 掩码的像素个数.
                #[inline]
                pub fn size(&self) -> usize {
                    let (h, w) = self.shape();
                    h * w
                }

                /// 判断一个索引是否合法 (未越界).
                #[inline]
                pub fn check(&self, (h, w): Idx2d) -> bool {
                    let (h_len, w_len) = self.shape();
                    h < h_len && w < w_len
                }

                /// 统计值为 `class` 的像素总个数.
                #[inline]
                pub fn count(&self, class: u8) -> usize {
                    self.data.iter().filter(|&p| *p == class).count()
                }

                /// 统计满足 `pred` 的像素总个数.
                #[inline]
                pub fn count_by(&self, pred: impl Fn(u8) -> bool) -> usize {
                    self.data.iter().filter(|&&p| pred(p)).count()
                }

                /// 掩码中是否存在值为 `class` 的像素?
                #[inline]
                pub fn has_class(&self, class: u8) -> bool {
                    self.data.iter().any(|&p| p == class)
                }

                /// 该掩码是否为全背景?
                #[inline]
                pub fn is_background(&self) -> bool {
                    self.data.iter().copied().all(is_background)
                }

                /// 各类别的像素个数, 按类别值升序.
                pub fn class_histogram(&self) -> BTreeMap<u8, usize> {
                    let mut ans = BTreeMap::new();
                    for &p in self.data.iter() {
                        *ans.entry(p).or_insert(0) += 1;
                    }
                    ans
                }

                /// 以行优先规则, 获取能迭代所有索引的迭代器.
                #[inline]
                pub fn pos_iter(&self) -> PosIter {
                    PosIter::new(self.shape())
                }

                /// 以行优先规则, 获取能迭代所有 `(索引, 像素值)` 的迭代器.
                #[inline]
                pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &u8)> {
                    self.data.indexed_iter()
                }

                /// 获得行优先存储的序列化数据.
                /// 当原始数据本身就是行优先格式时, 可以避免一次 deepcopy.
                pub fn as_row_major_slice(&self) -> Cow<[u8]> {
                    match self.data.as_slice() {
                        Some(sli) => Cow::Borrowed(sli),
                        None => Cow::Owned(self.data.iter().copied().collect()),
                    }
                }

                /// 按原样转换为单通道图像.
                pub fn to_gray_image(&self) -> GrayImage {
                    let (h, w) = self.shape();
                    GrayImage::from_fn(w as u32, h as u32, |x, y| {
                        Luma([self[(y as usize, x as usize)]])
                    })
                }

                /// 二值化: 满足 `pred` 的像素为 255, 其余为 0.
                pub fn binary_image(&self, pred: impl Fn(u8) -> bool) -> GrayImage {
                    let (h, w) = self.shape();
                    GrayImage::from_fn(w as u32, h as u32, |x, y| {
                        let hit = pred(self[(y as usize, x as usize)]);
                        Luma([if hit { u8::MAX } else { 0 }])
                    })
                }

                /// 截取 `rect` 与掩码的交集. 交集为空时返回 `None`.
                pub fn crop(&self, rect: Rect) -> Option<MaskView<'_>> {
                    let (h, w) = self.shape();
                    let r = rect.clip((w as u32, h as u32))?;
                    let (x0, y0) = (r.x as usize, r.y as usize);
                    let (x1, y1) = (r.right() as usize, r.bottom() as usize);
                    Some(MaskView::new(self.data.slice(s![y0..y1, x0..x1])))
                }

                /// 在 `rect` 窗口内统计满足 `pred` 的像素个数. 越界部分被忽略.
                pub fn count_in(&self, rect: Rect, pred: impl Fn(u8) -> bool) -> usize {
                    PosIter::window(rect)
                        .filter(|&pos| matches!(self.get(pos), Some(&p) if pred(p)))
                        .count()
                }

                /// 按照 `conn` 相邻规则获取所有区域. 两个像素 `p1` 和 `p2` 属于同一个区域,
                /// 当且仅当存在一条从 `p1` 到 `p2` 的相邻路径, 且路径上的所有像素
                /// (包括 `p1` 和 `p2`) 都满足谓词 `pred`.
                ///
                /// 区域按行优先扫描中首个像素出现的顺序排列.
                #[inline]
                pub fn areas(&self, pred: impl Fn(u8) -> bool, conn: Connectivity) -> Areas2d {
                    self.areas_from_local(self.pos_iter(), pred, conn)
                }

                /// 同 [`Self::areas`], 但只从 `it` 给出的种子位置出发做广度优先搜索.
                /// 不满足 `pred` 或越界的种子被忽略.
                pub fn areas_from_local<I: IntoIterator<Item = Idx2d>>(
                    &self,
                    it: I,
                    pred: impl Fn(u8) -> bool,
                    conn: Connectivity,
                ) -> Areas2d {
                    let mut ans = Areas2d::with_capacity(1);
                    let mut visited = Array2::<bool>::default(self.data.raw_dim());
                    let mut bfs_q = VecDeque::with_capacity(8);

                    for seed in it {
                        if !self.check(seed) || visited[seed] || !pred(self[seed]) {
                            continue;
                        }
                        visited[seed] = true;
                        bfs_q.push_back(seed);
                        let mut this_area = Area2d::with_capacity(1);
                        while let Some(cur) = bfs_q.pop_front() {
                            this_area.push(cur);
                            let n4 = neighbour4(cur);
                            let n8 = neighbour8(cur);
                            let neighbours: &[Idx2d] = match conn {
                                Connectivity::Four => &n4,
                                Connectivity::Eight => &n8,
                            };
                            for &next in neighbours {
                                if self.check(next) && !visited[next] && pred(self[next]) {
                                    visited[next] = true;
                                    bfs_q.push_back(next);
                                }
                            }
                        }
                        ans.push(this_area);
                    }
                    ans
                }
            }
        )+
    };
}

impl_mask_immut!(ClassMask, MaskView<'_>, MaskViewMut<'_>);
