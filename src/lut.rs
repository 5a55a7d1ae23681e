//! 稠密坐标查找表
//!
//! 每个单元保存对应图像中的 `(x, y)`，`[UNSET, UNSET]` 表示未设置。

use ndarray::Array2;
use opencv::core::{Point2i, Size};

use crate::config::UNSET;

#[derive(Debug, Clone, PartialEq)]
pub struct CoordMap {
    data: Array2<[i32; 2]>,
}

impl Default for CoordMap {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl CoordMap {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), [UNSET, UNSET]),
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(size.height.max(0) as usize, size.width.max(0) as usize)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn size(&self) -> Size {
        Size::new(self.cols() as i32, self.rows() as i32)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.cols() && (y as usize) < self.rows()
    }

    #[inline]
    fn is_set_value(value: &[i32; 2]) -> bool {
        value[0] >= 0 && value[1] >= 0
    }

    /// (x, y) 处已设置的坐标，越界或未设置返回 None
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<Point2i> {
        if !self.contains(x, y) {
            return None;
        }
        self.data
            .get((y as usize, x as usize))
            .filter(|v| Self::is_set_value(v))
            .map(|v| Point2i::new(v[0], v[1]))
    }

    #[inline]
    pub fn is_set(&self, x: i32, y: i32) -> bool {
        self.get(x, y).is_some()
    }

    /// 越界时不写入，返回 false
    #[inline]
    pub fn set(&mut self, x: i32, y: i32, value: Point2i) -> bool {
        if !self.contains(x, y) {
            return false;
        }
        match self.data.get_mut((y as usize, x as usize)) {
            Some(cell) => {
                *cell = [value.x, value.y];
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.data.fill([UNSET, UNSET]);
    }

    /// 把值不在 `bounds` 图像内的单元置为未设置，返回清除的个数
    pub fn retain_within(&mut self, bounds: Size) -> usize {
        let mut dropped = 0;
        for cell in self.data.iter_mut() {
            if Self::is_set_value(cell) && (cell[0] >= bounds.width || cell[1] >= bounds.height) {
                *cell = [UNSET, UNSET];
                dropped += 1;
            }
        }
        dropped
    }

    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|v| Self::is_set_value(v)).count()
    }

    /// 行优先遍历所有已设置的单元：(x, y, value)
    pub fn iter_set(&self) -> impl Iterator<Item = (i32, i32, Point2i)> + '_ {
        self.data
            .indexed_iter()
            .filter(|(_, v)| Self::is_set_value(v))
            .map(|((y, x), v)| (x as i32, y as i32, Point2i::new(v[0], v[1])))
    }

    /// 以 (x, y) 为中心、半径为 `radius` 的窗口内已设置坐标的均值，窗口裁剪到表内
    pub fn window_mean(&self, x: i32, y: i32, radius: i32) -> Option<(f32, f32)> {
        let x0 = x.saturating_sub(radius).max(0);
        let y0 = y.saturating_sub(radius).max(0);
        let x1 = x.saturating_add(radius).min(self.cols() as i32 - 1);
        let y1 = y.saturating_add(radius).min(self.rows() as i32 - 1);

        let mut sum = (0.0f64, 0.0f64);
        let mut count = 0usize;
        for wy in y0..=y1 {
            for wx in x0..=x1 {
                if let Some(p) = self.get(wx, wy) {
                    sum.0 += p.x as f64;
                    sum.1 += p.y as f64;
                    count += 1;
                }
            }
        }
        if count == 0 {
            None
        } else {
            Some(((sum.0 / count as f64) as f32, (sum.1 / count as f64) as f32))
        }
    }

    /// 一行的只读视图，按 x 索引
    pub(crate) fn row(&self, y: usize) -> ndarray::ArrayView1<'_, [i32; 2]> {
        self.data.row(y)
    }
}
