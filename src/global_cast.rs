//! 类型转换
//!
//! [CoordMap] 和 OpenCV 的 `CV_32FC1` 重映射表之间的转换。

use std::fmt::Display;

use opencv::core::{Mat, Scalar, CV_32FC1};
use opencv::prelude::*;

use crate::config::UNSET;
use crate::error::{LutError, Result};
use crate::lut::CoordMap;

/// 一对 `CV_32FC1` 表 (map_x, map_y)，未设置的单元为 [UNSET]
#[derive(Debug)]
pub struct RemapTables {
    pub map_x: Mat,
    pub map_y: Mat,
}

/// 将 [CoordMap] 转换为 [RemapTables]
impl TryFrom<&CoordMap> for RemapTables {
    type Error = LutError;

    fn try_from(map: &CoordMap) -> Result<Self> {
        let rows = map.rows() as i32;
        let cols = map.cols() as i32;
        let mut map_x =
            Mat::new_rows_cols_with_default(rows, cols, CV_32FC1, Scalar::all(UNSET as f64))?;
        let mut map_y =
            Mat::new_rows_cols_with_default(rows, cols, CV_32FC1, Scalar::all(UNSET as f64))?;
        {
            let xs = map_x.data_typed_mut::<f32>()?;
            for (x, y, p) in map.iter_set() {
                xs[y as usize * cols as usize + x as usize] = p.x as f32;
            }
        }
        {
            let ys = map_y.data_typed_mut::<f32>()?;
            for (x, y, p) in map.iter_set() {
                ys[y as usize * cols as usize + x as usize] = p.y as f32;
            }
        }
        Ok(Self { map_x, map_y })
    }
}

/// 将 [RemapTables] 转换为 [CoordMap]，坐标四舍五入
impl TryFrom<&RemapTables> for CoordMap {
    type Error = LutError;

    fn try_from(tables: &RemapTables) -> Result<Self> {
        let size = tables.map_x.size()?;
        let size_y = tables.map_y.size()?;
        if size != size_y {
            return Err(LutError::SizeMismatch {
                expected: (size.width, size.height),
                actual: (size_y.width, size_y.height),
            });
        }
        for m in [&tables.map_x, &tables.map_y] {
            if m.typ() != CV_32FC1 {
                return Err(LutError::UnsupportedImageType(m.typ()));
            }
        }
        // FileStorage 读出的矩阵是连续的，其他来源先拷贝一份
        let map_x = tables.map_x.try_clone()?;
        let map_y = tables.map_y.try_clone()?;
        let xs = map_x.data_typed::<f32>()?;
        let ys = map_y.data_typed::<f32>()?;

        let mut map = CoordMap::from_size(size);
        let cols = size.width as usize;
        for (i, (x, y)) in xs.iter().zip(ys.iter()).enumerate() {
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            let (vx, vy) = (x.round() as i32, y.round() as i32);
            if vx >= 0 && vy >= 0 {
                map.set((i % cols) as i32, (i / cols) as i32, opencv::core::Point2i::new(vx, vy));
            }
        }
        Ok(map)
    }
}

/// 打印行列数上限，超出部分用 `...` 省略
const PRINT_LIMIT: i32 = 8;

/// 实现 Display trait 用于打印 `CV_32FC1` 矩阵
pub struct MatPrinter<'a>(pub &'a Mat);

impl Display for MatPrinter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows = self.0.rows();
        let cols = self.0.cols();
        writeln!(f, "({}, {})", rows, cols)?;
        for i in 0..rows.min(PRINT_LIMIT) {
            for j in 0..cols.min(PRINT_LIMIT) {
                let v = self.0.at_2d::<f32>(i, j).map_err(|_| std::fmt::Error)?;
                write!(f, "{}, ", v)?;
            }
            if cols > PRINT_LIMIT {
                write!(f, "...")?;
            }
            writeln!(f)?;
        }
        if rows > PRINT_LIMIT {
            writeln!(f, "...")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Point2i;

    #[test]
    fn coord_map_to_tables() {
        let mut map = CoordMap::new(2, 3);
        map.set(1, 0, Point2i::new(5, 6));
        map.set(2, 1, Point2i::new(0, 9));
        let tables = RemapTables::try_from(&map).unwrap();
        assert_eq!(tables.map_x.rows(), 2);
        assert_eq!(tables.map_x.cols(), 3);
        assert_eq!(*tables.map_x.at_2d::<f32>(0, 1).unwrap(), 5.0);
        assert_eq!(*tables.map_y.at_2d::<f32>(0, 1).unwrap(), 6.0);
        assert_eq!(*tables.map_x.at_2d::<f32>(1, 2).unwrap(), 0.0);
        assert_eq!(*tables.map_x.at_2d::<f32>(0, 0).unwrap(), UNSET as f32);

        let back = CoordMap::try_from(&tables).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn non_finite_values_stay_unset() {
        let mut map_x =
            Mat::new_rows_cols_with_default(1, 2, CV_32FC1, Scalar::all(3.0)).unwrap();
        let map_y =
            Mat::new_rows_cols_with_default(1, 2, CV_32FC1, Scalar::all(4.0)).unwrap();
        *map_x.at_2d_mut::<f32>(0, 0).unwrap() = f32::NAN;
        let map = CoordMap::try_from(&RemapTables { map_x, map_y }).unwrap();
        assert!(!map.is_set(0, 0));
        assert_eq!(map.get(1, 0), Some(Point2i::new(3, 4)));
    }

    #[test]
    fn mat_printer_truncates() {
        let mut map = CoordMap::new(10, 2);
        map.set(1, 0, Point2i::new(5, 6));
        let tables = RemapTables::try_from(&map).unwrap();
        let text = MatPrinter(&tables.map_x).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "(10, 2)");
        assert_eq!(lines[1], "-1, 5, ");
        assert_eq!(lines.len(), 1 + PRINT_LIMIT as usize + 1);
        assert_eq!(*lines.last().unwrap(), "...");

        let wrong_type =
            Mat::new_rows_cols_with_default(1, 1, opencv::core::CV_8UC1, Scalar::all(0.0)).unwrap();
        let mut out = String::new();
        let printed = std::fmt::write(&mut out, format_args!("{}", MatPrinter(&wrong_type)));
        assert!(printed.is_err());
    }

    #[test]
    fn mismatched_tables_are_rejected() {
        let tables = RemapTables {
            map_x: Mat::new_rows_cols_with_default(2, 2, CV_32FC1, Scalar::all(0.0)).unwrap(),
            map_y: Mat::new_rows_cols_with_default(3, 2, CV_32FC1, Scalar::all(0.0)).unwrap(),
        };
        assert!(CoordMap::try_from(&tables).is_err());
    }
}
