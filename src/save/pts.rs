use std::path::Path;

use opencv::core::{Point2f, Vector};
use serde::{Deserialize, Serialize};

use crate::camera::LensModel;
use crate::error::Result;
use crate::fisheye2perspective::FishEye2Perspective;

/// 一个透视像素及其对应的鱼眼像素
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceRecord {
    pub perspective_x: i32,
    pub perspective_y: i32,
    pub fisheye_x: i32,
    pub fisheye_y: i32,
}

/// 批量查询输入的一行
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryPoint {
    pub x: f32,
    pub y: f32,
}

/// 导出 `dst_map` 中所有已设置的单元，返回写入的行数
pub fn write_correspondences<Lens: LensModel>(
    path: impl AsRef<Path>,
    engine: &FishEye2Perspective<Lens>,
) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut count = 0;
    for (x, y, s) in engine.dst_map().iter_set() {
        writer.serialize(CorrespondenceRecord {
            perspective_x: x,
            perspective_y: y,
            fisheye_x: s.x,
            fisheye_y: s.y,
        })?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

/// 读取带表头 `x,y` 的查询点
pub fn read_query_points(path: impl AsRef<Path>) -> Result<Vector<Point2f>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut points = Vector::<Point2f>::new();
    for record in reader.deserialize() {
        let record: QueryPoint = record?;
        points.push(Point2f::new(record.x, record.y));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fisheye2perspective::FishEye2Perspective;
    use opencv::core::{Point2i, Size};

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("fisheye_rs_{}_{}", std::process::id(), name))
    }

    #[test]
    fn write_and_read_back() {
        let mut engine = FishEye2Perspective::<crate::camera::StereographicCamera>::default();
        engine.initialize(Size::new(20, 20), Size::new(10, 10)).unwrap();
        let calibration = temp_path("pts_calibration.txt");
        std::fs::write(&calibration, "3 4 1 2\n10 10 5 5\n").unwrap();
        engine.load(calibration.to_str().unwrap()).unwrap();

        let path = temp_path("correspondences.csv");
        assert_eq!(write_correspondences(&path, &engine).unwrap(), 2);
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let records: Vec<CorrespondenceRecord> =
            reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(
            records[0],
            CorrespondenceRecord {
                perspective_x: 1,
                perspective_y: 2,
                fisheye_x: 3,
                fisheye_y: 4,
            }
        );
        assert_eq!(
            engine.dst_map().get(records[1].perspective_x, records[1].perspective_y),
            Some(Point2i::new(10, 10))
        );
        std::fs::remove_file(calibration).ok();
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn query_points_from_csv() {
        let path = temp_path("queries.csv");
        std::fs::write(&path, "x,y\n1.5,2\n40,7.25\n").unwrap();
        let points = read_query_points(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points.get(1).unwrap(), Point2f::new(40.0, 7.25));
        std::fs::remove_file(path).ok();
    }
}
