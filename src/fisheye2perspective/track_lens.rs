//! track lens：按球面角度分箱的最近邻查找
//!
//! 每个鱼眼像素经 `camera2world` 提升到单位球，按 (极角, 方位角) 分箱，
//! 箱内累计像素均值。查询方向所在箱为空时线性扫描所有箱，取两个步长以内
//! 最近的箱，最坏 O(n·m)。

use std::collections::HashMap;

use nalgebra::Vector3;
use opencv::core::{Point2f, Point2i, Size};

use crate::camera::LensModel;

#[derive(Debug, Clone, Copy)]
struct AngleBin {
    sum: (f64, f64),
    direction: Vector3<f32>,
    count: usize,
}

impl AngleBin {
    fn mean(&self) -> Point2i {
        Point2i::new(
            (self.sum.0 / self.count as f64).round() as i32,
            (self.sum.1 / self.count as f64).round() as i32,
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct AngleBins {
    /// 步长（弧度）
    step: f32,
    bins: HashMap<(i32, i32), AngleBin>,
    /// 线性扫描用
    entries: Vec<(Vector3<f32>, Point2i)>,
}

impl AngleBins {
    pub fn build<Lens: LensModel>(lens: &Lens, fisheye_size: Size, angle_step_deg: f32) -> Self {
        let step = angle_step_deg.max(1e-3).to_radians();
        let center = Point2f::new(
            fisheye_size.width as f32 / 2.0,
            fisheye_size.height as f32 / 2.0,
        );
        let mut bins = HashMap::<(i32, i32), AngleBin>::new();
        for y in 0..fisheye_size.height {
            for x in 0..fisheye_size.width {
                let direction = lens.camera2world(&Point2f::new(x as f32, y as f32), &center);
                let key = Self::key(&direction, step);
                let bin = bins.entry(key).or_insert(AngleBin {
                    sum: (0.0, 0.0),
                    direction: Vector3::zeros(),
                    count: 0,
                });
                bin.sum.0 += x as f64;
                bin.sum.1 += y as f64;
                bin.direction += direction;
                bin.count += 1;
            }
        }
        let entries = bins
            .values()
            .map(|bin| (bin.direction.normalize(), bin.mean()))
            .collect();
        log::debug!("track lens: {} angle bins", bins.len());
        Self {
            step,
            bins,
            entries,
        }
    }

    /// 方向 (镜头坐标系，光轴 -z) -> (极角, 方位角) 箱号
    #[inline]
    fn key(direction: &Vector3<f32>, step: f32) -> (i32, i32) {
        let d = direction.normalize();
        let polar = (-d.z).clamp(-1.0, 1.0).acos();
        let azimuth = d.y.atan2(d.x) + std::f32::consts::PI;
        ((polar / step) as i32, (azimuth / step) as i32)
    }

    /// 最近的鱼眼像素，超过两个步长的角距离视为找不到
    pub fn nearest(&self, direction: &Vector3<f32>) -> Option<Point2i> {
        let norm = direction.norm();
        if norm <= f32::EPSILON {
            return None;
        }
        if let Some(bin) = self.bins.get(&Self::key(direction, self.step)) {
            return Some(bin.mean());
        }
        let d = direction / norm;
        let max_cos = (2.0 * self.step).cos();
        self.entries
            .iter()
            .map(|(dir, p)| (dir.dot(&d), *p))
            .filter(|(cos, _)| *cos >= max_cos)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, p)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::StereographicCamera;

    #[test]
    fn optical_axis_resolves_to_center() {
        let lens = StereographicCamera::default();
        let bins = AngleBins::build(&lens, Size::new(100, 100), 1.0);
        let p = bins.nearest(&Vector3::new(0.0, 0.0, -1.0)).unwrap();
        assert!((p.x - 50).abs() <= 2 && (p.y - 50).abs() <= 2);
    }

    /// 极角 `polar_deg`、方位角 0 的单位方向
    fn tilted(polar_deg: f32) -> Vector3<f32> {
        let t = polar_deg.to_radians();
        Vector3::new(t.sin(), 0.0, -t.cos())
    }

    #[test]
    fn empty_bin_falls_back_to_neighbour_within_two_steps() {
        let step = 1.0f32.to_radians();
        let known = tilted(10.2);
        let pixel = Point2i::new(3, 4);
        let mut bins = AngleBins {
            step,
            ..Default::default()
        };
        bins.bins.insert(
            AngleBins::key(&known, step),
            AngleBin {
                sum: (3.0, 4.0),
                direction: known,
                count: 1,
            },
        );
        bins.entries.push((known, pixel));

        assert_eq!(bins.nearest(&known), Some(pixel));
        // 相邻箱为空，角距离 1.5 步
        let near = tilted(11.7);
        assert!(!bins.bins.contains_key(&AngleBins::key(&near, step)));
        assert_eq!(bins.nearest(&near), Some(pixel));
        // 超过两个步长
        assert_eq!(bins.nearest(&tilted(13.5)), None);
    }

    #[test]
    fn backward_direction_is_not_found() {
        let lens = StereographicCamera::default();
        let bins = AngleBins::build(&lens, Size::new(40, 40), 1.0);
        assert_eq!(bins.nearest(&Vector3::new(0.0, 0.0, 1.0)), None);
        assert_eq!(bins.nearest(&Vector3::zeros()), None);
    }
}
