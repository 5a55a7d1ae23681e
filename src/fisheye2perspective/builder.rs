use nalgebra::Rotation3;
use opencv::core::{Point2f, Point2i, Rect, Size};
use rayon::prelude::*;

use super::track_lens::AngleBins;
use super::{FishEye2Perspective, LutStats};
use crate::camera::LensModel;
use crate::config::{LutStrategy, PerspectiveParameters, MULTIPLE_THREAD};
use crate::error::Result;
use crate::projection::ProjectionPlane;

/// 一个透视像素与鱼眼像素的对应 (perspective, fisheye)
type Correspondence = (Point2i, Point2i);

/// 逐像素投影需要的只读状态，可在线程间共享
struct Projector<'a, Lens: LensModel> {
    lens: &'a Lens,
    plane: ProjectionPlane,
    rotation: Rotation3<f32>,
    fisheye_size: Size,
    fisheye_center: Point2f,
    perspective_center: Point2f,
    bins: Option<AngleBins>,
}

impl<'a, Lens: LensModel> Projector<'a, Lens> {
    #[inline]
    fn in_fisheye(&self, p: &Point2i) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.fisheye_size.width && p.y < self.fisheye_size.height
    }

    /// 透视像素 -> 鱼眼像素，落在鱼眼图像外返回 None
    #[inline]
    fn project(&self, x: i32, y: i32) -> Option<Point2i> {
        let offset = Point2f::new(
            x as f32 - self.perspective_center.x,
            y as f32 - self.perspective_center.y,
        );
        let on_plane =
            self.plane
                .point2projectiveplane_with(&offset, &self.perspective_center, &self.rotation);
        let direction = ProjectionPlane::to_lens_frame(&on_plane);
        let fisheye = match &self.bins {
            Some(bins) => bins.nearest(&direction),
            None => self.lens.world2camera(&direction, &self.fisheye_center),
        }?;
        self.in_fisheye(&fisheye).then_some(fisheye)
    }

    fn row(&self, y: i32, x0: i32, x1: i32) -> Vec<Correspondence> {
        (x0..x1)
            .filter_map(|x| self.project(x, y).map(|s| (Point2i::new(x, y), s)))
            .collect()
    }
}

impl<Lens> FishEye2Perspective<Lens>
where
    Lens: LensModel + Sync,
{
    /// 遍历整张透视图像，填充两张查找表
    pub fn create_perspective(&mut self, parameters: &PerspectiveParameters) -> Result<LutStats> {
        let extent = Rect::new(0, 0, self.perspective_size.width, self.perspective_size.height);
        self.create_perspective_in(extent, parameters)
    }

    /// 只处理 `extent` 内（裁剪到透视图像）的透视像素
    ///
    /// 投影到鱼眼图像外的像素直接跳过，保持原值。
    /// 多个透视像素落到同一鱼眼像素时，按行优先顺序最后一次写入生效。
    pub fn create_perspective_in(
        &mut self,
        extent: Rect,
        parameters: &PerspectiveParameters,
    ) -> Result<LutStats> {
        self.ensure_initialized()?;
        if parameters.fisheye_width != self.fisheye_size.width
            || parameters.fisheye_height != self.fisheye_size.height
            || parameters.perspective_width != self.perspective_size.width
            || parameters.perspective_height != self.perspective_size.height
        {
            log::warn!("parameter image sizes differ from the initialized lookup tables");
        }
        if parameters.reinitialize {
            self.src_map.reset();
            self.dst_map.reset();
        }

        let x0 = extent.x.max(0);
        let y0 = extent.y.max(0);
        let x1 = extent.x.saturating_add(extent.width).min(self.perspective_size.width);
        let y1 = extent.y.saturating_add(extent.height).min(self.perspective_size.height);

        let plane = ProjectionPlane::from(parameters);
        let bins = match parameters.strategy {
            LutStrategy::DirectProjection => None,
            LutStrategy::TrackLens { angle_step } => {
                log::info!("building track lens bins, step {} deg", angle_step);
                Some(AngleBins::build(&self.lens, self.fisheye_size, angle_step))
            }
        };
        let projector = Projector {
            lens: &self.lens,
            plane,
            rotation: plane.rotation_matrix(),
            fisheye_size: self.fisheye_size,
            fisheye_center: Self::center_of(self.fisheye_size),
            perspective_center: Self::center_of(self.perspective_size),
            bins,
        };

        log::info!(
            "create perspective LUT over [{}, {}) x [{}, {}), strategy {:?}",
            x0,
            x1,
            y0,
            y1,
            parameters.strategy
        );
        // 每行独立计算，再按行顺序合并
        let rows: Vec<Vec<Correspondence>> = if MULTIPLE_THREAD {
            (y0..y1)
                .into_par_iter()
                .map(|y| projector.row(y, x0, x1))
                .collect()
        } else {
            (y0..y1).map(|y| projector.row(y, x0, x1)).collect()
        };

        for (dst, src) in rows.into_iter().flatten() {
            self.src_map.set(src.x, src.y, dst);
            self.dst_map.set(dst.x, dst.y, src);
        }

        let stats = self.stats();
        log::info!(
            "perspective LUT: {}/{} fisheye, {}/{} perspective cells set",
            stats.fisheye_set,
            stats.fisheye_total,
            stats.perspective_set,
            stats.perspective_total
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{scenario_engine, scenario_parameters};
    use super::*;
    use crate::error::LutError;

    #[test]
    fn center_maps_to_center() {
        let engine = scenario_engine();
        let s = engine.dst_map().get(50, 50).unwrap();
        assert!((s.x - 100).abs() <= 2 && (s.y - 100).abs() <= 2, "{:?}", s);
    }

    #[test]
    fn lookup_tables_are_bidirectional() {
        let engine = scenario_engine();
        let stats = engine.stats();
        assert!(stats.perspective_set > 0);
        for (sx, sy, d) in engine.src_map().iter_set() {
            assert_eq!(engine.dst_map().get(d.x, d.y), Some(Point2i::new(sx, sy)));
        }
        for (_, _, s) in engine.dst_map().iter_set() {
            assert!(engine.src_map().is_set(s.x, s.y));
        }
    }

    #[test]
    fn directions_behind_the_lens_stay_unset() {
        // yaw 90 度后左半边朝向镜头后方
        let mut parameters = scenario_parameters();
        parameters.rotation = [0.0, 90.0, 0.0];
        let mut engine = FishEye2Perspective::from_parameters(&parameters).unwrap();
        let stats = engine.create_perspective(&parameters).unwrap();
        assert!(stats.perspective_set < stats.perspective_total);
        assert!(!engine.dst_map().is_set(0, 50));
        assert!(engine.dst_map().is_set(99, 50));
    }

    #[test]
    fn extent_limits_the_pass() {
        let parameters = scenario_parameters();
        let mut engine = FishEye2Perspective::from_parameters(&parameters).unwrap();
        engine
            .create_perspective_in(Rect::new(40, 40, 200, 20), &parameters)
            .unwrap();
        assert!(engine.dst_map().is_set(45, 45));
        assert!(engine.dst_map().is_set(99, 59));
        assert!(!engine.dst_map().is_set(45, 60));
        assert!(!engine.dst_map().is_set(10, 45));
    }

    #[test]
    fn extreme_extent_does_not_overflow() {
        let parameters = scenario_parameters();
        let mut engine = FishEye2Perspective::from_parameters(&parameters).unwrap();
        let stats = engine
            .create_perspective_in(Rect::new(i32::MAX, i32::MAX, 10, 10), &parameters)
            .unwrap();
        assert_eq!(stats.perspective_set, 0);
        let stats = engine
            .create_perspective_in(Rect::new(90, 90, i32::MAX, i32::MAX), &parameters)
            .unwrap();
        assert_eq!(stats.perspective_set, 100);
    }

    #[test]
    fn reinitialize_clears_previous_entries() {
        let mut parameters = scenario_parameters();
        let mut engine = FishEye2Perspective::from_parameters(&parameters).unwrap();
        engine
            .create_perspective_in(Rect::new(0, 0, 10, 10), &parameters)
            .unwrap();
        assert!(engine.dst_map().is_set(5, 5));

        parameters.reinitialize = false;
        engine
            .create_perspective_in(Rect::new(50, 50, 10, 10), &parameters)
            .unwrap();
        assert!(engine.dst_map().is_set(5, 5));

        parameters.reinitialize = true;
        engine
            .create_perspective_in(Rect::new(50, 50, 10, 10), &parameters)
            .unwrap();
        assert!(!engine.dst_map().is_set(5, 5));
        assert!(engine.dst_map().is_set(55, 55));
    }

    #[test]
    fn yaw_moves_the_center() {
        let mut parameters = scenario_parameters();
        parameters.rotation = [0.0, 30.0, 0.0];
        let mut engine = FishEye2Perspective::from_parameters(&parameters).unwrap();
        engine.create_perspective(&parameters).unwrap();
        let s = engine.dst_map().get(50, 50).unwrap();
        // 正 yaw 向 -x 转
        assert!(s.x < 90, "{:?}", s);
        assert!((s.y - 100).abs() <= 1);
    }

    #[test]
    fn track_lens_agrees_near_center() {
        let mut parameters = scenario_parameters();
        parameters.strategy = LutStrategy::TrackLens { angle_step: 1.0 };
        let mut engine = FishEye2Perspective::from_parameters(&parameters).unwrap();
        engine.create_perspective(&parameters).unwrap();
        let s = engine.dst_map().get(50, 50).unwrap();
        assert!((s.x - 100).abs() <= 3 && (s.y - 100).abs() <= 3, "{:?}", s);
    }

    #[test]
    fn uninitialized_engine_fails() {
        let mut engine = FishEye2Perspective::<crate::camera::StereographicCamera>::default();
        assert!(matches!(
            engine.create_perspective(&scenario_parameters()),
            Err(LutError::NotInitialized)
        ));
    }
}
