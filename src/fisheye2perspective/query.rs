use opencv::core::{Point2f, Vector};

use super::FishEye2Perspective;
use crate::camera::LensModel;
use crate::config::WINDOW_RADIUS;
use crate::error::{LutError, Result};
use crate::lut::CoordMap;

impl<Lens> FishEye2Perspective<Lens>
where
    Lens: LensModel,
{
    /// 鱼眼坐标 -> 透视坐标
    pub fn fisheye2perspective(&self, point: &Point2f) -> Result<Point2f> {
        Self::lookup(&self.src_map, point)
    }

    /// 透视坐标 -> 鱼眼坐标
    pub fn perspective2fisheye(&self, point: &Point2f) -> Result<Point2f> {
        Self::lookup(&self.dst_map, point)
    }

    /// 批量查询，失败的点返回 (0, 0)，对应 status 为 0
    pub fn fisheye2perspective_points(
        &self,
        points: &Vector<Point2f>,
    ) -> (Vector<Point2f>, Vector<u8>) {
        Self::lookup_points(&self.src_map, points)
    }

    pub fn perspective2fisheye_points(
        &self,
        points: &Vector<Point2f>,
    ) -> (Vector<Point2f>, Vector<u8>) {
        Self::lookup_points(&self.dst_map, points)
    }

    /// 取整后在 (2r+1)x(2r+1) 窗口内对已设置的坐标求平均
    fn lookup(map: &CoordMap, point: &Point2f) -> Result<Point2f> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(LutError::OutOfBounds {
                x: point.x as i32,
                y: point.y as i32,
            });
        }
        let x = point.x.round() as i32;
        let y = point.y.round() as i32;
        if !map.contains(x, y) {
            return Err(LutError::OutOfBounds { x, y });
        }
        map.window_mean(x, y, WINDOW_RADIUS)
            .map(|(mx, my)| Point2f::new(mx, my))
            .ok_or(LutError::Unmapped { x, y })
    }

    fn lookup_points(map: &CoordMap, points: &Vector<Point2f>) -> (Vector<Point2f>, Vector<u8>) {
        let mut mapped = Vector::<Point2f>::with_capacity(points.len());
        let mut status = Vector::<u8>::with_capacity(points.len());
        for p in points.iter() {
            match Self::lookup(map, &p) {
                Ok(q) => {
                    mapped.push(q);
                    status.push(1);
                }
                Err(e) => {
                    log::debug!("query ({}, {}) failed: {}", p.x, p.y, e);
                    mapped.push(Point2f::new(0.0, 0.0));
                    status.push(0);
                }
            }
        }
        (mapped, status)
    }
}
