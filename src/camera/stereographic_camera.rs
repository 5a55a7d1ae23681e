use nalgebra::Vector3;
use opencv::core::{Point2f, Point2i};

use super::LensModel;
use crate::config::{DEFAULT_X_MODIFIER, DEFAULT_Y_MODIFIER};

/// 立体投影镜头模型
///
/// `x_modifier` 和 `y_modifier` 是补偿镜头误差的标定系数，
/// 只作用于 [LensModel::world2camera]。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereographicCamera {
    pub x_modifier: f32,
    pub y_modifier: f32,
}

impl Default for StereographicCamera {
    fn default() -> Self {
        Self::new(DEFAULT_X_MODIFIER, DEFAULT_Y_MODIFIER)
    }
}

impl StereographicCamera {
    pub fn new(x_modifier: f32, y_modifier: f32) -> Self {
        Self {
            x_modifier,
            y_modifier,
        }
    }
}

impl LensModel for StereographicCamera {
    /// 平面 -> 球面的逆立体投影，分母恒 >= 1
    fn camera2world(&self, pixel: &Point2f, center: &Point2f) -> Vector3<f32> {
        let x = (pixel.x - center.x) / center.x;
        let y = (pixel.y - center.y) / center.y;
        let r2 = x * x + y * y;
        Vector3::new(2.0 * x / (1.0 + r2), 2.0 * y / (1.0 + r2), (r2 - 1.0) / (r2 + 1.0))
    }

    fn world2camera(&self, point: &Vector3<f32>, center: &Point2f) -> Option<Point2i> {
        let norm = point.norm();
        if norm <= f32::EPSILON {
            return None;
        }
        let p = point / norm;
        // 投影极点 (0, 0, 1)
        let denom = 1.0 - p.z;
        if denom <= f32::EPSILON {
            return None;
        }
        let x = p.x / denom * self.x_modifier;
        let y = p.y / denom * self.y_modifier;
        Some(Point2i::new(
            (center.x + x * center.x).round() as i32,
            (center.y + y * center.y).round() as i32,
        ))
    }
}
