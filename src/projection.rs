//! 投影平面
//!
//! 透视图像被看作放在距原点 `distance` 处、经过三轴旋转的虚拟平面。

use nalgebra::{Rotation3, Vector3};
use opencv::core::Point2f;

use crate::config::PerspectiveParameters;
use crate::utility::Utility;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionPlane {
    pub width: f32,
    pub height: f32,
    pub distance: f32,
    /// pitch, yaw, roll（度）
    pub rotation: [f32; 3],
}

impl Default for ProjectionPlane {
    fn default() -> Self {
        Self {
            width: 5.0,
            height: 5.0,
            distance: 1.0,
            rotation: [0.0; 3],
        }
    }
}

impl From<&PerspectiveParameters> for ProjectionPlane {
    fn from(parameters: &PerspectiveParameters) -> Self {
        Self {
            width: parameters.plane_width,
            height: parameters.plane_height,
            distance: parameters.distance,
            rotation: parameters.rotation,
        }
    }
}

impl ProjectionPlane {
    pub fn rotation_matrix(&self) -> Rotation3<f32> {
        let [pitch, yaw, roll] = self.rotation;
        Utility::euler_rotation(pitch.to_radians(), yaw.to_radians(), roll.to_radians())
    }

    /// 像素偏移 -> 旋转后平面上的三维点（平面坐标系）
    ///
    /// `offset` 是相对图像中心的像素偏移，按 `center` 归一化到 [-1, 1]。
    /// 宽高为 0 时平面退化成直线。
    pub fn point2projectiveplane(&self, offset: &Point2f, center: &Point2f) -> Vector3<f32> {
        self.point2projectiveplane_with(offset, center, &self.rotation_matrix())
    }

    /// 同 [Self::point2projectiveplane]，旋转矩阵由调用者预先计算
    #[inline]
    pub fn point2projectiveplane_with(
        &self,
        offset: &Point2f,
        center: &Point2f,
        rotation: &Rotation3<f32>,
    ) -> Vector3<f32> {
        let p = Vector3::new(
            offset.x / center.x * self.width * 0.5,
            self.distance,
            offset.y / center.y * self.height * 0.5,
        );
        Self::rotate_point(&p, rotation)
    }

    #[inline]
    pub fn rotate_point(point: &Vector3<f32>, rotation: &Rotation3<f32>) -> Vector3<f32> {
        rotation * point
    }

    /// 平面坐标系 -> 镜头坐标系：前向 +y 对齐光轴 -z，向下 +z 对齐 +y
    #[inline]
    pub fn to_lens_frame(point: &Vector3<f32>) -> Vector3<f32> {
        Vector3::new(point.x, point.z, -point.y)
    }
}
