mod stereographic_camera;
pub use stereographic_camera::StereographicCamera;

use nalgebra::Vector3;
use opencv::core::{Point2f, Point2i};

/// 镜头模型的trait
///
/// 像素以图像中心归一化后与单位球上的方向互相转换。
/// 单位球坐标系：x 向右，y 向下，光轴为 -z。
pub trait LensModel {
    /// 像素 -> 单位球上的方向
    fn camera2world(&self, pixel: &Point2f, center: &Point2f) -> Vector3<f32>;
    /// 方向 -> 像素，投影无定义时返回 None
    fn world2camera(&self, point: &Vector3<f32>, center: &Point2f) -> Option<Point2i>;
}
