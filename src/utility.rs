use nalgebra::{Rotation3, Vector3};

pub struct Utility {}

impl Utility {
    /// 欧拉角（弧度）-> 旋转矩阵, R = Rz(yaw) * Rx(pitch) * Ry(roll)
    ///
    /// 投影平面坐标系：x 向右，y 向前，z 向下，所以 roll 绕 y 轴。
    #[inline]
    pub fn euler_rotation(pitch: f32, yaw: f32, roll: f32) -> Rotation3<f32> {
        let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), pitch);
        let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), roll);
        let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), yaw);
        rz * rx * ry
    }
}

#[test]
fn test_euler_rotation() {
    let forward = Vector3::new(0.0f32, 1.0, 0.0);
    let yawed = Utility::euler_rotation(0.0, std::f32::consts::FRAC_PI_2, 0.0) * forward;
    assert!((yawed - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-6);

    let pitched = Utility::euler_rotation(std::f32::consts::FRAC_PI_2, 0.0, 0.0) * forward;
    assert!((pitched - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-6);

    // roll 不改变前向
    let rolled = Utility::euler_rotation(0.0, 0.0, 1.0) * forward;
    assert!((rolled - forward).norm() < 1e-6);
}
