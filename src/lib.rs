/// 鱼眼图像到透视图像的坐标映射
///
/// opencv
/// https://docs.rs/opencv/latest/opencv/all.html
///
/// nalgebra
/// https://docs.rs/nalgebra/latest/nalgebra/
///
/// ndarray
/// https://docs.rs/ndarray/latest/ndarray/all.html
///
extern crate opencv;

pub mod camera;
pub mod config;
pub mod error;
pub mod fisheye2perspective;
pub mod global_cast;
pub mod lut;
pub mod projection;
pub mod save;
mod utility;

pub use camera::{LensModel, StereographicCamera};
pub use config::{LutStrategy, ParametersTrait, PerspectiveParameters};
pub use error::{LutError, Result};
pub use fisheye2perspective::{FishEye2Perspective, LutStats};
pub use lut::CoordMap;
pub use projection::ProjectionPlane;
