//! 鱼眼 -> 透视 坐标映射
//!
//! 两张稠密查找表：
//! - `src_map`：鱼眼图像大小，保存对应的透视像素
//! - `dst_map`：透视图像大小，保存对应的鱼眼像素
//!
//! 流程：[FishEye2Perspective::initialize] 分配 ->
//! [FishEye2Perspective::create_perspective] 一次性填充 ->
//! [FishEye2Perspective::transform] / 查询 / 导出重映射表。

mod builder;
mod query;
mod remap;
mod storage;
mod track_lens;

use opencv::core::{Point2f, Size};
use serde::{Deserialize, Serialize};

use crate::camera::{LensModel, StereographicCamera};
use crate::config::PerspectiveParameters;
use crate::error::{LutError, Result};
use crate::lut::CoordMap;

/// 查找表覆盖情况
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LutStats {
    pub fisheye_set: usize,
    pub fisheye_total: usize,
    pub perspective_set: usize,
    pub perspective_total: usize,
}

#[derive(Debug, Default)]
pub struct FishEye2Perspective<Lens = StereographicCamera>
where
    Lens: LensModel,
{
    lens: Lens,
    fisheye_size: Size,
    perspective_size: Size,
    src_map: CoordMap,
    dst_map: CoordMap,
}

impl FishEye2Perspective<StereographicCamera> {
    /// 按参数中的图像大小和镜头系数初始化
    pub fn from_parameters(parameters: &PerspectiveParameters) -> Result<Self> {
        let lens = StereographicCamera::new(parameters.x_modifier, parameters.y_modifier);
        let mut engine = Self::new_with_lens(lens);
        engine.initialize(
            Size::new(parameters.fisheye_width, parameters.fisheye_height),
            Size::new(parameters.perspective_width, parameters.perspective_height),
        )?;
        Ok(engine)
    }
}

impl<Lens> FishEye2Perspective<Lens>
where
    Lens: LensModel,
{
    pub fn new_with_lens(lens: Lens) -> Self {
        Self {
            lens,
            fisheye_size: Size::default(),
            perspective_size: Size::default(),
            src_map: CoordMap::default(),
            dst_map: CoordMap::default(),
        }
    }

    /// 分配两张查找表，全部置为未设置
    pub fn initialize(&mut self, fisheye_size: Size, perspective_size: Size) -> Result<()> {
        for size in [fisheye_size, perspective_size] {
            if size.width <= 0 || size.height <= 0 {
                return Err(LutError::InvalidSize {
                    width: size.width,
                    height: size.height,
                });
            }
        }
        log::info!(
            "initialize fisheye {}x{} -> perspective {}x{}",
            fisheye_size.width,
            fisheye_size.height,
            perspective_size.width,
            perspective_size.height
        );
        self.fisheye_size = fisheye_size;
        self.perspective_size = perspective_size;
        self.src_map = CoordMap::from_size(fisheye_size);
        self.dst_map = CoordMap::from_size(perspective_size);
        Ok(())
    }

    #[inline]
    fn ensure_initialized(&self) -> Result<()> {
        if self.src_map.is_empty() || self.dst_map.is_empty() {
            Err(LutError::NotInitialized)
        } else {
            Ok(())
        }
    }

    pub fn lens(&self) -> &Lens {
        &self.lens
    }

    pub fn fisheye_size(&self) -> Size {
        self.fisheye_size
    }

    pub fn perspective_size(&self) -> Size {
        self.perspective_size
    }

    /// 鱼眼 -> 透视
    pub fn src_map(&self) -> &CoordMap {
        &self.src_map
    }

    /// 透视 -> 鱼眼
    pub fn dst_map(&self) -> &CoordMap {
        &self.dst_map
    }

    pub fn stats(&self) -> LutStats {
        LutStats {
            fisheye_set: self.src_map.count_set(),
            fisheye_total: self.src_map.rows() * self.src_map.cols(),
            perspective_set: self.dst_map.count_set(),
            perspective_total: self.dst_map.rows() * self.dst_map.cols(),
        }
    }

    #[inline]
    fn center_of(size: Size) -> Point2f {
        Point2f::new(size.width as f32 / 2.0, size.height as f32 / 2.0)
    }
}
