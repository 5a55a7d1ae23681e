use std::path::Path;

use opencv::core::{FileNode, FileNode_MAP, FileStorage, FileStorage_Mode};
use opencv::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{LutError, Result};

/// 查询时局部平均窗口半径，窗口大小为 (2r+1)x(2r+1)
pub const WINDOW_RADIUS: i32 = 2;
/// 查找表中未设置的坐标
pub const UNSET: i32 = -1;
pub const DEFAULT_X_MODIFIER: f32 = 1.0;
pub const DEFAULT_Y_MODIFIER: f32 = 1.0;
/// 是否使用多线程
pub const MULTIPLE_THREAD: bool = true;
/// track lens 角度分箱的默认步长（度）
pub const TRACK_LENS_ANGLE_STEP: f32 = 0.5;

/// FileStorage 中必须存在的节点
pub(crate) fn required_node(parent: &FileNode, key: &str) -> Result<FileNode> {
    let node = parent.get(key)?;
    if node.is_none()? {
        return Err(LutError::MissingEntry(key.to_string()));
    }
    Ok(node)
}

/// 查找表构建策略
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum LutStrategy {
    /// 直接投影：投影平面 -> 单位球 -> 鱼眼像素
    #[default]
    DirectProjection,
    /// 按球面角度分箱，搜索最近的鱼眼像素。O(n·m)，仅用于实验。
    TrackLens { angle_step: f32 },
}

impl LutStrategy {
    const DIRECT: &'static str = "DIRECT";
    const TRACK_LENS: &'static str = "TRACK_LENS";

    fn name(&self) -> &'static str {
        match self {
            LutStrategy::DirectProjection => Self::DIRECT,
            LutStrategy::TrackLens { .. } => Self::TRACK_LENS,
        }
    }
}

/// 参数文件的trait
pub trait ParametersTrait: Default {
    const CONFIG_TYPE: &'static str;
    fn read_from_yaml(path: &str) -> Result<Self>;
    fn write_to_yaml(&self, path: &str) -> Result<()>;
}

/// 鱼眼到透视变换的全部参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveParameters {
    // size
    pub fisheye_width: i32,
    pub fisheye_height: i32,
    pub perspective_width: i32,
    pub perspective_height: i32,
    // plane
    pub plane_width: f32,
    pub plane_height: f32,
    pub distance: f32,
    /// pitch, yaw, roll（度）
    pub rotation: [f32; 3],
    // lens
    pub x_modifier: f32,
    pub y_modifier: f32,
    /// 构建前是否把查找表重置为未设置
    pub reinitialize: bool,
    pub strategy: LutStrategy,
}

impl Default for PerspectiveParameters {
    fn default() -> Self {
        Self {
            fisheye_width: 960,
            fisheye_height: 960,
            perspective_width: 960,
            perspective_height: 960,
            plane_width: 5.0,
            plane_height: 5.0,
            distance: 1.0,
            rotation: [0.0; 3],
            x_modifier: DEFAULT_X_MODIFIER,
            y_modifier: DEFAULT_Y_MODIFIER,
            reinitialize: true,
            strategy: LutStrategy::DirectProjection,
        }
    }
}

impl PerspectiveParameters {
    /// 根据扩展名读取 yaml 或 json
    pub fn read(path: &str) -> Result<Self> {
        if Self::is_json(path) {
            let file = std::fs::File::open(path)?;
            Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
        } else {
            Self::read_from_yaml(path)
        }
    }

    pub fn write(&self, path: &str) -> Result<()> {
        if Self::is_json(path) {
            let file = std::fs::File::create(path)?;
            serde_json::to_writer_pretty(file, self)?;
            Ok(())
        } else {
            self.write_to_yaml(path)
        }
    }

    fn is_json(path: &str) -> bool {
        Path::new(path)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }

    fn read_f32(parent: &FileNode, key: &str) -> Result<f32> {
        Ok(required_node(parent, key)?.to_f64()? as f32)
    }

    fn read_i32(parent: &FileNode, key: &str) -> Result<i32> {
        Ok(required_node(parent, key)?.to_i32()?)
    }
}

impl ParametersTrait for PerspectiveParameters {
    const CONFIG_TYPE: &'static str = "FISHEYE2PERSPECTIVE";

    fn read_from_yaml(path: &str) -> Result<Self> {
        let fs = FileStorage::new(path, FileStorage_Mode::READ as i32, "utf-8")?;
        if !fs.is_opened()? {
            return Err(LutError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("cannot open {}", path),
            )));
        }
        let root = fs.root(0)?;

        if let Ok(model_type) = required_node(&root, "model_type") {
            let model_type = model_type.to_string()?;
            if model_type != Self::CONFIG_TYPE {
                log::error!("model type {} is not {}", model_type, Self::CONFIG_TYPE);
                return Err(LutError::InvalidEntry {
                    key: "model_type".to_string(),
                    value: model_type,
                });
            }
        }

        let mut parameters = Self {
            fisheye_width: Self::read_i32(&root, "fisheye_width")?,
            fisheye_height: Self::read_i32(&root, "fisheye_height")?,
            perspective_width: Self::read_i32(&root, "perspective_width")?,
            perspective_height: Self::read_i32(&root, "perspective_height")?,
            ..Default::default()
        };

        // plane
        let plane = required_node(&root, "plane_parameters")?;
        parameters.plane_width = Self::read_f32(&plane, "width")?;
        parameters.plane_height = Self::read_f32(&plane, "height")?;
        parameters.distance = Self::read_f32(&plane, "distance")?;
        parameters.rotation = [
            Self::read_f32(&plane, "pitch")?,
            Self::read_f32(&plane, "yaw")?,
            Self::read_f32(&plane, "roll")?,
        ];

        // lens
        let lens = required_node(&root, "lens_parameters")?;
        parameters.x_modifier = Self::read_f32(&lens, "x_modifier")?;
        parameters.y_modifier = Self::read_f32(&lens, "y_modifier")?;

        // optional
        if let Ok(reinit) = Self::read_i32(&root, "reinitialize") {
            parameters.reinitialize = reinit != 0;
        }
        if let Ok(strategy) = required_node(&root, "strategy") {
            let strategy = strategy.to_string()?;
            parameters.strategy = match strategy.as_str() {
                LutStrategy::DIRECT => LutStrategy::DirectProjection,
                LutStrategy::TRACK_LENS => {
                    let angle_step =
                        Self::read_f32(&root, "angle_step").unwrap_or(TRACK_LENS_ANGLE_STEP);
                    LutStrategy::TrackLens { angle_step }
                }
                _ => {
                    log::error!("unknown strategy {}", strategy);
                    return Err(LutError::InvalidEntry {
                        key: "strategy".to_string(),
                        value: strategy,
                    });
                }
            };
        }

        Ok(parameters)
    }

    fn write_to_yaml(&self, path: &str) -> Result<()> {
        let mut fs = FileStorage::new(path, FileStorage_Mode::WRITE as i32, "utf-8")?;

        fs.write_str("model_type", Self::CONFIG_TYPE)?;
        fs.write_i32("fisheye_width", self.fisheye_width)?;
        fs.write_i32("fisheye_height", self.fisheye_height)?;
        fs.write_i32("perspective_width", self.perspective_width)?;
        fs.write_i32("perspective_height", self.perspective_height)?;
        fs.write_i32("reinitialize", self.reinitialize as i32)?;
        fs.write_str("strategy", self.strategy.name())?;
        if let LutStrategy::TrackLens { angle_step } = self.strategy {
            fs.write_f64("angle_step", angle_step as f64)?;
        }

        // plane
        fs.start_write_struct("plane_parameters", FileNode_MAP, "")?;
        fs.write_f64("width", self.plane_width as f64)?;
        fs.write_f64("height", self.plane_height as f64)?;
        fs.write_f64("distance", self.distance as f64)?;
        fs.write_f64("pitch", self.rotation[0] as f64)?;
        fs.write_f64("yaw", self.rotation[1] as f64)?;
        fs.write_f64("roll", self.rotation[2] as f64)?;
        fs.end_write_struct()?;

        // lens
        fs.start_write_struct("lens_parameters", FileNode_MAP, "")?;
        fs.write_f64("x_modifier", self.x_modifier as f64)?;
        fs.write_f64("y_modifier", self.y_modifier as f64)?;
        fs.end_write_struct()?;

        fs.release()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("fisheye_rs_{}_{}", std::process::id(), name))
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn yaml_write_then_read() {
        let path = temp_path("params.yml");
        let parameters = PerspectiveParameters {
            fisheye_width: 200,
            fisheye_height: 180,
            perspective_width: 100,
            perspective_height: 90,
            rotation: [10.0, -20.0, 5.0],
            strategy: LutStrategy::TrackLens { angle_step: 1.0 },
            ..Default::default()
        };
        parameters.write_to_yaml(&path).unwrap();
        let read = PerspectiveParameters::read_from_yaml(&path).unwrap();
        assert_eq!(read, parameters);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn json_by_extension() {
        let path = temp_path("params.json");
        let parameters = PerspectiveParameters {
            plane_width: 3.0,
            reinitialize: false,
            ..Default::default()
        };
        parameters.write(&path).unwrap();
        assert_eq!(PerspectiveParameters::read(&path).unwrap(), parameters);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn wrong_model_type_and_unknown_strategy_are_rejected() {
        let path = temp_path("params_model_type.yml");
        PerspectiveParameters::default().write_to_yaml(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        std::fs::write(&path, text.replace("FISHEYE2PERSPECTIVE", "PINHOLE")).unwrap();
        match PerspectiveParameters::read_from_yaml(&path) {
            Err(LutError::InvalidEntry { key, value }) => {
                assert_eq!(key, "model_type");
                assert_eq!(value, "PINHOLE");
            }
            other => panic!("unexpected {:?}", other),
        }

        std::fs::write(&path, text.replace("DIRECT", "NEAREST")).unwrap();
        match PerspectiveParameters::read_from_yaml(&path) {
            Err(LutError::InvalidEntry { key, value }) => {
                assert_eq!(key, "strategy");
                assert_eq!(value, "NEAREST");
            }
            other => panic!("unexpected {:?}", other),
        }
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(PerspectiveParameters::read_from_yaml(&temp_path("missing.yml")).is_err());
    }
}
