//! 查找表读写
//!
//! - FileStorage：`map_x_p`/`map_y_p`（透视大小，鱼眼坐标），
//!   `map_x_f`/`map_y_f`（鱼眼大小，透视坐标）以及两组图像宽高
//! - 标定文本：每行 `srcX srcY dstX dstY`

use std::io::BufRead;

use opencv::core::{FileStorage, FileStorage_Mode, Point2i, Size};
use opencv::prelude::*;

use super::FishEye2Perspective;
use crate::camera::LensModel;
use crate::config::required_node;
use crate::error::{LutError, Result};
use crate::global_cast::RemapTables;
use crate::lut::CoordMap;

impl<Lens> FishEye2Perspective<Lens>
where
    Lens: LensModel,
{
    /// 保存查找表，用于跨进程缓存
    pub fn save(&self, path: &str) -> Result<()> {
        let perspective = self.create_fisheye2perspective_lut()?;
        let fisheye = self.create_perspective2fisheye_lut()?;

        let mut fs = FileStorage::new(path, FileStorage_Mode::WRITE as i32, "utf-8")?;
        if !fs.is_opened()? {
            return Err(Self::cannot_open(path));
        }
        fs.write_i32("fisheye_width", self.fisheye_size.width)?;
        fs.write_i32("fisheye_height", self.fisheye_size.height)?;
        fs.write_i32("perspective_width", self.perspective_size.width)?;
        fs.write_i32("perspective_height", self.perspective_size.height)?;
        fs.write_mat("map_x_p", &perspective.map_x)?;
        fs.write_mat("map_y_p", &perspective.map_y)?;
        fs.write_mat("map_x_f", &fisheye.map_x)?;
        fs.write_mat("map_y_f", &fisheye.map_y)?;
        fs.release()?;
        log::info!("saved lookup tables to {}", path);
        Ok(())
    }

    /// 读取 [Self::save] 写出的查找表，替换当前的表和图像大小
    pub fn load_maps(&mut self, path: &str) -> Result<()> {
        let fs = FileStorage::new(path, FileStorage_Mode::READ as i32, "utf-8")?;
        if !fs.is_opened()? {
            return Err(Self::cannot_open(path));
        }
        let root = fs.root(0)?;
        let fisheye_size = Size::new(
            required_node(&root, "fisheye_width")?.to_i32()?,
            required_node(&root, "fisheye_height")?.to_i32()?,
        );
        let perspective_size = Size::new(
            required_node(&root, "perspective_width")?.to_i32()?,
            required_node(&root, "perspective_height")?.to_i32()?,
        );

        let perspective = RemapTables {
            map_x: required_node(&root, "map_x_p")?.mat()?,
            map_y: required_node(&root, "map_y_p")?.mat()?,
        };
        let fisheye = RemapTables {
            map_x: required_node(&root, "map_x_f")?.mat()?,
            map_y: required_node(&root, "map_y_f")?.mat()?,
        };
        let mut dst_map = CoordMap::try_from(&perspective)?;
        let mut src_map = CoordMap::try_from(&fisheye)?;
        for (map, size) in [(&dst_map, perspective_size), (&src_map, fisheye_size)] {
            if map.size() != size {
                return Err(LutError::SizeMismatch {
                    expected: (size.width, size.height),
                    actual: (map.size().width, map.size().height),
                });
            }
        }
        // 值必须落在对方图像内
        let dropped = dst_map.retain_within(fisheye_size) + src_map.retain_within(perspective_size);
        if dropped > 0 {
            log::warn!("dropped {} out of range cells from {}", dropped, path);
        }

        self.fisheye_size = fisheye_size;
        self.perspective_size = perspective_size;
        self.src_map = src_map;
        self.dst_map = dst_map;
        let stats = self.stats();
        log::info!(
            "loaded lookup tables from {}: {} fisheye, {} perspective cells set",
            path,
            stats.fisheye_set,
            stats.perspective_set
        );
        Ok(())
    }

    /// 读取外部标定工具生成的对应点，返回写入的行数
    ///
    /// 格式错误或越界的行直接跳过。需要先 [Self::initialize]。
    pub fn load(&mut self, path: &str) -> Result<usize> {
        self.ensure_initialized()?;
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);

        let mut applied = 0;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let Some([sx, sy, dx, dy]) = Self::parse_calibration_line(&line) else {
                log::debug!("skip malformed line {}: {:?}", line_no + 1, line);
                continue;
            };
            if !self.src_map.contains(sx, sy) || !self.dst_map.contains(dx, dy) {
                log::debug!("skip out of range line {}: {:?}", line_no + 1, line);
                continue;
            }
            self.src_map.set(sx, sy, Point2i::new(dx, dy));
            self.dst_map.set(dx, dy, Point2i::new(sx, sy));
            applied += 1;
        }
        log::info!("loaded {} correspondences from {}", applied, path);
        Ok(applied)
    }

    fn parse_calibration_line(line: &str) -> Option<[i32; 4]> {
        let mut values = [0i32; 4];
        let mut fields = line.split_whitespace();
        for v in values.iter_mut() {
            *v = fields.next()?.parse().ok()?;
        }
        fields.next().is_none().then_some(values)
    }

    fn cannot_open(path: &str) -> LutError {
        LutError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("cannot open {}", path),
        ))
    }
}
