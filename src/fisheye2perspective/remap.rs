use opencv::core::{Mat, Rect, Scalar, Size, BORDER_CONSTANT, CV_8UC3};
use opencv::imgproc::INTER_LINEAR;
use opencv::prelude::*;
use rayon::prelude::*;

use super::FishEye2Perspective;
use crate::camera::LensModel;
use crate::config::MULTIPLE_THREAD;
use crate::error::{LutError, Result};
use crate::global_cast::{MatPrinter, RemapTables};

const CHANNELS: usize = 3;

impl<Lens> FishEye2Perspective<Lens>
where
    Lens: LensModel,
{
    /// 用 `dst_map` 把鱼眼图像重采样到透视图像
    ///
    /// `roi` 是透视图像中的区域，会被裁剪到图像范围内；区域外的 `dst` 像素不变，
    /// 区域内未映射的像素置黑。`dst` 大小或类型不符时重新分配。
    pub fn transform(&self, src: &Mat, roi: Rect, dst: &mut Mat) -> Result<()> {
        self.ensure_initialized()?;
        self.check_fisheye_image(src)?;

        let width = self.perspective_size.width;
        let height = self.perspective_size.height;
        if dst.size()? != self.perspective_size || dst.typ() != CV_8UC3 || !dst.is_continuous() {
            *dst = Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0))?;
        }

        let src_owned;
        let src = if src.is_continuous() {
            src
        } else {
            src_owned = src.try_clone()?;
            &src_owned
        };
        let src_bytes = src.data_bytes()?;
        let fisheye_width = self.fisheye_size.width as usize;

        let x0 = roi.x.clamp(0, width) as usize;
        let y0 = roi.y.clamp(0, height) as usize;
        let x1 = roi.x.saturating_add(roi.width).clamp(0, width) as usize;
        let y1 = roi.y.saturating_add(roi.height).clamp(0, height) as usize;

        let dst_map = &self.dst_map;
        let fill_row = |(y, row): (usize, &mut [u8])| {
            if y < y0 || y >= y1 {
                return;
            }
            let lut_row = dst_map.row(y);
            for x in x0..x1 {
                let Some(pixel) = row.get_mut(x * CHANNELS..(x + 1) * CHANNELS) else {
                    break;
                };
                let source = lut_row
                    .get(x)
                    .filter(|v| v[0] >= 0 && v[1] >= 0 && (v[0] as usize) < fisheye_width)
                    .and_then(|v| {
                        let i = (v[1] as usize * fisheye_width + v[0] as usize) * CHANNELS;
                        src_bytes.get(i..i + CHANNELS)
                    });
                match source {
                    Some(s) => pixel.copy_from_slice(s),
                    None => pixel.fill(0),
                }
            }
        };

        let stride = width as usize * CHANNELS;
        let out = dst.data_bytes_mut()?;
        if MULTIPLE_THREAD {
            out.par_chunks_mut(stride).enumerate().for_each(fill_row);
        } else {
            out.chunks_mut(stride).enumerate().for_each(fill_row);
        }
        Ok(())
    }

    /// 透视图像大小的重映射表，值为鱼眼坐标，可直接用于 `imgproc::remap`
    pub fn create_fisheye2perspective_lut(&self) -> Result<RemapTables> {
        self.ensure_initialized()?;
        let tables = RemapTables::try_from(&self.dst_map)?;
        log::debug!("map_x_p: {}", MatPrinter(&tables.map_x));
        Ok(tables)
    }

    /// 鱼眼图像大小的重映射表，值为透视坐标
    pub fn create_perspective2fisheye_lut(&self) -> Result<RemapTables> {
        self.ensure_initialized()?;
        let tables = RemapTables::try_from(&self.src_map)?;
        log::debug!("map_x_f: {}", MatPrinter(&tables.map_x));
        Ok(tables)
    }

    /// OpenCV remap：鱼眼 -> 透视
    pub fn remap_perspective(&self, src: &Mat) -> Result<Mat> {
        self.check_fisheye_image(src)?;
        let tables = self.create_fisheye2perspective_lut()?;
        Self::remap_with(src, &tables)
    }

    /// OpenCV remap：透视 -> 鱼眼
    pub fn remap_fisheye(&self, src: &Mat) -> Result<Mat> {
        self.check_size(src, self.perspective_size)?;
        let tables = self.create_perspective2fisheye_lut()?;
        Self::remap_with(src, &tables)
    }

    fn remap_with(src: &Mat, tables: &RemapTables) -> Result<Mat> {
        let mut dst = Mat::default();
        opencv::imgproc::remap(
            src,
            &mut dst,
            &tables.map_x,
            &tables.map_y,
            INTER_LINEAR,
            BORDER_CONSTANT,
            Scalar::all(0.0),
        )?;
        Ok(dst)
    }

    fn check_fisheye_image(&self, src: &Mat) -> Result<()> {
        if src.typ() != CV_8UC3 {
            return Err(LutError::UnsupportedImageType(src.typ()));
        }
        self.check_size(src, self.fisheye_size)
    }

    fn check_size(&self, src: &Mat, expected: Size) -> Result<()> {
        let actual = src.size()?;
        if actual != expected {
            log::warn!(
                "image size {}x{} does not match lookup table {}x{}",
                actual.width,
                actual.height,
                expected.width,
                expected.height
            );
            return Err(LutError::SizeMismatch {
                expected: (expected.width, expected.height),
                actual: (actual.width, actual.height),
            });
        }
        Ok(())
    }
}
