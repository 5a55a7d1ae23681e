//! 用法：
//! fisheye2perspective <config.yml|json> <fisheye image> <output image> [lut cache] [query csv]
//!
//! 有缓存文件时直接读取查找表，否则计算后写入缓存。
use anyhow::{bail, Context};
use opencv::core::{Rect, Vector};
use opencv::imgcodecs;
use opencv::prelude::*;

use fisheye_rs::{FishEye2Perspective, PerspectiveParameters};

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_nanos()
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        bail!(
            "usage: {} <config.yml|json> <fisheye image> <output image> [lut cache] [query csv]",
            args[0]
        );
    }
    let (config_path, image_path, output_path) = (&args[1], &args[2], &args[3]);
    let cache_path = args.get(4);
    let query_path = args.get(5);

    let parameters = PerspectiveParameters::read(config_path)
        .with_context(|| format!("read parameters from {}", config_path))?;
    log::info!("parameters: {:?}", parameters);

    let mut engine = FishEye2Perspective::from_parameters(&parameters)?;
    match cache_path {
        Some(path) if std::path::Path::new(path).exists() => {
            engine
                .load_maps(path)
                .with_context(|| format!("load lookup tables from {}", path))?;
        }
        _ => {
            engine.create_perspective(&parameters)?;
            if let Some(path) = cache_path {
                engine.save(path)?;
            }
        }
    }
    log::info!("stats: {}", serde_json::to_string(&engine.stats())?);

    let img = imgcodecs::imread(image_path, imgcodecs::IMREAD_COLOR)?;
    if img.empty() {
        bail!("cannot read image {}", image_path);
    }
    let size = engine.perspective_size();
    let mut perspective = opencv::core::Mat::default();
    engine.transform(&img, Rect::new(0, 0, size.width, size.height), &mut perspective)?;
    if !imgcodecs::imwrite(output_path, &perspective, &Vector::new())? {
        bail!("cannot write image {}", output_path);
    }
    log::info!("wrote {}", output_path);

    if let Some(path) = query_path {
        let points = fisheye_rs::save::read_query_points(path)?;
        let (mapped, status) = engine.perspective2fisheye_points(&points);
        for ((p, q), s) in points.iter().zip(mapped.iter()).zip(status.iter()) {
            if s != 0 {
                log::info!("perspective ({}, {}) -> fisheye ({:.2}, {:.2})", p.x, p.y, q.x, q.y);
            } else {
                log::warn!("perspective ({}, {}) is not mapped", p.x, p.y);
            }
        }
    }
    Ok(())
}
