//! 错误类型
//!
//! 查找表构建、查询、重映射和读写共用的错误。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LutError {
    #[error("lookup tables are not initialized")]
    NotInitialized,

    #[error("image size mismatch: expected {expected:?}, got {actual:?}")]
    SizeMismatch {
        expected: (i32, i32),
        actual: (i32, i32),
    },

    #[error("invalid image size {width}x{height}")]
    InvalidSize { width: i32, height: i32 },

    #[error("unsupported image type {0}, expected CV_8UC3")]
    UnsupportedImageType(i32),

    #[error("point ({x}, {y}) is outside the lookup table")]
    OutOfBounds { x: i32, y: i32 },

    #[error("no mapped entry around ({x}, {y})")]
    Unmapped { x: i32, y: i32 },

    #[error("missing entry `{0}` in lookup table file")]
    MissingEntry(String),

    #[error("invalid value `{value}` for `{key}`")]
    InvalidEntry { key: String, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LutError>;
