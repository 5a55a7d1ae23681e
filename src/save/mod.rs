//! 对应点导出与批量查询输入
mod pts;

pub use pts::{read_query_points, write_correspondences, CorrespondenceRecord, QueryPoint};
