use std::io;
use thiserror::Error;

/// 读取或处理标注时可能发生的错误.
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),

    /// 坐标无法解析为数字.
    #[error("malformed coordinate `{0}`")]
    Coordinate(String),

    /// 文件结构与格式不符, 例如缺少某个字段或某一列.
    #[error("unexpected layout: {0}")]
    Layout(String),

    #[error("unknown annotation source `{0}`")]
    UnknownSource(String),

    #[error("unknown label `{0}`")]
    UnknownLabel(String),

    /// 类别编号用 `u8` 表示, 不能超过 255 个标签.
    #[error("{0} labels cannot be encoded in a single-channel mask")]
    TooManyLabels(usize),
}

pub type AnnotationResult<T> = Result<T, AnnotationError>;
