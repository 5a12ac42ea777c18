use crate::reconcile::ReconcileError;
use crate::slide::SlideError;
use thiserror::Error;

/// 处理一对 (切片, 掩码) 时可能发生的错误.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Slide(#[from] SlideError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("failed to read mask: {0}")]
    Mask(#[from] image::ImageError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
