use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("normalize expects {expected} channels but the image has {found}")]
    ChannelMismatch { expected: usize, found: usize },

    #[error("std evaluated to zero for channel {channel}, leading to division by zero")]
    ZeroStd { channel: usize },

    #[error("stage `{stage}` expects {expected} input")]
    StageOrder {
        stage: String,
        expected: &'static str,
    },

    #[error("pipeline ended without converting the image to a tensor")]
    MissingTensor,
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("reading `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decoding image `{}`", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("split directory `{}` does not exist", path.display())]
    MissingSplit { path: PathBuf },

    #[error("couldn't find any class folder in `{}`", path.display())]
    NoClasses { path: PathBuf },

    #[error("found no valid image file for class `{class}` in `{}`", path.display())]
    EmptyClass { class: String, path: PathBuf },

    #[error("transforms must be added before loading the data")]
    TransformsNotSet,

    #[error("batch size must be positive")]
    InvalidBatchSize,

    #[error("split `{0}` contains no images")]
    EmptySplit(String),

    #[error("transforming `{}`", path.display())]
    Transform {
        path: PathBuf,
        #[source]
        source: TransformError,
    },

    #[error(transparent)]
    Tensor(#[from] TransformError),

    #[error("rendering image")]
    Render(#[source] std::io::Error),
}

pub type Result<T, E = DataError> = std::result::Result<T, E>;
