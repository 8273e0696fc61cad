pub mod data;
pub mod error;
pub mod stats;
pub mod transform;
pub mod utils;

pub use data::{
    loader::{AfmData, LoadedData, LoaderConfig},
    ImageBatch, ImageBatcher, Split,
};
pub use error::{DataError, TransformError};
pub use transform::{crop::AfmCrop, tensor::ImageTensor, Compose, Normalize, Stage};
