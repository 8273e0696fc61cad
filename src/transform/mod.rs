use std::{fmt, sync::Arc};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::{data::PerSplit, error::TransformError, Split};

use self::tensor::ImageTensor;

pub mod crop;
pub mod ops;
pub mod tensor;

/// An image -> image step of a pipeline.
pub trait ImageTransform: Send + Sync {
    fn apply(&self, img: DynamicImage) -> DynamicImage;

    fn name(&self) -> String {
        let name = std::any::type_name::<Self>();
        name.rsplit("::").next().unwrap_or(name).to_string()
    }
}

#[derive(Clone)]
pub enum Stage {
    Image(Arc<dyn ImageTransform>),
    ToTensor,
    Normalize(Normalize),
}

impl Stage {
    pub fn image(transform: impl ImageTransform + 'static) -> Self {
        Self::Image(Arc::new(transform))
    }

    pub fn name(&self) -> String {
        match self {
            Stage::Image(t) => t.name(),
            Stage::ToTensor => "ToTensor".to_string(),
            Stage::Normalize(_) => "Normalize".to_string(),
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Normalize(n) => f.debug_tuple("Normalize").field(n).finish(),
            stage => f.write_str(&stage.name()),
        }
    }
}

/// Per-channel normalization statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_new::new)]
pub struct Normalize {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Normalize {
    fn check(&self, t: &ImageTensor) -> Result<(), TransformError> {
        for len in [self.mean.len(), self.std.len()] {
            if len != t.channels() {
                return Err(TransformError::ChannelMismatch {
                    expected: len,
                    found: t.channels(),
                });
            }
        }
        Ok(())
    }

    /// `(x - mean) / std` per channel.
    pub fn apply(&self, mut t: ImageTensor) -> Result<ImageTensor, TransformError> {
        self.check(&t)?;
        if let Some(channel) = self.std.iter().position(|s| *s == 0.0) {
            return Err(TransformError::ZeroStd { channel });
        }

        let pixels = t.height() * t.width();
        for (c, chunk) in t.values.chunks_mut(pixels.max(1)).enumerate() {
            let (mean, std) = (self.mean[c], self.std[c]);
            chunk.iter_mut().for_each(|v| *v = (*v - mean) / std);
        }
        Ok(t)
    }

    /// `x * std + mean` per channel.
    pub fn denormalize(&self, mut t: ImageTensor) -> Result<ImageTensor, TransformError> {
        self.check(&t)?;

        let pixels = t.height() * t.width();
        for (c, chunk) in t.values.chunks_mut(pixels.max(1)).enumerate() {
            let (mean, std) = (self.mean[c], self.std[c]);
            chunk.iter_mut().for_each(|v| *v = *v * std + mean);
        }
        Ok(t)
    }
}

/// An ordered sequence of stages applied to a decoded image.
#[derive(Debug, Clone, Default)]
pub struct Compose {
    stages: Vec<Stage>,
}

enum Value {
    Image(DynamicImage),
    Tensor(ImageTensor),
}

impl Compose {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn apply(&self, img: DynamicImage) -> Result<ImageTensor, TransformError> {
        let mut value = Value::Image(img);
        for stage in &self.stages {
            value = match (stage, value) {
                (Stage::Image(t), Value::Image(img)) => Value::Image(t.apply(img)),
                (Stage::ToTensor, Value::Image(img)) => {
                    Value::Tensor(ImageTensor::from_image(&img))
                }
                (Stage::Normalize(n), Value::Tensor(t)) => Value::Tensor(n.apply(t)?),
                (stage, Value::Tensor(_)) => {
                    return Err(TransformError::StageOrder {
                        stage: stage.name(),
                        expected: "an image",
                    })
                }
                (stage, Value::Image(_)) => {
                    return Err(TransformError::StageOrder {
                        stage: stage.name(),
                        expected: "a tensor",
                    })
                }
            };
        }

        match value {
            Value::Tensor(t) => Ok(t),
            Value::Image(_) => Err(TransformError::MissingTensor),
        }
    }
}

/// Returns a copy of `stages` followed by tensor conversion and `normalize`.
pub fn with_tensor_stages(stages: &[Stage], normalize: &Normalize) -> Vec<Stage> {
    stages
        .iter()
        .cloned()
        .chain([Stage::ToTensor, Stage::Normalize(normalize.clone())])
        .collect()
}

/// The train/val pipelines together with the statistics they normalize with.
#[derive(Debug, Clone)]
pub struct SplitTransforms {
    pipelines: PerSplit<Compose>,
    normalize: Normalize,
}

impl SplitTransforms {
    pub fn new(train: &[Stage], val: &[Stage], normalize: Normalize) -> Self {
        let pipelines = PerSplit::new(
            Compose::new(with_tensor_stages(train, &normalize)),
            Compose::new(with_tensor_stages(val, &normalize)),
        );
        Self {
            pipelines,
            normalize,
        }
    }

    pub fn pipeline(&self, split: Split) -> &Compose {
        self.pipelines.get(split)
    }

    pub fn normalize(&self) -> &Normalize {
        &self.normalize
    }
}
