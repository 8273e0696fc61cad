use std::fmt;

use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Data, ElementConversion, Int, Tensor},
};
use derive_new::new;

use self::folder::ImageItem;

pub mod folder;
pub mod loader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Split {
    #[default]
    Train,
    Val,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Val];

    /// Name of the split's directory under the data root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One value per split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct PerSplit<T> {
    pub train: T,
    pub val: T,
}

impl<T> PerSplit<T> {
    pub fn get(&self, split: Split) -> &T {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
        }
    }

    pub fn try_from_fn<E>(mut f: impl FnMut(Split) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self::new(f(Split::Train)?, f(Split::Val)?))
    }
}

pub struct ImageBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// N x C x H x W
    pub img: Tensor<B, 4>,
    pub label: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<ImageItem, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>) -> ImageBatch<B> {
        // items are already normalized by the split's pipeline
        let img = items
            .iter()
            .map(|item| item.img.to_data())
            .map(|data| Tensor::<B, 3>::from_data(data.convert::<B::FloatElem>(), &self.device))
            .collect();

        let label = items
            .iter()
            .map(|item| item.label as i64)
            .map(|label| Data::<B::IntElem, 1>::from([label.elem()]))
            .map(|data| Tensor::<B, 1, Int>::from_data(data, &self.device))
            .collect();

        let img = Tensor::stack(img, 0);
        let label = Tensor::cat(label, 0);

        ImageBatch { img, label }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::tensor::ImageTensor;

    type B = burn::backend::NdArray;

    #[test]
    fn batches_stack_items() {
        let device = burn::backend::ndarray::NdArrayDevice::Cpu;
        let batcher = ImageBatcher::<B>::new(device);
        let items = (0..3)
            .map(|i| ImageItem {
                img: ImageTensor::new(vec![i as f32; 3 * 2 * 4], [3, 2, 4]),
                label: i % 2,
            })
            .collect();

        let batch = batcher.batch(items);
        assert_eq!(batch.img.shape().dims, [3, 3, 2, 4]);
        assert_eq!(batch.label.into_data().convert::<i64>().value, vec![0, 1, 0]);
    }

    #[test]
    fn per_split_lookup() {
        let sizes = PerSplit::new(10, 4);
        assert_eq!(*sizes.get(Split::Train), 10);
        assert_eq!(*sizes.get(Split::Val), 4);
        assert_eq!(Split::Val.to_string(), "val");
    }
}
