use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use burn::{
    config::Config,
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    tensor::{backend::Backend, Int, Tensor},
};

use crate::{
    error::{DataError, Result},
    stats::ChannelStats,
    transform::{tensor::ImageTensor, Compose, Normalize, SplitTransforms, Stage},
    utils::{make_grid, show_image_terminal_color, tensor_to_image, terminal_width, GridConfig},
};

use super::{folder::ImageFolderDataset, ImageBatch, ImageBatcher, PerSplit, Split};

pub type ImageLoader<B> = Arc<dyn DataLoader<ImageBatch<B>>>;

#[derive(Config)]
pub struct LoaderConfig {
    #[config(default = 1)]
    pub batch_size: usize,
    #[config(default = 0)]
    pub num_workers: usize,
    /// Shuffle seed of the train/val loaders.
    #[config(default = 42)]
    pub seed: u64,
    /// When false, loaders never use worker threads regardless of `num_workers`.
    #[config(default = true)]
    pub parallel_load: bool,
}

/// Checks whether `num_workers` loader threads can be started.
pub trait WorkerProbe {
    fn check(&self, num_workers: usize) -> io::Result<()>;
}

/// Spawns and joins the requested number of threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnProbe;

impl WorkerProbe for SpawnProbe {
    fn check(&self, num_workers: usize) -> io::Result<()> {
        let handles = (0..num_workers)
            .map(|i| {
                thread::Builder::new()
                    .name(format!("loader-probe-{i}"))
                    .spawn(|| ())
            })
            .collect::<io::Result<Vec<_>>>()?;

        for handle in handles {
            handle
                .join()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "probe thread panicked"))?;
        }
        Ok(())
    }
}

fn resolve_workers(config: &LoaderConfig, probe: &dyn WorkerProbe) -> usize {
    if config.num_workers == 0 {
        return 0;
    }
    if !config.parallel_load {
        log::info!("parallel loading disabled, ignoring num_workers");
        return 0;
    }
    match probe.check(config.num_workers) {
        Ok(()) => config.num_workers,
        Err(err) => {
            log::warn!(
                "using {} workers failed ({err}), using 0 workers instead",
                config.num_workers
            );
            0
        }
    }
}

fn build_loader<B: Backend>(
    dataset: ImageFolderDataset,
    device: B::Device,
    batch_size: usize,
    shuffle: Option<u64>,
    num_workers: usize,
) -> ImageLoader<B> {
    let mut builder = DataLoaderBuilder::new(ImageBatcher::<B>::new(device)).batch_size(batch_size);
    if let Some(seed) = shuffle {
        builder = builder.shuffle(seed);
    }
    if num_workers > 0 {
        builder = builder.num_workers(num_workers);
    }
    builder.build(dataset)
}

/// An AFM image dataset rooted at a directory with `train` and `val`
/// subdirectories, each holding one folder per class.
#[derive(Debug, Clone)]
pub struct AfmData {
    data_dir: PathBuf,
    transforms: Option<SplitTransforms>,
}

impl AfmData {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            transforms: None,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn split_dir(&self, split: Split) -> PathBuf {
        self.data_dir.join(split.dir_name())
    }

    /// Builds the train and val pipelines: each given stage list followed by
    /// tensor conversion and normalization with `normalize`. The stage lists
    /// themselves are left as they are.
    pub fn add_transforms(
        &mut self,
        train: &[Stage],
        val: &[Stage],
        normalize: Normalize,
    ) -> &SplitTransforms {
        self.transforms
            .insert(SplitTransforms::new(train, val, normalize))
    }

    pub fn transforms(&self) -> Option<&SplitTransforms> {
        self.transforms.as_ref()
    }

    pub fn load_data<B: Backend>(
        &self,
        config: &LoaderConfig,
        device: B::Device,
    ) -> Result<LoadedData<B>> {
        self.load_data_with(config, device, &SpawnProbe)
    }

    pub fn load_data_with<B: Backend>(
        &self,
        config: &LoaderConfig,
        device: B::Device,
        probe: &dyn WorkerProbe,
    ) -> Result<LoadedData<B>> {
        let transforms = self.transforms.as_ref().ok_or(DataError::TransformsNotSet)?;
        if config.batch_size == 0 {
            return Err(DataError::InvalidBatchSize);
        }

        log::info!("loading datasets from `{}`", self.data_dir.display());
        let datasets = PerSplit::try_from_fn(|split| {
            ImageFolderDataset::new(self.split_dir(split), transforms.pipeline(split).clone())
        })?;
        let dataset_sizes = PerSplit::new(datasets.train.len(), datasets.val.len());
        let class_names = datasets.train.classes().to_vec();
        log::info!(
            "train: {} images, val: {} images, classes: {:?}",
            dataset_sizes.train,
            dataset_sizes.val,
            class_names
        );

        let num_workers = resolve_workers(config, probe);
        log::info!("creating loaders with {num_workers} workers");
        let PerSplit { train, val } = datasets;
        let loaders = PerSplit::new(
            build_loader(train, device.clone(), config.batch_size, Some(config.seed), num_workers),
            build_loader(val, device, config.batch_size, Some(config.seed), num_workers),
        );

        Ok(LoadedData {
            loaders,
            dataset_sizes,
            class_names,
            normalize: transforms.normalize().clone(),
            num_workers,
        })
    }

    /// A single-threaded, non-shuffling loader over `split` that converts
    /// images to tensors after `stages` without normalizing them.
    pub fn stats_loader<B: Backend>(
        &self,
        stages: &[Stage],
        batch_size: usize,
        split: Split,
        device: B::Device,
    ) -> Result<ImageLoader<B>> {
        if batch_size == 0 {
            return Err(DataError::InvalidBatchSize);
        }
        let pipeline = Compose::new(
            stages
                .iter()
                .cloned()
                .chain([Stage::ToTensor])
                .collect(),
        );
        let dataset = ImageFolderDataset::new(self.split_dir(split), pipeline)?;
        Ok(build_loader(dataset, device, batch_size, None, 0))
    }

    /// Per-channel mean and std of `split`, averaged over images. See
    /// [`ChannelStats`] for how the std is estimated.
    pub fn mean_std<B: Backend>(
        &self,
        stages: &[Stage],
        batch_size: usize,
        split: Split,
        device: B::Device,
    ) -> Result<Normalize> {
        let loader = self.stats_loader::<B>(stages, batch_size, split, device)?;

        let mut stats = ChannelStats::default();
        for batch in loader.iter() {
            stats.update(batch.img);
        }

        let normalize = stats
            .finish()
            .ok_or_else(|| DataError::EmptySplit(split.to_string()))?;
        log::info!(
            "{split} statistics over {} images: mean {:?}, std {:?}",
            stats.count(),
            normalize.mean,
            normalize.std
        );
        Ok(normalize)
    }
}

/// Loaders and metadata produced by [`AfmData::load_data`].
pub struct LoadedData<B: Backend> {
    loaders: PerSplit<ImageLoader<B>>,
    dataset_sizes: PerSplit<usize>,
    class_names: Vec<String>,
    normalize: Normalize,
    num_workers: usize,
}

impl<B: Backend> LoadedData<B> {
    pub fn loader(&self, split: Split) -> &ImageLoader<B> {
        self.loaders.get(split)
    }

    pub fn dataset_sizes(&self) -> &PerSplit<usize> {
        &self.dataset_sizes
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn normalize(&self) -> &Normalize {
        &self.normalize
    }

    /// Worker count the loaders were actually built with.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn label_names(&self, labels: Tensor<B, 1, Int>) -> Vec<String> {
        labels
            .into_data()
            .convert::<i64>()
            .value
            .into_iter()
            .map(|label| {
                self.class_names
                    .get(label as usize)
                    .cloned()
                    .unwrap_or_else(|| label.to_string())
            })
            .collect()
    }

    /// Tiles the first batch of `split` into one image, together with the
    /// batch's labels.
    pub fn batch_grid(
        &self,
        split: Split,
        config: &GridConfig,
    ) -> Option<(Tensor<B, 3>, Tensor<B, 1, Int>)> {
        self.loader(split)
            .iter()
            .next()
            .map(|batch| (make_grid(batch.img, config), batch.label))
    }

    /// Undoes the normalization of a C x H x W image and clips it to `[0, 1]`.
    pub fn denormalize(&self, img: Tensor<B, 3>) -> Result<ImageTensor> {
        let img = self.normalize.denormalize(tensor_to_image(img))?;
        Ok(img.clamp(0.0, 1.0))
    }

    /// Renders a normalized C x H x W image on the terminal.
    pub fn imshow(&self, img: Tensor<B, 3>, title: Option<&str>) -> Result<()> {
        let img = self.denormalize(img)?.to_rgb_image();

        let mut out = io::stdout().lock();
        if let Some(title) = title {
            writeln!(out, "{title}").map_err(DataError::Render)?;
        }
        show_image_terminal_color(&img, terminal_width(), &mut out).map_err(DataError::Render)?;
        out.flush().map_err(DataError::Render)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProbe;

    impl WorkerProbe for FailingProbe {
        fn check(&self, _num_workers: usize) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "no threads for you"))
        }
    }

    struct PanickingProbe;

    impl WorkerProbe for PanickingProbe {
        fn check(&self, _num_workers: usize) -> io::Result<()> {
            panic!("probe must not run");
        }
    }

    #[test]
    fn worker_resolution() {
        let config = LoaderConfig::new().with_num_workers(4);
        assert_eq!(resolve_workers(&config, &SpawnProbe), 4);
        assert_eq!(resolve_workers(&config, &FailingProbe), 0);

        let serial = config.clone().with_parallel_load(false);
        assert_eq!(resolve_workers(&serial, &PanickingProbe), 0);

        let none = LoaderConfig::new();
        assert_eq!(resolve_workers(&none, &PanickingProbe), 0);
    }

    #[test]
    fn defaults() {
        let config = LoaderConfig::new();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.num_workers, 0);
        assert!(config.parallel_load);
    }

    #[test]
    fn loading_requires_transforms() {
        type B = burn::backend::NdArray;
        let data = AfmData::new("/nonexistent");
        let result = data.load_data::<B>(
            &LoaderConfig::new(),
            burn::backend::ndarray::NdArrayDevice::Cpu,
        );
        assert!(matches!(result, Err(DataError::TransformsNotSet)));
    }
}
