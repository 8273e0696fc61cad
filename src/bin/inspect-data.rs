use afm_data as source;
use burn::{
    backend::{ndarray::NdArrayDevice, NdArray},
    config::Config,
};
use dotenv::dotenv;
use source::{
    data::loader::{AfmData, LoaderConfig},
    transform::{crop::AfmCrop, ops::Resize, Stage},
    utils::{get_env, GridConfig},
    Split,
};

use anyhow::{Context, Result};

type B = NdArray<f32>;

fn main() -> Result<()> {
    // a missing .env is fine, the variables may come from the shell
    dotenv().ok();
    env_logger::init();

    let data_dir = get_env("AFM_DATA_DIR")?;
    let config = match get_env("AFM_LOADER_CONFIG") {
        Ok(path) => LoaderConfig::load(&path).context(format!("loading config `{path}`"))?,
        Err(_) => LoaderConfig::new().with_batch_size(4),
    };
    let device = NdArrayDevice::Cpu;

    let train = vec![Stage::image(AfmCrop), Stage::image(Resize::new(224, 224))];
    let val = train.clone();

    let mut data = AfmData::new(&data_dir);

    // calculate stats on the cropped, resized images
    let normalize = data
        .mean_std::<B>(&train, config.batch_size, Split::Train, device.clone())
        .context("computing train statistics")?;
    println!("mean: {:?}", normalize.mean);
    println!("std: {:?}", normalize.std);

    data.add_transforms(&train, &val, normalize);
    let loaded = data
        .load_data::<B>(&config, device)
        .context("loading data")?;
    println!(
        "num items: train {}, val {}",
        loaded.dataset_sizes().train,
        loaded.dataset_sizes().val
    );
    println!("classes: {:?}", loaded.class_names());

    // show a batch
    let (grid, labels) = loaded
        .batch_grid(Split::Train, &GridConfig::new())
        .context("train split is empty")?;
    let titles = loaded.label_names(labels);
    loaded
        .imshow(grid.clone(), Some(&titles.join(", ")))
        .context("showing batch")?;

    std::fs::create_dir_all("./out").context("creating ./out")?;
    let img = loaded.denormalize(grid)?.to_rgb_image();
    img.save("./out/batch-grid.png")
        .context("saving batch grid")?;

    Ok(())
}
