use std::io::{self, Write};

use anyhow::{Context, Result};
use burn::{
    config::Config,
    tensor::{backend::Backend, Tensor},
};
use image::RgbImage;

use crate::transform::tensor::ImageTensor;

pub fn get_env(key: &str) -> Result<String> {
    std::env::var(key).context(format!("getting env variable `{key}`"))
}

/// Columns available for drawing, falling back to 80 when not on a tty.
pub fn terminal_width() -> usize {
    termion::terminal_size()
        .map(|(cols, _)| cols as usize)
        .unwrap_or(80)
}

/// Draws one coloured cell per sampled pixel. Images wider than `max_width`
/// are sampled with a fixed stride in both directions.
pub fn show_image_terminal_color(
    img: &RgbImage,
    max_width: usize,
    out: &mut impl Write,
) -> io::Result<()> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let step = w.div_ceil(max_width.max(1)).max(1);

    for i in (0..h).step_by(step) {
        for j in (0..w).step_by(step) {
            let p = img.get_pixel(j as _, i as _);
            let color = termion::color::Rgb(p[0], p[1], p[2]);
            write!(out, "{} ", termion::color::Bg(color))?;
        }
        writeln!(out, "{}", termion::color::Bg(termion::color::Reset))?;
    }
    Ok(())
}

pub fn tensor_to_image<B: Backend>(tensor: Tensor<B, 3>) -> ImageTensor {
    ImageTensor::from_data(tensor.into_data().convert::<f32>())
}

#[derive(Config)]
pub struct GridConfig {
    /// Images per row.
    #[config(default = 8)]
    pub nrow: usize,
    #[config(default = 2)]
    pub padding: usize,
    #[config(default = 0.0)]
    pub pad_value: f32,
}

/// Tiles an N x C x H x W batch into a single C x H' x W' image.
/// Grayscale batches are expanded to three channels and a batch of one
/// image is returned as is.
pub fn make_grid<B: Backend>(images: Tensor<B, 4>, config: &GridConfig) -> Tensor<B, 3> {
    let [n, c, h, w] = images.shape().dims;
    let (images, c) = match c {
        1 => (images.repeat(1, 3), 3),
        _ => (images, c),
    };
    if n == 1 {
        return images.reshape([c, h, w]);
    }

    let padding = config.padding;
    let xmaps = config.nrow.clamp(1, n.max(1));
    let ymaps = n.div_ceil(xmaps);
    let (height, width) = (h + padding, w + padding);

    let mut grid = Tensor::<B, 3>::zeros(
        [c, ymaps * height + padding, xmaps * width + padding],
        &images.device(),
    )
    .add_scalar(config.pad_value);

    for k in 0..n {
        let (y, x) = (k / xmaps, k % xmaps);
        let (y0, x0) = (y * height + padding, x * width + padding);
        let img = images
            .clone()
            .slice([k..k + 1, 0..c, 0..h, 0..w])
            .reshape([c, h, w]);
        grid = grid.slice_assign([0..c, y0..y0 + h, x0..x0 + w], img);
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Data, Shape};

    type B = burn::backend::NdArray;

    fn batch(n: usize, c: usize, h: usize, w: usize) -> Tensor<B, 4> {
        let device = burn::backend::ndarray::NdArrayDevice::Cpu;
        let values = (0..n * c * h * w).map(|i| (i / (c * h * w)) as f32 + 1.0).collect();
        Tensor::from_data(Data::new(values, Shape::new([n, c, h, w])), &device)
    }

    #[test]
    fn grid_layout() {
        let grid = make_grid(batch(3, 3, 4, 5), &GridConfig::new().with_nrow(2));
        // 2 columns, 2 rows, 2px padding around every tile
        assert_eq!(grid.shape().dims, [3, 2 * 6 + 2, 2 * 7 + 2]);

        let img = tensor_to_image(grid);
        let at = |y: usize, x: usize| img.values[y * img.width() + x];
        assert_eq!(at(0, 0), 0.0);
        assert_eq!(at(2, 2), 1.0);
        assert_eq!(at(2, 9), 2.0);
        assert_eq!(at(8, 2), 3.0);
        assert_eq!(at(8, 9), 0.0);
    }

    #[test]
    fn grid_expands_grayscale() {
        let grid = make_grid(batch(2, 1, 3, 3), &GridConfig::new());
        assert_eq!(grid.shape().dims, [3, 3 + 4, 2 * 5 + 2]);
    }

    #[test]
    fn grid_of_one_is_the_image() {
        let grid = make_grid(batch(1, 3, 4, 5), &GridConfig::new());
        assert_eq!(grid.shape().dims, [3, 4, 5]);
    }

    #[test]
    fn terminal_rendering_is_downsampled() {
        let img = RgbImage::from_pixel(40, 10, image::Rgb([255, 0, 0]));
        let mut out = Vec::new();
        show_image_terminal_color(&img, 20, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert_eq!(text.lines().next().unwrap().matches(' ').count(), 20);
    }
}
