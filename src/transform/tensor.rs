use burn::tensor::{Data, Shape};
use image::{DynamicImage, RgbImage};
use itertools::Itertools;

/// Channel-first image buffer: `dims` is `[channels, height, width]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub values: Vec<f32>,
    pub dims: [usize; 3],
}

impl ImageTensor {
    pub fn new(values: Vec<f32>, dims: [usize; 3]) -> Self {
        debug_assert_eq!(values.len(), dims.iter().product::<usize>());
        Self { values, dims }
    }

    /// Converts an image into a tensor with values in `[0, 1]`, keeping the
    /// image's own channel count.
    pub fn from_image(img: &DynamicImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let channels = img.color().channel_count() as usize;
        let raw = match channels {
            1 => img.to_luma8().into_raw(),
            2 => img.to_luma_alpha8().into_raw(),
            3 => img.to_rgb8().into_raw(),
            _ => img.to_rgba8().into_raw(),
        };

        // H x W x C -> C x H x W
        let pixels = width * height;
        let mut values = vec![0f32; channels * pixels];
        for (i, px) in raw.chunks_exact(channels).enumerate() {
            for (c, v) in px.iter().enumerate() {
                values[c * pixels + i] = *v as f32 / 255.0;
            }
        }

        Self::new(values, [channels, height, width])
    }

    pub fn channels(&self) -> usize {
        self.dims[0]
    }

    pub fn height(&self) -> usize {
        self.dims[1]
    }

    pub fn width(&self) -> usize {
        self.dims[2]
    }

    pub fn channel(&self, c: usize) -> &[f32] {
        let pixels = self.height() * self.width();
        &self.values[c * pixels..(c + 1) * pixels]
    }

    /// Values in H x W x C order.
    pub fn channels_last(&self) -> Vec<f32> {
        let pixels = self.height() * self.width();
        (0..pixels)
            .flat_map(|i| (0..self.channels()).map(move |c| self.values[c * pixels + i]))
            .collect_vec()
    }

    pub fn clamp(mut self, min: f32, max: f32) -> Self {
        self.values.iter_mut().for_each(|v| *v = v.clamp(min, max));
        self
    }

    pub fn to_data(&self) -> Data<f32, 3> {
        Data::new(self.values.clone(), Shape::new(self.dims))
    }

    pub fn from_data(data: Data<f32, 3>) -> Self {
        Self::new(data.value, data.shape.dims)
    }

    /// Grayscale tensors are replicated over the three colour channels,
    /// extra channels (alpha) are dropped. Values are clipped to `[0, 1]`.
    pub fn to_rgb_image(&self) -> RgbImage {
        let hwc = self.channels_last();
        let c = self.channels();
        let to_u8 = |x: f32| (x.clamp(0.0, 1.0) * 255.0).round() as u8;

        let mut img = RgbImage::new(self.width() as _, self.height() as _);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let base = (y as usize * self.width() + x as usize) * c;
            *pixel = if c < 3 {
                let v = to_u8(hwc[base]);
                image::Rgb([v, v, v])
            } else {
                image::Rgb([
                    to_u8(hwc[base]),
                    to_u8(hwc[base + 1]),
                    to_u8(hwc[base + 2]),
                ])
            };
        }
        img
    }
}

#[cfg(test)]
mod tests {
    use super::ImageTensor;
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn rgb_image_is_channel_first() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 51]));
        img.put_pixel(1, 0, Rgb([0, 255, 102]));

        let t = ImageTensor::from_image(&DynamicImage::ImageRgb8(img));
        assert_eq!(t.dims, [3, 1, 2]);
        assert_eq!(t.channel(0), &[1.0, 0.0]);
        assert_eq!(t.channel(1), &[0.0, 1.0]);
        assert_eq!(t.channel(2), &[0.2, 0.4]);
    }

    #[test]
    fn grayscale_keeps_one_channel() {
        let img = GrayImage::from_pixel(3, 2, Luma([255]));
        let t = ImageTensor::from_image(&DynamicImage::ImageLuma8(img));
        assert_eq!(t.dims, [1, 2, 3]);
        assert!(t.values.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn channels_last_interleaves() {
        let t = ImageTensor::new(vec![1.0, 2.0, 3.0, 4.0], [2, 1, 2]);
        assert_eq!(t.channels_last(), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn rgb_image_round_trip() {
        let mut img = RgbImage::new(4, 3);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 40) as u8, (y * 60) as u8, 200]);
        }
        let t = ImageTensor::from_image(&DynamicImage::ImageRgb8(img.clone()));
        assert_eq!(t.to_rgb_image(), img);
    }
}
