//! Image primitives that are usually placed in front of [`AfmCrop`](super::crop::AfmCrop)
//! or after it, before the tensor stages.

use derive_new::new;
use image::{imageops::FilterType, DynamicImage};

use super::ImageTransform;

#[derive(Debug, Clone, Copy, new)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

impl ImageTransform for Resize {
    fn apply(&self, img: DynamicImage) -> DynamicImage {
        img.resize_exact(self.width, self.height, FilterType::Triangle)
    }

    fn name(&self) -> String {
        "Resize".to_string()
    }
}

/// Crops a `width` x `height` window from the centre. Sizes larger than the
/// image are clamped to it.
#[derive(Debug, Clone, Copy, new)]
pub struct CenterCrop {
    pub width: u32,
    pub height: u32,
}

impl ImageTransform for CenterCrop {
    fn apply(&self, img: DynamicImage) -> DynamicImage {
        let w = self.width.min(img.width());
        let h = self.height.min(img.height());
        let x = (img.width() - w) / 2;
        let y = (img.height() - h) / 2;
        img.crop_imm(x, y, w, h)
    }

    fn name(&self) -> String {
        "CenterCrop".to_string()
    }
}

#[derive(Debug, Clone, Copy, new)]
pub struct RandomHorizontalFlip {
    pub p: f64,
}

impl ImageTransform for RandomHorizontalFlip {
    fn apply(&self, img: DynamicImage) -> DynamicImage {
        if rand::random::<f64>() < self.p {
            img.fliph()
        } else {
            img
        }
    }

    fn name(&self) -> String {
        "RandomHorizontalFlip".to_string()
    }
}

#[derive(Debug, Clone, Copy, new)]
pub struct RandomVerticalFlip {
    pub p: f64,
}

impl ImageTransform for RandomVerticalFlip {
    fn apply(&self, img: DynamicImage) -> DynamicImage {
        if rand::random::<f64>() < self.p {
            img.flipv()
        } else {
            img
        }
    }

    fn name(&self) -> String {
        "RandomVerticalFlip".to_string()
    }
}

/// Converts to grayscale but keeps three identical channels, so statistics
/// computed for RGB still apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grayscale;

impl ImageTransform for Grayscale {
    fn apply(&self, img: DynamicImage) -> DynamicImage {
        DynamicImage::ImageRgb8(img.grayscale().to_rgb8())
    }

    fn name(&self) -> String {
        "Grayscale".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    fn gradient(w: u32, h: u32) -> DynamicImage {
        let mut img = RgbImage::new(w, h);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([x as u8, y as u8, 0]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn resize_is_exact() {
        let out = Resize::new(16, 8).apply(gradient(40, 30));
        assert_eq!(out.dimensions(), (16, 8));
    }

    #[test]
    fn center_crop_takes_the_middle() {
        let out = CenterCrop::new(4, 2).apply(gradient(10, 6)).to_rgb8();
        assert_eq!(out.dimensions(), (4, 2));
        assert_eq!(*out.get_pixel(0, 0), Rgb([3, 2, 0]));

        let clamped = CenterCrop::new(100, 100).apply(gradient(10, 6));
        assert_eq!(clamped.dimensions(), (10, 6));
    }

    #[test]
    fn flips_respect_probability() {
        let img = gradient(5, 3);

        let never = RandomHorizontalFlip::new(0.0).apply(img.clone()).to_rgb8();
        assert_eq!(never, img.to_rgb8());

        let always = RandomHorizontalFlip::new(1.0).apply(img.clone()).to_rgb8();
        assert_eq!(*always.get_pixel(0, 0), Rgb([4, 0, 0]));

        let always = RandomVerticalFlip::new(1.0).apply(img).to_rgb8();
        assert_eq!(*always.get_pixel(0, 0), Rgb([0, 2, 0]));
    }

    #[test]
    fn grayscale_keeps_three_channels() {
        let out = Grayscale.apply(gradient(3, 3));
        assert_eq!(out.color().channel_count(), 3);
        let px = out.to_rgb8().get_pixel(2, 1).0;
        assert!(px[0] == px[1] && px[1] == px[2]);
    }
}
