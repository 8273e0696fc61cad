use image::DynamicImage;

use super::ImageTransform;

/// Removes the right 30% of an image. AFM images often carry a colour scale
/// bar on the right-hand side.
#[derive(Debug, Clone, Copy, Default)]
pub struct AfmCrop;

impl AfmCrop {
    pub fn cropped_width(width: u32) -> u32 {
        (0.7 * width as f64).floor() as u32
    }
}

impl ImageTransform for AfmCrop {
    fn apply(&self, img: DynamicImage) -> DynamicImage {
        let (w, h) = (img.width(), img.height());
        img.crop_imm(0, 0, Self::cropped_width(w), h)
    }

    fn name(&self) -> String {
        "AfmCrop".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    #[test]
    fn keeps_left_seventy_percent() {
        for (w, h) in [(10, 10), (11, 3), (37, 20), (224, 224), (1000, 1)] {
            let img = DynamicImage::ImageRgb8(RgbImage::new(w, h));
            let out = AfmCrop.apply(img);
            assert_eq!(out.dimensions(), ((0.7 * w as f64).floor() as u32, h));
        }
        assert_eq!(AfmCrop::cropped_width(10), 7);
    }

    #[test]
    fn drops_the_scale_bar() {
        let keep = AfmCrop::cropped_width(20);
        let mut img = RgbImage::from_pixel(20, 5, Rgb([10, 10, 10]));
        for x in keep..20 {
            for y in 0..5 {
                img.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        let out = AfmCrop.apply(DynamicImage::ImageRgb8(img)).to_rgb8();
        assert_eq!(out.width(), keep);
        assert!(out.pixels().all(|p| *p == Rgb([10, 10, 10])));
    }
}
