use burn::tensor::{backend::Backend, Tensor};

use crate::transform::Normalize;

/// Accumulates per-channel statistics over batches of images.
///
/// Every image contributes its own channel means and (unbiased) channel
/// standard deviations; [`ChannelStats::finish`] averages those over all images.
/// This is the mean of per-image stds, not the pooled dataset std, so images
/// that differ a lot from each other end up with a smaller std than the
/// dataset as a whole.
#[derive(Debug, Clone, Default)]
pub struct ChannelStats {
    mean_sum: Vec<f64>,
    std_sum: Vec<f64>,
    count: usize,
}

impl ChannelStats {
    /// `batch` is N x C x H x W.
    pub fn update<B: Backend>(&mut self, batch: Tensor<B, 4>) {
        let [n, c, h, w] = batch.shape().dims;
        if n == 0 {
            return;
        }
        let pixels = h * w;

        let x = batch.reshape([n, c, pixels]);
        let mean = x.clone().mean_dim(2);
        let diff = x - mean.clone();
        let std = (diff.clone() * diff)
            .sum_dim(2)
            .div_scalar(pixels as f32 - 1.0)
            .sqrt();

        let mean = to_vec(mean.sum_dim(0).reshape([c]));
        let std = to_vec(std.sum_dim(0).reshape([c]));

        if self.mean_sum.is_empty() {
            self.mean_sum = vec![0.0; c];
            self.std_sum = vec![0.0; c];
        }
        debug_assert_eq!(self.mean_sum.len(), c, "channel count changed between batches");

        for (acc, v) in self.mean_sum.iter_mut().zip(mean) {
            *acc += v as f64;
        }
        for (acc, v) in self.std_sum.iter_mut().zip(std) {
            *acc += v as f64;
        }
        self.count += n;
    }

    /// Number of images seen so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn finish(&self) -> Option<Normalize> {
        if self.count == 0 {
            return None;
        }
        let count = self.count as f64;
        let avg = |sum: &[f64]| sum.iter().map(|s| (s / count) as f32).collect();
        Some(Normalize::new(avg(&self.mean_sum), avg(&self.std_sum)))
    }
}

fn to_vec<B: Backend>(t: Tensor<B, 1>) -> Vec<f32> {
    t.into_data().convert::<f32>().value
}

#[cfg(test)]
mod tests {
    use super::ChannelStats;
    use burn::tensor::{Data, Shape, Tensor};

    type B = burn::backend::NdArray;

    fn batch(values: Vec<f32>, dims: [usize; 4]) -> Tensor<B, 4> {
        let device = burn::backend::ndarray::NdArrayDevice::Cpu;
        Tensor::from_data(Data::new(values, Shape::new(dims)), &device)
    }

    #[test]
    fn constant_images() {
        let mut stats = ChannelStats::default();
        stats.update(batch(vec![0.25; 2 * 3 * 4 * 4], [2, 3, 4, 4]));
        stats.update(batch(vec![0.25; 3 * 4 * 4], [1, 3, 4, 4]));

        let result = stats.finish().unwrap();
        assert_eq!(stats.count(), 3);
        assert_eq!(result.mean.len(), 3);
        for (m, s) in result.mean.iter().zip(result.std.iter()) {
            assert!((m - 0.25).abs() < 1e-6);
            assert!(s.abs() < 1e-6);
        }
    }

    #[test]
    fn averages_per_image_statistics() {
        // one channel, two pixels per image
        let mut stats = ChannelStats::default();
        stats.update(batch(vec![0.0, 1.0, 0.5, 0.5], [2, 1, 1, 2]));

        let result = stats.finish().unwrap();
        // image means 0.5 and 0.5; stds sqrt(0.5) and 0
        assert!((result.mean[0] - 0.5).abs() < 1e-6);
        assert!((result.std[0] - 0.5f32.sqrt() / 2.0).abs() < 1e-6);
    }

    #[test]
    fn empty_has_no_result() {
        assert!(ChannelStats::default().finish().is_none());
    }
}
