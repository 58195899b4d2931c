use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, Axis};

use crate::config::{ModelConfig, Normalization};

/// ImageNet channel means in BGR order.
const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessSpec {
    pub input_size: u32,
    pub normalization: Normalization,
    pub rescale: f32,
}

impl From<&ModelConfig> for PreprocessSpec {
    fn from(config: &ModelConfig) -> Self {
        Self {
            input_size: config.input_size,
            normalization: config.normalization,
            rescale: config.rescale,
        }
    }
}

impl PreprocessSpec {
    /// Resize, convert to a `[1, H, W, 3]` batch, normalise, rescale.
    pub fn apply(&self, image: &DynamicImage) -> Array4<f32> {
        let size = self.input_size;
        let rgb = image
            .resize_exact(size, size, FilterType::Nearest)
            .to_rgb8();

        let side = size as usize;
        let mut batch = Array4::<f32>::zeros((1, side, side, 3));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for (c, &value) in pixel.0.iter().enumerate() {
                batch[[0, y as usize, x as usize, c]] = value as f32;
            }
        }

        if self.normalization == Normalization::Vgg19Caffe {
            caffe_normalize(&mut batch);
        }
        batch.mapv_inplace(|v| v * self.rescale);
        batch
    }
}

fn caffe_normalize(batch: &mut Array4<f32>) {
    for mut pixel in batch.lanes_mut(Axis(3)) {
        let (r, g, b) = (pixel[0], pixel[1], pixel[2]);
        pixel[0] = b - CAFFE_MEAN_BGR[0];
        pixel[1] = g - CAFFE_MEAN_BGR[1];
        pixel[2] = r - CAFFE_MEAN_BGR[2];
    }
}
