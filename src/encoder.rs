// 该文件是 Tumbler Probe 项目的一部分。
// src/encoder.rs - 图像编码器
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Tumbler Probe 贡献者

use std::borrow::Cow;

use image::{RgbImage, imageops::FilterType};
use tracing::debug;

use crate::frame::{EncodedTensor, InputSpec, RGB_CHANNELS, TensorLayout};

/// 缩放时使用的插值方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ResizeFilter {
  Nearest,
  /// 双线性
  #[default]
  Triangle,
  CatmullRom,
  Gaussian,
  Lanczos3,
}

impl From<ResizeFilter> for FilterType {
  fn from(filter: ResizeFilter) -> Self {
    match filter {
      ResizeFilter::Nearest => FilterType::Nearest,
      ResizeFilter::Triangle => FilterType::Triangle,
      ResizeFilter::CatmullRom => FilterType::CatmullRom,
      ResizeFilter::Gaussian => FilterType::Gaussian,
      ResizeFilter::Lanczos3 => FilterType::Lanczos3,
    }
  }
}

/// 把解码后的图像缩放并归一化为推理输入
#[derive(Debug, Clone, Copy)]
pub struct ImageEncoder {
  spec: InputSpec,
  filter: FilterType,
}

impl ImageEncoder {
  pub fn new(spec: InputSpec) -> Self {
    Self {
      spec,
      filter: ResizeFilter::default().into(),
    }
  }

  pub fn filter(mut self, filter: impl Into<FilterType>) -> Self {
    self.filter = filter.into();
    self
  }

  /// 编码一帧图像，输出长度恒为 3 * width * height
  pub fn encode(&self, image: &RgbImage) -> EncodedTensor {
    let (width, height) = (self.spec.width, self.spec.height);
    if self.spec.is_empty() {
      return EncodedTensor::new(self.spec, Vec::new());
    }

    let resized = if image.dimensions() == (width, height) {
      Cow::Borrowed(image)
    } else {
      debug!(
        "缩放图像: {}x{} -> {}x{}",
        image.width(),
        image.height(),
        width,
        height
      );
      Cow::Owned(image::imageops::resize(image, width, height, self.filter))
    };

    let bytes = match self.spec.layout {
      TensorLayout::Nhwc => resized.as_raw().clone(),
      TensorLayout::Nchw => to_planar(&resized),
    };

    EncodedTensor::new(self.spec, bytes)
  }
}

fn to_planar(image: &RgbImage) -> Vec<u8> {
  let (width, height) = image.dimensions();
  let plane = width as usize * height as usize;
  let mut planar = vec![0u8; RGB_CHANNELS * plane];

  for h in 0..height {
    for w in 0..width {
      let pixel = image.get_pixel(w, h);
      let offset = h as usize * width as usize + w as usize;
      for c in 0..RGB_CHANNELS {
        planar[c * plane + offset] = pixel[c];
      }
    }
  }
  planar
}
