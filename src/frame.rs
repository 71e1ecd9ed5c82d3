// 该文件是 Tumbler Probe 项目的一部分。
// src/frame.rs - 编码张量定义
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

pub const RGB_CHANNELS: usize = 3;

/// 张量内存布局
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TensorLayout {
  /// 逐像素交错 R, G, B（行优先）
  #[default]
  Nhwc,
  /// 按通道分平面存放
  Nchw,
}

/// 推理引擎期望的输入形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
  pub width: u32,
  pub height: u32,
  pub layout: TensorLayout,
}

impl Default for InputSpec {
  fn default() -> Self {
    Self {
      width: 416,
      height: 416,
      layout: TensorLayout::Nhwc,
    }
  }
}

impl InputSpec {
  pub fn new(width: u32, height: u32, layout: TensorLayout) -> Self {
    Self {
      width,
      height,
      layout,
    }
  }

  /// 批大小固定为 1 的四维形状
  pub fn shape(&self) -> [usize; 4] {
    let (w, h) = (self.width as usize, self.height as usize);
    match self.layout {
      TensorLayout::Nhwc => [1, h, w, RGB_CHANNELS],
      TensorLayout::Nchw => [1, RGB_CHANNELS, h, w],
    }
  }

  pub fn len(&self) -> usize {
    RGB_CHANNELS * self.width as usize * self.height as usize
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// 归一化后的输入张量，每个值都在 [0.0, 1.0] 之间
#[derive(Debug, Clone)]
pub struct EncodedTensor {
  spec: InputSpec,
  data: Box<[f32]>,
}

impl EncodedTensor {
  pub(crate) fn new(spec: InputSpec, data: Vec<u8>) -> Self {
    // 逐字节归一化
    let data = data.into_iter().map(|v| f32::from(v) / 255.0).collect();
    Self { spec, data }
  }

  pub fn spec(&self) -> &InputSpec {
    &self.spec
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

impl AsRef<[f32]> for EncodedTensor {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}
