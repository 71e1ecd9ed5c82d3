// 该文件是 Tumbler Probe 项目的一部分。
// src/model.rs - 模型与推理引擎
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

use ndarray::Array3;

use crate::frame::{EncodedTensor, InputSpec};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 外部推理引擎
///
/// 引擎只负责两件事：从映射好的模型字节得到可用的推理句柄，
/// 以及把一次前向推理的结果写进调用方预先分配的输出缓冲区。
pub trait Engine: Sized {
  type Error: std::error::Error + Send + Sync + 'static;

  fn load(asset: &ModelAsset, input: &InputSpec) -> Result<Self, Self::Error>;

  fn run(&self, input: &EncodedTensor, output: &mut Array3<f32>) -> Result<(), Self::Error>;
}

mod asset;
pub use self::asset::{ModelAsset, ModelAssetBuilder, ModelError};

#[cfg(feature = "tract_backend")]
mod tract_engine;
#[cfg(feature = "tract_backend")]
pub use self::tract_engine::{TractEngine, TractEngineError};
