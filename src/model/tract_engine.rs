// 该文件是 Tumbler Probe 项目的一部分。
// src/model/tract_engine.rs - 基于 tract 的推理引擎
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

use std::io::Cursor;

use ndarray::Array3;
use thiserror::Error;
use tract_onnx::prelude::*;
use tracing::{debug, info};

use crate::{
  frame::{EncodedTensor, InputSpec},
  model::{Engine, ModelAsset},
};

type Plan = RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>;

#[derive(Error, Debug)]
pub enum TractEngineError {
  #[error("Tract 错误: {0}")]
  TractError(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("输入形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  InputMismatch {
    expected: [usize; 4],
    actual: [usize; 4],
  },
  #[error("模型没有输出")]
  NoOutput,
  #[error("输出大小不匹配: 期望 {expected} 个元素, 实际 {actual} 个")]
  OutputMismatch { expected: usize, actual: usize },
}

impl From<TractError> for TractEngineError {
  fn from(err: TractError) -> Self {
    TractEngineError::TractError(err.into())
  }
}

/// 纯 Rust 的 ONNX 推理引擎
pub struct TractEngine {
  plan: Plan,
  input_shape: [usize; 4],
}

impl Engine for TractEngine {
  type Error = TractEngineError;

  fn load(asset: &ModelAsset, input: &InputSpec) -> Result<Self, Self::Error> {
    let shape = input.shape();
    info!("创建 tract 推理计划, 输入形状: {:?}", shape);

    let mut reader = Cursor::new(asset.as_bytes());
    let plan = tract_onnx::onnx()
      .model_for_read(&mut reader)?
      .with_input_fact(
        0,
        InferenceFact::dt_shape(f32::datum_type(), tvec![shape[0], shape[1], shape[2], shape[3]]),
      )?
      .into_optimized()?
      .into_runnable()?;
    info!("模型加载完成");

    Ok(Self {
      plan,
      input_shape: shape,
    })
  }

  fn run(&self, input: &EncodedTensor, output: &mut Array3<f32>) -> Result<(), Self::Error> {
    debug!("设置模型输入");
    let actual = input.spec().shape();
    if actual != self.input_shape {
      return Err(TractEngineError::InputMismatch {
        expected: self.input_shape,
        actual,
      });
    }
    let tensor = Tensor::from_shape(&self.input_shape, input.as_ref())?;

    debug!("执行模型推理");
    let outputs = self.plan.run(tvec![tensor.into()])?;

    debug!("获取模型输出");
    let result = outputs.first().ok_or(TractEngineError::NoOutput)?;
    let view = result.to_array_view::<f32>()?;
    debug!("模型输出形状: {:?}", view.shape());

    if view.len() != output.len() {
      return Err(TractEngineError::OutputMismatch {
        expected: output.len(),
        actual: view.len(),
      });
    }
    for (dst, src) in output.iter_mut().zip(view.iter()) {
      *dst = *src;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{decoder::OutputShape, encoder::ImageEncoder, frame::TensorLayout};
  use image::{Rgb, RgbImage};
  use std::io::Write;
  use tempfile::NamedTempFile;

  /// ONNX Identity 模型 (opset 13)，输入输出均为 float [1, 1, 4, 3]
  const IDENTITY_1X1X4X3: &[u8] = &[
    0x08, 0x07, 0x3a, 0x4f, 0x0a, 0x10, 0x0a, 0x01, 0x78, 0x12, 0x01, 0x79, 0x22, 0x08, 0x49, 0x64,
    0x65, 0x6e, 0x74, 0x69, 0x74, 0x79, 0x12, 0x01, 0x67, 0x5a, 0x1b, 0x0a, 0x01, 0x78, 0x12, 0x16,
    0x0a, 0x14, 0x08, 0x01, 0x12, 0x10, 0x0a, 0x02, 0x08, 0x01, 0x0a, 0x02, 0x08, 0x01, 0x0a, 0x02,
    0x08, 0x04, 0x0a, 0x02, 0x08, 0x03, 0x62, 0x1b, 0x0a, 0x01, 0x79, 0x12, 0x16, 0x0a, 0x14, 0x08,
    0x01, 0x12, 0x10, 0x0a, 0x02, 0x08, 0x01, 0x0a, 0x02, 0x08, 0x01, 0x0a, 0x02, 0x08, 0x04, 0x0a,
    0x02, 0x08, 0x03, 0x42, 0x02, 0x10, 0x0d,
  ];

  fn identity_engine() -> (TractEngine, ImageEncoder) {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(IDENTITY_1X1X4X3).unwrap();
    file.flush().unwrap();

    let spec = InputSpec::new(4, 1, TensorLayout::Nhwc);
    let asset = ModelAsset::open(file.path()).unwrap();
    let engine = TractEngine::load(&asset, &spec).unwrap();
    (engine, ImageEncoder::new(spec))
  }

  fn pixels() -> RgbImage {
    RgbImage::from_pixel(4, 1, Rgb([255, 0, 51]))
  }

  #[test]
  fn test_run_copies_model_output_in_order() {
    let (engine, encoder) = identity_engine();
    let input = encoder.encode(&pixels());
    let mut output = OutputShape::new(2, 6).alloc();

    engine.run(&input, &mut output).unwrap();

    let expected: Vec<f32> = [1.0, 0.0, 51.0 / 255.0].repeat(4);
    assert_eq!(output.iter().copied().collect::<Vec<_>>(), expected);
    assert_eq!(output.as_slice().unwrap(), input.as_ref());
  }

  #[test]
  fn test_run_rejects_mismatched_output_shape() {
    let (engine, encoder) = identity_engine();
    let input = encoder.encode(&pixels());
    let mut output = OutputShape::new(3, 6).alloc();

    let err = engine.run(&input, &mut output).unwrap_err();
    assert!(matches!(
      err,
      TractEngineError::OutputMismatch {
        expected: 18,
        actual: 12
      }
    ));
  }

  #[test]
  fn test_run_rejects_tensor_encoded_for_other_shape() {
    let (engine, _) = identity_engine();
    let other = ImageEncoder::new(InputSpec::new(2, 2, TensorLayout::Nhwc));
    let input = other.encode(&pixels());
    let mut output = OutputShape::new(2, 6).alloc();

    let err = engine.run(&input, &mut output).unwrap_err();
    assert!(matches!(
      err,
      TractEngineError::InputMismatch {
        expected: [1, 1, 4, 3],
        actual: [1, 2, 2, 3]
      }
    ));
  }

  #[test]
  fn test_load_rejects_garbage_model() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"not an onnx model").unwrap();
    file.flush().unwrap();

    let asset = ModelAsset::open(file.path()).unwrap();
    let spec = InputSpec::new(4, 1, TensorLayout::Nhwc);
    assert!(matches!(
      TractEngine::load(&asset, &spec),
      Err(TractEngineError::TractError(_))
    ));
  }
}
