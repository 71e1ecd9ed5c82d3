// 该文件是 Tumbler Probe 项目的一部分。
// src/detector.rs - 目标检测器
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

use image::RgbImage;
use thiserror::Error;
use tracing::{Level, debug, enabled, error, info};

use crate::{
  config::DetectorConfig,
  decoder::{DetectionDecoder, DetectionRecord, OutputShape, flatten},
  encoder::ImageEncoder,
  model::{Engine, Model, ModelAsset, ModelAssetBuilder, ModelError},
};

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("{0}")]
  ModelError(#[from] ModelError),
  #[error("推理引擎错误: {0}")]
  EngineError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DetectorError {
  fn engine<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    DetectorError::EngineError(Box::new(err))
  }
}

/// 单次推理的判定结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
  /// 第一条超过阈值的记录
  Detected(DetectionRecord),
  NotDetected,
}

impl Verdict {
  pub fn is_detected(&self) -> bool {
    matches!(self, Verdict::Detected(_))
  }
}

/// 编码 → 推理 → 解码
pub struct TargetDetector<E> {
  engine: E,
  encoder: ImageEncoder,
  decoder: DetectionDecoder,
  output: OutputShape,
}

impl<E: Engine> TargetDetector<E> {
  pub fn new(engine: E, config: &DetectorConfig) -> Self {
    Self {
      engine,
      encoder: ImageEncoder::new(config.input).filter(config.filter),
      decoder: DetectionDecoder::new(config.record, config.threshold),
      output: config.output,
    }
  }

  /// 从映射好的模型创建检测器
  pub fn load(asset: &ModelAsset, config: &DetectorConfig) -> Result<Self, DetectorError> {
    let engine = E::load(asset, &config.input).map_err(DetectorError::engine)?;
    Ok(Self::new(engine, config))
  }

  /// 映射模型文件并创建检测器
  pub fn open(builder: ModelAssetBuilder, config: &DetectorConfig) -> Result<Self, DetectorError> {
    let asset = builder.open()?;
    Self::load(&asset, config)
  }

  /// 加载失败时记录原因并返回 `None`，调用方据此跳过推理
  pub fn load_or_skip(builder: ModelAssetBuilder, config: &DetectorConfig) -> Option<Self> {
    match Self::open(builder, config) {
      Ok(detector) => Some(detector),
      Err(e) => {
        error!("模型加载失败: {}", e);
        error!("推理器未初始化，跳过推理");
        None
      }
    }
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }
}

impl<E: Engine> Model for TargetDetector<E> {
  type Input = RgbImage;
  type Output = Verdict;
  type Error = DetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = self.encoder.encode(input);
    debug!("输入张量长度: {}", tensor.len());

    let mut output = self.output.alloc();
    self
      .engine
      .run(&tensor, &mut output)
      .map_err(DetectorError::engine)?;

    let flat = flatten(&output);
    // 全量扫描只在调试日志打开时进行
    if enabled!(Level::DEBUG) {
      if let Some(best) = self.decoder.best(&flat) {
        debug!(
          "最高置信度: {:.4} (记录 {})",
          best.confidence(),
          best.index
        );
      }
    }

    let verdict = match self.decoder.first_hit(&flat) {
      Some(record) => {
        info!(
          "记录 {} 置信度 {:.4} 超过阈值 {}",
          record.index,
          record.confidence(),
          self.decoder.threshold()
        );
        Verdict::Detected(record)
      }
      None => Verdict::NotDetected,
    };
    Ok(verdict)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    decoder::RecordLayout,
    encoder::ResizeFilter,
    frame::{EncodedTensor, InputSpec, TensorLayout},
  };
  use image::Rgb;
  use ndarray::Array3;
  use std::cell::Cell;

  #[derive(Error, Debug)]
  #[error("引擎故障")]
  struct FakeFailure;

  /// 用输入张量的均值作为每条记录的分数
  struct MeanScoreEngine {
    runs: Cell<usize>,
    expected_len: usize,
  }

  impl Engine for MeanScoreEngine {
    type Error = FakeFailure;

    fn load(_asset: &ModelAsset, input: &InputSpec) -> Result<Self, Self::Error> {
      Ok(Self {
        runs: Cell::new(0),
        expected_len: input.len(),
      })
    }

    fn run(&self, input: &EncodedTensor, output: &mut Array3<f32>) -> Result<(), Self::Error> {
      assert_eq!(input.len(), self.expected_len);
      self.runs.set(self.runs.get() + 1);
      let mean = input.as_ref().iter().sum::<f32>() / input.len() as f32;
      for mut record in output.rows_mut() {
        record[4] = mean;
        record[5] = mean;
      }
      Ok(())
    }
  }

  struct FailingEngine;

  impl Engine for FailingEngine {
    type Error = FakeFailure;

    fn load(_asset: &ModelAsset, _input: &InputSpec) -> Result<Self, Self::Error> {
      Err(FakeFailure)
    }

    fn run(&self, _input: &EncodedTensor, _output: &mut Array3<f32>) -> Result<(), Self::Error> {
      Err(FakeFailure)
    }
  }

  fn test_config() -> DetectorConfig {
    DetectorConfig {
      input: InputSpec::new(8, 8, TensorLayout::Nhwc),
      filter: ResizeFilter::Triangle,
      output: OutputShape::new(3, 6),
      record: RecordLayout::default(),
      threshold: 0.5,
    }
  }

  fn engine(config: &DetectorConfig) -> MeanScoreEngine {
    MeanScoreEngine {
      runs: Cell::new(0),
      expected_len: config.input.len(),
    }
  }

  #[test]
  fn test_white_image_is_detected() {
    let config = test_config();
    let detector = TargetDetector::new(engine(&config), &config);
    let image = RgbImage::from_pixel(20, 10, Rgb([255, 255, 255]));

    let verdict = detector.infer(&image).unwrap();
    assert!(verdict.is_detected());
    match verdict {
      Verdict::Detected(record) => assert_eq!(record.index, 0),
      Verdict::NotDetected => unreachable!(),
    }
    assert_eq!(detector.engine().runs.get(), 1);
  }

  #[test]
  fn test_dark_image_is_not_detected() {
    let config = test_config();
    let detector = TargetDetector::new(engine(&config), &config);
    // 约 0.25，不超过阈值
    let image = RgbImage::from_pixel(20, 10, Rgb([128, 128, 128]));

    assert_eq!(detector.infer(&image).unwrap(), Verdict::NotDetected);
  }

  #[test]
  fn test_engine_failure_propagates() {
    let config = test_config();
    let detector = TargetDetector::new(FailingEngine, &config);
    let image = RgbImage::new(4, 4);

    let err = detector.infer(&image).unwrap_err();
    assert_eq!(err.to_string(), "推理引擎错误: 引擎故障");
  }

  #[test]
  fn test_load_failure_is_reported() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"not a model").unwrap();
    let asset = ModelAsset::open(file.path()).unwrap();

    let result = TargetDetector::<FailingEngine>::load(&asset, &test_config());
    assert!(matches!(result, Err(DetectorError::EngineError(_))));

    let detector = TargetDetector::<MeanScoreEngine>::load(&asset, &test_config()).unwrap();
    assert_eq!(detector.engine().expected_len, 8 * 8 * 3);
  }

  #[test]
  fn test_load_or_skip_returns_none_on_engine_failure() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"not a model").unwrap();

    let builder = ModelAssetBuilder::new(file.path());
    assert!(TargetDetector::<FailingEngine>::load_or_skip(builder, &test_config()).is_none());
  }

  #[test]
  fn test_load_or_skip_returns_none_on_missing_file() {
    let builder = ModelAssetBuilder::new("/nonexistent/rhm.onnx");
    assert!(TargetDetector::<MeanScoreEngine>::load_or_skip(builder, &test_config()).is_none());

    let err = TargetDetector::<MeanScoreEngine>::open(
      ModelAssetBuilder::new("/nonexistent/rhm.onnx"),
      &test_config(),
    )
    .err()
    .unwrap();
    assert!(matches!(
      err,
      DetectorError::ModelError(ModelError::ModelLoadError(_))
    ));
  }

  #[test]
  fn test_load_or_skip_keeps_working_detector() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"weights").unwrap();

    let builder = ModelAssetBuilder::new(file.path());
    let detector = TargetDetector::<MeanScoreEngine>::load_or_skip(builder, &test_config()).unwrap();
    let image = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
    assert!(detector.infer(&image).unwrap().is_detected());
  }

  #[test]
  fn test_debug_scan_does_not_change_verdict() {
    let config = test_config();
    let detector = TargetDetector::new(engine(&config), &config);
    let image = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));

    let quiet = detector.infer(&image).unwrap();
    let subscriber = tracing_subscriber::fmt()
      .with_max_level(Level::DEBUG)
      .with_test_writer()
      .finish();
    let verbose = tracing::subscriber::with_default(subscriber, || detector.infer(&image).unwrap());

    assert_eq!(quiet, verbose);
    assert_eq!(detector.engine().runs.get(), 2);
  }
}
