// 该文件是 Tumbler Probe 项目的一部分。
// src/decoder.rs - 检测输出解码
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
use thiserror::Error;

/// 每条检测记录的默认字段数: [cx, cy, w, h, objectness, class_score]
pub const DEFAULT_FIELDS: usize = 6;
pub const DEFAULT_RECORDS: usize = 10647;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
  #[error("记录步长不能为 0")]
  ZeroStride,
  #[error("字段索引 {index} 超出记录步长 {stride}")]
  FieldOutOfRange { index: usize, stride: usize },
}

/// 推理输出形状 (batch, records, fields)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputShape {
  pub batch: usize,
  pub records: usize,
  pub fields: usize,
}

impl Default for OutputShape {
  fn default() -> Self {
    Self::new(DEFAULT_RECORDS, DEFAULT_FIELDS)
  }
}

impl OutputShape {
  pub fn new(records: usize, fields: usize) -> Self {
    Self {
      batch: 1,
      records,
      fields,
    }
  }

  pub fn len(&self) -> usize {
    self.batch * self.records * self.fields
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// 预分配输出缓冲区
  pub fn alloc(&self) -> Array3<f32> {
    Array3::zeros((self.batch, self.records, self.fields))
  }
}

/// 单条记录内各字段的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
  stride: usize,
  objectness: usize,
  class_score: usize,
}

impl Default for RecordLayout {
  fn default() -> Self {
    Self {
      stride: DEFAULT_FIELDS,
      objectness: 4,
      class_score: 5,
    }
  }
}

impl RecordLayout {
  pub fn new(stride: usize, objectness: usize, class_score: usize) -> Result<Self, LayoutError> {
    if stride == 0 {
      return Err(LayoutError::ZeroStride);
    }
    for index in [objectness, class_score] {
      if index >= stride {
        return Err(LayoutError::FieldOutOfRange { index, stride });
      }
    }
    Ok(Self {
      stride,
      objectness,
      class_score,
    })
  }

  fn record(&self, index: usize, fields: &[f32]) -> DetectionRecord {
    let mut bbox = [0.0; 4];
    let n = fields.len().min(4);
    bbox[..n].copy_from_slice(&fields[..n]);

    DetectionRecord {
      index,
      bbox,
      objectness: fields[self.objectness],
      class_score: fields[self.class_score],
    }
  }
}

/// 一条检测记录
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionRecord {
  pub index: usize,
  /// 前四个字段，默认布局下为 [cx, cy, w, h]
  pub bbox: [f32; 4],
  pub objectness: f32,
  pub class_score: f32,
}

impl DetectionRecord {
  /// 类别置信度 = 类别分数 * 目标存在概率
  pub fn confidence(&self) -> f32 {
    self.class_score * self.objectness
  }
}

/// 按 (batch, record, field) 顺序展平
pub fn flatten(output: &Array3<f32>) -> Vec<f32> {
  output.iter().copied().collect()
}

/// 按记录步长切分，末尾不足一条的部分被忽略
pub fn records<'a>(
  flat: &'a [f32],
  layout: &'a RecordLayout,
) -> impl Iterator<Item = DetectionRecord> + 'a {
  flat
    .chunks_exact(layout.stride)
    .enumerate()
    .map(move |(index, fields)| layout.record(index, fields))
}

/// 使用默认记录布局判断是否检测到目标
pub fn is_detected(flat: &[f32], threshold: f32) -> bool {
  DetectionDecoder::new(RecordLayout::default(), threshold).detect(flat)
}

#[derive(Debug, Clone, Copy)]
pub struct DetectionDecoder {
  layout: RecordLayout,
  threshold: f32,
}

impl DetectionDecoder {
  pub fn new(layout: RecordLayout, threshold: f32) -> Self {
    Self { layout, threshold }
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  /// 第一条置信度超过阈值的记录
  pub fn first_hit(&self, flat: &[f32]) -> Option<DetectionRecord> {
    records(flat, &self.layout).find(|record| record.confidence() > self.threshold)
  }

  pub fn detect(&self, flat: &[f32]) -> bool {
    self.first_hit(flat).is_some()
  }

  pub fn decode(&self, output: &Array3<f32>) -> bool {
    self.detect(&flatten(output))
  }

  /// 置信度最高的记录，仅用于调试输出
  pub fn best(&self, flat: &[f32]) -> Option<DetectionRecord> {
    records(flat, &self.layout).max_by(|a, b| a.confidence().total_cmp(&b.confidence()))
  }
}
