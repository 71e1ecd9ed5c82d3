// 该文件是 Tumbler Probe 项目的一部分。
// src/config.rs - 检测参数配置
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

use clap::Args;
use thiserror::Error;

use crate::{
  decoder::{LayoutError, OutputShape, RecordLayout},
  encoder::ResizeFilter,
  frame::{InputSpec, TensorLayout},
  output::Messages,
};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("记录布局错误: {0}")]
  LayoutError(#[from] LayoutError),
}

/// 一次检测所需的全部参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
  pub input: InputSpec,
  pub filter: ResizeFilter,
  pub output: OutputShape,
  pub record: RecordLayout,
  pub threshold: f32,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      input: InputSpec::default(),
      filter: ResizeFilter::default(),
      output: OutputShape::default(),
      record: RecordLayout::default(),
      threshold: 0.5,
    }
  }
}

/// 检测参数（命令行）
#[derive(Args, Debug, Clone)]
pub struct DetectorArgs {
  /// 模型输入宽度
  #[arg(long, default_value = "416", value_name = "PIXELS")]
  pub width: u32,

  /// 模型输入高度
  #[arg(long, default_value = "416", value_name = "PIXELS")]
  pub height: u32,

  /// 输入张量布局
  #[arg(long, value_enum, default_value = "nhwc")]
  pub layout: TensorLayout,

  /// 缩放插值方式
  #[arg(long, value_enum, default_value = "triangle")]
  pub filter: ResizeFilter,

  /// 输出记录条数
  #[arg(long, default_value = "10647", value_name = "COUNT")]
  pub records: usize,

  /// 每条记录的字段数
  #[arg(long, default_value = "6", value_name = "COUNT")]
  pub fields: usize,

  /// 目标存在概率所在的字段索引
  #[arg(long, default_value = "4", value_name = "INDEX")]
  pub objectness_index: usize,

  /// 类别分数所在的字段索引
  #[arg(long, default_value = "5", value_name = "INDEX")]
  pub class_index: usize,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub threshold: f32,

  /// 检测到目标时的提示
  #[arg(long, default_value = "Tumbler detected!", value_name = "TEXT")]
  pub detected_message: String,

  /// 未检测到目标时的提示
  #[arg(long, default_value = "No tumbler detected.", value_name = "TEXT")]
  pub missing_message: String,
}

impl DetectorArgs {
  pub fn detector_config(&self) -> Result<DetectorConfig, ConfigError> {
    // 记录步长即输出的字段数
    let record = RecordLayout::new(self.fields, self.objectness_index, self.class_index)?;

    Ok(DetectorConfig {
      input: InputSpec::new(self.width, self.height, self.layout),
      filter: self.filter,
      output: OutputShape::new(self.records, self.fields),
      record,
      threshold: self.threshold,
    })
  }

  pub fn messages(&self) -> Messages {
    Messages::new(&self.detected_message, &self.missing_message)
  }
}
