// 该文件是 Tumbler Probe 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复推理测速
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use tumbler_probe::{
  FromUrl,
  config::DetectorArgs,
  detector::TargetDetector,
  input::ImageFileInput,
  model::{ModelAssetBuilder, TractEngine},
  output::SilentOutput,
  task::{RepeatShotTask, Task},
};
use tracing::info;

/// Tumbler Probe 测速参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型文件路径
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 重复次数
  #[arg(long, default_value = "1000", value_name = "COUNT")]
  pub times: usize,
  #[command(flatten)]
  pub detector: DetectorArgs,
}

fn main() -> Result<()> {
  tumbler_probe::logging::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("重复次数: {}", args.times);

  let config = args.detector.detector_config()?;
  let builder = ModelAssetBuilder::from_url(&args.model)?;
  let model = TargetDetector::<TractEngine>::open(builder, &config)?;
  let input = ImageFileInput::from_url(&args.input)?;

  RepeatShotTask::default()
    .with_times(args.times)
    .run_task(input, model, SilentOutput)?;

  Ok(())
}
