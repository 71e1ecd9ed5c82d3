// 该文件是 Tumbler Probe 项目的一部分。
// src/main.rs - 单次检测主程序
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
use tracing::info;
use url::Url;

use tumbler_probe::{
  FromUrl,
  config::DetectorArgs,
  detector::TargetDetector,
  input::ImageFileInput,
  model::{ModelAssetBuilder, TractEngine},
  output::ToastOutput,
  task::{OneShotTask, Task},
};

/// Tumbler Probe 参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型文件路径，例如 model:///assets/rhm.onnx?offset=0&length=1024
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///assets/fish_3.png
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  #[command(flatten)]
  pub detector: DetectorArgs,
}

fn main() -> Result<()> {
  tumbler_probe::logging::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("置信度阈值: {}", args.detector.threshold);

  let config = args.detector.detector_config()?;

  let builder = ModelAssetBuilder::from_url(&args.model)?;
  let Some(detector) = TargetDetector::<TractEngine>::load_or_skip(builder, &config) else {
    return Ok(());
  };

  let input = ImageFileInput::from_url(&args.input)?;
  let output = ToastOutput::stdout(args.detector.messages());

  OneShotTask.run_task(input, detector, output)?;

  Ok(())
}
