// 该文件是 Tumbler Probe 项目的一部分。
// src/output.rs - 输出定义
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

use std::{
  cell::RefCell,
  convert::Infallible,
  io::{self, Write},
};

use tracing::{debug, info};

use crate::detector::Verdict;

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

/// 两条固定提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages {
  pub detected: String,
  pub not_detected: String,
}

impl Default for Messages {
  fn default() -> Self {
    Self::new("Tumbler detected!", "No tumbler detected.")
  }
}

impl Messages {
  pub fn new(detected: &str, not_detected: &str) -> Self {
    Self {
      detected: detected.to_string(),
      not_detected: not_detected.to_string(),
    }
  }

  pub fn select(&self, verdict: &Verdict) -> &str {
    if verdict.is_detected() {
      &self.detected
    } else {
      &self.not_detected
    }
  }
}

/// 类似移动端 toast 的一次性提示，写到任意 `Write` 目标
pub struct ToastOutput<W: Write = io::Stdout> {
  messages: Messages,
  sink: RefCell<W>,
}

impl ToastOutput {
  pub fn stdout(messages: Messages) -> Self {
    Self::with_sink(messages, io::stdout())
  }
}

impl<W: Write> ToastOutput<W> {
  pub fn with_sink(messages: Messages, sink: W) -> Self {
    Self {
      messages,
      sink: RefCell::new(sink),
    }
  }

  pub fn into_sink(self) -> W {
    self.sink.into_inner()
  }
}

impl<F, W: Write> Render<F, Verdict> for ToastOutput<W> {
  type Error = io::Error;

  fn render_result(&self, _frame: &F, result: &Verdict) -> Result<(), Self::Error> {
    let message = self.messages.select(result);
    info!("提示: {}", message);
    writeln!(self.sink.borrow_mut(), "{}", message)
  }
}

/// 只在调试日志中记录判定结果，不产生任何输出
pub struct SilentOutput;

impl<F> Render<F, Verdict> for SilentOutput {
  type Error = Infallible;

  fn render_result(&self, _frame: &F, result: &Verdict) -> Result<(), Self::Error> {
    debug!("判定结果: {:?}", result);
    Ok(())
  }
}
