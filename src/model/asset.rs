// 该文件是 Tumbler Probe 项目的一部分。
// src/model/asset.rs - 只读映射的模型文件
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
  fs::File,
  path::{Path, PathBuf},
};

use memmap2::{Mmap, MmapOptions};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, url_file_path};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型区域越界: 偏移 {offset} + 长度 {length} 超过文件大小 {file_len}")]
  RegionOutOfBounds {
    offset: u64,
    length: u64,
    file_len: u64,
  },
}

/// 映射到内存中的模型文件区域
pub struct ModelAsset {
  path: PathBuf,
  mmap: Mmap,
}

impl std::fmt::Debug for ModelAsset {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ModelAsset")
      .field("path", &self.path)
      .field("len", &self.mmap.len())
      .finish()
  }
}

impl ModelAsset {
  /// 映射整个文件
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ModelError> {
    ModelAssetBuilder::new(path).open()
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.mmap
  }

  pub fn len(&self) -> usize {
    self.mmap.len()
  }

  pub fn is_empty(&self) -> bool {
    self.mmap.is_empty()
  }
}

#[derive(Debug, Clone)]
pub struct ModelAssetBuilder {
  path: PathBuf,
  offset: u64,
  length: Option<u64>,
}

impl FromUrlWithScheme for ModelAssetBuilder {
  const SCHEME: &'static str = "model";
}

impl FromUrl for ModelAssetBuilder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let path = url_file_path(url)
      .map_err(|e| ModelError::ModelPathError(format!("路径编码无效: {}", e)))?;
    let mut builder = ModelAssetBuilder::new(path);
    for (key, value) in url.query_pairs() {
      let parse = || {
        value
          .parse::<u64>()
          .map_err(|e| ModelError::ModelPathError(format!("参数 {} 无效: {}", key, e)))
      };
      match key.as_ref() {
        "offset" => builder = builder.offset(parse()?),
        "length" => builder = builder.length(parse()?),
        _ => debug!("忽略未知的模型参数: {}", key),
      }
    }
    Ok(builder)
  }
}

impl ModelAssetBuilder {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      offset: 0,
      length: None,
    }
  }

  /// 模型在文件中的起始偏移
  pub fn offset(mut self, offset: u64) -> Self {
    self.offset = offset;
    self
  }

  /// 声明的模型长度，缺省时映射到文件末尾
  pub fn length(mut self, length: u64) -> Self {
    self.length = Some(length);
    self
  }

  pub fn open(self) -> Result<ModelAsset, ModelError> {
    info!("加载模型文件: {}", self.path.display());
    let file = File::open(&self.path).inspect_err(|e| {
      error!("无法打开模型文件 {}: {}", self.path.display(), e);
    })?;

    let file_len = file.metadata()?.len();
    let length = match self.length {
      Some(length) => length,
      None => file_len.saturating_sub(self.offset),
    };
    if self.offset.saturating_add(length) > file_len {
      return Err(ModelError::RegionOutOfBounds {
        offset: self.offset,
        length,
        file_len,
      });
    }

    // SAFETY: 映射为只读，模型文件在进程生命周期内不应被修改
    let mmap = unsafe {
      MmapOptions::new()
        .offset(self.offset)
        .len(length as usize)
        .map(&file)?
    };
    debug!(
      "模型文件大小: {:.2} MB",
      mmap.len() as f64 / (1024.0 * 1024.0)
    );

    Ok(ModelAsset {
      path: self.path,
      mmap,
    })
  }
}
